mod area;

pub use area::{ContextStorage, StorageArea};
