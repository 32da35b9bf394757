pub mod storage;
pub mod warm;

pub use storage::{ContextStorage, StorageArea};
pub use warm::HttpWarmer;
