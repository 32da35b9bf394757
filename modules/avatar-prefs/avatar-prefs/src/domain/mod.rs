pub mod bus;
pub mod deriver;
pub mod error;
pub mod ports;
pub mod session;
pub mod store;
pub mod view;

pub use bus::{AvatarUpdated, Notification, PreferenceBus, Subscription};
pub use deriver::AvatarDeriver;
pub use error::{DomainError, StorageError};
pub use ports::{ContextId, ImageWarmer, LocalStorage, NoopWarmer, StorageChange, StorageEvents};
pub use session::{PreferenceSession, SessionPhase};
pub use store::PreferenceStore;
pub use view::AvatarView;
