pub mod broadcast;
pub mod config;
pub mod error;
pub mod manager;
pub mod model;
pub mod room_key;
pub mod sweeper;

pub use config::HoldConfig;
pub use error::HoldError;
pub use manager::HoldManager;
pub use model::{CarId, Hold, HoldEvent, HoldSnapshot, HoldStatus};
pub use room_key::RoomKey;
