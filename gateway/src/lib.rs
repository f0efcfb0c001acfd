pub mod config;
pub mod handler;
pub mod protocol;
pub mod server;

pub use config::AppConfig;
pub use handler::{HoldService, Session};
pub use protocol::{ClientRequest, Op, ServerMessage};
pub use server::serve;
