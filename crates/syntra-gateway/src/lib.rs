pub mod annotations;
pub mod connection;
pub mod error;
pub mod gateway;
pub mod history;
pub mod notify;
pub mod rooms;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use error::GatewayError;
pub use gateway::Gateway;
pub use rooms::{Credential, RoomRegistry, SessionId};
