pub mod bridge;
pub mod events;
pub mod presence;
pub mod rooms;
pub mod server;
pub mod session;
