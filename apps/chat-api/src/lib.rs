pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;

use std::sync::Arc;

use config::Config;
use db::pool::DbPool;
use gateway::bridge::DeliveryBridge;
use gateway::rooms::RoomRegistry;

/// Shared application state available to all route handlers. The room
/// registry is only ever reached through here; there is no ambient instance.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub rooms: Arc<RoomRegistry>,
    pub bridge: DeliveryBridge,
}

impl AppState {
    pub fn new(db: DbPool, config: Arc<Config>) -> Self {
        let rooms = Arc::new(RoomRegistry::new());
        let bridge = DeliveryBridge::new(rooms.clone());
        Self {
            db,
            config,
            rooms,
            bridge,
        }
    }
}
