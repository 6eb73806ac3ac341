use crate::room::RoomController;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub room: Arc<RoomController>,
}

impl AppState {
    pub fn new(room: Arc<RoomController>) -> Self {
        Self { room }
    }
}
