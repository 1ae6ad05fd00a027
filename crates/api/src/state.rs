use std::sync::Arc;

use lagooz_events::CommunicationDelivery;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub pool: lagooz_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Used for communications that are due when they are submitted.
    pub delivery: Arc<dyn CommunicationDelivery>,
}
