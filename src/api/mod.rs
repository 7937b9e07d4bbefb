pub mod handlers;
pub mod routes;

pub use routes::build_router;

use std::sync::Arc;

use crate::broadcast::BroadcastHub;
use crate::rca::RcaClient;
use crate::storage::TelemetryStore;

/// Shared application state for the backend binary.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TelemetryStore>,
    pub hub: Arc<BroadcastHub>,
    pub rca: Arc<RcaClient>,
}

impl AppState {
    pub fn new(store: Arc<dyn TelemetryStore>, hub: Arc<BroadcastHub>, rca: Arc<RcaClient>) -> Self {
        Self { store, hub, rca }
    }
}
