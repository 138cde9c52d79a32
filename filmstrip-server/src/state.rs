use filmstrip_core::{
    CacheStore, Config, Databases, Orchestrator, Scanner,
};
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dbs: Arc<Databases>,
    pub cache: Arc<CacheStore>,
    pub scanner: Arc<Scanner>,
    pub orchestrator: Arc<Orchestrator>,
}
