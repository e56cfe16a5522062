use std::sync::Arc;

use crate::{config::AppConfig, neo4j_store::Neo4jStore};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<Neo4jStore>,
}
