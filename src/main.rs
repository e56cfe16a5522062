// Módulos de la aplicación
mod api;
mod app_state;
mod comparison;
mod config;
mod error;
mod export;
#[cfg(test)]
mod fakes;
mod hierarchy;
mod models;
mod neo4j_store;
mod retrieval;
mod store;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::neo4j_store::Neo4jStore;

#[tokio::main]
async fn main() {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().expect("Error al cargar la configuración");

    // 3. Conectar a Neo4j y asegurar esquemas
    let graph = neo4j_store::connect_from_config(&cfg)
        .await
        .expect("Error conectando a Neo4j");
    neo4j_store::ensure_schema(&graph)
        .await
        .expect("Error asegurando el esquema de Neo4j");

    // 4. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        store: Arc::new(Neo4jStore::new(graph)),
    };

    // 5. Configurar el router de la API
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 6. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .expect("No se pudo abrir el puerto del servidor");
    info!("🚀 Servidor escuchando en http://{}", server_addr);

    axum::serve(listener, app)
        .await
        .expect("El servidor terminó con error");
}
