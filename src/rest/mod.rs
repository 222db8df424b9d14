use std::net::SocketAddr;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::{catalog::Catalog, storage::Storage};

mod handlers;
mod models;

use handlers::{
    add_attribute, add_category, add_product, delete_attribute, delete_category, delete_product,
    get_product, health, home, list_attributes, list_categories, list_products, not_found,
    update_product,
};

#[derive(Clone)]
pub struct AppState<S: Storage> {
    pub catalog: Catalog<S>,
    pub started_at: std::time::SystemTime,
}

pub fn router<S: Storage + Clone + Send + Sync + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health::<S>))
        .route("/categories", get(list_categories::<S>))
        .route("/categories/add", post(add_category::<S>))
        .route("/categories/:id", delete(delete_category::<S>))
        .route("/categories/:id/attributes", get(list_attributes::<S>))
        .route("/categories/:id/attributes/add", post(add_attribute::<S>))
        .route("/attributes/:id", delete(delete_attribute::<S>))
        .route("/products", get(list_products::<S>))
        .route("/products/add", post(add_product::<S>))
        .route(
            "/products/:id",
            get(get_product::<S>)
                .put(update_product::<S>)
                .delete(delete_product::<S>),
        )
        .fallback(not_found)
        .with_state(state)
}

pub async fn serve<S: Storage + Clone + Send + Sync + 'static>(
    addr: SocketAddr,
    catalog: Catalog<S>,
    shutdown: tokio_util::sync::CancellationToken,
) -> anyhow::Result<()> {
    let state = AppState {
        catalog,
        started_at: std::time::SystemTime::now(),
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("🌐 REST listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            log::info!("🛑 REST shutdown requested");
        })
        .await?;
    log::info!("👋 REST server exited");
    Ok(())
}
