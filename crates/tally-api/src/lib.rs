//! tally-api — HTTP interface of the metrics collector.
//!
//! Provides axum route handlers over a [`tally_store::MetricStore`].
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/update` | Apply a JSON metric record, return the merged record |
//! | POST | `/update/{kind}/{name}/{value}` | Apply a metric from path parameters |
//! | POST | `/value` | Look up a metric by `{id, type}`, return its record |
//! | GET | `/value/{kind}/{name}` | Bare metric value as text |
//! | GET | `/` | Plain-text `name value` listing of all metrics |
//!
//! `POST` bodies may be gzip-compressed (`Content-Encoding: gzip`).

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tally_store::MetricStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: MetricStore,
}

/// Build the collector router.
pub fn build_router(store: MetricStore) -> Router {
    let state = ApiState { store };

    Router::new()
        .route("/", get(handlers::list_metrics))
        .route("/value", post(handlers::get_metric))
        .route("/value/{kind}/{name}", get(handlers::get_metric_by_params))
        .route("/update", post(handlers::update_metric))
        .route(
            "/update/{kind}/{name}/{value}",
            post(handlers::update_metric_by_params),
        )
        .with_state(state)
}
