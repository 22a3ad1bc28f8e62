// HTTP routes configuration

use crate::core::state::AppState;
use crate::handlers::{cylinders, health, metrics, profiles, reports, stream};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Profile document
        .route(
            "/users/{user_id}",
            post(profiles::create_profile_handler).get(profiles::get_profile_handler),
        )
        .route("/users/{user_id}/settings", put(profiles::update_settings_handler))

        // Cylinder mutations
        .route("/users/{user_id}/cylinders", post(cylinders::add_cylinder_handler))
        .route(
            "/users/{user_id}/cylinders/{cylinder_id}",
            put(cylinders::update_weight_handler).delete(cylinders::remove_cylinder_handler),
        )

        // Derived views
        .route("/users/{user_id}/alerts", get(reports::alerts_handler))
        .route("/users/{user_id}/levels", get(reports::levels_handler))
        .route("/users/{user_id}/report/summary", get(reports::summary_handler))
        .route("/users/{user_id}/report/daily", get(reports::daily_handler))
        .route("/users/{user_id}/report/export.csv", get(reports::csv_handler))
        .route("/users/{user_id}/report/workbook", get(reports::workbook_handler))

        // Live updates
        .route("/users/{user_id}/stream", get(stream::stream_handler))

        // Operations
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics::metrics_handler))

        // 404 fallback for all unmatched routes
        .fallback(crate::handlers::fallback::fallback_handler)

        .with_state(state)
}
