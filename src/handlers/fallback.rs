use crate::core::error::ApiError;
use axum::{http::Uri, response::{IntoResponse, Response}};

pub async fn fallback_handler(uri: Uri) -> Response {
    ApiError::NotFound(format!("No route for {}", uri.path())).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::body_json;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_fallback_is_json_404() {
        let response = fallback_handler(Uri::from_static("/nowhere")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Resource not found: No route for /nowhere");
    }
}
