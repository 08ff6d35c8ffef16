//! Streaming serve handler.
//!
//! `serve` hands the host a router whose only job is to map request
//! paths onto object keys and proxy the backend response: headers are
//! forwarded verbatim (minus hop-by-hop ones), the body is streamed
//! chunk by chunk, and the downstream consumption rate governs how fast
//! bytes are pulled from the backend. Any backend failure becomes a
//! not-found response; the underlying error goes to the log.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::oci::OciStorage;

pub fn router(storage: Arc<OciStorage>) -> Router {
    Router::new().route("/{*path}", get(serve_object)).with_state(storage)
}

/// Connection-scoped headers that must not be proxied onto a new
/// response.
const HOP_BY_HOP: [HeaderName; 5] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

async fn serve_object(
    State(storage): State<Arc<OciStorage>>,
    Path(path): Path<String>,
) -> Response {
    let fetched = match storage.open(&path).await {
        Ok(fetched) => fetched,
        Err(err) => {
            tracing::error!(error = %err, path = %path, "serving object failed");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let mut builder = Response::builder().status(StatusCode::OK);
    for (name, value) in fetched.headers.iter() {
        if !HOP_BY_HOP.contains(name) {
            builder = builder.header(name, value);
        }
    }
    match builder.body(Body::from_stream(fetched.stream)) {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, path = %path, "building streamed response failed");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::BackendError;
    use crate::retry::RetryPolicy;
    use axum::body::to_bytes;
    use axum::http::Request;
    use std::time::Duration;
    use stowage_core::StorageConfig;
    use tower::ServiceExt;

    fn app(backend: Arc<MockBackend>) -> Router {
        let config = StorageConfig {
            bucket: "b".to_string(),
            namespace: "ns".to_string(),
            host: Some("ns.objectstorage.r1.example.com".to_string()),
            path_prefix: "images".to_string(),
            ..Default::default()
        };
        let backend: Arc<dyn crate::backend::ObjectBackend> = backend;
        let storage = Arc::new(
            OciStorage::with_parts(
                config,
                RetryPolicy::new(3, Duration::from_millis(0)),
                Some(backend),
            )
            .unwrap(),
        );
        router(storage)
    }

    #[tokio::test]
    async fn streams_the_object_with_backend_headers() {
        let backend = Arc::new(MockBackend::new());
        backend.insert("images/2024/cat.webp", b"meow", "image/webp");

        let response = app(backend)
            .oneshot(Request::get("/2024/cat.webp").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/webp");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"meow");
    }

    #[tokio::test]
    async fn request_paths_that_already_carry_the_prefix_are_not_doubled() {
        let backend = Arc::new(MockBackend::new());
        backend.insert("images/2024/cat.webp", b"meow", "image/webp");

        let response = app(backend)
            .oneshot(Request::get("/images/2024/cat.webp").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_objects_become_not_found() {
        let response = app(Arc::new(MockBackend::new()))
            .oneshot(Request::get("/2024/gone.webp").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn backend_failures_become_not_found_after_retries() {
        let backend = Arc::new(MockBackend::new());
        for _ in 0..3 {
            backend.push_failure(BackendError::Status { status: 500, message: "boom".into() });
        }

        let response = app(backend.clone())
            .oneshot(Request::get("/2024/cat.webp").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(backend.call_count(), 3);
    }
}
