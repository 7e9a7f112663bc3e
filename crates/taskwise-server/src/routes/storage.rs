use axum::{
    extract::State,
    http::{
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
        HeaderMap, HeaderValue,
    },
    response::IntoResponse,
    routing::get,
    Router,
};

use taskwise_core::attachment::guess_mime;

use super::AppState;
use crate::error::{ApiPath, ApiResult};

pub fn routes() -> Router<AppState> {
    Router::new().route("/storage/{*key}", get(serve_object))
}

/// Raster images are the only uploads a browser may render in place.
/// Everything else, SVG included, is sent as a download.
fn renders_inline(mime: &str) -> bool {
    mime.starts_with("image/") && mime != "image/svg+xml"
}

/// Public read access to stored uploads. Keys are random per upload, so
/// the URL itself is the capability.
async fn serve_object(
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
) -> ApiResult<impl IntoResponse> {
    let bytes = state.store.get(&key).await?;

    let mime = guess_mime(&key);
    let mut headers = HeaderMap::new();
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=86400"));
    if renders_inline(mime) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(mime));
    } else {
        let served_as = if mime == "image/svg+xml" {
            "application/octet-stream"
        } else {
            mime
        };
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(served_as));
        headers.insert(CONTENT_DISPOSITION, HeaderValue::from_static("attachment"));
    }
    Ok((headers, bytes))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use bytes::Bytes;
    use tower::ServiceExt;

    use crate::routes::build_router;
    use crate::test_helpers::test_state;

    async fn get(app: axum::Router, uri: &str) -> axum::response::Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn serves_stored_objects_without_auth() {
        let state = test_state("http://127.0.0.1:8000").await;
        state
            .store
            .put("attachments/1/abc/denah.png", Bytes::from_static(b"\x89PNG"))
            .await
            .unwrap();
        let app = build_router(state);

        let resp = get(app.clone(), "/storage/attachments/1/abc/denah.png").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "image/png");
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"\x89PNG");

        let resp = get(app, "/storage/attachments/1/abc/missing.png").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn only_raster_images_render_inline() {
        let state = test_state("http://127.0.0.1:8000").await;
        for key in [
            "attachments/1/a/foto.jpg",
            "attachments/1/b/x.svg",
            "attachments/1/c/laporan.pdf",
            "attachments/1/d/halaman.html",
        ] {
            state
                .store
                .put(key, Bytes::from_static(b"<svg><script>alert(1)</script></svg>"))
                .await
                .unwrap();
        }
        let app = build_router(state);

        let resp = get(app.clone(), "/storage/attachments/1/a/foto.jpg").await;
        assert_eq!(resp.headers()["content-type"], "image/jpeg");
        assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
        assert!(resp.headers().get("content-disposition").is_none());

        let resp = get(app.clone(), "/storage/attachments/1/b/x.svg").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "application/octet-stream");
        assert_eq!(resp.headers()["content-disposition"], "attachment");
        assert_eq!(resp.headers()["x-content-type-options"], "nosniff");

        let resp = get(app.clone(), "/storage/attachments/1/c/laporan.pdf").await;
        assert_eq!(resp.headers()["content-type"], "application/pdf");
        assert_eq!(resp.headers()["content-disposition"], "attachment");

        let resp = get(app, "/storage/attachments/1/d/halaman.html").await;
        assert_eq!(resp.headers()["content-type"], "application/octet-stream");
        assert_eq!(resp.headers()["content-disposition"], "attachment");
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let state = test_state("http://127.0.0.1:8000").await;
        let app = build_router(state);
        let resp = get(app, "/storage/attachments/..%2F..%2Fetc%2Fpasswd").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
