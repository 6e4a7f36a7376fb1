pub mod api;
pub mod ui;
pub mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Upstreams
        .route("/api/v1/upstreams", get(api::handle_list_upstreams))
        .route("/api/v1/status", get(api::handle_get_status))
        .route("/api/v1/execute", post(api::handle_execute))
        // Health
        .route("/healthz", get(api::handle_healthz))
        // Push channel
        .route("/ws", get(ws::handle_ws))
        // Dashboard UI
        .route("/ui/", get(ui::handle_dashboard))
        // Static files
        .nest_service("/ui/static", ServeDir::new("static"))
        // Root redirect
        .route(
            "/",
            get(|| async {
                axum::response::Redirect::to("/ui/")
            }),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::build_http;
    use crate::clients::relay::Relay;
    use crate::clients::relay::tests::{mount_healthy_cluster, options};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;
    use wiremock::MockServer;

    async fn app(upstreams: &[String]) -> Router {
        let relay = Arc::new(Relay::new(build_http(false).unwrap()));
        let opts: Vec<_> = upstreams.iter().map(|u| options(u)).collect();
        relay.add_cluster_servers(&opts).await;
        build_router(AppState { relay })
    }

    async fn body_json(res: axum::response::Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn healthz_and_root_redirect() {
        let app = app(&[]).await;

        let res = app.clone().oneshot(get_req("/healthz")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app.oneshot(get_req("/")).await.unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/ui/");
    }

    #[tokio::test]
    async fn dashboard_lists_a_panel_per_upstream() {
        let app = app(&["http://a".to_string(), "http://b".to_string()]).await;
        let res = app.oneshot(get_req("/ui/")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(html.matches(r#"class="gui-panel""#).count(), 2);
    }

    #[tokio::test]
    async fn upstreams_are_listed() {
        let app = app(&["http://b".to_string(), "http://a".to_string()]).await;
        let res = app.oneshot(get_req("/api/v1/upstreams")).await.unwrap();
        assert_eq!(body_json(res).await, json!(["http://a", "http://b"]));
    }

    #[tokio::test]
    async fn status_is_fetched_on_demand() {
        let server = MockServer::start().await;
        mount_healthy_cluster(&server).await;
        let app = app(&[server.uri()]).await;

        let uri = format!("/api/v1/status?id={}", server.uri());
        let res = app.oneshot(get_req(&uri)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["id"], json!(server.uri()));
        assert_eq!(body["cluster"]["status"], "Normal");
    }

    #[tokio::test]
    async fn execute_maps_errors_to_status_codes() {
        let app = app(&["http://a".to_string()]).await;

        let res = app
            .clone()
            .oneshot(post_json(
                "/api/v1/execute",
                json!({ "id": "http://zzz", "params": { "cmd": "startCluster" } }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = app
            .oneshot(post_json(
                "/api/v1/execute",
                json!({ "id": "http://a", "params": { "cmd": "nope" } }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["error"], "Invalid operation (nope)");
    }
}
