//! Axum router setup.

use crate::auth::auth_middleware;
use crate::handlers::{auth, info, records};
use crate::service::RecordService;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(service: RecordService, max_payload_size: usize) -> Router {
    // Authenticated routes
    let authenticated = Router::new()
        .route("/records", get(records::list_records))
        .route(
            "/records/{id}",
            get(records::get_record)
                .put(records::put_record)
                .delete(records::delete_record),
        )
        .layer(middleware::from_fn_with_state(
            service.clone(),
            auth_middleware,
        ));

    // Unauthenticated routes
    let public = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/version", get(info::version));

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_payload_size))
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenService;
    use crate::service::BuildInfo;
    use crate::storage::Storage;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app() -> Router {
        let service = RecordService::new(
            Storage::in_memory().unwrap(),
            TokenService::new(b"router-secret", Duration::from_secs(3600)),
            BuildInfo::current(chrono::NaiveDate::from_ymd_opt(2024, 3, 1)),
        );
        build_router(service, 64 * 1024)
    }

    fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_of(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(app: &Router, login: &str) -> String {
        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/register",
                None,
                Some(json!({ "login": login, "password": "pw" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        json_of(response).await["token"].as_str().unwrap().to_string()
    }

    fn record_body(id: Uuid, version: i64) -> Value {
        json!({
            "id": id,
            "type": "text",
            "data": "c2VhbGVk",
            "nonce": "AAAAAAAAAAAAAAAA",
            "version": version,
        })
    }

    async fn put(app: &Router, token: &str, id: Uuid, body: Value) -> StatusCode {
        app.clone()
            .oneshot(request(
                Method::PUT,
                &format!("/records/{}", id),
                Some(token),
                Some(body),
            ))
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn version_is_public() {
        let response = app()
            .oneshot(request(Method::GET, "/version", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_of(response).await;
        assert_eq!(body["build_version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["build_date"], "2024-03-01");
    }

    #[tokio::test]
    async fn records_require_token() {
        let app = app();
        let response = app
            .clone()
            .oneshot(request(Method::GET, "/records", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(json_of(response).await["error"].is_string());

        let response = app
            .oneshot(request(Method::GET, "/records", Some("bogus"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_login_statuses() {
        let app = app();
        register(&app, "alice").await;

        let duplicate = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/register",
                None,
                Some(json!({ "login": "alice", "password": "pw" })),
            ))
            .await
            .unwrap();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let empty = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/register",
                None,
                Some(json!({ "login": "", "password": "pw" })),
            ))
            .await
            .unwrap();
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let malformed = app
            .clone()
            .oneshot(request(Method::POST, "/login", None, Some(json!({ "login": 5 }))))
            .await
            .unwrap();
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

        let wrong = app
            .oneshot(request(
                Method::POST,
                "/login",
                None,
                Some(json!({ "login": "alice", "password": "nope" })),
            ))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn record_lifecycle() {
        let app = app();
        let token = register(&app, "alice").await;
        let id = Uuid::new_v4();

        assert_eq!(put(&app, &token, id, record_body(id, 1)).await, StatusCode::NO_CONTENT);
        assert_eq!(put(&app, &token, id, record_body(id, 2)).await, StatusCode::NO_CONTENT);
        assert_eq!(put(&app, &token, id, record_body(id, 2)).await, StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(request(Method::GET, &format!("/records/{}", id), Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_of(response).await;
        assert_eq!(body["version"], 2);
        assert_eq!(body["type"], "text");
        assert_eq!(body["data"], "c2VhbGVk");

        let response = app
            .clone()
            .oneshot(request(Method::DELETE, &format!("/records/{}", id), Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(request(Method::GET, &format!("/records/{}", id), Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request(Method::GET, "/records", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(json_of(response).await, json!([]));
    }

    #[tokio::test]
    async fn users_do_not_see_each_other() {
        let app = app();
        let alice = register(&app, "alice").await;
        let bob = register(&app, "bob").await;
        let id = Uuid::new_v4();
        put(&app, &alice, id, record_body(id, 1)).await;

        let response = app
            .clone()
            .oneshot(request(Method::GET, &format!("/records/{}", id), Some(&bob), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request(Method::GET, "/records", Some(&alice), None))
            .await
            .unwrap();
        assert_eq!(json_of(response).await.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_puts_are_bad_requests() {
        let app = app();
        let token = register(&app, "alice").await;
        let id = Uuid::new_v4();

        let mut wrong_type = record_body(id, 1);
        wrong_type["type"] = json!("photo");
        assert_eq!(put(&app, &token, id, wrong_type).await, StatusCode::BAD_REQUEST);

        let mismatched = record_body(Uuid::new_v4(), 1);
        assert_eq!(put(&app, &token, id, mismatched).await, StatusCode::BAD_REQUEST);

        let mut bad_base64 = record_body(id, 1);
        bad_base64["data"] = json!("***");
        assert_eq!(put(&app, &token, id, bad_base64).await, StatusCode::BAD_REQUEST);

        assert_eq!(put(&app, &token, id, record_body(id, 0)).await, StatusCode::BAD_REQUEST);
        assert_eq!(put(&app, &token, id, record_body(id, 3)).await, StatusCode::CONFLICT);

        let response = app
            .oneshot(request(Method::GET, "/records/not-a-uuid", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_body_rejected() {
        let app = app();
        let token = register(&app, "alice").await;
        let id = Uuid::new_v4();

        let mut body = record_body(id, 1);
        body["data"] = json!("A".repeat(128 * 1024));
        assert_eq!(put(&app, &token, id, body).await, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
