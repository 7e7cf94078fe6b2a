//! `ApiClient`, `UserPanel`, `SchemaCatalog` and `HealthProbe` against a mock backend

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use integrator_client::{
    ApiClient, CatalogState, HealthProbe, MemorySessionStore, SCHEMA_FETCH_FAILED, SchemaCatalog,
    Session, SessionStore, USER_CREATED, USER_DELETED, UserPanel,
};
use integrator_core::error::SELF_DELETE_MESSAGE;
use integrator_core::{Credentials, Error, NewUser, PasswordChange, Secret, UserRef};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{bearer_token, body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn me_json(id: i64, is_admin: bool) -> serde_json::Value {
    json!({
        "id": id,
        "username": "admin",
        "email": "admin@example.com",
        "is_active": true,
        "is_admin": is_admin
    })
}

async fn logged_in_client(server: &MockServer) -> ApiClient {
    let store = Arc::new(MemorySessionStore::new());
    store.set(Session::new(Secret::from("tok-123")));
    ApiClient::new(server.uri()).unwrap().with_session_store(store)
}

#[tokio::test]
async fn test_login_stores_session_and_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("username=admin"))
        .and(body_string_contains("password=s3cret"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok-123", "token_type": "bearer"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/me/"))
        .and(bearer_token("tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(me_json(1, true)))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).unwrap();
    let user = client
        .login(&Credentials::new("admin", "s3cret"))
        .await
        .unwrap();

    assert!(user.is_admin);
    let session = client.session().unwrap();
    assert_eq!(session.token.expose(), "tok-123");
    assert_eq!(session.user, Some(user));

    client.logout();
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_login_failure_surfaces_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "Incorrect username or password"})),
        )
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).unwrap();
    let err = client
        .login(&Credentials::new("admin", "wrong"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Api { status: 401, .. }));
    assert_eq!(err.user_message("Login failed"), "Incorrect username or password");
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_list_users_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/"))
        .and(bearer_token("tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            me_json(1, true),
            {"id": 2, "username": "bob", "email": "bob@example.com", "is_admin": false}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let users = logged_in_client(&server).await.list_users().await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[1].username, "bob");
    assert!(users[1].is_active);
}

#[tokio::test]
async fn test_missing_session_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).unwrap();
    assert!(matches!(client.list_users().await, Err(Error::Authentication(_))));
}

#[tokio::test]
async fn test_delete_user_by_email_is_url_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/users/bob%40example.com"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = logged_in_client(&server).await;
    client
        .delete_user(&UserRef::Email("bob@example.com".to_string()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_change_password_posts_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/change-password"))
        .and(body_json(json!({"old_password": "old", "new_password": "new"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let change = PasswordChange {
        old_password: Secret::from("old"),
        new_password: Secret::from("new"),
    };
    logged_in_client(&server)
        .await
        .change_password(&change)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_panel_create_then_delete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/"))
        .and(body_json(json!({
            "username": "bob",
            "email": "bob@example.com",
            "password": "pw",
            "is_admin": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 2})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            me_json(1, true),
            {
                "id": 2,
                "username": "bob",
                "email": "bob@example.com",
                "is_active": true,
                "is_admin": false
            }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/users/2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let me = serde_json::from_value(me_json(1, true)).unwrap();
    let panel = UserPanel::new(logged_in_client(&server).await, me);

    panel
        .create_user(&NewUser {
            username: "bob".to_string(),
            email: "bob@example.com".to_string(),
            password: Secret::from("pw"),
            is_admin: false,
        })
        .await
        .unwrap();
    assert_eq!(panel.message().as_deref(), Some(USER_CREATED));
    assert_eq!(panel.users().len(), 2);

    panel.request_delete(UserRef::Id(2)).unwrap();
    panel.confirm_delete().await.unwrap();
    assert_eq!(panel.message().as_deref(), Some(USER_DELETED));
    assert_eq!(panel.users().len(), 1);
}

#[tokio::test]
async fn test_panel_self_delete_never_reaches_backend() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = logged_in_client(&server).await;
    let me = serde_json::from_value(me_json(1, true)).unwrap();
    let panel = UserPanel::new(client, me);

    let err = panel.request_delete(UserRef::Id(1)).unwrap_err();
    assert_eq!(err.user_message("ignored"), SELF_DELETE_MESSAGE);
    assert_eq!(panel.error().as_deref(), Some(SELF_DELETE_MESSAGE));

    let err = panel
        .request_delete(UserRef::Email("ADMIN@example.com".to_string()))
        .unwrap_err();
    assert!(matches!(err, Error::SelfAction(_)));
}

#[tokio::test]
async fn test_schema_catalog_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/schemas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sources": {
                "bigquery": {"configs": {"projectId": {"type": "string", "required": true}}}
            },
            "destinations": {}
        })))
        .mount(&server)
        .await;

    let catalog = SchemaCatalog::new(ApiClient::new(server.uri()).unwrap());
    let parsed = catalog.load().await.unwrap();

    assert_eq!(parsed.sources.len(), 1);
    assert_eq!(parsed.sources[0].name, "bigquery");
    assert!(parsed.sources[0].configs["projectId"].required);
    assert!(parsed.destinations.is_empty());
    assert!(matches!(catalog.state(), CatalogState::Loaded(_)));
}

#[tokio::test]
async fn test_schema_order_survives_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/schemas"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{
                "sources": {"bigquery": {"configs": {
                    "tableId": {"type": "string", "required": true},
                    "datasetId": {"type": "string", "required": true},
                    "projectId": {"type": "string", "required": true}
                }}},
                "destinations": {
                    "meta_marketing": {"configs": {}},
                    "google_ads": {"configs": {}}
                }
            }"#,
        ))
        .mount(&server)
        .await;

    let catalog = SchemaCatalog::new(ApiClient::new(server.uri()).unwrap());
    let parsed = catalog.load().await.unwrap();

    let fields: Vec<String> = parsed.sources[0].rows().into_iter().map(|r| r.name).collect();
    assert_eq!(fields, vec!["tableId", "datasetId", "projectId"]);
    let destinations: Vec<&str> = parsed.destinations.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(destinations, vec!["meta_marketing", "google_ads"]);
}

#[tokio::test]
async fn test_schema_catalog_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/schemas"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "db down"})))
        .mount(&server)
        .await;

    let catalog = SchemaCatalog::new(ApiClient::new(server.uri()).unwrap());
    assert!(catalog.load().await.is_err());
    assert_eq!(catalog.error().as_deref(), Some(SCHEMA_FETCH_FAILED));
}

#[tokio::test]
async fn test_malformed_body_is_a_serialization_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/schemas"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri()).unwrap();
    assert!(matches!(
        client.fetch_schemas().await,
        Err(Error::Serialization(_))
    ));
}

#[tokio::test]
async fn test_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/healthcheck"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = ApiClient::with_timeout(server.uri(), Duration::from_millis(200)).unwrap();
    assert!(matches!(
        client.healthcheck().await,
        Err(Error::Timeout { duration_ms: 200 })
    ));
}

#[tokio::test]
async fn test_health_probes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/healthcheck"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/connect"))
        .and(header("X-API-Key", "key-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/connect"))
        .and(header("X-API-Key", "wrong"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let probe = HealthProbe::new(ApiClient::new(server.uri()).unwrap());

    assert!(probe.backend().await.healthy);

    let report = probe
        .connection(&server.uri(), &Secret::from("key-1"))
        .await
        .unwrap();
    assert!(report.healthy);
    assert_eq!(report.status, Some(200));

    let report = probe
        .connection(&server.uri(), &Secret::from("wrong"))
        .await
        .unwrap();
    assert!(!report.healthy);
    assert_eq!(report.message, "Health check failed: Forbidden");

    let err = probe.connection("", &Secret::from("key-1")).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[tokio::test]
async fn test_unreachable_backend_is_unhealthy() {
    let probe = HealthProbe::new(ApiClient::new("http://127.0.0.1:9").unwrap());
    let report = probe.backend().await;
    assert!(!report.healthy);
    assert_eq!(report.status, None);
    assert!(report.message.starts_with("Connection error"));
}
