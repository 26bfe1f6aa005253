// Integration tests for the HTTP adapters
//
// A wiremock server stands in for both the datastore (REST + SSE feed) and
// the Auth0 tenant.

use farmfit_client::{Auth0Config, Auth0Provider, ClientConfig, FarmFitClient, HttpGateway};
use farmfit_core::{
    ChangeEvent, DataGateway, EntityWriter, IdentityProvider, OwnerId, Pet, PetDraft, PetFilters,
    Query, Species, SyncError, SyncPhase,
};
use futures::StreamExt;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PET_ID: &str = "0190a4b2-7c1e-7000-8000-000000000001";
const OTHER_PET_ID: &str = "0190a4b2-7c1e-7000-8000-000000000002";

fn pet_json(id: &str, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "owner_id": "auth0|u1",
        "name": name,
        "species": "dog",
        "created_at": "2025-03-01T12:00:00Z",
        "updated_at": "2025-03-01T12:00:00Z"
    })
}

fn client(server: &MockServer) -> FarmFitClient {
    let client = FarmFitClient::new(ClientConfig::new(server.uri(), "anon-key")).unwrap();
    client.set_access_token(Some("user-token".to_string()));
    client
}

fn sse_body(messages: &[serde_json::Value]) -> String {
    messages
        .iter()
        .map(|m| format!("data: {}\n\n", m))
        .collect()
}

// =============================================================================
// Data gateway
// =============================================================================

#[tokio::test]
async fn test_fetch_sends_postgrest_query_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/pets"))
        .and(query_param("owner_id", "eq.auth0|u1"))
        .and(query_param("species", "eq.dog"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pet_json(PET_ID, "Rex")])))
        .expect(1)
        .mount(&server)
        .await;

    let gateway: Arc<HttpGateway<Pet>> = client(&server).gateway();
    let query: Query = PetFilters::species(Species::Dog).into();
    let pets = gateway
        .fetch(&OwnerId::from("auth0|u1"), &query)
        .await
        .unwrap();

    assert_eq!(pets.len(), 1);
    assert_eq!(pets[0].name, "Rex");
}

#[tokio::test]
async fn test_rejected_token_maps_to_permission_denied() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/pets"))
        .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
        .mount(&server)
        .await;

    let gateway: Arc<HttpGateway<Pet>> = client(&server).gateway();
    let err = gateway
        .fetch(&OwnerId::from("auth0|u1"), &Query::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_insert_returns_representation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/pets"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([pet_json(PET_ID, "Rex")])))
        .mount(&server)
        .await;

    let gateway: Arc<HttpGateway<Pet>> = client(&server).gateway();
    let draft = PetDraft::new("Rex", "dog").into_pet(OwnerId::from("auth0|u1"));
    let stored = gateway.insert(&draft).await.unwrap();

    assert_eq!(stored.id.to_string(), PET_ID);
}

#[tokio::test]
async fn test_delete_targets_id() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/pets"))
        .and(query_param("id", format!("eq.{}", PET_ID)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let gateway: Arc<HttpGateway<Pet>> = client(&server).gateway();
    gateway.delete(&PET_ID.parse().unwrap()).await.unwrap();
}

#[tokio::test]
async fn test_subscribe_decodes_server_sent_events() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        json!({"type": "INSERT", "record": pet_json(PET_ID, "Rex")}),
        json!({"type": "PING"}),
        json!({"type": "UPDATE", "record": pet_json(PET_ID, "Rex II")}),
        json!({"type": "DELETE", "old_record": {"id": PET_ID}}),
    ]);
    Mock::given(method("GET"))
        .and(path("/realtime/v1/pets"))
        .and(query_param("owner_id", "eq.auth0|u1"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let gateway: Arc<HttpGateway<Pet>> = client(&server).gateway();
    let stream = gateway.subscribe(&OwnerId::from("auth0|u1")).await.unwrap();
    let events: Vec<ChangeEvent<Pet>> = stream.map(|e| e.unwrap()).collect().await;

    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], ChangeEvent::Inserted(p) if p.name == "Rex"));
    assert!(matches!(&events[1], ChangeEvent::Updated(p) if p.name == "Rex II"));
    assert!(matches!(&events[2], ChangeEvent::Deleted(id) if id.to_string() == PET_ID));
}

#[tokio::test]
async fn test_subscribe_failure_is_a_subscription_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/realtime/v1/pets"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let gateway: Arc<HttpGateway<Pet>> = client(&server).gateway();
    let err = match gateway.subscribe(&OwnerId::from("auth0|u1")).await {
        Ok(_) => panic!("subscribe should fail"),
        Err(e) => e,
    };

    assert!(matches!(err, SyncError::Subscription(_)));
}

#[tokio::test]
async fn test_sync_hook_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/pets"))
        .and(query_param("order", "name.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            pet_json(PET_ID, "Rex"),
            pet_json(OTHER_PET_ID, "Fido"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/realtime/v1/pets"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body(&[
                    json!({"type": "DELETE", "old_record": {"id": OTHER_PET_ID}}),
                    json!({"type": "UPDATE", "record": pet_json(PET_ID, "x")}),
                ])),
        )
        .mount(&server)
        .await;

    let pets = client(&server).sync::<Pet>();
    pets.activate("auth0|u1", PetFilters::default().into())
        .await
        .unwrap();

    let mut rx = pets.watch();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.entities.len() == 1 && snapshot.entities[0].name == "x" {
                return snapshot;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("change events were not applied");

    assert_eq!(snapshot.phase, SyncPhase::Ready);
    assert_eq!(snapshot.entities[0].id.to_string(), PET_ID);
}

#[tokio::test]
async fn test_listing_hook_skips_change_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/pets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pet_json(PET_ID, "Rex")])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/realtime/v1/pets"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let pets = client(&server).listing::<Pet>();
    pets.activate("auth0|u1", PetFilters::default().into())
        .await
        .unwrap();

    let snapshot = pets.snapshot();
    assert_eq!(snapshot.entities.len(), 1);
    assert_eq!(snapshot.phase, SyncPhase::Ready);
    assert!(snapshot.error.is_none());
    assert!(!pets.is_subscribed());
}

// =============================================================================
// Auth0
// =============================================================================

fn auth0(server: &MockServer) -> Auth0Provider {
    Auth0Provider::new(Auth0Config::new(server.uri(), "client-123"))
}

#[tokio::test]
async fn test_device_login_polls_until_approved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/device/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dev-1",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://tenant/activate",
            "expires_in": 600,
            "interval": 0
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("device_code=dev-1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "authorization_pending"
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "refresh_token": "ref-1",
            "token_type": "Bearer",
            "expires_in": 86400
        })))
        .mount(&server)
        .await;

    let prompts = Arc::new(Mutex::new(Vec::new()));
    let seen = prompts.clone();
    let provider = auth0(&server).with_prompt(move |prompt| {
        seen.lock().unwrap().push(prompt.user_code.clone());
    });

    let credential = provider.login().await.unwrap().unwrap();

    assert_eq!(credential.access_token, "tok-1");
    assert_eq!(credential.refresh_token.as_deref(), Some("ref-1"));
    assert_eq!(*prompts.lock().unwrap(), vec!["ABCD-EFGH".to_string()]);
}

#[tokio::test]
async fn test_denied_device_login_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/device/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dev-1",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://tenant/activate",
            "expires_in": 600,
            "interval": 0
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "access_denied",
            "error_description": "User cancelled"
        })))
        .mount(&server)
        .await;

    let provider = auth0(&server).with_prompt(|_| {});
    assert!(provider.login().await.unwrap().is_none());
}

#[tokio::test]
async fn test_user_info() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "auth0|u1",
            "email": "ada@farm.test",
            "email_verified": true,
            "name": "Ada",
            "https://farmfit.app/roles": ["practitioner"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let provider = auth0(&server);

    let principal = provider.get_user_info("tok-1").await.unwrap().unwrap();
    assert_eq!(principal.subject.as_str(), "auth0|u1");
    assert!(principal.email_verified);
    assert_eq!(principal.roles, vec!["practitioner"]);

    assert!(provider.get_user_info("stale").await.unwrap().is_none());
}

#[tokio::test]
async fn test_logout_accepts_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/logout"))
        .and(query_param("client_id", "client-123"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "farmfit://callback"),
        )
        .expect(1)
        .mount(&server)
        .await;

    auth0(&server).logout().await.unwrap();
}

#[tokio::test]
async fn test_exchange_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code_verifier=verifier-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-2",
            "id_token": "id-2"
        })))
        .mount(&server)
        .await;

    let credential = auth0(&server)
        .exchange_code("code-1", "verifier-1")
        .await
        .unwrap();

    assert_eq!(credential.access_token, "tok-2");
    assert_eq!(credential.token_type, "Bearer");
}
