//! DataCite MDS client tests against a mock HTTP server

mod common;

use wiremock::matchers::{basic_auth, body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{doi, invalid_metadata, metadata, TARGET};
use doi_updater::authority::{DataCiteClient, DataCiteConfig, DoiError, DoiService};
use doi_updater::doi::{DoiData, DoiStatus};

const USER: &str = "GBIF.GBIF";
const PASSWORD: &str = "secret";

fn client(server: &MockServer) -> DataCiteClient {
    DataCiteClient::new(DataCiteConfig {
        api_url: server.uri(),
        username: USER.into(),
        password: PASSWORD.into(),
        timeout_ms: 5000,
    })
    .unwrap()
}

async fn mount_metadata(server: &MockServer, doi_path: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/metadata/{}", doi_path)))
        .respond_with(ResponseTemplate::new(status).set_body_string("<resource/>"))
        .mount(server)
        .await;
}

async fn mount_target(server: &MockServer, doi_path: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/doi/{}", doi_path)))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

// =============================================================================
// Resolve
// =============================================================================

#[tokio::test]
async fn test_resolve_registered() {
    let server = MockServer::start().await;
    let doi = doi("abc1");
    mount_metadata(&server, doi.as_str(), 200).await;
    mount_target(&server, doi.as_str(), 200, TARGET).await;

    let data = client(&server).resolve(&doi).await.unwrap();
    assert_eq!(
        data,
        Some(DoiData::new(DoiStatus::Registered, Some(TARGET.into())))
    );
}

#[tokio::test]
async fn test_resolve_reserved_has_no_target() {
    let server = MockServer::start().await;
    let doi = doi("abc2");
    mount_metadata(&server, doi.as_str(), 200).await;
    mount_target(&server, doi.as_str(), 404, "DOI not found").await;

    let data = client(&server).resolve(&doi).await.unwrap();
    assert_eq!(data, Some(DoiData::new(DoiStatus::Reserved, None)));
}

#[tokio::test]
async fn test_resolve_deactivated() {
    let server = MockServer::start().await;
    let doi = doi("abc3");
    mount_metadata(&server, doi.as_str(), 410).await;
    mount_target(&server, doi.as_str(), 200, TARGET).await;

    let data = client(&server).resolve(&doi).await.unwrap().unwrap();
    assert_eq!(data.status, DoiStatus::Deleted);
    assert_eq!(data.target.as_deref(), Some(TARGET));
}

#[tokio::test]
async fn test_resolve_unknown() {
    let server = MockServer::start().await;
    let doi = doi("abc4");
    mount_metadata(&server, doi.as_str(), 404).await;

    assert_eq!(client(&server).resolve(&doi).await.unwrap(), None);
}

// =============================================================================
// Register and update
// =============================================================================

#[tokio::test]
async fn test_register_uploads_metadata_then_target() {
    let server = MockServer::start().await;
    let doi = doi("reg1");
    mount_metadata(&server, doi.as_str(), 404).await;

    Mock::given(method("POST"))
        .and(path("/metadata"))
        .and(basic_auth(USER, PASSWORD))
        .and(body_string(metadata(&doi)))
        .respond_with(ResponseTemplate::new(201).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/doi"))
        .and(basic_auth(USER, PASSWORD))
        .and(body_string(format!("doi={}\nurl={}", doi, TARGET)))
        .respond_with(ResponseTemplate::new(201).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .register(&doi, TARGET, &metadata(&doi))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_register_existing_doi_conflicts() {
    let server = MockServer::start().await;
    let doi = doi("reg2");
    mount_metadata(&server, doi.as_str(), 200).await;
    mount_target(&server, doi.as_str(), 200, TARGET).await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server)
        .register(&doi, TARGET, &metadata(&doi))
        .await
        .unwrap_err();
    assert_eq!(err, DoiError::Exists(doi));
}

#[tokio::test]
async fn test_oversized_metadata_reports_413() {
    let server = MockServer::start().await;
    let doi = doi("big");

    Mock::given(method("POST"))
        .and(path("/metadata"))
        .respond_with(ResponseTemplate::new(413).set_body_string("Request Entity Too Large"))
        .mount(&server)
        .await;

    let err = client(&server)
        .update_metadata(&doi, &metadata(&doi))
        .await
        .unwrap_err();
    assert!(err.is_payload_too_large());
}

#[tokio::test]
async fn test_conflict_status_maps_to_exists() {
    let server = MockServer::start().await;
    let doi = doi("taken");

    Mock::given(method("POST"))
        .and(path("/doi"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let err = client(&server).update_target(&doi, TARGET).await.unwrap_err();
    assert_eq!(err, DoiError::Exists(doi));
}

#[tokio::test]
async fn test_server_error_keeps_status_and_body() {
    let server = MockServer::start().await;
    let doi = doi("oops");

    Mock::given(method("POST"))
        .and(path("/doi"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database is down"))
        .mount(&server)
        .await;

    let err = client(&server).update_target(&doi, TARGET).await.unwrap_err();
    assert_eq!(
        err,
        DoiError::Http {
            status: 500,
            message: "database is down".into(),
        }
    );
}

#[tokio::test]
async fn test_invalid_metadata_sends_nothing() {
    let server = MockServer::start().await;
    let doi = doi("bad");

    let err = client(&server)
        .reserve(&doi, &invalid_metadata(&doi))
        .await
        .unwrap_err();

    assert!(matches!(err, DoiError::InvalidMetadata(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_reserved_removes_completely() {
    let server = MockServer::start().await;
    let doi = doi("del1");
    mount_metadata(&server, doi.as_str(), 200).await;
    mount_target(&server, doi.as_str(), 204, "").await;

    Mock::given(method("DELETE"))
        .and(path(format!("/doi/{}", doi)))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client(&server).delete(&doi).await.unwrap());
}

#[tokio::test]
async fn test_delete_registered_leaves_tombstone() {
    let server = MockServer::start().await;
    let doi = doi("del2");
    mount_metadata(&server, doi.as_str(), 200).await;
    mount_target(&server, doi.as_str(), 200, TARGET).await;

    Mock::given(method("DELETE"))
        .and(path(format!("/metadata/{}", doi)))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    assert!(!client(&server).delete(&doi).await.unwrap());
}

#[tokio::test]
async fn test_delete_unknown_is_not_found() {
    let server = MockServer::start().await;
    let doi = doi("del3");
    mount_metadata(&server, doi.as_str(), 404).await;

    let err = client(&server).delete(&doi).await.unwrap_err();
    assert!(err.is_not_found());
}
