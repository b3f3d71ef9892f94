use bdpa_cloud::{RemoteClient, RemoteConfig, RemoteError, RemoteStore};
use bdpa_types::EntityKind;
use wiremock::matchers::{body_json_string, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn setup(server: &MockServer) -> RemoteClient {
    let config = RemoteConfig {
        api_base_url: server.uri(),
        storage_bucket: "avances-fotos".into(),
        request_timeout_secs: 5,
    };
    RemoteClient::new(config)
}

fn avance_payload() -> serde_json::Value {
    serde_json::json!({
        "id": "av-1",
        "torre": "A",
        "ubicacion": "A101",
        "categoria": "Instalación PAU",
        "porcentaje": 80,
    })
}

// --- Record mutations ---

#[tokio::test]
async fn create_record_returns_echoed_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/avances"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "av-1"})))
        .mount(&server)
        .await;

    let client = setup(&server);
    let id = client.create_record(EntityKind::Avance, &avance_payload()).await.unwrap();
    assert_eq!(id, "av-1");
}

#[tokio::test]
async fn create_medicion_hits_mediciones_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mediciones"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "m-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = setup(&server);
    let payload = serde_json::json!({"id": "m-1", "torre": "B", "piso": 3});
    client.create_record(EntityKind::Medicion, &payload).await.unwrap();
}

#[tokio::test]
async fn update_record_sends_patch() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/avances/av-1"))
        .and(body_json_string(r#"{"porcentaje": 100}"#))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = setup(&server);
    client
        .update_record(EntityKind::Avance, "av-1", &serde_json::json!({"porcentaje": 100}))
        .await
        .unwrap();
}

#[tokio::test]
async fn conflict_maps_to_conflict_error() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/avances/av-1"))
        .respond_with(ResponseTemplate::new(409).set_body_string("version mismatch"))
        .mount(&server)
        .await;

    let client = setup(&server);
    let err = client
        .update_record(EntityKind::Avance, "av-1", &serde_json::json!({"porcentaje": 100}))
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "expected conflict, got: {err}");
}

#[tokio::test]
async fn server_error_maps_to_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/avances"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = setup(&server);
    let err = client.create_record(EntityKind::Avance, &avance_payload()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Transport(_)), "expected transport, got: {err}");
    assert!(!err.is_conflict());
}

#[tokio::test]
async fn connection_refused_maps_to_transport() {
    // Nothing listening on this port.
    let config = RemoteConfig {
        api_base_url: "http://127.0.0.1:1".into(),
        storage_bucket: "avances-fotos".into(),
        request_timeout_secs: 2,
    };
    let client = RemoteClient::new(config);
    let err = client.create_record(EntityKind::Avance, &avance_payload()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Transport(_)));
}

#[tokio::test]
async fn delete_record_success() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/mediciones/m-9"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = setup(&server);
    client.delete_record(EntityKind::Medicion, "m-9").await.unwrap();
}

#[tokio::test]
async fn delete_of_missing_record_is_idempotent_success() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/avances/av-gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = setup(&server);
    client.delete_record(EntityKind::Avance, "av-gone").await.unwrap();
}

#[tokio::test]
async fn create_foto_via_records_api_is_rejected() {
    let server = MockServer::start().await;
    let client = setup(&server);
    let err = client
        .create_record(EntityKind::Foto, &serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Api(_)));
}

// --- Photo upload ---

#[tokio::test]
async fn upload_photo_returns_public_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/avances-fotos/a/101.jpg"))
        .and(header_exists("x-content-sha256"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = setup(&server);
    let url = client
        .upload_photo("avances-fotos", "a/101.jpg", b"jpeg-bytes")
        .await
        .unwrap();
    assert_eq!(
        url,
        format!("{}/storage/v1/object/public/avances-fotos/a/101.jpg", server.uri())
    );
}

#[tokio::test]
async fn upload_photo_failure_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = setup(&server);
    let err = client.upload_photo("avances-fotos", "a/101.jpg", b"x").await.unwrap_err();
    assert!(matches!(err, RemoteError::Transport(_)));
}

#[tokio::test]
async fn bearer_token_is_sent_when_set() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/avances"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "av-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = setup(&server);
    client.set_token("jwt-token".into());
    client.create_record(EntityKind::Avance, &avance_payload()).await.unwrap();
}
