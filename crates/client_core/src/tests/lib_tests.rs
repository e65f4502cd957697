use super::*;
use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use shared::domain::{Epsilon, ImageKind};
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};

use crate::error::SERVICE_UNAVAILABLE_MESSAGE;

#[derive(Debug, Default)]
struct CapturedUpload {
    epsilon: Option<String>,
    image: Vec<u8>,
    file_name: Option<String>,
    content_type: Option<String>,
}

#[derive(Clone)]
enum MockReply {
    Success(AttackResponse),
    Status(StatusCode),
    Raw(&'static str),
    Delayed(Duration),
}

#[derive(Clone)]
struct MockState {
    tx: Arc<Mutex<Option<oneshot::Sender<CapturedUpload>>>>,
    reply: MockReply,
}

async fn handle_attack(State(state): State<MockState>, mut multipart: Multipart) -> Response {
    let mut upload = CapturedUpload::default();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.content_type = field.content_type().map(str::to_string);
                upload.image = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            }
            "epsilon" => upload.epsilon = field.text().await.ok(),
            _ => {}
        }
    }
    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send(upload);
    }

    match state.reply {
        MockReply::Success(body) => Json(body).into_response(),
        MockReply::Status(code) => (code, "model exploded").into_response(),
        MockReply::Raw(body) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
        MockReply::Delayed(delay) => {
            tokio::time::sleep(delay).await;
            Json(cat_dog_response()).into_response()
        }
    }
}

async fn spawn_attack_server(
    reply: MockReply,
) -> anyhow::Result<(String, oneshot::Receiver<CapturedUpload>)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel();
    let state = MockState {
        tx: Arc::new(Mutex::new(Some(tx))),
        reply,
    };
    let app = Router::new()
        .route("/attack", post(handle_attack))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), rx))
}

/// Base URL of a port that was bound and released, so connections are refused.
async fn refused_service_url() -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}

fn cat_dog_response() -> AttackResponse {
    AttackResponse {
        attack_success: true,
        clean_prediction: "cat".to_string(),
        adversarial_prediction: "dog".to_string(),
        adversarial_image_b64: STANDARD.encode(b"\x89PNG adversarial"),
    }
}

fn cat_request() -> AttackRequest {
    AttackRequest::new(
        "cat.jpg",
        ImageKind::Jpeg,
        b"\xff\xd8\xffcat".to_vec(),
        Epsilon::new(0.05),
    )
}

#[test]
fn attack_endpoint_appends_route_once() {
    assert_eq!(
        attack_endpoint("http://127.0.0.1:8000").expect("url").as_str(),
        "http://127.0.0.1:8000/attack"
    );
    assert_eq!(
        attack_endpoint(" http://svc.local/api/ ").expect("url").as_str(),
        "http://svc.local/api/attack"
    );
    assert!(attack_endpoint("not a url").is_err());
}

#[tokio::test]
async fn posts_image_and_epsilon_as_multipart() {
    let (server_url, upload_rx) = spawn_attack_server(MockReply::Success(cat_dog_response()))
        .await
        .expect("spawn server");
    let service = HttpAttackService::from_service_url(&server_url, None).expect("service");

    let result = service.attack(cat_request()).await.expect("attack");

    let upload = upload_rx.await.expect("upload");
    assert_eq!(upload.epsilon.as_deref(), Some("0.05"));
    assert_eq!(upload.image, b"\xff\xd8\xffcat");
    assert_eq!(upload.file_name.as_deref(), Some("cat.jpg"));
    assert_eq!(upload.content_type.as_deref(), Some("image/jpeg"));

    assert_eq!(
        result,
        AttackResult {
            attack_success: true,
            clean_prediction: "cat".to_string(),
            adversarial_prediction: "dog".to_string(),
            adversarial_image: b"\x89PNG adversarial".to_vec(),
        }
    );
    assert_eq!(result.adversarial_image_b64(), cat_dog_response().adversarial_image_b64);
}

#[tokio::test]
async fn non_success_status_is_reported_without_parsing_body() {
    let (server_url, _upload_rx) =
        spawn_attack_server(MockReply::Status(StatusCode::INTERNAL_SERVER_ERROR))
            .await
            .expect("spawn server");
    let service = HttpAttackService::from_service_url(&server_url, None).expect("service");

    let err = service.attack(cat_request()).await.expect_err("500");
    assert!(matches!(err, ServiceError::Status(500)), "unexpected: {err:?}");
}

#[tokio::test]
async fn malformed_json_is_a_payload_error() {
    let (server_url, _upload_rx) = spawn_attack_server(MockReply::Raw("{\"attack_success\": tru"))
        .await
        .expect("spawn server");
    let service = HttpAttackService::from_service_url(&server_url, None).expect("service");

    let err = service.attack(cat_request()).await.expect_err("malformed");
    assert!(matches!(err, ServiceError::MalformedPayload(_)), "unexpected: {err:?}");
}

#[tokio::test]
async fn invalid_base64_image_is_a_payload_error() {
    let mut body = cat_dog_response();
    body.adversarial_image_b64 = "data:image/png;base64,!!!".to_string();
    let (server_url, _upload_rx) = spawn_attack_server(MockReply::Success(body))
        .await
        .expect("spawn server");
    let service = HttpAttackService::from_service_url(&server_url, None).expect("service");

    let err = service.attack(cat_request()).await.expect_err("bad base64");
    assert!(matches!(err, ServiceError::MalformedPayload(_)), "unexpected: {err:?}");
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let service = HttpAttackService::from_service_url(&refused_service_url().await, None).expect("service");

    let err = service.attack(cat_request()).await.expect_err("refused");
    assert!(matches!(err, ServiceError::Transport(_)), "unexpected: {err:?}");
}

#[tokio::test]
async fn client_timeout_bounds_a_stalled_response() {
    let (server_url, upload_rx) = spawn_attack_server(MockReply::Delayed(Duration::from_secs(5)))
        .await
        .expect("spawn server");
    let timeout = Some(Duration::from_millis(200));
    let service = HttpAttackService::from_service_url(&server_url, timeout).expect("service");

    let err = service.attack(cat_request()).await.expect_err("timeout");
    assert!(matches!(err, ServiceError::Transport(_)), "unexpected: {err:?}");
    assert!(upload_rx.await.is_ok());
}

#[tokio::test]
async fn session_over_http_reports_cat_dog_scenario() {
    let (server_url, upload_rx) = spawn_attack_server(MockReply::Success(cat_dog_response()))
        .await
        .expect("spawn server");
    let service = HttpAttackService::from_service_url(&server_url, None).expect("service");
    let session = AttackSession::new(Arc::new(service), SessionOptions::default());

    session.select_image("cat.jpg", ImageKind::Jpeg, b"\xff\xd8\xffcat".to_vec());
    session.set_epsilon(0.05);
    let status = session.submit().await;

    let upload = upload_rx.await.expect("upload");
    assert_eq!(upload.epsilon.as_deref(), Some("0.05"));
    let result = status.result().expect("succeeded");
    assert!(result.attack_success);
    assert_eq!(result.clean_prediction, "cat");
    assert_eq!(result.adversarial_prediction, "dog");
    assert_eq!(result.adversarial_image_b64(), cat_dog_response().adversarial_image_b64);
    assert_eq!(session.status(), status);
    assert!(session.can_submit());
}

#[tokio::test]
async fn session_over_http_embeds_status_code() {
    let (server_url, _upload_rx) =
        spawn_attack_server(MockReply::Status(StatusCode::INTERNAL_SERVER_ERROR))
            .await
            .expect("spawn server");
    let service = HttpAttackService::from_service_url(&server_url, None).expect("service");
    let session = AttackSession::new(Arc::new(service), SessionOptions::default());

    session.select_image("cat.png", ImageKind::Png, b"\x89PNGcat".to_vec());
    let status = session.submit().await;

    let message = status.error().expect("failed").to_string();
    assert!(message.contains("500"), "message: {message}");
}

#[tokio::test]
async fn session_over_http_advises_when_service_is_down() {
    let service = HttpAttackService::from_service_url(&refused_service_url().await, None).expect("service");
    let session = AttackSession::new(Arc::new(service), SessionOptions::default());

    session.select_image("cat.png", ImageKind::Png, b"\x89PNGcat".to_vec());
    let status = session.submit().await;

    assert_eq!(
        status.error().expect("failed").to_string(),
        SERVICE_UNAVAILABLE_MESSAGE
    );
    assert!(!session.status().is_awaiting());
    assert!(session.can_submit());
}
