use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use shared::protocol::{AttackResponse, ATTACK_ROUTE, EPSILON_FIELD, IMAGE_FIELD};
use tracing::debug;
use url::Url;

pub mod error;
pub mod input;
pub mod preview;
pub mod session;
pub mod types;

pub use error::{ServiceError, SessionError};
pub use input::{InputController, SelectedImage};
pub use preview::{PreviewHandle, PreviewRegistry};
pub use session::{
    AttackSession, ImageSummary, SessionEvent, SessionOptions, SessionSnapshot, SessionStatus,
};
pub use types::{AttackRequest, AttackResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote side of an attack: classifies the image and perturbs it.
#[async_trait]
pub trait AttackService: Send + Sync {
    async fn attack(&self, request: AttackRequest) -> Result<AttackResult, ServiceError>;
}

/// Builds the `POST /attack` URL for a service base URL.
pub fn attack_endpoint(service_url: &str) -> Result<Url, url::ParseError> {
    let base = service_url.trim().trim_end_matches('/');
    Url::parse(&format!("{base}{ATTACK_ROUTE}"))
}

/// [`AttackService`] over HTTP multipart.
pub struct HttpAttackService {
    http: Client,
    endpoint: Url,
}

impl HttpAttackService {
    /// `request_timeout` bounds the whole exchange, body read included.
    pub fn new(endpoint: Url, request_timeout: Option<Duration>) -> Result<Self, ServiceError> {
        let mut builder = Client::builder().connect_timeout(CONNECT_TIMEOUT);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ServiceError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, endpoint })
    }

    pub fn from_service_url(
        service_url: &str,
        request_timeout: Option<Duration>,
    ) -> Result<Self, ServiceError> {
        let endpoint = attack_endpoint(service_url).map_err(|e| {
            ServiceError::Transport(format!("invalid attack service url {service_url:?}: {e}"))
        })?;
        Self::new(endpoint, request_timeout)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn multipart_form(request: AttackRequest) -> Result<Form, ServiceError> {
    let epsilon = request.epsilon().to_string();
    let file_name = request.image_name().to_string();
    let mime = request.image_kind().mime_type();
    let image = Part::bytes(request.into_image())
        .file_name(file_name)
        .mime_str(mime)
        .map_err(|e| ServiceError::Transport(format!("invalid image content type: {e}")))?;
    Ok(Form::new()
        .part(IMAGE_FIELD, image)
        .text(EPSILON_FIELD, epsilon))
}

#[async_trait]
impl AttackService for HttpAttackService {
    async fn attack(&self, request: AttackRequest) -> Result<AttackResult, ServiceError> {
        let request_id = request.request_id();
        let form = multipart_form(request)?;
        let response = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(%request_id, status = status.as_u16(), "attack: service responded");
        if !status.is_success() {
            return Err(ServiceError::Status(status.as_u16()));
        }

        let body: AttackResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::MalformedPayload(e.to_string()))?;
        AttackResult::try_from(body)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
