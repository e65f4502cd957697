use base64::{engine::general_purpose::STANDARD, Engine as _};
use shared::{
    domain::{Epsilon, ImageKind},
    protocol::AttackResponse,
};
use uuid::Uuid;

use crate::error::ServiceError;

/// One outgoing attack, built at submit time and consumed by the service call.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackRequest {
    request_id: Uuid,
    image_name: String,
    image_kind: ImageKind,
    image: Vec<u8>,
    epsilon: Epsilon,
}

impl AttackRequest {
    pub fn new(
        image_name: impl Into<String>,
        image_kind: ImageKind,
        image: Vec<u8>,
        epsilon: Epsilon,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            image_name: image_name.into(),
            image_kind,
            image,
            epsilon,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    pub fn image_kind(&self) -> ImageKind {
        self.image_kind
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn epsilon(&self) -> Epsilon {
        self.epsilon
    }

    pub fn into_image(self) -> Vec<u8> {
        self.image
    }
}

/// Parsed outcome of a successful attack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackResult {
    pub attack_success: bool,
    pub clean_prediction: String,
    pub adversarial_prediction: String,
    /// Decoded adversarial image, PNG as produced by the service.
    pub adversarial_image: Vec<u8>,
}

impl AttackResult {
    pub fn adversarial_image_b64(&self) -> String {
        STANDARD.encode(&self.adversarial_image)
    }
}

impl TryFrom<AttackResponse> for AttackResult {
    type Error = ServiceError;

    fn try_from(value: AttackResponse) -> Result<Self, Self::Error> {
        let adversarial_image = STANDARD
            .decode(value.adversarial_image_b64.trim())
            .map_err(|e| ServiceError::MalformedPayload(format!("invalid adversarial image: {e}")))?;
        Ok(Self {
            attack_success: value.attack_success,
            clean_prediction: value.clean_prediction,
            adversarial_prediction: value.adversarial_prediction,
            adversarial_image,
        })
    }
}
