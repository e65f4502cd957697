use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Epsilon, ImageKind},
    error::ErrorReport,
};

pub const ATTACK_ROUTE: &str = "/attack";
pub const IMAGE_FIELD: &str = "image";
pub const EPSILON_FIELD: &str = "epsilon";

/// JSON body returned by `POST /attack` on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackResponse {
    pub attack_success: bool,
    pub clean_prediction: String,
    pub adversarial_prediction: String,
    /// Base64 image bytes without a `data:` prefix.
    pub adversarial_image_b64: String,
}

/// Machine-readable summary of one attack attempt, printed by `--json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackReport {
    pub image_name: String,
    pub image_kind: ImageKind,
    pub epsilon: Epsilon,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<AttackOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub attack_success: bool,
    pub clean_prediction: String,
    pub adversarial_prediction: String,
    pub adversarial_image_bytes: usize,
}
