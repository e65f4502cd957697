//! Text rendering of a session snapshot: status banner plus the original and
//! adversarial images side by side.

use chrono::Utc;
use client_core::{AttackResult, SessionSnapshot, SessionStatus};
use image::GenericImageView;
use shared::protocol::{AttackOutcome, AttackReport};

const COLUMN_WIDTH: usize = 34;

pub fn render_snapshot(snapshot: &SessionSnapshot, original: Option<&[u8]>) -> String {
    let mut out = String::new();
    match &snapshot.image {
        Some(image) => out.push_str(&format!(
            "Image: {} ({}, {} bytes) {}\n",
            image.name, image.kind, image.size_bytes, image.preview_uri
        )),
        None => out.push_str("Image: none selected\n"),
    }
    out.push_str(&format!(
        "Epsilon (Perturbation): {}\n",
        snapshot.epsilon.label()
    ));

    match &snapshot.status {
        SessionStatus::Idle => {
            let hint = if snapshot.can_submit {
                "Ready. Run the attack."
            } else {
                "Select a PNG or JPEG image to begin."
            };
            out.push_str(hint);
            out.push('\n');
        }
        SessionStatus::AwaitingResponse => out.push_str("Attacking...\n"),
        SessionStatus::Failed(err) => out.push_str(&format!("Error: {err}\n")),
        SessionStatus::Succeeded(result) => out.push_str(&render_result(result, original)),
    }
    out
}

fn render_result(result: &AttackResult, original: Option<&[u8]>) -> String {
    let banner = if result.attack_success {
        "Successful!"
    } else {
        "Failed"
    };
    let left = [
        "Original Image".to_string(),
        describe_image(original),
        format!("Model Prediction: {}", result.clean_prediction),
    ];
    let right = [
        "Adversarial Image".to_string(),
        describe_image(Some(&result.adversarial_image)),
        format!("Model Prediction: {}", result.adversarial_prediction),
    ];

    let mut out = format!("Attack Status: {banner}\n");
    for (l, r) in left.iter().zip(right.iter()) {
        out.push_str(&format!("{l:<width$} | {r}\n", width = COLUMN_WIDTH));
    }
    out
}

fn describe_image(bytes: Option<&[u8]>) -> String {
    let Some(bytes) = bytes else {
        return "(preview released)".to_string();
    };
    match image::load_from_memory(bytes) {
        Ok(decoded) => {
            let (width, height) = decoded.dimensions();
            format!("{width}x{height}, {} bytes", bytes.len())
        }
        Err(_) => format!("undecodable image, {} bytes", bytes.len()),
    }
}

/// `None` until an image has been selected.
pub fn build_report(snapshot: &SessionSnapshot) -> Option<AttackReport> {
    let image = snapshot.image.as_ref()?;
    let outcome = snapshot.status.result().map(|result| AttackOutcome {
        attack_success: result.attack_success,
        clean_prediction: result.clean_prediction.clone(),
        adversarial_prediction: result.adversarial_prediction.clone(),
        adversarial_image_bytes: result.adversarial_image.len(),
    });
    Some(AttackReport {
        image_name: image.name.clone(),
        image_kind: image.kind,
        epsilon: snapshot.epsilon,
        completed_at: Utc::now(),
        outcome,
        error: snapshot.status.error().map(|err| err.report()),
    })
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
