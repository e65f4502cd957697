use std::sync::Arc;

use shared::domain::{Epsilon, ImageKind};
use tracing::debug;

use crate::{
    preview::{PreviewHandle, PreviewRegistry},
    types::AttackRequest,
};

/// The user's chosen image together with its local preview handle.
#[derive(Debug)]
pub struct SelectedImage {
    name: String,
    kind: ImageKind,
    bytes: Arc<[u8]>,
    preview: PreviewHandle,
}

impl SelectedImage {
    pub fn new(
        previews: &PreviewRegistry,
        name: impl Into<String>,
        kind: ImageKind,
        bytes: Vec<u8>,
    ) -> Self {
        let name = name.into();
        let bytes: Arc<[u8]> = Arc::from(bytes);
        let preview = previews.acquire(&name, Arc::clone(&bytes));
        Self {
            name,
            kind,
            bytes,
            preview,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }
}

/// Holds the submittable input: at most one image and the epsilon value.
#[derive(Debug)]
pub struct InputController {
    selected: Option<SelectedImage>,
    epsilon: Epsilon,
}

impl Default for InputController {
    fn default() -> Self {
        Self::new(Epsilon::DEFAULT)
    }
}

impl InputController {
    pub fn new(epsilon: Epsilon) -> Self {
        Self {
            selected: None,
            epsilon,
        }
    }

    /// Replaces the current image. The previous image, and with it its
    /// preview handle, is dropped here.
    pub fn select_image(&mut self, image: SelectedImage) {
        debug!(
            name = image.name(),
            kind = %image.kind(),
            bytes = image.bytes().len(),
            "input: image selected"
        );
        if let Some(previous) = self.selected.replace(image) {
            debug!(name = previous.name(), "input: releasing previous image");
        }
    }

    /// Stores `value` as-is; range checks belong to the caller's affordance.
    pub fn set_epsilon(&mut self, value: f64) {
        self.epsilon = Epsilon::new(value);
    }

    pub fn epsilon(&self) -> Epsilon {
        self.epsilon
    }

    pub fn selected(&self) -> Option<&SelectedImage> {
        self.selected.as_ref()
    }

    pub fn has_image(&self) -> bool {
        self.selected.is_some()
    }

    pub fn can_submit(&self, in_flight: bool) -> bool {
        self.has_image() && !in_flight
    }

    /// Snapshots the current image and epsilon into a request.
    pub fn build_request(&self) -> Option<AttackRequest> {
        let image = self.selected.as_ref()?;
        Some(AttackRequest::new(
            image.name(),
            image.kind(),
            image.bytes().to_vec(),
            self.epsilon,
        ))
    }
}

#[cfg(test)]
#[path = "tests/input_tests.rs"]
mod tests;
