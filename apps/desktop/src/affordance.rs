//! Input rules the file picker and slider enforce before anything reaches
//! the session: PNG/JPEG files only, epsilon snapped to the slider range.

use std::path::Path;

use anyhow::{anyhow, Context};
use shared::domain::{Epsilon, ImageKind};

#[derive(Debug)]
pub struct PickedImage {
    pub name: String,
    pub kind: ImageKind,
    pub bytes: Vec<u8>,
}

/// Content type as a browser `accept="image/png, image/jpeg"` picker would
/// judge it: by extension, not by sniffing the bytes.
pub fn image_kind_for_path(path: &Path) -> anyhow::Result<ImageKind> {
    let mime = mime_guess::from_path(path)
        .first()
        .ok_or_else(|| anyhow!("cannot determine the type of {}", path.display()))?;
    Ok(ImageKind::from_mime_type(mime.essence_str())?)
}

pub async fn pick_image(path: &Path) -> anyhow::Result<PickedImage> {
    let kind = image_kind_for_path(path)?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(PickedImage { name, kind, bytes })
}

pub fn parse_epsilon(raw: &str) -> anyhow::Result<Epsilon> {
    let value: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("epsilon must be a number, got {raw:?}"))?;
    Epsilon::snapped(value).ok_or_else(|| anyhow!("epsilon must be a number, got {raw:?}"))
}
