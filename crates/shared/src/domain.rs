use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::UnsupportedImageType;

/// Perturbation strength sent to the attack service.
///
/// The value is stored exactly as given; range enforcement belongs to the
/// input affordance, which goes through [`Epsilon::snapped`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epsilon(pub f64);

impl Epsilon {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 0.2;
    pub const STEP: f64 = 0.005;
    pub const DEFAULT: Epsilon = Epsilon(0.05);

    /// 1 / STEP, kept integral so snapped values match their decimal literals.
    const STEPS_PER_UNIT: f64 = 200.0;

    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Clamps into `[MIN, MAX]` and rounds to the nearest `STEP`, the way the
    /// slider does. Returns `None` for NaN.
    pub fn snapped(value: f64) -> Option<Self> {
        if value.is_nan() {
            return None;
        }
        let clamped = value.clamp(Self::MIN, Self::MAX);
        let steps = (clamped * Self::STEPS_PER_UNIT).round();
        // `+ 0.0` turns -0.0 into 0.0 so the wire text is never "-0".
        Some(Self(steps / Self::STEPS_PER_UNIT + 0.0))
    }

    pub fn is_within_range(self) -> bool {
        (Self::MIN..=Self::MAX).contains(&self.0)
    }

    /// Three-decimal label shown next to the slider, e.g. `0.050`.
    pub fn label(self) -> String {
        format!("{:.3}", self.0)
    }
}

impl Default for Epsilon {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Decimal text form used on the wire (`0.05` -> `"0.05"`).
impl fmt::Display for Epsilon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
        }
    }

    pub fn from_mime_type(mime: &str) -> Result<Self, UnsupportedImageType> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Ok(ImageKind::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Ok(ImageKind::Jpeg),
            other => Err(UnsupportedImageType {
                mime: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}
