use serde::{Deserialize, Serialize};

/// A single named object with a confidence score.
///
/// Constructed only through [`DetectedObject::new`], which enforces a
/// non-empty display name and a confidence in `[0, 1]`. Deserialization goes
/// through the same check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDetectedObject")]
pub struct DetectedObject {
    name: String,
    confidence: f64,
}

#[derive(Deserialize)]
struct RawDetectedObject {
    name: String,
    confidence: f64,
}

impl TryFrom<RawDetectedObject> for DetectedObject {
    type Error = String;

    fn try_from(raw: RawDetectedObject) -> Result<Self, Self::Error> {
        DetectedObject::new(raw.name, raw.confidence).ok_or_else(|| {
            "detected object needs a non-empty name and a confidence in [0, 1]".to_string()
        })
    }
}

impl DetectedObject {
    /// Returns `None` when the trimmed name is empty or the confidence is not
    /// a finite number in `[0, 1]`.
    pub fn new(name: impl Into<String>, confidence: f64) -> Option<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() || !is_probability(confidence) {
            return None;
        }
        let name = if trimmed.len() == name.len() {
            name
        } else {
            trimmed.to_string()
        };
        Some(Self { name, confidence })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

pub(crate) fn is_probability(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Outcome of one `detect` call.
///
/// `objects` is never empty once returned from the service: a failed real
/// call is replaced by mock detections with `success == false` and the
/// failure text in `error`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub objects: Vec<DetectedObject>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionResult {
    /// Successful result from either the upstream model or the unconfigured mock path.
    pub fn detected(objects: Vec<DetectedObject>) -> Self {
        Self {
            objects,
            success: true,
            error: None,
        }
    }

    /// Mock substitute after the real pipeline failed.
    pub fn fallback(objects: Vec<DetectedObject>, error: impl Into<String>) -> Self {
        Self {
            objects,
            success: false,
            error: Some(error.into()),
        }
    }

    /// True when callers should verify the objects before scoring.
    pub fn is_degraded(&self) -> bool {
        !self.success
    }
}
