//! Generation request parameters.
//!
//! `GenerationParams` is the normalized parameter bag shared by every
//! provider adapter. Each adapter reads the knobs it understands and
//! ignores the rest; validation of provider-specific combinations happens
//! inside the adapter.

use serde::{Deserialize, Serialize};

use crate::job::ModelType;

/// Output quality tier for image models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// Standard quality (cheapest tier).
    #[default]
    Standard,
    /// High quality (premium tier).
    High,
}

impl Quality {
    /// Get the quality tier as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::High => "high",
        }
    }
}

/// Output resolution tier for video models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// 1280x720.
    #[default]
    #[serde(rename = "720p")]
    Hd720,
    /// 1920x1080.
    #[serde(rename = "1080p")]
    FullHd,
}

impl Resolution {
    /// Get the resolution tier as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hd720 => "720p",
            Self::FullHd => "1080p",
        }
    }
}

fn default_outputs() -> u8 {
    1
}

/// Normalized generation parameters.
///
/// The parameter bag is frozen into the job record at submission time
/// together with the ticket cost computed from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Quality tier (image models).
    #[serde(default)]
    pub quality: Quality,

    /// Aspect ratio, e.g. `"1:1"` or `"16:9"` (image models).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,

    /// Clip duration in seconds (video models).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,

    /// Output resolution tier (video models).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,

    /// Reference image for conditioning, if the model supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image_url: Option<String>,

    /// Number of outputs requested per call (image models, 1-4).
    #[serde(default = "default_outputs")]
    pub outputs: u8,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            aspect_ratio: None,
            duration_seconds: None,
            resolution: None,
            reference_image_url: None,
            outputs: default_outputs(),
        }
    }
}

/// A normalized generation request handed to a provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The model to generate with.
    pub model_id: String,

    /// Whether the model produces images or video.
    pub model_type: ModelType,

    /// The text prompt.
    pub prompt: String,

    /// Normalized parameters.
    pub params: GenerationParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_default_to_one_standard_output() {
        let params: GenerationParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.quality, Quality::Standard);
        assert_eq!(params.outputs, 1);
        assert!(params.duration_seconds.is_none());
    }

    #[test]
    fn resolution_serializes_as_tier_name() {
        let json = serde_json::to_string(&Resolution::FullHd).unwrap();
        assert_eq!(json, "\"1080p\"");
        let parsed: Resolution = serde_json::from_str("\"720p\"").unwrap();
        assert_eq!(parsed, Resolution::Hd720);
    }

    #[test]
    fn quality_parses_snake_case() {
        let parsed: Quality = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(parsed, Quality::High);
    }
}
