//! Ticket pricing for generation models.
//!
//! Cost is computed deterministically from `(model_id, params)` against a
//! fixed lookup table. The orchestrator freezes the result into the job
//! record at reservation time; it is never recomputed afterwards, even if
//! the table changes mid-flight.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::StudioError;
use crate::job::ModelType;
use crate::params::{GenerationParams, Quality, Resolution};

/// Maximum outputs an image call may request.
pub const MAX_IMAGE_OUTPUTS: u8 = 4;

/// Maximum video clip duration in seconds.
pub const MAX_VIDEO_DURATION_SECONDS: u32 = 30;

/// Billing granularity for video, in seconds.
const VIDEO_BILLING_BLOCK_SECONDS: u32 = 5;

/// Ticket pricing for all generation models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingTable {
    /// Image model pricing, keyed by model id.
    pub image: HashMap<String, ImagePricing>,

    /// Video model pricing, keyed by model id.
    pub video: HashMap<String, VideoPricing>,
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut image = HashMap::new();
        image.insert(
            "lumina-image-1".to_string(),
            ImagePricing {
                standard_tickets: 1,
                high_tickets: 2,
            },
        );
        image.insert(
            "flux-queue-xl".to_string(),
            ImagePricing {
                standard_tickets: 2,
                high_tickets: 3,
            },
        );

        let mut video = HashMap::new();
        video.insert(
            "vireo-video-1".to_string(),
            VideoPricing {
                tickets_per_block_720p: 4,
                full_hd_multiplier: 2,
            },
        );

        Self { image, video }
    }
}

impl PricingTable {
    /// Look up whether a model produces images or video.
    ///
    /// Returns `None` for model ids not in the table.
    #[must_use]
    pub fn model_type(&self, model_id: &str) -> Option<ModelType> {
        if self.image.contains_key(model_id) {
            Some(ModelType::Image)
        } else if self.video.contains_key(model_id) {
            Some(ModelType::Video)
        } else {
            None
        }
    }

    /// Compute the ticket cost for a generation.
    ///
    /// Image models price per call, tiered by quality; the output count does
    /// not change the price. Video models price per started 5-second block
    /// at 720p, multiplied for full HD.
    ///
    /// # Errors
    ///
    /// - `StudioError::UnknownModel` for model ids not in the table.
    /// - `StudioError::InvalidParameters` for out-of-range outputs/duration.
    pub fn ticket_cost(&self, model_id: &str, params: &GenerationParams) -> Result<i64, StudioError> {
        if let Some(pricing) = self.image.get(model_id) {
            if params.outputs == 0 || params.outputs > MAX_IMAGE_OUTPUTS {
                return Err(StudioError::InvalidParameters(format!(
                    "outputs must be 1-{MAX_IMAGE_OUTPUTS}, got {}",
                    params.outputs
                )));
            }
            return Ok(match params.quality {
                Quality::Standard => pricing.standard_tickets,
                Quality::High => pricing.high_tickets,
            });
        }

        if let Some(pricing) = self.video.get(model_id) {
            let duration = params
                .duration_seconds
                .unwrap_or(VIDEO_BILLING_BLOCK_SECONDS);
            if duration == 0 || duration > MAX_VIDEO_DURATION_SECONDS {
                return Err(StudioError::InvalidParameters(format!(
                    "duration must be 1-{MAX_VIDEO_DURATION_SECONDS} seconds, got {duration}"
                )));
            }
            let blocks = i64::from(duration.div_ceil(VIDEO_BILLING_BLOCK_SECONDS));
            let multiplier = match params.resolution.unwrap_or_default() {
                Resolution::Hd720 => 1,
                Resolution::FullHd => pricing.full_hd_multiplier,
            };
            return Ok(blocks * pricing.tickets_per_block_720p * multiplier);
        }

        Err(StudioError::UnknownModel {
            model_id: model_id.to_string(),
        })
    }
}

/// Ticket pricing for an image model (per call, tiered by quality).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePricing {
    /// Tickets per call at standard quality.
    pub standard_tickets: i64,
    /// Tickets per call at high quality.
    pub high_tickets: i64,
}

/// Ticket pricing for a video model (per 5-second block, tiered by resolution).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoPricing {
    /// Tickets per started 5-second block at 720p.
    pub tickets_per_block_720p: i64,
    /// Multiplier applied at 1080p.
    pub full_hd_multiplier: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_cost_tiers_by_quality() {
        let table = PricingTable::default();

        let standard = GenerationParams::default();
        assert_eq!(table.ticket_cost("lumina-image-1", &standard).unwrap(), 1);

        let high = GenerationParams {
            quality: Quality::High,
            ..GenerationParams::default()
        };
        assert_eq!(table.ticket_cost("lumina-image-1", &high).unwrap(), 2);
    }

    #[test]
    fn image_cost_is_flat_per_call() {
        let table = PricingTable::default();
        let four_outputs = GenerationParams {
            outputs: 4,
            ..GenerationParams::default()
        };
        let one_output = GenerationParams::default();

        assert_eq!(
            table.ticket_cost("lumina-image-1", &four_outputs).unwrap(),
            table.ticket_cost("lumina-image-1", &one_output).unwrap(),
        );
    }

    #[test]
    fn video_cost_scales_with_duration_and_resolution() {
        let table = PricingTable::default();

        // 12 seconds rounds up to three 5-second blocks.
        let hd = GenerationParams {
            duration_seconds: Some(12),
            ..GenerationParams::default()
        };
        assert_eq!(table.ticket_cost("vireo-video-1", &hd).unwrap(), 12);

        let full_hd = GenerationParams {
            duration_seconds: Some(12),
            resolution: Some(Resolution::FullHd),
            ..GenerationParams::default()
        };
        assert_eq!(table.ticket_cost("vireo-video-1", &full_hd).unwrap(), 24);
    }

    #[test]
    fn video_duration_defaults_to_one_block() {
        let table = PricingTable::default();
        let params = GenerationParams::default();
        assert_eq!(table.ticket_cost("vireo-video-1", &params).unwrap(), 4);
    }

    #[test]
    fn unknown_model_rejected() {
        let table = PricingTable::default();
        let err = table
            .ticket_cost("mystery-model", &GenerationParams::default())
            .unwrap_err();
        assert!(matches!(err, StudioError::UnknownModel { .. }));
    }

    #[test]
    fn out_of_range_params_rejected() {
        let table = PricingTable::default();

        let too_many = GenerationParams {
            outputs: 9,
            ..GenerationParams::default()
        };
        assert!(matches!(
            table.ticket_cost("lumina-image-1", &too_many),
            Err(StudioError::InvalidParameters(_))
        ));

        let too_long = GenerationParams {
            duration_seconds: Some(600),
            ..GenerationParams::default()
        };
        assert!(matches!(
            table.ticket_cost("vireo-video-1", &too_long),
            Err(StudioError::InvalidParameters(_))
        ));
    }

    #[test]
    fn model_type_lookup() {
        let table = PricingTable::default();
        assert_eq!(table.model_type("lumina-image-1"), Some(ModelType::Image));
        assert_eq!(table.model_type("vireo-video-1"), Some(ModelType::Video));
        assert_eq!(table.model_type("nope"), None);
    }
}
