use std::collections::HashMap;

use uuid::Uuid;

use crate::models::library::{NormalizedRect, Score, DEFAULT_WIDTH_RATIO};

/// Pixel size of a stored page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Resolves a stored image name to its pixel size.
///
/// `None` means the image cannot be resolved (missing file, undecodable header).
pub trait ImageDimensions {
    fn dimensions(&self, image_name: &str) -> Option<ImageSize>;
}

impl ImageDimensions for HashMap<String, ImageSize> {
    fn dimensions(&self, image_name: &str) -> Option<ImageSize> {
        self.get(image_name).copied()
    }
}

/// Source region, crop and speed of one segment, with the image already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentGeometry {
    pub segment_id: Uuid,
    /// `None` when the page was deleted or its image is missing.
    pub source: Option<ImageSize>,
    pub crop: NormalizedRect,
    pub speed_factor: f64,
}

impl SegmentGeometry {
    pub fn new(source: Option<ImageSize>, crop: NormalizedRect, speed_factor: f64) -> Self {
        Self {
            segment_id: Uuid::new_v4(),
            source,
            crop,
            speed_factor,
        }
    }

    /// Width / height of the cropped region in source pixels.
    ///
    /// Returns `None` for unresolved sources and for degenerate crops, both of
    /// which render as zero-height content.
    pub fn aspect_ratio(&self) -> Option<f64> {
        let source = self.source?;
        if !self.crop.is_normalized() {
            return None;
        }
        let width = source.width as f64 * self.crop.width;
        let height = source.height as f64 * self.crop.height;
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        let ratio = width / height;
        ratio.is_finite().then_some(ratio)
    }

    pub fn is_resolved(&self) -> bool {
        self.aspect_ratio().is_some()
    }
}

/// Everything the playback core needs from a timeline, in playback order.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineGeometry {
    pub base_duration_secs: f64,
    pub width_ratio: f64,
    pub segments: Vec<SegmentGeometry>,
}

impl TimelineGeometry {
    pub fn new(base_duration_secs: f64, width_ratio: f64, segments: Vec<SegmentGeometry>) -> Self {
        Self {
            base_duration_secs,
            width_ratio,
            segments,
        }
    }

    /// Resolves a score's timeline against the image store.
    ///
    /// Returns `None` when the score has no timeline yet. Segments whose page
    /// was deleted, or whose image cannot be read, stay in place unresolved.
    pub fn resolve(score: &Score, images: &dyn ImageDimensions) -> Option<Self> {
        let timeline = score.timeline.as_ref()?;
        let segments = timeline
            .segments
            .iter()
            .map(|segment| {
                let source = segment
                    .source_page_id
                    .and_then(|page_id| score.page(page_id))
                    .and_then(|page| images.dimensions(page.image_name()));
                SegmentGeometry {
                    segment_id: segment.id,
                    source,
                    crop: segment.crop_or_full(),
                    speed_factor: segment.speed_factor,
                }
            })
            .collect();

        Some(Self {
            base_duration_secs: timeline.base_duration_secs,
            width_ratio: timeline.default_width_ratio,
            segments,
        })
    }

    pub fn unresolved_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| !segment.is_resolved())
            .count()
    }

    pub fn effective_width_ratio(&self) -> f64 {
        if self.width_ratio.is_finite() && self.width_ratio > 0.0 {
            self.width_ratio
        } else {
            DEFAULT_WIDTH_RATIO
        }
    }

    pub fn speed_factors(&self) -> Vec<f64> {
        self.segments
            .iter()
            .map(|segment| segment.speed_factor)
            .collect()
    }
}
