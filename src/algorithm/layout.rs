//! Projects segment geometry onto a viewport: rendered heights and the
//! scroll offset at which each segment's content ends.

use crate::algorithm::geometry::TimelineGeometry;

/// Measured size of the scrollable viewport in points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// False until the view system has measured the viewport.
    pub fn is_measured(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height >= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutConfig {
    /// Vertical gap between two rendered segments.
    pub segment_spacing: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutProjection {
    pub content_width: f64,
    pub content_height: f64,
    pub viewport_height: f64,
    /// `content_height - viewport_height`, floored at 0.
    pub max_offset: f64,
    pub heights: Vec<f64>,
    /// Clamped to `max_offset`; the last entry is exactly `max_offset`.
    pub end_offsets: Vec<f64>,
}

impl LayoutProjection {
    pub fn project(geometry: &TimelineGeometry, viewport: Viewport, config: &LayoutConfig) -> Self {
        let content_width = viewport.width.max(0.0) * geometry.effective_width_ratio();
        let aspect_ratios: Vec<Option<f64>> = geometry
            .segments
            .iter()
            .map(|segment| segment.aspect_ratio())
            .collect();
        project_segments(
            &aspect_ratios,
            content_width,
            viewport.height,
            config.segment_spacing,
        )
    }

    pub fn len(&self) -> usize {
        self.end_offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.end_offsets.is_empty()
    }

    pub fn start_offset(&self, index: usize) -> f64 {
        if index == 0 {
            0.0
        } else {
            self.end_offsets.get(index - 1).copied().unwrap_or(self.max_offset)
        }
    }

    /// Scroll distance covered by each segment.
    pub fn distances(&self) -> Vec<f64> {
        (0..self.end_offsets.len())
            .map(|index| (self.end_offsets[index] - self.start_offset(index)).max(0.0))
            .collect()
    }

    /// Horizontal offset that centres the content: negative inset for narrow
    /// content, midpoint scroll for wide content.
    pub fn horizontal_center_offset(&self, viewport_width: f64) -> f64 {
        let inset = ((viewport_width - self.content_width) * 0.5).max(0.0);
        if inset > 0.0 {
            -inset
        } else {
            ((self.content_width - viewport_width) * 0.5).max(0.0)
        }
    }
}

/// Lays out segments top to bottom at `content_width`.
///
/// `None` ratios (unresolved content) take zero height and add no spacing,
/// but still occupy a slot whose end offset equals the previous one.
pub fn project_segments(
    aspect_ratios: &[Option<f64>],
    content_width: f64,
    viewport_height: f64,
    segment_spacing: f64,
) -> LayoutProjection {
    let content_width = if content_width.is_finite() {
        content_width.max(0.0)
    } else {
        0.0
    };
    let spacing = if segment_spacing.is_finite() {
        segment_spacing.max(0.0)
    } else {
        0.0
    };
    let viewport_height = if viewport_height.is_finite() {
        viewport_height.max(0.0)
    } else {
        0.0
    };

    let heights: Vec<f64> = aspect_ratios
        .iter()
        .map(|ratio| match ratio {
            Some(ratio) if *ratio > 0.0 && ratio.is_finite() => content_width / ratio,
            _ => 0.0,
        })
        .collect();

    let mut raw_ends = Vec::with_capacity(heights.len());
    let mut cursor = 0.0;
    let mut placed_any = false;
    for height in &heights {
        if *height > 0.0 {
            if placed_any {
                cursor += spacing;
            }
            cursor += height;
            placed_any = true;
        }
        raw_ends.push(cursor);
    }

    let content_height = cursor;
    let max_offset = (content_height - viewport_height).max(0.0);

    let mut end_offsets: Vec<f64> = raw_ends
        .into_iter()
        .map(|end| end.min(max_offset))
        .collect();
    if let Some(last) = end_offsets.last_mut() {
        *last = max_offset;
    }

    LayoutProjection {
        content_width,
        content_height,
        viewport_height,
        max_offset,
        heights,
        end_offsets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::geometry::{ImageSize, SegmentGeometry};
    use crate::models::library::NormalizedRect;

    #[test]
    fn heights_follow_content_width_and_aspect_ratio() {
        let projection = project_segments(&[Some(2.0), Some(0.5)], 400.0, 300.0, 0.0);
        assert_eq!(projection.heights, vec![200.0, 800.0]);
        assert_eq!(projection.content_height, 1_000.0);
        assert_eq!(projection.max_offset, 700.0);
        assert_eq!(projection.end_offsets, vec![200.0, 700.0]);
    }

    #[test]
    fn end_offsets_are_clamped_and_last_is_max() {
        let projection = project_segments(&[Some(1.0), Some(1.0), Some(1.0)], 300.0, 500.0, 0.0);
        assert_eq!(projection.max_offset, 400.0);
        assert_eq!(projection.end_offsets, vec![300.0, 400.0, 400.0]);
    }

    #[test]
    fn content_shorter_than_viewport_never_scrolls() {
        let projection = project_segments(&[Some(4.0), Some(4.0)], 400.0, 800.0, 0.0);
        assert_eq!(projection.max_offset, 0.0);
        assert!(projection.end_offsets.iter().all(|end| *end == 0.0));
        assert!(projection.distances().iter().all(|distance| *distance == 0.0));
    }

    #[test]
    fn unresolved_segments_keep_their_slot_with_zero_distance() {
        let projection = project_segments(&[Some(1.0), None, Some(1.0)], 100.0, 50.0, 10.0);
        assert_eq!(projection.heights, vec![100.0, 0.0, 100.0]);
        assert_eq!(projection.content_height, 210.0);
        assert_eq!(projection.end_offsets, vec![100.0, 100.0, 160.0]);
        assert_eq!(projection.distances(), vec![100.0, 0.0, 60.0]);
    }

    #[test]
    fn last_offset_is_exact_despite_rounding() {
        let ratios = vec![Some(3.0); 7];
        let projection = project_segments(&ratios, 100.0, 0.1, 0.0);
        let last = *projection.end_offsets.last().expect("offsets");
        assert_eq!(last, projection.max_offset);
    }

    #[test]
    fn empty_timeline_projects_to_nothing() {
        let projection = project_segments(&[], 400.0, 800.0, 16.0);
        assert!(projection.is_empty());
        assert_eq!(projection.max_offset, 0.0);
    }

    #[test]
    fn project_applies_width_ratio() {
        let geometry = TimelineGeometry::new(
            60.0,
            0.5,
            vec![SegmentGeometry::new(
                Some(ImageSize::new(1_000, 2_000)),
                NormalizedRect::FULL,
                1.0,
            )],
        );
        let projection =
            LayoutProjection::project(&geometry, Viewport::new(400.0, 100.0), &LayoutConfig::default());
        assert_eq!(projection.content_width, 200.0);
        assert_eq!(projection.heights, vec![400.0]);
        assert_eq!(projection.max_offset, 300.0);
    }

    #[test]
    fn horizontal_centering_handles_narrow_and_wide_content() {
        let narrow = project_segments(&[Some(1.0)], 300.0, 100.0, 0.0);
        assert_eq!(narrow.horizontal_center_offset(400.0), -50.0);

        let wide = project_segments(&[Some(1.0)], 520.0, 100.0, 0.0);
        assert_eq!(wide.horizontal_center_offset(400.0), 60.0);
    }
}
