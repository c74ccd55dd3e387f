//! Persisted score library (library.json).
//! schemaVersion: 1
//!
//! Ordering lives in the `Vec`s: `pages` and `segments` are always kept in
//! display/playback order, and `page_number` / `order` are re-derived from
//! that order after every structural edit.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_SCORE_TITLE: &str = "Untitled";
pub const DEFAULT_TIMELINE_TITLE: &str = "Untitled";
pub const DEFAULT_BASE_DURATION_SECS: f64 = 60.0;
pub const DEFAULT_WIDTH_RATIO: f64 = 1.0;
pub const WIDTH_RATIO_RANGE: RangeInclusive<f64> = 0.3..=1.3;
pub const DEFAULT_SPEED_FACTOR: f64 = 1.0;
/// Smallest crop edge accepted when authoring a cropped segment.
pub const MIN_CROP_EDGE: f64 = 0.05;

/// Rectangle in normalized coordinates (0.0–1.0) relative to the source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub const FULL: NormalizedRect = NormalizedRect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when every component lies in [0, 1].
    pub fn is_normalized(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|value| value.is_finite() && (0.0..=1.0).contains(value))
    }

    /// Enforces a minimum edge and keeps the rectangle inside the unit square.
    pub fn clamped(self, min_edge: f64) -> Self {
        let min_edge = min_edge.clamp(0.0, 1.0);
        let width = self.width.clamp(min_edge, 1.0);
        let height = self.height.clamp(min_edge, 1.0);
        Self {
            x: self.x.clamp(0.0, 1.0 - width),
            y: self.y.clamp(0.0, 1.0 - height),
            width,
            height,
        }
    }
}

impl Default for NormalizedRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// One scanned page image of a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: Uuid,
    /// Stored image reference; may carry a legacy directory prefix.
    pub image_file_name: String,
    pub page_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Page {
    /// Bare file name of the page image, without any directory prefix.
    pub fn image_name(&self) -> &str {
        bare_file_name(&self.image_file_name)
    }
}

/// One unit of autoplay content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: Uuid,
    /// `None` once the source page was deleted; such a segment renders nothing.
    #[serde(default)]
    pub source_page_id: Option<Uuid>,
    #[serde(default)]
    pub crop_rect_normalized: Option<NormalizedRect>,
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f64,
    pub order: u32,
}

impl Segment {
    pub fn crop_or_full(&self) -> NormalizedRect {
        self.crop_rect_normalized.unwrap_or_default()
    }
}

fn default_speed_factor() -> f64 {
    DEFAULT_SPEED_FACTOR
}

/// Autoplay configuration of a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "baseScoreDurationSec")]
    pub base_duration_secs: f64,
    pub default_width_ratio: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl Timeline {
    /// Default timeline: one whole-page segment per page, in page order.
    pub fn for_pages(pages: &[Page]) -> Self {
        let segments = pages
            .iter()
            .enumerate()
            .map(|(index, page)| Segment {
                id: Uuid::new_v4(),
                source_page_id: Some(page.id),
                crop_rect_normalized: None,
                speed_factor: DEFAULT_SPEED_FACTOR,
                order: index as u32 + 1,
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            title: DEFAULT_TIMELINE_TITLE.to_string(),
            base_duration_secs: DEFAULT_BASE_DURATION_SECS,
            default_width_ratio: DEFAULT_WIDTH_RATIO,
            created_at: Utc::now(),
            segments,
        }
    }

    pub fn renumber(&mut self) {
        for (index, segment) in self.segments.iter_mut().enumerate() {
            segment.order = index as u32 + 1;
        }
    }

    pub fn segment(&self, id: Uuid) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.id == id)
    }

    fn segment_index(&self, id: Uuid) -> AppResult<usize> {
        self.segments
            .iter()
            .position(|segment| segment.id == id)
            .ok_or(AppError::SegmentNotFound(id))
    }

    /// Appends a segment. The crop is clamped to the unit square with a
    /// minimum edge of [`MIN_CROP_EDGE`].
    pub fn push_segment(
        &mut self,
        source_page_id: Uuid,
        crop: Option<NormalizedRect>,
        speed_factor: f64,
    ) -> AppResult<Uuid> {
        validate_speed_factor(speed_factor)?;
        let crop = match crop {
            Some(rect) => {
                let finite = [rect.x, rect.y, rect.width, rect.height]
                    .iter()
                    .all(|value| value.is_finite());
                if !finite {
                    return Err(AppError::InvalidCropRect(format!("{rect:?}")));
                }
                Some(rect.clamped(MIN_CROP_EDGE))
            }
            None => None,
        };

        let id = Uuid::new_v4();
        self.segments.push(Segment {
            id,
            source_page_id: Some(source_page_id),
            crop_rect_normalized: crop,
            speed_factor,
            order: 0,
        });
        self.renumber();
        Ok(id)
    }

    pub fn remove_segment(&mut self, id: Uuid) -> AppResult<Segment> {
        let index = self.segment_index(id)?;
        let removed = self.segments.remove(index);
        self.renumber();
        Ok(removed)
    }

    pub fn swap_segments(&mut self, a: Uuid, b: Uuid) -> AppResult<()> {
        let first = self.segment_index(a)?;
        let second = self.segment_index(b)?;
        self.segments.swap(first, second);
        self.renumber();
        Ok(())
    }

    /// Moves `id` directly in front of `before`; `None` moves it to the end.
    pub fn move_segment_before(&mut self, id: Uuid, before: Option<Uuid>) -> AppResult<()> {
        if before == Some(id) {
            return Ok(());
        }
        if let Some(anchor) = before {
            self.segment_index(anchor)?;
        }

        let index = self.segment_index(id)?;
        let segment = self.segments.remove(index);
        let target = match before {
            Some(anchor) => self.segment_index(anchor)?,
            None => self.segments.len(),
        };
        self.segments.insert(target, segment);
        self.renumber();
        Ok(())
    }

    pub fn set_speed_factor(&mut self, id: Uuid, speed_factor: f64) -> AppResult<()> {
        validate_speed_factor(speed_factor)?;
        let index = self.segment_index(id)?;
        self.segments[index].speed_factor = speed_factor;
        Ok(())
    }

    pub fn set_base_duration(&mut self, secs: f64) -> AppResult<()> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(AppError::InvalidDuration(secs));
        }
        self.base_duration_secs = secs;
        Ok(())
    }

    /// Stores the width ratio clamped to [`WIDTH_RATIO_RANGE`] and returns it.
    pub fn set_width_ratio(&mut self, ratio: f64) -> f64 {
        let ratio = if ratio.is_finite() {
            ratio.clamp(*WIDTH_RATIO_RANGE.start(), *WIDTH_RATIO_RANGE.end())
        } else {
            DEFAULT_WIDTH_RATIO
        };
        self.default_width_ratio = ratio;
        ratio
    }

    /// Nullifies every reference to `page_id`; the segments stay in place.
    pub fn detach_page(&mut self, page_id: Uuid) -> usize {
        let mut detached = 0;
        for segment in &mut self.segments {
            if segment.source_page_id == Some(page_id) {
                segment.source_page_id = None;
                detached += 1;
            }
        }
        detached
    }
}

fn validate_speed_factor(speed_factor: f64) -> AppResult<()> {
    if !speed_factor.is_finite() || speed_factor <= 0.0 {
        return Err(AppError::InvalidSpeedFactor(speed_factor));
    }
    Ok(())
}

/// A named collection of ordered page images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Timeline>,
}

impl Score {
    pub fn new(title: &str) -> AppResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            title: normalize_title(title)?,
            created_at: Utc::now(),
            pages: Vec::new(),
            timeline: None,
        })
    }

    pub fn rename(&mut self, title: &str) -> AppResult<()> {
        self.title = normalize_title(title)?;
        Ok(())
    }

    pub fn page(&self, id: Uuid) -> Option<&Page> {
        self.pages.iter().find(|page| page.id == id)
    }

    fn page_index(&self, id: Uuid) -> AppResult<usize> {
        self.pages
            .iter()
            .position(|page| page.id == id)
            .ok_or(AppError::PageNotFound(id))
    }

    pub fn renumber_pages(&mut self) {
        for (index, page) in self.pages.iter_mut().enumerate() {
            page.page_number = index as u32 + 1;
        }
    }

    /// Appends a page at the end of the score.
    pub fn add_page(&mut self, image_file_name: &str, note: Option<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.pages.push(Page {
            id,
            image_file_name: image_file_name.to_string(),
            page_number: 0,
            note,
        });
        self.renumber_pages();
        id
    }

    /// Removes a page; timeline segments that referenced it survive unresolved.
    pub fn remove_page(&mut self, id: Uuid) -> AppResult<Page> {
        let index = self.page_index(id)?;
        let removed = self.pages.remove(index);
        self.renumber_pages();
        if let Some(timeline) = self.timeline.as_mut() {
            timeline.detach_page(id);
        }
        Ok(removed)
    }

    /// Moves a page to `to_index` (0-based, clamped to the page count).
    pub fn move_page(&mut self, id: Uuid, to_index: usize) -> AppResult<()> {
        let index = self.page_index(id)?;
        let page = self.pages.remove(index);
        let target = to_index.min(self.pages.len());
        self.pages.insert(target, page);
        self.renumber_pages();
        Ok(())
    }

    pub fn set_page_note(&mut self, id: Uuid, note: Option<String>) -> AppResult<()> {
        let index = self.page_index(id)?;
        self.pages[index].note = note.filter(|text| !text.trim().is_empty());
        Ok(())
    }

    /// Returns the timeline, creating the default one on first use.
    pub fn ensure_timeline(&mut self) -> &mut Timeline {
        let pages = &self.pages;
        self.timeline
            .get_or_insert_with(|| Timeline::for_pages(pages))
    }

    pub fn timeline_mut(&mut self) -> AppResult<&mut Timeline> {
        let id = self.id;
        self.timeline.as_mut().ok_or(AppError::TimelineMissing(id))
    }

    /// Appends a segment cut from one of this score's pages.
    pub fn add_segment(
        &mut self,
        page_id: Uuid,
        crop: Option<NormalizedRect>,
        speed_factor: f64,
    ) -> AppResult<Uuid> {
        self.page_index(page_id)?;
        self.ensure_timeline()
            .push_segment(page_id, crop, speed_factor)
    }

    /// Restores the ordering invariants on data read from disk or a bundle.
    pub fn normalize_order(&mut self) {
        self.pages.sort_by_key(|page| page.page_number);
        self.renumber_pages();
        if let Some(timeline) = self.timeline.as_mut() {
            timeline.segments.sort_by_key(|segment| segment.order);
            timeline.renumber();
        }
    }
}

fn normalize_title(title: &str) -> AppResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidTitle);
    }
    Ok(trimmed.to_string())
}

/// Root object of library.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub schema_version: u32,
    #[serde(default)]
    pub scores: Vec<Score>,
}

impl Default for Library {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            scores: Vec::new(),
        }
    }
}

impl Library {
    pub fn create_score(&mut self, title: &str) -> AppResult<Uuid> {
        let score = Score::new(title)?;
        let id = score.id;
        self.scores.push(score);
        Ok(id)
    }

    /// Deletes a score together with its pages and timeline.
    pub fn delete_score(&mut self, id: Uuid) -> AppResult<Score> {
        let index = self
            .scores
            .iter()
            .position(|score| score.id == id)
            .ok_or(AppError::ScoreNotFound(id))?;
        Ok(self.scores.remove(index))
    }

    pub fn score(&self, id: Uuid) -> AppResult<&Score> {
        self.scores
            .iter()
            .find(|score| score.id == id)
            .ok_or(AppError::ScoreNotFound(id))
    }

    pub fn score_mut(&mut self, id: Uuid) -> AppResult<&mut Score> {
        self.scores
            .iter_mut()
            .find(|score| score.id == id)
            .ok_or(AppError::ScoreNotFound(id))
    }

    /// Newest first.
    pub fn scores_by_created_desc(&self) -> Vec<&Score> {
        let mut scores: Vec<&Score> = self.scores.iter().collect();
        scores.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        scores
    }

    pub fn scores_by_title(&self) -> Vec<&Score> {
        let mut scores: Vec<&Score> = self.scores.iter().collect();
        scores.sort_by(|a, b| {
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then(a.created_at.cmp(&b.created_at))
        });
        scores
    }

    pub fn find_page(&self, id: Uuid) -> Option<&Page> {
        self.scores.iter().find_map(|score| score.page(id))
    }

    pub fn contains_segment(&self, id: Uuid) -> bool {
        self.scores
            .iter()
            .filter_map(|score| score.timeline.as_ref())
            .any(|timeline| timeline.segment(id).is_some())
    }

    pub fn contains_timeline(&self, id: Uuid) -> bool {
        self.scores
            .iter()
            .filter_map(|score| score.timeline.as_ref())
            .any(|timeline| timeline.id == id)
    }

    /// Bare file names of every image referenced by a page.
    pub fn referenced_image_names(&self) -> BTreeSet<String> {
        self.scores
            .iter()
            .flat_map(|score| score.pages.iter())
            .map(|page| page.image_name().to_string())
            .collect()
    }

    pub fn normalize_order(&mut self) {
        for score in &mut self.scores {
            score.normalize_order();
        }
    }
}

pub fn bare_file_name(reference: &str) -> &str {
    reference
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(reference)
}
