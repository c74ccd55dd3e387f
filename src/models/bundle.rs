//! Export bundle manifest (manifest.json).
//! version: 1
//!
//! Timestamps are ISO-8601 with second precision and a `Z` suffix so that
//! bundles stay readable by strict ISO-8601 decoders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::library::{bare_file_name, NormalizedRect, Page, Score, Segment, Timeline};

pub const MANIFEST_VERSION: u32 = 1;
pub const MANIFEST_FILE_NAME: &str = "manifest.json";
pub const IMAGES_DIR_NAME: &str = "images";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    pub version: u32,
    #[serde(with = "iso8601")]
    pub exported_at: DateTime<Utc>,
    pub scores: Vec<ScoreExport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreExport {
    pub id: Uuid,
    pub title: String,
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,
    pub pages: Vec<PageExport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<TimelineExport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageExport {
    pub id: Uuid,
    /// Bare file name inside the bundle's `images/` directory.
    pub image_name: String,
    pub page_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineExport {
    pub id: Uuid,
    pub title: String,
    pub base_score_duration_sec: f64,
    pub default_width_ratio: f64,
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,
    pub segments: Vec<SegmentExport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentExport {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_page_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_rect_normalized: Option<NormalizedRect>,
    pub speed_factor: f64,
    pub order: u32,
}

impl From<&Page> for PageExport {
    fn from(page: &Page) -> Self {
        Self {
            id: page.id,
            image_name: page.image_name().to_string(),
            page_number: page.page_number,
            note: page.note.clone(),
        }
    }
}

impl From<&Segment> for SegmentExport {
    fn from(segment: &Segment) -> Self {
        Self {
            id: segment.id,
            source_page_id: segment.source_page_id,
            crop_rect_normalized: segment.crop_rect_normalized,
            speed_factor: segment.speed_factor,
            order: segment.order,
        }
    }
}

impl From<&Timeline> for TimelineExport {
    fn from(timeline: &Timeline) -> Self {
        Self {
            id: timeline.id,
            title: timeline.title.clone(),
            base_score_duration_sec: timeline.base_duration_secs,
            default_width_ratio: timeline.default_width_ratio,
            created_at: timeline.created_at,
            segments: timeline.segments.iter().map(SegmentExport::from).collect(),
        }
    }
}

impl From<&Score> for ScoreExport {
    fn from(score: &Score) -> Self {
        Self {
            id: score.id,
            title: score.title.clone(),
            created_at: score.created_at,
            pages: score.pages.iter().map(PageExport::from).collect(),
            timeline: score.timeline.as_ref().map(TimelineExport::from),
        }
    }
}

impl PageExport {
    pub fn to_page(&self) -> Page {
        Page {
            id: self.id,
            image_file_name: bare_file_name(&self.image_name).to_string(),
            page_number: self.page_number,
            note: self.note.clone(),
        }
    }
}

impl TimelineExport {
    /// Builds an empty timeline shell; segments are upserted separately.
    pub fn to_timeline_shell(&self) -> Timeline {
        Timeline {
            id: self.id,
            title: self.title.clone(),
            base_duration_secs: self.base_score_duration_sec,
            default_width_ratio: self.default_width_ratio,
            created_at: self.created_at,
            segments: Vec::new(),
        }
    }
}

impl SegmentExport {
    /// `source_page_id` is the already-resolved page reference.
    pub fn to_segment(&self, source_page_id: Option<Uuid>) -> Segment {
        Segment {
            id: self.id,
            source_page_id,
            crop_rect_normalized: self.crop_rect_normalized,
            speed_factor: self.speed_factor,
            order: self.order,
        }
    }
}

mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(raw.trim())
            .map(|value| value.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
