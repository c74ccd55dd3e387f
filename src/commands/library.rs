//! Authoring operations over the persisted library.
//!
//! Each operation loads `library.json`, applies one edit and saves it back.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::algorithm::geometry::TimelineGeometry;
use crate::error::{AppError, AppResult};
use crate::models::library::{NormalizedRect, Timeline};
use crate::storage::{GcReport, ImageStore, LibraryStore};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreListItem {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub page_count: usize,
    pub segment_count: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreSort {
    /// Newest first.
    #[default]
    CreatedDesc,
    Title,
}

pub fn list_scores(store: &LibraryStore, sort: ScoreSort) -> AppResult<Vec<ScoreListItem>> {
    let library = store.load()?;
    let scores = match sort {
        ScoreSort::CreatedDesc => library.scores_by_created_desc(),
        ScoreSort::Title => library.scores_by_title(),
    };
    Ok(scores
        .into_iter()
        .map(|score| ScoreListItem {
            id: score.id,
            title: score.title.clone(),
            created_at: score.created_at,
            page_count: score.pages.len(),
            segment_count: score.timeline.as_ref().map(|t| t.segments.len()),
        })
        .collect())
}

pub fn create_score(store: &LibraryStore, title: &str) -> AppResult<Uuid> {
    let id = store.update(|library| library.create_score(title))?;
    log::info!("create_score: id={id}");
    Ok(id)
}

pub fn rename_score(store: &LibraryStore, score_id: Uuid, title: &str) -> AppResult<()> {
    store.update(|library| library.score_mut(score_id)?.rename(title))
}

/// Deletes the score with its pages and timeline. Image files stay until
/// [`collect_image_garbage`] runs.
pub fn delete_score(store: &LibraryStore, score_id: Uuid) -> AppResult<()> {
    let removed = store.update(|library| library.delete_score(score_id))?;
    log::info!(
        "delete_score: id={} pages={}",
        removed.id,
        removed.pages.len()
    );
    Ok(())
}

/// Copies `image_path` into the image store and appends it as a new page.
pub fn add_page(
    store: &LibraryStore,
    images: &ImageStore,
    score_id: Uuid,
    image_path: &Path,
    note: Option<String>,
) -> AppResult<Uuid> {
    // Fail before copying anything when the score does not exist.
    store.load()?.score(score_id)?;

    let image_name = images.store_file(image_path)?;
    let result = store.update(|library| {
        Ok(library
            .score_mut(score_id)?
            .add_page(&image_name, note))
    });
    match result {
        Ok(page_id) => {
            log::info!("add_page: score={score_id} page={page_id} image={image_name}");
            Ok(page_id)
        }
        Err(e) => {
            if let Err(cleanup) = images.delete(&image_name) {
                log::warn!("add_page: failed to remove {image_name}: {cleanup}");
            }
            Err(e)
        }
    }
}

pub fn remove_page(store: &LibraryStore, score_id: Uuid, page_id: Uuid) -> AppResult<()> {
    let removed = store.update(|library| library.score_mut(score_id)?.remove_page(page_id))?;
    log::info!("remove_page: score={score_id} page={}", removed.id);
    Ok(())
}

pub fn move_page(
    store: &LibraryStore,
    score_id: Uuid,
    page_id: Uuid,
    to_index: usize,
) -> AppResult<()> {
    store.update(|library| library.score_mut(score_id)?.move_page(page_id, to_index))
}

pub fn set_page_note(
    store: &LibraryStore,
    score_id: Uuid,
    page_id: Uuid,
    note: Option<String>,
) -> AppResult<()> {
    store.update(|library| library.score_mut(score_id)?.set_page_note(page_id, note))
}

/// Returns the score's timeline, creating the default one on first use.
pub fn ensure_timeline(store: &LibraryStore, score_id: Uuid) -> AppResult<Timeline> {
    store.update(|library| Ok(library.score_mut(score_id)?.ensure_timeline().clone()))
}

pub fn add_segment(
    store: &LibraryStore,
    score_id: Uuid,
    page_id: Uuid,
    crop: Option<NormalizedRect>,
    speed_factor: f64,
) -> AppResult<Uuid> {
    let id = store.update(|library| {
        library
            .score_mut(score_id)?
            .add_segment(page_id, crop, speed_factor)
    })?;
    log::info!("add_segment: score={score_id} segment={id}");
    Ok(id)
}

pub fn remove_segment(store: &LibraryStore, score_id: Uuid, segment_id: Uuid) -> AppResult<()> {
    store.update(|library| {
        library
            .score_mut(score_id)?
            .timeline_mut()?
            .remove_segment(segment_id)
            .map(|_| ())
    })
}

pub fn swap_segments(store: &LibraryStore, score_id: Uuid, a: Uuid, b: Uuid) -> AppResult<()> {
    store.update(|library| library.score_mut(score_id)?.timeline_mut()?.swap_segments(a, b))
}

pub fn move_segment_before(
    store: &LibraryStore,
    score_id: Uuid,
    segment_id: Uuid,
    before: Option<Uuid>,
) -> AppResult<()> {
    store.update(|library| {
        library
            .score_mut(score_id)?
            .timeline_mut()?
            .move_segment_before(segment_id, before)
    })
}

pub fn set_speed_factor(
    store: &LibraryStore,
    score_id: Uuid,
    segment_id: Uuid,
    speed_factor: f64,
) -> AppResult<()> {
    store.update(|library| {
        library
            .score_mut(score_id)?
            .timeline_mut()?
            .set_speed_factor(segment_id, speed_factor)
    })
}

pub fn set_base_duration(store: &LibraryStore, score_id: Uuid, secs: f64) -> AppResult<()> {
    store.update(|library| library.score_mut(score_id)?.timeline_mut()?.set_base_duration(secs))
}

/// Returns the ratio actually stored after clamping.
pub fn set_width_ratio(store: &LibraryStore, score_id: Uuid, ratio: f64) -> AppResult<f64> {
    store.update(|library| Ok(library.score_mut(score_id)?.timeline_mut()?.set_width_ratio(ratio)))
}

/// Geometry of the score's timeline with image sizes read from the store.
pub fn timeline_geometry(
    store: &LibraryStore,
    images: &ImageStore,
    score_id: Uuid,
) -> AppResult<TimelineGeometry> {
    let library = store.load()?;
    let score = library.score(score_id)?;
    let geometry =
        TimelineGeometry::resolve(score, images).ok_or(AppError::TimelineMissing(score_id))?;
    let unresolved = geometry.unresolved_count();
    if unresolved > 0 {
        log::warn!("timeline_geometry: score={score_id} unresolved segments={unresolved}");
    }
    Ok(geometry)
}

pub fn collect_image_garbage(store: &LibraryStore, images: &ImageStore) -> AppResult<GcReport> {
    let library = store.load()?;
    images.collect_garbage(&library)
}
