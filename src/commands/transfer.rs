//! Export/import of the whole library as a bundle directory:
//!
//! ```text
//! <bundle>/manifest.json
//! <bundle>/images/<image files>
//! ```

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::bundle::{
    BundleManifest, ScoreExport, IMAGES_DIR_NAME, MANIFEST_FILE_NAME, MANIFEST_VERSION,
};
use crate::models::library::{Library, Score};
use crate::storage::images::list_visible_files;
use crate::storage::{ImageStore, LibraryStore};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub bundle_dir: PathBuf,
    pub scores: usize,
    pub images_copied: usize,
    /// Referenced images that were not found in the image store.
    pub images_missing: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub scores_imported: usize,
    pub pages_imported: usize,
    pub timelines_imported: usize,
    pub segments_imported: usize,
    pub images_copied: usize,
    /// Timelines not imported because their score already owns a different one.
    pub timelines_skipped: usize,
}

/// Writes the library and its referenced images to `bundle_dir`.
///
/// An earlier bundle at that path (a directory holding `manifest.json`) is
/// replaced. Any other non-empty directory is refused.
pub fn export_bundle(
    store: &LibraryStore,
    images: &ImageStore,
    bundle_dir: &Path,
) -> AppResult<ExportSummary> {
    let library = store.load()?;
    log::info!("export_bundle: path={}", bundle_dir.display());

    clear_previous_bundle(bundle_dir)?;
    let images_out = bundle_dir.join(IMAGES_DIR_NAME);
    std::fs::create_dir_all(&images_out).map_err(|e| AppError::file_io(&images_out, e))?;

    let manifest = BundleManifest {
        version: MANIFEST_VERSION,
        exported_at: Utc::now(),
        scores: library.scores.iter().map(ScoreExport::from).collect(),
    };
    let manifest_path = bundle_dir.join(MANIFEST_FILE_NAME);
    let json = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(&manifest_path, json).map_err(|e| AppError::file_io(&manifest_path, e))?;

    let mut images_copied = 0;
    let mut images_missing = Vec::new();
    for name in library.referenced_image_names() {
        if !images.exists(&name) {
            log::warn!("export_bundle: image {name} is missing, skipping");
            images_missing.push(name);
            continue;
        }
        let destination = images_out.join(&name);
        std::fs::copy(images.path_of(&name), &destination)
            .map_err(|e| AppError::file_io(&destination, e))?;
        images_copied += 1;
    }

    log::info!(
        "export_bundle: scores={} images={} missing={}",
        manifest.scores.len(),
        images_copied,
        images_missing.len()
    );
    Ok(ExportSummary {
        bundle_dir: bundle_dir.to_path_buf(),
        scores: manifest.scores.len(),
        images_copied,
        images_missing,
    })
}

fn clear_previous_bundle(bundle_dir: &Path) -> AppResult<()> {
    if !bundle_dir.exists() {
        return Ok(());
    }
    if !bundle_dir.is_dir() {
        return Err(AppError::ExportTargetOccupied(bundle_dir.to_path_buf()));
    }
    if bundle_dir.join(MANIFEST_FILE_NAME).is_file() {
        log::info!("export_bundle: replacing bundle at {}", bundle_dir.display());
        return std::fs::remove_dir_all(bundle_dir).map_err(|e| AppError::file_io(bundle_dir, e));
    }
    let mut entries =
        std::fs::read_dir(bundle_dir).map_err(|e| AppError::file_io(bundle_dir, e))?;
    if entries.next().is_some() {
        return Err(AppError::ExportTargetOccupied(bundle_dir.to_path_buf()));
    }
    Ok(())
}

/// Reads and validates a bundle's manifest.
pub fn read_manifest(bundle_dir: &Path) -> AppResult<BundleManifest> {
    let manifest_path = bundle_dir.join(MANIFEST_FILE_NAME);
    if !manifest_path.is_file() {
        return Err(AppError::ManifestMissing(manifest_path));
    }
    let raw = std::fs::read_to_string(&manifest_path)
        .map_err(|e| AppError::file_io(&manifest_path, e))?;
    let manifest: BundleManifest =
        serde_json::from_str(&raw).map_err(|e| AppError::ManifestMalformed(e.to_string()))?;
    if manifest.version != MANIFEST_VERSION {
        return Err(AppError::UnsupportedSchema {
            expected: MANIFEST_VERSION,
            found: manifest.version,
        });
    }
    Ok(manifest)
}

/// Merges a bundle into the library, upserting by id. Records that already
/// exist are left untouched, and so are existing image files.
///
/// The bundle is validated before anything is copied; the library file is
/// only written once the merge succeeded.
pub fn import_bundle(
    store: &LibraryStore,
    images: &ImageStore,
    bundle_dir: &Path,
) -> AppResult<ImportSummary> {
    log::info!("import_bundle: path={}", bundle_dir.display());
    let manifest = read_manifest(bundle_dir)?;
    let images_in = bundle_dir.join(IMAGES_DIR_NAME);
    if !images_in.is_dir() {
        return Err(AppError::ImagesDirMissing(images_in));
    }
    let mut working = store.load()?;

    let mut summary = ImportSummary::default();
    for name in list_visible_files(&images_in)? {
        if images.copy_in_if_absent(&images_in.join(&name), &name)? {
            summary.images_copied += 1;
        }
    }

    for score in &manifest.scores {
        merge_score(&mut working, score, &mut summary);
    }
    working.normalize_order();
    store.save(&working)?;

    log::info!(
        "import_bundle: scores={} pages={} timelines={} segments={} images={} skipped_timelines={}",
        summary.scores_imported,
        summary.pages_imported,
        summary.timelines_imported,
        summary.segments_imported,
        summary.images_copied,
        summary.timelines_skipped
    );
    Ok(summary)
}

fn merge_score(library: &mut Library, export: &ScoreExport, summary: &mut ImportSummary) {
    let mut new_pages: Vec<_> = export
        .pages
        .iter()
        .filter(|page| library.find_page(page.id).is_none())
        .map(|page| page.to_page())
        .collect();
    new_pages.sort_by_key(|page| page.page_number);
    let timeline_owned_elsewhere = export.timeline.as_ref().is_some_and(|timeline| {
        library.contains_timeline(timeline.id)
            && library
                .score(export.id)
                .map_or(true, |score| score.timeline.as_ref().map(|t| t.id) != Some(timeline.id))
    });

    let index = match library.scores.iter().position(|score| score.id == export.id) {
        Some(index) => index,
        None => {
            library.scores.push(Score {
                id: export.id,
                title: export.title.clone(),
                created_at: export.created_at,
                pages: Vec::new(),
                timeline: None,
            });
            summary.scores_imported += 1;
            library.scores.len() - 1
        }
    };

    // Imported pages go after the pages the score already has.
    let score = &mut library.scores[index];
    let last_page_number = score.pages.iter().map(|page| page.page_number).max().unwrap_or(0);
    for (offset, page) in new_pages.iter_mut().enumerate() {
        page.page_number = last_page_number + offset as u32 + 1;
    }
    summary.pages_imported += new_pages.len();
    score.pages.extend(new_pages);

    let Some(timeline_export) = export.timeline.as_ref() else {
        return;
    };
    if timeline_owned_elsewhere {
        log::warn!(
            "import_bundle: timeline {} belongs to another score, skipping",
            timeline_export.id
        );
        summary.timelines_skipped += 1;
        return;
    }

    let mut new_segments: Vec<_> = timeline_export
        .segments
        .iter()
        .filter(|segment| !library.contains_segment(segment.id))
        .map(|segment| {
            let page_id = segment
                .source_page_id
                .filter(|page_id| library.scores[index].page(*page_id).is_some());
            segment.to_segment(page_id)
        })
        .collect();
    new_segments.sort_by_key(|segment| segment.order);

    let score = &mut library.scores[index];
    let timeline = match score.timeline.as_mut() {
        Some(existing) if existing.id == timeline_export.id => existing,
        Some(existing) => {
            log::warn!(
                "import_bundle: score {} already has timeline {}, skipping {}",
                score.id,
                existing.id,
                timeline_export.id
            );
            summary.timelines_skipped += 1;
            return;
        }
        None => {
            summary.timelines_imported += 1;
            score.timeline.insert(timeline_export.to_timeline_shell())
        }
    };
    let last_order = timeline.segments.iter().map(|segment| segment.order).max().unwrap_or(0);
    for (offset, segment) in new_segments.iter_mut().enumerate() {
        segment.order = last_order + offset as u32 + 1;
    }
    summary.segments_imported += new_segments.len();
    timeline.segments.extend(new_segments);
}
