use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use uuid::Uuid;

use scorenest_lib::commands::library::{self as library_cmd, ScoreSort};
use scorenest_lib::commands::transfer;
use scorenest_lib::models::library::{NormalizedRect, DEFAULT_SCORE_TITLE};
use scorenest_lib::{
    AppConfig, AppResult, PlaybackController, PlaybackPlan, PlaybackSession, PlaybackState,
    Viewport, VirtualViewport,
};

#[derive(Parser, Debug)]
#[command(name = "scorenest", version, about = "Score library and autoplay timelines")]
struct Cli {
    /// Data directory (overrides SCORENEST_DATA_DIR and the platform default).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List scores, newest first.
    List {
        #[arg(long)]
        by_title: bool,
    },
    /// Create an empty score.
    NewScore {
        #[arg(default_value = DEFAULT_SCORE_TITLE)]
        title: String,
    },
    RenameScore { score_id: Uuid, title: String },
    /// Delete a score with its pages and timeline.
    DeleteScore { score_id: Uuid },
    /// Copy an image into the library as the score's next page.
    AddPage {
        score_id: Uuid,
        image: PathBuf,
        #[arg(long)]
        note: Option<String>,
    },
    RemovePage { score_id: Uuid, page_id: Uuid },
    /// Move a page to a 0-based position.
    MovePage {
        score_id: Uuid,
        page_id: Uuid,
        index: usize,
    },
    /// Set or clear (no text) a page note.
    SetNote {
        score_id: Uuid,
        page_id: Uuid,
        text: Option<String>,
    },
    /// Show the score's timeline, creating the default one if needed.
    Timeline { score_id: Uuid },
    /// Append a segment cut from a page.
    AddSegment {
        score_id: Uuid,
        page_id: Uuid,
        /// Normalized crop as `x,y,width,height`.
        #[arg(long, value_parser = parse_crop)]
        crop: Option<NormalizedRect>,
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
    },
    RemoveSegment { score_id: Uuid, segment_id: Uuid },
    SwapSegments { score_id: Uuid, a: Uuid, b: Uuid },
    /// Move a segment in front of another one, or to the end.
    MoveSegment {
        score_id: Uuid,
        segment_id: Uuid,
        #[arg(long)]
        before: Option<Uuid>,
    },
    SetSpeed {
        score_id: Uuid,
        segment_id: Uuid,
        speed: f64,
    },
    /// Set the timeline's total playback duration in seconds.
    SetDuration { score_id: Uuid, seconds: f64 },
    SetWidthRatio { score_id: Uuid, ratio: f64 },
    /// Print the layout and timing tables for a viewport size.
    Plan(ViewportArgs),
    /// Simulate playback on a virtual viewport.
    Play(ViewportArgs),
    /// Export the library to a bundle directory.
    Export { dir: PathBuf },
    /// Merge a bundle directory into the library.
    Import { dir: PathBuf },
    /// Delete stored images no page references.
    GcImages,
}

#[derive(Parser, Debug)]
struct ViewportArgs {
    score_id: Uuid,
    #[arg(long)]
    width: f64,
    #[arg(long)]
    height: f64,
}

fn parse_crop(raw: &str) -> Result<NormalizedRect, String> {
    let values = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid crop '{raw}': {e}"))?;
    match values.as_slice() {
        [x, y, width, height] => Ok(NormalizedRect::new(*x, *y, *width, *height)),
        _ => Err(format!("crop needs 4 values, got {}", values.len())),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("scorenest: {e}");
            eprintln!("error[{}]: {e}", e.code());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let config = AppConfig::load(cli.data_dir)?;
    let store = config.library_store();
    let images = config.image_store();

    match cli.cmd {
        Command::List { by_title } => {
            let sort = if by_title {
                ScoreSort::Title
            } else {
                ScoreSort::CreatedDesc
            };
            for item in library_cmd::list_scores(&store, sort)? {
                let segments = item
                    .segment_count
                    .map(|count| format!("{count} segments"))
                    .unwrap_or_else(|| "no timeline".to_string());
                println!(
                    "{}  {}  {} pages, {}  {}",
                    item.id,
                    item.title,
                    item.page_count,
                    segments,
                    item.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::NewScore { title } => {
            println!("{}", library_cmd::create_score(&store, &title)?);
        }
        Command::RenameScore { score_id, title } => {
            library_cmd::rename_score(&store, score_id, &title)?;
        }
        Command::DeleteScore { score_id } => {
            library_cmd::delete_score(&store, score_id)?;
        }
        Command::AddPage {
            score_id,
            image,
            note,
        } => {
            println!(
                "{}",
                library_cmd::add_page(&store, &images, score_id, &image, note)?
            );
        }
        Command::RemovePage { score_id, page_id } => {
            library_cmd::remove_page(&store, score_id, page_id)?;
        }
        Command::MovePage {
            score_id,
            page_id,
            index,
        } => {
            library_cmd::move_page(&store, score_id, page_id, index)?;
        }
        Command::SetNote {
            score_id,
            page_id,
            text,
        } => {
            library_cmd::set_page_note(&store, score_id, page_id, text)?;
        }
        Command::Timeline { score_id } => {
            let timeline = library_cmd::ensure_timeline(&store, score_id)?;
            println!(
                "{}  {}  base={}s width_ratio={}",
                timeline.id, timeline.title, timeline.base_duration_secs, timeline.default_width_ratio
            );
            for segment in &timeline.segments {
                let page = segment
                    .source_page_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "<deleted page>".to_string());
                let crop = segment.crop_or_full();
                println!(
                    "  #{} {}  page={}  crop=({:.2},{:.2},{:.2},{:.2})  speed={}",
                    segment.order,
                    segment.id,
                    page,
                    crop.x,
                    crop.y,
                    crop.width,
                    crop.height,
                    segment.speed_factor
                );
            }
        }
        Command::AddSegment {
            score_id,
            page_id,
            crop,
            speed,
        } => {
            println!(
                "{}",
                library_cmd::add_segment(&store, score_id, page_id, crop, speed)?
            );
        }
        Command::RemoveSegment {
            score_id,
            segment_id,
        } => {
            library_cmd::remove_segment(&store, score_id, segment_id)?;
        }
        Command::SwapSegments { score_id, a, b } => {
            library_cmd::swap_segments(&store, score_id, a, b)?;
        }
        Command::MoveSegment {
            score_id,
            segment_id,
            before,
        } => {
            library_cmd::move_segment_before(&store, score_id, segment_id, before)?;
        }
        Command::SetSpeed {
            score_id,
            segment_id,
            speed,
        } => {
            library_cmd::set_speed_factor(&store, score_id, segment_id, speed)?;
        }
        Command::SetDuration { score_id, seconds } => {
            library_cmd::set_base_duration(&store, score_id, seconds)?;
        }
        Command::SetWidthRatio { score_id, ratio } => {
            let stored = library_cmd::set_width_ratio(&store, score_id, ratio)?;
            println!("{stored}");
        }
        Command::Plan(args) => {
            let geometry = library_cmd::timeline_geometry(&store, &images, args.score_id)?;
            let viewport = Viewport::new(args.width, args.height);
            let plan = PlaybackPlan::build(&geometry, viewport, &config.controller_config().layout);
            print_plan(&plan);
        }
        Command::Play(args) => {
            let geometry = library_cmd::timeline_geometry(&store, &images, args.score_id)?;
            simulate_playback(&config, geometry, Viewport::new(args.width, args.height)).await?;
        }
        Command::Export { dir } => {
            let summary = transfer::export_bundle(&store, &images, &dir)?;
            println!(
                "exported {} scores, {} images to {}",
                summary.scores,
                summary.images_copied,
                summary.bundle_dir.display()
            );
            for name in summary.images_missing {
                println!("  missing image: {name}");
            }
        }
        Command::Import { dir } => {
            let summary = transfer::import_bundle(&store, &images, &dir)?;
            println!(
                "imported {} scores, {} pages, {} timelines, {} segments, {} images",
                summary.scores_imported,
                summary.pages_imported,
                summary.timelines_imported,
                summary.segments_imported,
                summary.images_copied
            );
            if summary.timelines_skipped > 0 {
                println!("  kept existing timeline for {} scores", summary.timelines_skipped);
            }
        }
        Command::GcImages => {
            let report = library_cmd::collect_image_garbage(&store, &images)?;
            println!("kept {}, deleted {}", report.kept, report.deleted.len());
            for (name, error) in report.failures {
                println!("  failed {name}: {error}");
            }
        }
    }
    Ok(())
}

fn print_plan(plan: &PlaybackPlan) {
    println!(
        "content {:.1}x{:.1}  viewport height {:.1}  max offset {:.1}  duration {:.2}s",
        plan.projection.content_width,
        plan.projection.content_height,
        plan.projection.viewport_height,
        plan.clock.max_offset(),
        plan.clock.total_duration()
    );
    for (index, span) in plan.clock.spans().iter().enumerate() {
        println!(
            "  {:>3}  height {:>8.1}  offset {:>8.1} -> {:>8.1}  time {:>7.2}s -> {:>7.2}s",
            index,
            plan.projection.heights[index],
            span.start_offset,
            span.end_offset,
            span.start_time,
            span.end_time
        );
    }
}

async fn simulate_playback(
    config: &AppConfig,
    geometry: scorenest_lib::TimelineGeometry,
    viewport: Viewport,
) -> AppResult<()> {
    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut controller = PlaybackController::new(VirtualViewport::new(), config.controller_config());
    controller.set_on_complete(move || {
        let _ = done_tx.send(());
    });
    controller.configure(geometry, viewport);
    let mut session = PlaybackSession::new(controller, config.frame_interval());
    let state = session.play(Instant::now())?;
    if state == PlaybackState::Stopped {
        println!("nothing to play");
        return Ok(());
    }

    let mut progress = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = done_rx.recv() => {
                println!("completed at offset {:.1}", session.lock()?.current_offset());
                break;
            }
            _ = progress.tick() => {
                let guard = session.lock()?;
                if guard.state() != PlaybackState::Playing {
                    if guard.state() != PlaybackState::Completed {
                        println!("playback {:?}", guard.state());
                        break;
                    }
                    continue;
                }
                let segment = guard
                    .current_segment_index()
                    .map(|index| index.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("offset {:>8.1}  segment {segment}", guard.current_offset());
            }
            _ = tokio::signal::ctrl_c() => {
                session.stop()?;
                println!("stopped");
                break;
            }
        }
    }

    session.teardown()
}
