//! Montage - command-line video editor
//!
//! Loads project documents and renders them: single frames, full exports
//! and a headless preview driven by keyboard controls on stdin.

mod controls;
mod logging;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::Sender;
use montage_core::{CancelToken, EditorConfig, FrameBuffer, FrameRate, RationalTime, Resolution};
use montage_media::{encoder_for, Codec, ExportFormat, ExportPipeline, ExportRequest, Quality};
use montage_render::{Compositor, FileAssets, PreviewDriver};
use montage_timeline::{Project, ProjectFile, TracingObserver};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::controls::{ControlAction, TimelineView};

#[derive(Parser)]
#[command(name = "montage")]
#[command(about = "Montage - render and export timeline projects")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a summary of a project
    Info {
        /// Project file path
        project: PathBuf,
    },

    /// Render one frame to a PNG
    Frame {
        /// Project file path
        project: PathBuf,

        /// Time in seconds
        #[arg(short, long, default_value_t = 0.0)]
        time: f64,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        output_size: OutputSize,

        /// Directory asset urls are resolved against (defaults to the project's directory)
        #[arg(long)]
        assets: Option<PathBuf>,
    },

    /// Render and encode the whole project
    Export {
        /// Project file path
        project: PathBuf,

        /// Output file path; the codec's extension is added when missing
        #[arg(short, long)]
        output: PathBuf,

        /// Codec (y4m, h264, vp9, prores)
        #[arg(long, default_value = "y4m")]
        codec: Codec,

        /// Quality tier (low, medium, high, ultra)
        #[arg(long, default_value = "medium")]
        quality: Quality,

        #[command(flatten)]
        output_size: OutputSize,

        /// Frame rate, e.g. 30 or 30000/1001 (defaults to the project's)
        #[arg(long, value_parser = parse_frame_rate)]
        fps: Option<FrameRate>,

        #[arg(long)]
        assets: Option<PathBuf>,
    },

    /// Play the project headlessly; keys on stdin control playback
    Preview {
        /// Project file path
        project: PathBuf,

        /// Stop after this many seconds of wall-clock time
        #[arg(long)]
        seconds: Option<f64>,

        /// Restart from the beginning at the end
        #[arg(long = "loop")]
        looping: bool,

        /// Write every rendered frame as a PNG into this directory
        #[arg(long)]
        dump: Option<PathBuf>,

        #[command(flatten)]
        output_size: OutputSize,

        #[arg(long)]
        assets: Option<PathBuf>,
    },
}

/// Optional override of the project resolution.
#[derive(clap::Args)]
struct OutputSize {
    /// Output width (defaults to the project's)
    #[arg(long)]
    width: Option<u32>,

    /// Output height (defaults to the project's)
    #[arg(long)]
    height: Option<u32>,
}

impl OutputSize {
    fn resolve(&self, project: &Project) -> Resolution {
        Resolution::new(
            self.width.unwrap_or(project.resolution.width),
            self.height.unwrap_or(project.resolution.height),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EditorConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EditorConfig::load(),
    };
    logging::init_logging(&config.logging);

    match cli.command {
        Commands::Info { project } => {
            let project = load_project(&project)?;
            print_info(&project);
        }
        Commands::Frame {
            project: path,
            time,
            output,
            output_size,
            assets,
        } => {
            let project = load_project(&path)?;
            let compositor = compositor(&config, asset_root(&path, assets));
            let resolution = output_size.resolve(&project);
            let time = RationalTime::from_seconds_f64(time);

            let frame = tokio::task::spawn_blocking(move || {
                compositor.render_frame_at(&project, time, resolution)
            })
            .await?;
            save_png(frame, &output)?;
            info!(time = %time, %resolution, output = %output.display(), "Frame written");
        }
        Commands::Export {
            project: path,
            output,
            codec,
            quality,
            output_size,
            fps,
            assets,
        } => {
            let project = load_project(&path)?;
            let mut format = ExportFormat::new(
                output_size.resolve(&project),
                fps.unwrap_or(project.frame_rate),
                codec,
            )
            .with_quality(quality);
            if let Some(ext) = output.extension().and_then(|e| e.to_str()) {
                format = format.with_extension(ext);
            }

            let mut encoder = encoder_for(&format)?;
            let pipeline = ExportPipeline::new(
                Arc::new(compositor(&config, asset_root(&path, assets))),
                config.export.clone(),
                Arc::new(TracingObserver),
            );
            let request = ExportRequest {
                project,
                format,
                destination: output,
            };

            let report = pipeline
                .export_to_file(&request, encoder.as_mut(), |p| {
                    eprintln!("[{:>5.1}%] {:<9} {}", p.percent, p.stage, p.message);
                })
                .await;
            match (report.success, report.artifact_location, report.error) {
                (true, Some(location), _) => println!("{}", location.display()),
                (_, _, error) => {
                    anyhow::bail!("export failed: {}", error.unwrap_or_default())
                }
            }
        }
        Commands::Preview {
            project: path,
            seconds,
            looping,
            dump,
            output_size,
            assets,
        } => {
            let project = load_project(&path)?;
            let resolution = output_size.resolve(&project);
            let compositor = Arc::new(compositor(&config, asset_root(&path, assets)));
            let options = PreviewOptions {
                limit: seconds.map(Duration::from_secs_f64),
                looping,
                dump,
            };
            preview(project, compositor, resolution, options).await?;
        }
    }

    Ok(())
}

fn load_project(path: &Path) -> Result<Project> {
    let file = ProjectFile::load_from_file(path)
        .with_context(|| format!("loading project {}", path.display()))?;
    Ok(file.project)
}

/// Asset urls resolve against `explicit`, or the project's directory.
fn asset_root(project: &Path, explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        project
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

fn compositor(config: &EditorConfig, root: PathBuf) -> Compositor {
    Compositor::new(
        Arc::new(FileAssets::new(root)),
        Arc::new(TracingObserver),
        config.render.clone(),
    )
}

fn print_info(project: &Project) {
    let duration = project.duration();
    println!("Project:     {}", project.name);
    println!("Resolution:  {}", project.resolution);
    println!("Frame rate:  {}", project.frame_rate);
    println!(
        "Duration:    {:.3}s ({} frames)",
        duration.to_seconds_f64(),
        project.frame_rate.frame_count(duration)
    );
    println!("Effects:     {}", project.effects.len());
    println!("Transitions: {}", project.transitions.len());
    println!("Keyframes:   {}", project.keyframes.len());
    for track in project.tracks_by_layer() {
        println!("Layer {:>3}:   {} clip(s)", track.layer, track.len());
        for clip in &track.clips {
            println!(
                "  {:<24} {:>8.3}s .. {:>8.3}s  {}",
                clip.label(),
                clip.start.to_seconds_f64(),
                clip.end().to_seconds_f64(),
                clip.kind
            );
        }
    }
}

fn save_png(frame: FrameBuffer, path: &Path) -> Result<()> {
    let (width, height) = (frame.width, frame.height);
    let image = image::RgbaImage::from_raw(width, height, frame.into_data())
        .context("frame buffer does not match its dimensions")?;
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))
}

/// Parse `30` or `30000/1001`.
fn parse_frame_rate(value: &str) -> Result<FrameRate, String> {
    let rate = match value.split_once('/') {
        Some((n, d)) => FrameRate::new(
            n.trim().parse().map_err(|_| format!("bad numerator in {value:?}"))?,
            d.trim().parse().map_err(|_| format!("bad denominator in {value:?}"))?,
        ),
        None => FrameRate::from_fps(
            value
                .trim()
                .parse()
                .map_err(|_| format!("expected an integer or n/d, got {value:?}"))?,
        ),
    };
    if rate.is_valid() {
        Ok(rate)
    } else {
        Err(format!("frame rate must be positive, got {value:?}"))
    }
}

// ── Preview ─────────────────────────────────────────────────────

struct PreviewOptions {
    limit: Option<Duration>,
    looping: bool,
    dump: Option<PathBuf>,
}

/// Forward key presses from stdin until it closes or the receiver is gone.
fn read_controls(tx: Sender<ControlAction>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        for action in line.chars().filter_map(controls::action_for_key) {
            if tx.send(action).is_err() {
                return;
            }
        }
    }
}

async fn preview(
    project: Project,
    compositor: Arc<Compositor>,
    resolution: Resolution,
    options: PreviewOptions,
) -> Result<()> {
    if let Some(dir) = &options.dump {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::Builder::new()
        .name("montage-controls".into())
        .spawn(move || read_controls(tx))
        .context("spawning control reader")?;

    let period = Duration::from_secs_f64(project.frame_rate.frame_duration().to_seconds_f64());
    let duration = project.duration();
    let mut driver = PreviewDriver::new(compositor, Arc::new(project), CancelToken::new())
        .with_resolution(resolution);
    let mut view = TimelineView::default();
    driver.clock_mut().set_looping(options.looping);
    driver.clock_mut().play();

    info!(
        %resolution,
        duration = duration.to_seconds_f64(),
        "Preview started (space: play/pause, +/-: zoom, 0: reset view, q: quit)"
    );

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let started = ticker.tick().await;
    let mut last = started;
    let mut rendered = 0u64;

    'playback: loop {
        let tick = ticker.tick().await;
        let elapsed = tick - last;
        last = tick;

        for action in rx.try_iter() {
            if !controls::apply(action, driver.clock_mut(), &mut view) {
                break 'playback;
            }
        }
        if options.limit.is_some_and(|limit| tick - started >= limit) {
            break;
        }
        if !driver.clock().is_playing() {
            if driver.clock().position() >= duration {
                break;
            }
            continue;
        }

        let frame = tokio::task::block_in_place(|| driver.step(elapsed));
        rendered += 1;
        debug!(time = %frame.time, zoom = view.zoom, "Preview frame");
        if let Some(dir) = &options.dump {
            save_png(frame.frame, &dir.join(format!("frame_{rendered:05}.png")))?;
        }
    }

    info!(
        rendered,
        position = driver.clock().position().to_seconds_f64(),
        "Preview stopped"
    );
    Ok(())
}
