// Copyright 2025 Andrew D. Straw.

use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use clap::Parser;
use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use capture_clock::{MonotonicInstant, RealInstant};
use capture_drawable::{Drawable, Rect};
use frame_preparer::{LazyDrawablePointer, PointerBitmap};
use video_capture_core::{
    Encoder, ImageByInterval, NotifyNextVideo, PngSink, RotationReason, Sequencer, SequencedVideoParams, VideoParams,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Directory segments and still previews are written into.
    #[arg(long)]
    out_dir: Utf8PathBuf,

    /// Capture width, in pixels.
    #[arg(long, default_value_t = 320)]
    width: u32,

    /// Capture height, in pixels.
    #[arg(long, default_value_t = 240)]
    height: u32,

    /// Frame rate of the simulated capture.
    #[arg(long, default_value_t = 25)]
    frame_rate: u32,

    /// Duration of the simulated capture, in seconds.
    #[arg(long, default_value_t = 10.0)]
    duration_secs: f64,

    /// Rotate to a new file every this many seconds.
    #[arg(long, default_value_t = 2.0)]
    break_interval_secs: f64,

    /// Disable showing progress.
    #[arg(short, long, default_value_t)]
    no_progress: bool,
}

/// Writes each frame as a standalone PNG, standing in for a real video
/// encoder so this demo has no codec dependency.
struct PngFrameEncoder {
    out_dir: Utf8PathBuf,
    frames_written: usize,
}

impl Encoder for PngFrameEncoder {
    fn open(
        &mut self,
        filename: &str,
        _codec_name: &str,
        _codec_options: &str,
        _width: u32,
        _height: u32,
        _frame_rate: u32,
        _file_permissions: u32,
    ) -> Result<(), String> {
        tracing::info!(filename, "opening segment");
        self.frames_written = 0;
        Ok(())
    }

    fn push_frame(&mut self, image: &Drawable, _monotonic_timestamp: MonotonicInstant) -> Result<(), String> {
        self.frames_written += 1;
        let path = self.out_dir.join(format!("frame-{:06}.png", self.frames_written));
        write_png(&path, image).map_err(|e| e.to_string())
    }

    fn flush(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), String> {
        tracing::info!(frames = self.frames_written, "closing segment");
        Ok(())
    }
}

struct FilePngSink;

impl PngSink for FilePngSink {
    fn write_png(&mut self, filename: &str, image: &Drawable) -> Result<(), String> {
        write_png(filename, image).map_err(|e| e.to_string())
    }
}

fn write_png(path: impl AsRef<camino::Utf8Path>, image: &Drawable) -> Result<()> {
    let path = path.as_ref();
    let buf = image::RgbImage::from_raw(image.width(), image.height(), image.data().to_vec())
        .ok_or_else(|| eyre::eyre!("drawable buffer is not a valid {}x{} RGB8 raster", image.width(), image.height()))?;
    buf.save(path).with_context(|| format!("writing {path}"))
}

struct LoggingNotifier;
impl NotifyNextVideo for LoggingNotifier {
    fn notify(&mut self, now: MonotonicInstant, reason: RotationReason) {
        tracing::info!(?now, ?reason, "rotated to a new segment");
    }
}

struct NoPointer;
impl LazyDrawablePointer for NoPointer {
    fn materialise(&mut self) -> PointerBitmap {
        PointerBitmap { width: 0, height: 0, hotspot_x: 0, hotspot_y: 0, rgba: Vec::new() }
    }
}

fn main() -> Result<()> {
    env_tracing_logger::init();
    let cli = Cli::parse();

    std::fs::create_dir_all(&cli.out_dir).with_context(|| format!("creating {}", cli.out_dir))?;

    let bounds = Rect::new(0, 0, cli.width, cli.height);
    let params = VideoParams {
        frame_rate: cli.frame_rate,
        image_by_interval: ImageByInterval::WithTimestamp,
        codec_name: "png-sequence".to_string(),
        codec_options: String::new(),
        file_permissions: 0o644,
        crop_rect: bounds,
        draw_pointer: false,
    };

    let start = Instant::now();
    let mut sequencer = Sequencer::new(
        SequencedVideoParams {
            video: params,
            break_interval: Duration::from_secs_f64(cli.break_interval_secs),
            filename_prefix: cli.out_dir.join("segment").to_string(),
            extension: "seq".to_string(),
            png_extension: "png".to_string(),
        },
        bounds,
        MonotonicInstant::from_std(start),
        RealInstant::now(),
        chrono::FixedOffset::east_opt(0).unwrap(),
        None,
        Box::new(PngFrameEncoder { out_dir: cli.out_dir.clone(), frames_written: 0 }),
    )?;

    let mut drawable = Drawable::zeros(cli.width, cli.height);
    let mut png_sink = FilePngSink;
    let mut notifier = LoggingNotifier;
    let mut acl = video_capture_core::LoggingAclReportApi;

    let total = Duration::from_secs_f64(cli.duration_secs);
    let tick = Duration::from_secs_f64(1.0 / cli.frame_rate as f64);

    let pb: Option<ProgressBar> = if !cli.no_progress {
        let style = ProgressStyle::with_template("Capturing {wide_bar} {pos}/{len} ETA: {eta} ")?;
        let len = (cli.duration_secs / tick.as_secs_f64()) as u64;
        Some(ProgressBar::new(len).with_style(style))
    } else {
        None
    };

    let mut elapsed = Duration::ZERO;
    while elapsed <= total {
        let now = MonotonicInstant::from_std(start + elapsed);
        sequencer.periodic_snapshot(now, 0, 0, &mut drawable, &mut NoPointer, &mut png_sink, &mut notifier, &mut acl)?;
        if let Some(pb) = pb.as_ref() {
            pb.inc(1);
        }
        elapsed += tick;
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    eprintln!("capture finished; {} frames emitted", sequencer.ctx().frame_index());
    Ok(())
}
