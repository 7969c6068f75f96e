use anyhow::Context;
use clap::{ArgAction, Parser};
use face_landmarks::detector::DEFAULT_CASCADE;
use face_landmarks::tracker::DEFAULT_DOWNSAMPLE_RATIO;
use face_landmarks::{
    CascadeDetector, LandmarkTracker, LandmarkWriter, RegionMode, Rotation, ShapePredictor,
    TrackerConfig, VideoSource,
};
use opencv::highgui;
use std::ops::ControlFlow;
use std::path::PathBuf;

const WINDOW_NAME: &str = "Face Landmark Detector";
const DEFAULT_MODEL: &str = "../../data/shape_predictor_68_face_landmarks.dat";
const ESCAPE_KEY: i32 = 27;

#[derive(Parser, Debug)]
#[command(about = "Detect 68 face landmarks on every frame of a video")]
struct Args {
    /// Video file, stream URL or camera index.
    source: String,

    /// Directory receiving landmarks.txt.
    output_dir: PathBuf,

    /// Frame rotation: 0 none, 1 clockwise, 2 upside down, 3 counter-clockwise.
    #[arg(default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
    rotation: u8,

    /// Run the predictor on the whole frame instead of a detected face.
    #[arg(long)]
    full_frame: bool,

    /// dlib shape predictor model (.dat or .dat.bz2).
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: PathBuf,

    /// Haar cascade used for face detection.
    #[arg(long, default_value = DEFAULT_CASCADE)]
    cascade: String,

    /// Scale applied to frames before face detection.
    #[arg(long, default_value_t = DEFAULT_DOWNSAMPLE_RATIO)]
    downsample_ratio: f64,

    /// Do not open a preview window.
    #[arg(long)]
    headless: bool,

    /// More logging, repeat for more detail.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args: Args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .compact()
        .init();

    let mode = if args.full_frame {
        RegionMode::FullFrame
    } else {
        RegionMode::Detect
    };
    let config = TrackerConfig::new(
        Rotation::from_flag(args.rotation)?,
        mode,
        args.downsample_ratio,
    )?;

    let mut source = VideoSource::open(&args.source)?;
    if let (Some(frames), Some(fps)) = (source.frame_count()?, source.fps()?) {
        tracing::info!("{} reports {} frames at {:.1} fps", source.name(), frames, fps);
    }

    let writer = LandmarkWriter::create(&args.output_dir)
        .with_context(|| format!("failed to create landmarks file in {:?}", args.output_dir))?;

    let predictor = ShapePredictor::from_dlib_file(&args.model)
        .with_context(|| format!("failed to load shape predictor {:?}", args.model))?;
    let detector = CascadeDetector::new(&args.cascade)
        .with_context(|| format!("failed to load face cascade {}", args.cascade))?;
    let mut tracker = LandmarkTracker::new(detector, predictor, config);

    if !args.headless {
        highgui::named_window(WINDOW_NAME, highgui::WINDOW_NORMAL)?;
    }

    let headless = args.headless;
    tracker.run(source.frames(), writer, |processed| {
        if headless {
            return Ok(ControlFlow::Continue(()));
        }
        highgui::imshow(WINDOW_NAME, &processed.annotated)?;
        let key = highgui::wait_key(5)?;
        if key == ESCAPE_KEY || key == 'q' as i32 {
            tracing::info!("stopped by user");
            return Ok(ControlFlow::Break(()));
        }
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(())
}
