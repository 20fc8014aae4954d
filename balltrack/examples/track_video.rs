/// Single-object tracking of a moving blob with a Kalman estimator
///
/// Reads an image sequence (a directory of frames) or, with the `opencv`
/// feature, a video file. Annotated frames, the final trajectory image and
/// trajectory.json are written to the output directory.
///
/// Visual indicators:
/// - RED: blob marker and measured centres
/// - GREEN: predictions
/// - BLUE: corrected estimates
///
/// Usage:
///   cargo run --release --example track_video -- <velocity|acceleration> <input> [--output DIR] [--config FILE] [--mask] [--max-frames N]
///
/// Examples:
///   cargo run --release --example track_video -- velocity test_data/ball_frames
///   cargo run --release --features opencv --example track_video -- acceleration test_data/ball.mp4 --output out
use anyhow::{bail, Context};
use balltrack::{
    AnnotatedFrameWriter, FrameSource, ImageSequenceSource, MotionModel, TrackerConfig,
    TrackingController,
};
use std::env;
use std::path::{Path, PathBuf};

fn print_usage(program: &str) {
    eprintln!(
        "Usage: {} <velocity|acceleration> <input> [--output DIR] [--config FILE] [--mask] [--max-frames N]",
        program
    );
}

fn open_source(input: &str) -> anyhow::Result<Box<dyn FrameSource>> {
    if Path::new(input).is_dir() {
        return Ok(Box::new(ImageSequenceSource::open(input)?));
    }
    open_video(input)
}

#[cfg(feature = "opencv")]
fn open_video(input: &str) -> anyhow::Result<Box<dyn FrameSource>> {
    Ok(Box::new(balltrack::VideoFileSource::open(input)?))
}

#[cfg(not(feature = "opencv"))]
fn open_video(input: &str) -> anyhow::Result<Box<dyn FrameSource>> {
    bail!(
        "{} is not a directory; video files need the `opencv` feature",
        input
    )
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        print_usage(&args[0]);
        bail!("missing arguments");
    }

    // Unknown model names fall back to constant acceleration
    let model = args[1].parse::<MotionModel>().unwrap_or_else(|_| {
        log::warn!(
            "Unknown motion model '{}', using {}",
            args[1],
            MotionModel::ConstantAcceleration
        );
        MotionModel::ConstantAcceleration
    });
    let input = args[2].clone();

    let mut output_dir = PathBuf::from("tracking_output");
    let mut config_path: Option<PathBuf> = None;
    let mut include_mask = false;
    let mut max_frames: Option<u64> = None;

    let mut arg_idx = 3;
    while arg_idx < args.len() {
        match args[arg_idx].as_str() {
            "--output" if arg_idx + 1 < args.len() => {
                output_dir = PathBuf::from(&args[arg_idx + 1]);
                arg_idx += 2;
            }
            "--config" if arg_idx + 1 < args.len() => {
                config_path = Some(PathBuf::from(&args[arg_idx + 1]));
                arg_idx += 2;
            }
            "--max-frames" if arg_idx + 1 < args.len() => {
                let value = &args[arg_idx + 1];
                max_frames = Some(
                    value
                        .parse()
                        .with_context(|| format!("invalid frame count '{}'", value))?,
                );
                arg_idx += 2;
            }
            "--mask" => {
                include_mask = true;
                arg_idx += 1;
            }
            other => {
                print_usage(&args[0]);
                bail!("unexpected argument '{}'", other);
            }
        }
    }

    let config = match &config_path {
        Some(path) => TrackerConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => TrackerConfig::default(),
    }
    .with_motion_model(model);

    log::info!("balltrack {}", balltrack::version());
    log::info!("Input: {} | Output: {}", input, output_dir.display());

    let mut source = open_source(&input)?;
    let mut writer = AnnotatedFrameWriter::new(&output_dir)?.with_mask(include_mask);
    if let Some(limit) = max_frames {
        writer = writer.with_frame_limit(limit);
    }

    let mut tracker = TrackingController::new(config)?;
    let summary = tracker.run(&mut source, &mut writer)?;

    let trajectory = tracker.trajectory();
    println!("Frames processed:   {}", summary.frames_processed);
    println!("Detections:         {}", summary.detections);
    println!("Coasted frames:     {}", summary.coasted_frames);
    println!("Final trajectory:   {} points", trajectory.final_points().len());
    if let Some(last) = trajectory.final_points().last() {
        println!("Last position:      {} (frame {})", last.point, last.frame_id);
    }
    println!("Elapsed:            {:.2?}", summary.elapsed);
    println!("Output written to   {}", output_dir.display());

    Ok(())
}
