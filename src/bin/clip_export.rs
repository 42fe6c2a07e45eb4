use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use pose_clipper::app::AppState;
use pose_clipper::config::Config;
use pose_clipper::export::{save_bundle, ZipBundle};
use pose_clipper::pose::OnnxLandmarkerFactory;
use pose_clipper::video::OpenCvVideo;

/// ウィンドウなしで区間をエクスポートする
#[derive(Parser, Debug)]
#[command(version = env!("GIT_VERSION"), about = "Export an annotated frame range")]
struct Args {
    /// 動画ファイル
    video: PathBuf,

    /// 開始フレーム
    #[arg(short, long)]
    start: u32,

    /// 終了フレーム (含む)
    #[arg(short, long)]
    end: u32,

    /// ラベル
    #[arg(short, long)]
    label: Option<String>,

    /// 設定ファイル
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// 出力先 (設定の export.output_dir を上書き)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    info!("clip_export {}", env!("GIT_VERSION"));

    let config = Config::load_or_default(&args.config);

    let factory = OnnxLandmarkerFactory::new(config.detector.clone());
    let mut app = AppState::new(&config, Box::new(factory));
    app.initialize_for_export()?;

    let mut video = OpenCvVideo::open(&args.video)?;
    app.load_video(&mut video);

    app.seek_to_frame(&mut video, args.start)?;
    app.mark_start(&video, args.label.as_deref());
    app.seek_to_frame(&mut video, args.end)?;
    app.mark_end(&video);

    let mut sink = ZipBundle::new();
    let summary = app
        .export_clip(&mut video, &mut sink)
        .with_context(|| format!("{} ({:?})", app.status(), app.export_phase()))?;

    let dir = args.output.unwrap_or(config.export.output_dir);
    let path = save_bundle(&dir, &summary.file_name, &summary.bundle)?;
    info!(
        "Wrote {} ({} frames, skipped {:?})",
        path.display(),
        summary.frames_written.len(),
        summary.frames_skipped
    );
    Ok(())
}
