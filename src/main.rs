use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use pose_clipper::app::AppState;
use pose_clipper::config::Config;
use pose_clipper::export::{save_bundle, ZipBundle};
use pose_clipper::live::LiveView;
use pose_clipper::pose::OnnxLandmarkerFactory;
use pose_clipper::render::{Key, SkeletonRenderer, ViewerWindow};
use pose_clipper::video::{OpenCvVideo, VideoSource};

/// `[` / `]` で移動するフレーム数
const JUMP_FRAMES: u32 = 10;

/// 動画を再生・コマ送りしながら姿勢を確認し、区間をエクスポートする
#[derive(Parser, Debug)]
#[command(version = env!("GIT_VERSION"), about = "Pose clip annotator")]
struct Args {
    /// 動画ファイル
    video: PathBuf,

    /// 設定ファイル
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// 開始マーク時に付けるラベル
    #[arg(short, long)]
    label: Option<String>,
}

fn export(app: &mut AppState, video: &mut OpenCvVideo, config: &Config) -> Result<()> {
    let mut sink = ZipBundle::new();
    let summary = app.export_clip(video, &mut sink)?;
    let path = save_bundle(&config.export.output_dir, &summary.file_name, &summary.bundle)?;
    info!(
        "Wrote {} ({} frames, {} without a person)",
        path.display(),
        summary.frames_written.len(),
        summary.frames_skipped.len()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    info!("clip_annotator {}", env!("GIT_VERSION"));

    let config = Config::load_or_default(&args.config);

    let factory = OnnxLandmarkerFactory::new(config.detector.clone());
    let mut app = AppState::new(&config, Box::new(factory));
    // 検出器がなくても動画の確認はできる。エクスポートは検証で拒否される
    if let Err(e) = app.initialize() {
        error!("Detector initialization failed: {:#}", e);
    }

    let mut video = OpenCvVideo::open(&args.video)?;
    app.load_video(&mut video);
    let (width, height) = video.dimensions();

    let mut window = ViewerWindow::new("Clip Annotator", width as usize, height as usize)?;
    let mut live = LiveView::new(SkeletonRenderer::from_config(&config.render));

    println!("Space: play/pause  Left/Right: step  [/]: -/+{} frames", JUMP_FRAMES);
    println!("S: mark start  E: mark end  X: export  click: select person  Esc: quit");

    let mut playing = false;
    let mut last_advance = Instant::now();
    let mut last_tick_error: Option<String> = None;

    while window.is_open() {
        if let Some(point) = window.take_click() {
            app.select_point(point);
        }

        for key in window.pressed_keys() {
            let current = app.current_frame(&video);
            let result = match key {
                Key::Space => {
                    playing = !playing;
                    Ok(())
                }
                Key::Right => {
                    playing = false;
                    app.step_frame(&mut video, 1)
                }
                Key::Left => {
                    playing = false;
                    app.step_frame(&mut video, -1)
                }
                Key::LeftBracket => app.seek_to_frame(&mut video, current.saturating_sub(JUMP_FRAMES)),
                Key::RightBracket => app.seek_to_frame(&mut video, current + JUMP_FRAMES),
                Key::S => {
                    app.mark_start(&video, args.label.as_deref());
                    Ok(())
                }
                Key::E => {
                    app.mark_end(&video);
                    Ok(())
                }
                Key::X => {
                    playing = false;
                    export(&mut app, &mut video, &config)
                }
                _ => Ok(()),
            };
            if let Err(e) = result {
                error!("{:#}", e);
            }
        }

        let interval = Duration::from_secs_f64(app.timebase.frame_interval());
        if playing && last_advance.elapsed() >= interval {
            last_advance = Instant::now();
            if !video.advance()? {
                playing = false;
            }
        }

        // 同じエラーは毎ティック出さない
        match live.tick(&mut app, &video, &mut window) {
            Ok(_) => last_tick_error = None,
            Err(e) => {
                let message = format!("{:#}", e);
                if last_tick_error.as_deref() != Some(message.as_str()) {
                    warn!("Detection failed: {}", message);
                    last_tick_error = Some(message);
                }
            }
        }

        window.set_title(&format!(
            "Clip Annotator - frame {} - {}",
            app.current_frame(&video),
            app.status()
        ));
        window.present()?;
    }

    info!("Shutting down...");
    Ok(())
}
