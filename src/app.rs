//! Application state and the operator's actions.
//!
//! The selection point, marked range, detector sessions and clock live in
//! [`AppState`] and are passed explicitly to the live view and the exporter.

use anyhow::Result;
use log::{info, warn};

use crate::config::Config;
use crate::error::ClipError;
use crate::export::{ArchiveSink, ClipExporter, ExportPhase, ExportSummary, RangeMarker};
use crate::pose::{DetectorSessions, LandmarkerFactory};
use crate::render::SkeletonRenderer;
use crate::tracker::{NormalizedPoint, SelectionState, Timebase};
use crate::video::VideoSource;

/// 操作者の状態 (選択点・区間・検出セッション・時計)
pub struct AppState {
    pub selection: SelectionState,
    pub range: RangeMarker,
    pub timebase: Timebase,
    pub sessions: DetectorSessions,
    exporter: ClipExporter,
    default_frame_rate: f64,
    status: String,
}

impl AppState {
    pub fn new(config: &Config, factory: Box<dyn LandmarkerFactory>) -> Self {
        Self {
            selection: SelectionState::default(),
            range: RangeMarker::default(),
            timebase: Timebase::new(config.video.default_frame_rate),
            sessions: DetectorSessions::new(factory),
            exporter: ClipExporter::new(SkeletonRenderer::from_config(&config.render)),
            default_frame_rate: config.video.default_frame_rate,
            status: String::new(),
        }
    }

    /// 両方の検出セッションを作成
    ///
    /// 失敗してもステータスに表示するだけで、呼び出し側は表示を続けてよい。
    /// エクスポートは検出器の検証で拒否される。
    pub fn initialize(&mut self) -> Result<()> {
        self.set_status("Loading pose model...");
        match self.sessions.initialize() {
            Ok(()) => {
                self.set_status("Model ready - open a video to begin.");
                Ok(())
            }
            Err(err) => {
                self.set_status(format!("{}. Reload to retry.", err));
                Err(err)
            }
        }
    }

    /// エクスポート用セッションのみ作成 (ライブ表示なしの場合)
    pub fn initialize_for_export(&mut self) -> Result<()> {
        self.set_status("Loading pose model...");
        match self.sessions.initialize_export() {
            Ok(()) => {
                self.set_status("Model ready.");
                Ok(())
            }
            Err(err) => {
                self.set_status(format!("{}. Reload to retry.", err));
                Err(err)
            }
        }
    }

    /// 開いた動画のフレームレートを採用し、動画側の換算にも同じ値を使わせる
    pub fn load_video(&mut self, video: &mut dyn VideoSource) {
        self.timebase
            .set_frame_rate(video.frame_rate(), self.default_frame_rate);
        video.use_frame_rate(self.timebase.frame_rate());
        let (w, h) = video.dimensions();
        info!(
            "Video loaded: {}x{} @ {:.3} fps",
            w,
            h,
            self.timebase.frame_rate()
        );
    }

    /// 最新のステータス表示
    pub fn status(&self) -> &str {
        &self.status
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
        info!("{}", self.status);
    }

    pub fn current_frame(&self, video: &dyn VideoSource) -> u32 {
        self.timebase.frame_at(video.current_time())
    }

    pub fn select_point(&mut self, point: NormalizedPoint) {
        info!("Selected point: ({:.3}, {:.3})", point.x, point.y);
        self.selection.set_point(point);
    }

    /// 1フレーム進む (`direction > 0`) か戻る
    /// 戻った場合はストリーミング検出器を作り直す
    pub fn step_frame(&mut self, video: &mut dyn VideoSource, direction: i32) -> Result<()> {
        let target = video.current_time() + direction as f64 * self.timebase.frame_interval();
        video.seek(target.max(0.0))?;
        if direction < 0 {
            self.sessions.reset_streaming()?;
        }
        Ok(())
    }

    /// 指定フレームへ移動。時刻が戻った場合はストリーミング検出器を作り直す
    pub fn seek_to_frame(&mut self, video: &mut dyn VideoSource, frame: u32) -> Result<()> {
        let previous = video.current_time();
        video.seek(self.timebase.time_of(frame))?;
        if video.current_time() < previous {
            self.sessions.reset_streaming()?;
        }
        Ok(())
    }

    pub fn mark_start(&mut self, video: &dyn VideoSource, label: Option<&str>) -> u32 {
        let frame = self.current_frame(video);
        self.range.mark_start(frame, label);
        self.set_status(format!(
            "Start marked at frame {} ({})",
            frame,
            self.range.label()
        ));
        frame
    }

    pub fn mark_end(&mut self, video: &dyn VideoSource) -> u32 {
        let frame = self.current_frame(video);
        self.range.mark_end(frame);
        self.set_status(format!("End marked at frame {}", frame));
        frame
    }

    /// エクスポートの進行状態
    pub fn export_phase(&self) -> ExportPhase {
        self.exporter.phase()
    }

    /// マークした区間を `sink` にエクスポート
    pub fn export_clip(
        &mut self,
        video: &mut dyn VideoSource,
        sink: &mut dyn ArchiveSink,
    ) -> Result<ExportSummary> {
        let previous = video.current_time();
        let Self {
            range,
            timebase,
            sessions,
            exporter,
            status,
            ..
        } = self;

        let result = exporter.run(
            range,
            timebase,
            video,
            sessions.export(),
            sink,
            &mut |p| *status = format!("Processing frame {} / {}", p.frame, p.end_frame),
        );

        match &result {
            Ok(_) => self.set_status("Export complete!"),
            Err(err) => match err.downcast_ref::<ClipError>() {
                Some(ClipError::InvalidRange { .. }) => self.set_status("Invalid start/end frames."),
                _ => self.set_status(format!("Export failed: {:#}", err)),
            },
        }

        // エクスポートで再生位置が戻った。ライブ検出に逆行した時刻を渡さない
        if video.current_time() < previous {
            if let Err(err) = self.sessions.reset_streaming() {
                warn!("{:#}", err);
            }
        }
        result
    }
}
