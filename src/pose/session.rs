//! Lifecycle of the two detector sessions.
//!
//! The streaming session feeds the live view and must be torn down whenever
//! playback time moves backward; the export session is single-shot and is
//! created eagerly so the first export never waits on model setup.

use anyhow::Result;
use image::RgbImage;
use log::{info, warn};

use super::detector::{LandmarkerFactory, PoseLandmarker, RunningMode};
use super::keypoint::DetectionResult;
use crate::error::{ClipError, SessionKind};

/// 外部から見えるセッション状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    Loading,
    Ready,
    Failed(String),
}

enum SessionState {
    Uninitialized,
    Loading,
    Ready(Box<dyn PoseLandmarker>),
    Failed(String),
}

/// 検出器インスタンス1つと、その呼び出し規約のチェック
pub struct Session {
    kind: SessionKind,
    state: SessionState,
    last_timestamp: Option<i64>,
    generation: u32,
}

impl Session {
    fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            state: SessionState::Uninitialized,
            last_timestamp: None,
            generation: 0,
        }
    }

    fn mode(&self) -> RunningMode {
        match self.kind {
            SessionKind::Streaming => RunningMode::Streaming,
            SessionKind::Export => RunningMode::SingleShot,
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn status(&self) -> SessionStatus {
        match &self.state {
            SessionState::Uninitialized => SessionStatus::Uninitialized,
            SessionState::Loading => SessionStatus::Loading,
            SessionState::Ready(_) => SessionStatus::Ready,
            SessionState::Failed(reason) => SessionStatus::Failed(reason.clone()),
        }
    }

    /// (再)作成された回数
    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn load(&mut self, factory: &dyn LandmarkerFactory) -> Result<()> {
        // 新しいインスタンスを作る前に古いものを破棄
        self.state = SessionState::Loading;
        self.last_timestamp = None;
        info!("Loading {} pose detector...", self.kind);

        match factory.create(self.mode()) {
            Ok(landmarker) => {
                self.state = SessionState::Ready(landmarker);
                self.generation += 1;
                info!("{} pose detector ready", self.kind);
                Ok(())
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!("{} pose detector failed to load: {}", self.kind, reason);
                self.state = SessionState::Failed(reason.clone());
                Err(ClipError::DetectorUnavailable {
                    session: self.kind,
                    reason,
                }
                .into())
            }
        }
    }

    fn landmarker(&mut self) -> Result<&mut Box<dyn PoseLandmarker>> {
        match &mut self.state {
            SessionState::Ready(landmarker) => Ok(landmarker),
            SessionState::Failed(reason) => Err(ClipError::DetectorUnavailable {
                session: self.kind,
                reason: reason.clone(),
            }
            .into()),
            SessionState::Uninitialized | SessionState::Loading => {
                Err(ClipError::SessionNotReady(self.kind).into())
            }
        }
    }

    /// ストリーミング検出。タイムスタンプが進んでいなければエラー
    pub fn detect_for_video(&mut self, frame: &RgbImage, timestamp_ms: i64) -> Result<DetectionResult> {
        if self.kind != SessionKind::Streaming {
            return Err(ClipError::ModeMismatch {
                session: self.kind,
                call: "detect_for_video",
            }
            .into());
        }
        if let Some(previous) = self.last_timestamp {
            if timestamp_ms <= previous {
                return Err(ClipError::NonMonotonicTimestamp {
                    previous,
                    given: timestamp_ms,
                }
                .into());
            }
        }
        let result = self.landmarker()?.detect_for_video(frame, timestamp_ms)?;
        self.last_timestamp = Some(timestamp_ms);
        Ok(result)
    }

    /// 静止フレーム1枚に対する単発検出
    pub fn detect(&mut self, frame: &RgbImage) -> Result<DetectionResult> {
        if self.kind != SessionKind::Export {
            return Err(ClipError::ModeMismatch {
                session: self.kind,
                call: "detect",
            }
            .into());
        }
        self.landmarker()?.detect(frame)
    }
}

/// ストリーミング用とエクスポート用のセッションを保持
pub struct DetectorSessions {
    factory: Box<dyn LandmarkerFactory>,
    streaming: Session,
    export: Session,
}

impl DetectorSessions {
    pub fn new(factory: Box<dyn LandmarkerFactory>) -> Self {
        Self {
            factory,
            streaming: Session::new(SessionKind::Streaming),
            export: Session::new(SessionKind::Export),
        }
    }

    /// 両方のセッションを作成
    ///
    /// 失敗はそれぞれのセッションに記録され、もう一方は使える状態のまま残る。
    /// 最初のエラーを返す。
    pub fn initialize(&mut self) -> Result<()> {
        let streaming = self.streaming.load(self.factory.as_ref());
        let export = self.export.load(self.factory.as_ref());
        streaming.and(export)
    }

    /// エクスポート用セッションのみ作成 (ライブ表示なしで使う場合)
    pub fn initialize_export(&mut self) -> Result<()> {
        self.export.load(self.factory.as_ref())
    }

    /// ストリーミング用セッションを破棄して作り直す
    ///
    /// Ready 以外 (未作成・失敗) のセッションには何もしない。自動での再試行はしない。
    pub fn reset_streaming(&mut self) -> Result<()> {
        if self.streaming.status() != SessionStatus::Ready {
            return Ok(());
        }
        info!("Resetting streaming detector after backward seek");
        self.streaming.load(self.factory.as_ref())
    }

    pub fn streaming(&mut self) -> &mut Session {
        &mut self.streaming
    }

    pub fn export(&mut self) -> &mut Session {
        &mut self.export
    }

    pub fn streaming_status(&self) -> SessionStatus {
        self.streaming.status()
    }

    pub fn export_status(&self) -> SessionStatus {
        self.export.status()
    }
}
