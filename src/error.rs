//! Error taxonomy for the annotation pipeline.
//!
//! Operations return `anyhow::Result`; callers that need to branch on a
//! failure class downcast to [`ClipError`].

use std::fmt;

use thiserror::Error;

/// エラー対象の検出セッション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// ライブ表示用 (連続モード)
    Streaming,
    /// エクスポート用 (静止画モード)
    Export,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Streaming => f.write_str("streaming"),
            Self::Export => f.write_str("export"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClipError {
    /// 区間が未設定、または開始 < 終了 でない
    #[error("invalid start/end frames: start={start:?}, end={end:?}")]
    InvalidRange {
        start: Option<u32>,
        end: Option<u32>,
    },

    /// セッションの初期化に失敗 (再読み込みで再試行)
    #[error("{session} detector unavailable: {reason}")]
    DetectorUnavailable { session: SessionKind, reason: String },

    /// セッションが未作成
    #[error("{0} detector is not ready")]
    SessionNotReady(SessionKind),

    /// タイムスタンプが増加していない
    #[error("non-monotonic timestamp: {given}ms after {previous}ms")]
    NonMonotonicTimestamp { previous: i64, given: i64 },

    /// 検出呼び出しがセッションの実行モードと合わない
    #[error("{session} detector cannot run {call}")]
    ModeMismatch {
        session: SessionKind,
        call: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_range_message() {
        let err = ClipError::InvalidRange {
            start: Some(5),
            end: Some(3),
        };
        assert!(err.to_string().contains("invalid start/end frames"));
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn test_detector_unavailable_message() {
        let err = ClipError::DetectorUnavailable {
            session: SessionKind::Export,
            reason: "model missing".to_string(),
        };
        assert_eq!(err.to_string(), "export detector unavailable: model missing");
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = ClipError::SessionNotReady(SessionKind::Streaming).into();
        assert!(matches!(
            err.downcast_ref::<ClipError>(),
            Some(ClipError::SessionNotReady(SessionKind::Streaming))
        ));
    }
}
