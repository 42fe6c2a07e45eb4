use anyhow::Result;
use image::RgbImage;

use super::keypoint::DetectionResult;
use crate::config::DetectorConfig;

/// 検出器の実行モード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningMode {
    /// 連続フレーム用。内部に時間方向の状態を持ち、単調増加のタイムスタンプを要求する
    Streaming,
    /// 静止画用。状態を持たず任意の順序で呼べる
    SingleShot,
}

/// 姿勢推定エンジンの境界
pub trait PoseLandmarker {
    /// 動画フレームを検出 (Streaming モード専用)
    ///
    /// `timestamp_ms` は同一インスタンスへの呼び出しで狭義単調増加でなければならない。
    fn detect_for_video(&mut self, frame: &RgbImage, timestamp_ms: i64) -> Result<DetectionResult>;

    /// 静止画を検出 (SingleShot モード専用)
    fn detect(&mut self, frame: &RgbImage) -> Result<DetectionResult>;
}

/// 共通設定から実行モード別の検出器を生成する
///
/// 両セッションは同じモデル・同じ最大人数で生成される。
pub trait LandmarkerFactory {
    fn create(&self, mode: RunningMode) -> Result<Box<dyn PoseLandmarker>>;
}

/// 検出器1つ分の生成パラメータ
///
/// 実行モード以外は共通設定から取るので、両セッションで必ず一致する。
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkerOptions {
    pub mode: RunningMode,
    pub pose_model: String,
    pub person_model: String,
    pub person_input_size: u32,
    pub max_people: usize,
    pub person_score_threshold: f32,
    pub iou_threshold: f32,
}

impl LandmarkerOptions {
    pub fn for_mode(config: &DetectorConfig, mode: RunningMode) -> Self {
        Self {
            mode,
            pose_model: config.pose_model.clone(),
            person_model: config.person_model.clone(),
            person_input_size: config.person_input_size,
            max_people: config.max_people,
            person_score_threshold: config.person_score_threshold,
            iou_threshold: config.iou_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_shared_between_modes() {
        let config = DetectorConfig {
            max_people: 3,
            ..Default::default()
        };
        let streaming = LandmarkerOptions::for_mode(&config, RunningMode::Streaming);
        let single = LandmarkerOptions::for_mode(&config, RunningMode::SingleShot);

        assert_eq!(streaming.max_people, 3);
        assert_eq!(single.max_people, 3);
        // 実行モード以外は同一
        assert_eq!(
            LandmarkerOptions {
                mode: RunningMode::Streaming,
                ..single
            },
            streaming
        );
    }

    #[test]
    fn test_default_max_people() {
        let options = LandmarkerOptions::for_mode(&DetectorConfig::default(), RunningMode::SingleShot);
        assert_eq!(options.max_people, 2);
        assert_eq!(options.mode, RunningMode::SingleShot);
    }
}
