use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::tracker::DEFAULT_FRAME_RATE;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VideoConfig {
    /// 動画がFPSを報告しない場合のフレームレート
    #[serde(default = "default_frame_rate")]
    pub default_frame_rate: f64,
}

fn default_frame_rate() -> f64 { DEFAULT_FRAME_RATE }

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            default_frame_rate: default_frame_rate(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    /// 33ランドマーク姿勢モデル (ONNX)
    #[serde(default = "default_pose_model")]
    pub pose_model: String,
    /// 人物検出モデル (YOLOv8, ONNX)
    #[serde(default = "default_person_model")]
    pub person_model: String,
    /// 人物検出の入力サイズ
    #[serde(default = "default_person_input_size")]
    pub person_input_size: u32,
    /// 同時に検出する最大人数 (両セッション共通)
    #[serde(default = "default_max_people")]
    pub max_people: usize,
    /// 人物検出の信頼度閾値
    #[serde(default = "default_person_score_threshold")]
    pub person_score_threshold: f32,
    /// NMS の IoU 閾値
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
}

fn default_pose_model() -> String { "models/pose_landmark_full.onnx".to_string() }
fn default_person_model() -> String { "models/yolov8n.onnx".to_string() }
fn default_person_input_size() -> u32 { 640 }
fn default_max_people() -> usize { 2 }
fn default_person_score_threshold() -> f32 { 0.25 }
fn default_iou_threshold() -> f32 { 0.45 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            pose_model: default_pose_model(),
            person_model: default_person_model(),
            person_input_size: default_person_input_size(),
            max_people: default_max_people(),
            person_score_threshold: default_person_score_threshold(),
            iou_threshold: default_iou_threshold(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    /// 可視性の閾値 (人物平均・骨格線両端の両方に使う)
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// キーポイント円の半径 (ピクセル)
    #[serde(default = "default_joint_radius")]
    pub joint_radius: i32,
    /// 線幅 (ピクセル)
    #[serde(default = "default_line_width")]
    pub line_width: u32,
    /// 十字線の半分の長さ (ピクセル)
    #[serde(default = "default_crosshair_half_size")]
    pub crosshair_half_size: i32,
}

fn default_min_confidence() -> f32 { 0.5 }
fn default_joint_radius() -> i32 { 3 }
fn default_line_width() -> u32 { 2 }
fn default_crosshair_half_size() -> i32 { 10 }

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            joint_radius: default_joint_radius(),
            line_width: default_line_width(),
            crosshair_half_size: default_crosshair_half_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    /// アーカイブの保存先ディレクトリ
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf { PathBuf::from(".") }

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// 読めなければデフォルト設定
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}; using defaults", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.video.default_frame_rate, 30.0);
        assert_eq!(config.detector.max_people, 2);
        assert_eq!(config.render.min_confidence, 0.5);
        assert_eq!(config.render.line_width, 2);
        assert_eq!(config.export.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [video]
            default_frame_rate = 25.0

            [detector]
            max_people = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.video.default_frame_rate, 25.0);
        assert_eq!(config.detector.max_people, 4);
        assert_eq!(config.detector.person_input_size, 640);
        assert_eq!(config.render.crosshair_half_size, 10);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("does/not/exist.toml");
        assert_eq!(config.detector.max_people, 2);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = std::env::temp_dir().join(format!("pose_clipper_cfg_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        fs::write(&path, "[render]\nmin_confidence = \"high\"\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
        assert_eq!(Config::load_or_default(&path).render.min_confidence, 0.5);

        fs::remove_dir_all(&dir).unwrap();
    }
}
