//! ONNX Runtime backed pose landmarker.
//!
//! Each frame goes through two models: a YOLOv8 person detector proposes
//! boxes, then the 33-landmark pose model runs on a square crop per box.
//! In streaming mode the boxes come from the previous frame's keypoints
//! while tracking holds, so the person detector only runs to (re)acquire.

use anyhow::{anyhow, Context, Result};
use image::{imageops, imageops::FilterType, RgbImage};
use log::debug;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use super::crop::{bbox_from_keypoints, crop_for_pose, remap_person, BBox};
use super::detector::{LandmarkerFactory, LandmarkerOptions, PoseLandmarker, RunningMode};
use super::keypoint::{DetectionResult, Keypoint, KeypointIndex, Person};
use super::person_detector::PersonDetector;
use crate::config::DetectorConfig;

/// ランドマークモデルの入力サイズ
const POSE_INPUT_SIZE: u32 = 256;

/// 出力1点あたりの値 (x, y, z, visibility, presence)
const VALUES_PER_LANDMARK: usize = 5;

/// 姿勢フラグ (人物らしさ) の閾値
const POSE_PRESENCE_THRESHOLD: f32 = 0.5;

/// 追跡を継続するキーポイントの可視性
const TRACKING_VISIBILITY: f32 = 0.5;

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// 検出器を作るたびに両方の ONNX モデルを読み込む
pub struct OnnxLandmarkerFactory {
    config: DetectorConfig,
}

impl OnnxLandmarkerFactory {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }
}

impl LandmarkerFactory for OnnxLandmarkerFactory {
    fn create(&self, mode: RunningMode) -> Result<Box<dyn PoseLandmarker>> {
        let options = LandmarkerOptions::for_mode(&self.config, mode);
        let person = PersonDetector::new(
            &options.person_model,
            options.person_input_size,
            options.person_score_threshold,
            options.iou_threshold,
        )?;
        let pose = PoseModel::new(&options.pose_model)?;
        debug!("{:?} landmarker created (max {} people)", mode, options.max_people);

        Ok(Box::new(OnnxLandmarker {
            mode: options.mode,
            person,
            pose,
            max_people: options.max_people,
            tracked: Vec::new(),
        }))
    }
}

/// 33ランドマーク姿勢モデル
struct PoseModel {
    session: Session,
    input_name: String,
    landmarks_name: String,
    presence_name: Option<String>,
}

impl PoseModel {
    fn new(model_path: &str) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load pose model {}", model_path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| anyhow!("pose model has no inputs"))?;
        let landmarks_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| anyhow!("pose model has no outputs"))?;
        let presence_name = session.outputs.get(1).map(|o| o.name.clone());

        Ok(Self {
            session,
            input_name,
            landmarks_name,
            presence_name,
        })
    }

    /// クロップ画像から姿勢を推定 (クロップ内の正規化座標)
    ///
    /// 入力: [1, 256, 256, 3] の f32 テンソル (0.0〜1.0)
    /// 出力: [1, 39 * 5] 先頭33点を使う
    fn infer(&mut self, crop: &RgbImage) -> Result<Option<Person>> {
        let resized = imageops::resize(crop, POSE_INPUT_SIZE, POSE_INPUT_SIZE, FilterType::Triangle);
        let s = POSE_INPUT_SIZE as usize;
        let mut input = Array4::<f32>::zeros((1, s, s, 3));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                input[[0, y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
            }
        }

        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .context("Pose inference failed")?;

        if let Some(name) = &self.presence_name {
            let flag: ndarray::ArrayViewD<f32> = outputs[name.as_str()]
                .try_extract_array()
                .context("Failed to extract pose flag")?;
            let presence = flag.iter().next().copied().unwrap_or(0.0);
            if presence < POSE_PRESENCE_THRESHOLD {
                return Ok(None);
            }
        }

        let output: ndarray::ArrayViewD<f32> = outputs[self.landmarks_name.as_str()]
            .try_extract_array()
            .context("Failed to extract landmark tensor")?;
        let values: Vec<f32> = output.iter().copied().collect();
        if values.len() < KeypointIndex::COUNT * VALUES_PER_LANDMARK {
            return Err(anyhow!(
                "unexpected landmark tensor size {} (shape {:?})",
                values.len(),
                output.shape()
            ));
        }

        let scale = POSE_INPUT_SIZE as f32;
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        for (i, kp) in keypoints.iter_mut().enumerate() {
            let v = &values[i * VALUES_PER_LANDMARK..(i + 1) * VALUES_PER_LANDMARK];
            *kp = Keypoint::new(v[0] / scale, v[1] / scale, v[2] / scale, sigmoid(v[3]));
        }

        Ok(Some(Person::new(keypoints)))
    }
}

struct OnnxLandmarker {
    mode: RunningMode,
    person: PersonDetector,
    pose: PoseModel,
    max_people: usize,
    /// 前フレームで追跡できた人物 (streaming のみ)
    tracked: Vec<Person>,
}

impl OnnxLandmarker {
    fn landmarks_in(&mut self, frame: &RgbImage, boxes: &[BBox]) -> Result<Vec<Person>> {
        let mut people = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            let (crop, region) = crop_for_pose(frame, bbox);
            if let Some(person) = self.pose.infer(&crop)? {
                people.push(remap_person(&person, &region));
            }
        }
        Ok(people)
    }

    fn detect_people(&mut self, frame: &RgbImage) -> Result<Vec<Person>> {
        let boxes = self.person.detect(frame, self.max_people)?;
        self.landmarks_in(frame, &boxes)
    }
}

impl PoseLandmarker for OnnxLandmarker {
    fn detect_for_video(&mut self, frame: &RgbImage, timestamp_ms: i64) -> Result<DetectionResult> {
        if self.mode != RunningMode::Streaming {
            return Err(anyhow!("landmarker was created for single images"));
        }
        let (w, h) = frame.dimensions();

        let boxes: Vec<BBox> = self
            .tracked
            .iter()
            .filter_map(|p| bbox_from_keypoints(p, w, h, TRACKING_VISIBILITY))
            .collect();

        let mut people = if boxes.is_empty() {
            Vec::new()
        } else {
            self.landmarks_in(frame, &boxes)?
        };
        // 追跡が途切れた / 人数が減った場合は検出し直す
        if people.len() < boxes.len() || people.is_empty() {
            people = self.detect_people(frame)?;
            debug!("ts={}ms re-acquired {} people", timestamp_ms, people.len());
        }

        self.tracked = people
            .iter()
            .filter(|p| p.average_visibility() >= TRACKING_VISIBILITY)
            .cloned()
            .collect();
        Ok(DetectionResult::new(people))
    }

    fn detect(&mut self, frame: &RgbImage) -> Result<DetectionResult> {
        if self.mode != RunningMode::SingleShot {
            return Err(anyhow!("landmarker was created for video"));
        }
        Ok(DetectionResult::new(self.detect_people(frame)?))
    }
}
