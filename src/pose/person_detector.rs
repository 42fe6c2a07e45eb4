use anyhow::{Context, Result};
use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use super::crop::{non_max_suppression, BBox};

/// YOLOv8nベースの人物検出器
pub struct PersonDetector {
    session: Session,
    input_size: u32,
    score_threshold: f32,
    iou_threshold: f32,
}

impl PersonDetector {
    /// ONNXモデルを読み込んで初期化
    pub fn new(model_path: &str, input_size: u32, score_threshold: f32, iou_threshold: f32) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load person detection model {}", model_path))?;
        Ok(Self {
            session,
            input_size,
            score_threshold,
            iou_threshold,
        })
    }

    /// フレームから人物を検出し、スコアの高い順に最大 `max_people` 個のBBoxを返す
    pub fn detect(&mut self, frame: &RgbImage, max_people: usize) -> Result<Vec<BBox>> {
        let (frame_w, frame_h) = frame.dimensions();
        let input = self.preprocess(frame);

        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs!["images" => input_tensor])
            .context("Person detection inference failed")?;

        // 出力: [1, 84, N]
        let output: ndarray::ArrayViewD<f32> = outputs["output0"]
            .try_extract_array()
            .context("Failed to extract person detection output")?;

        let scale_x = frame_w as f32 / self.input_size as f32;
        let scale_y = frame_h as f32 / self.input_size as f32;

        let mut candidates = Vec::new();
        for i in 0..output.shape()[2] {
            // クラス0 = 人物
            let score = output[[0, 4, i]];
            if score < self.score_threshold {
                continue;
            }
            let cx = output[[0, 0, i]];
            let cy = output[[0, 1, i]];
            let w = output[[0, 2, i]];
            let h = output[[0, 3, i]];
            let bbox = BBox {
                x: (cx - w / 2.0) * scale_x,
                y: (cy - h / 2.0) * scale_y,
                width: w * scale_x,
                height: h * scale_y,
            };
            candidates.push((bbox, score));
        }

        non_max_suppression(&mut candidates, self.iou_threshold);
        Ok(candidates
            .into_iter()
            .take(max_people)
            .map(|(bbox, _)| bbox)
            .collect())
    }

    /// RGB画像 → NCHW [1, 3, input_size, input_size] テンソルに変換
    fn preprocess(&self, frame: &RgbImage) -> Array4<f32> {
        let size = self.input_size;
        let resized = imageops::resize(frame, size, size, FilterType::Triangle);

        // [0, 255] → [0.0, 1.0] 正規化
        let s = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, s, s));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
            }
        }
        tensor
    }
}
