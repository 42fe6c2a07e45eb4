use image::{imageops, RgbImage};

use super::keypoint::{Keypoint, KeypointIndex, Person};

/// クロップ領域（正規化座標 0.0〜1.0）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRegion {
    pub fn full() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.width >= 1.0 && self.height >= 1.0
    }
}

/// BBox（ピクセル座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// スコアの高い順に並べ、重なりが `iou_threshold` を超える候補を除く
pub fn non_max_suppression(candidates: &mut Vec<(BBox, f32)>, iou_threshold: f32) {
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut kept = 0;
    for index in 0..candidates.len() {
        let overlaps = (0..kept).any(|prev| candidates[prev].0.iou(&candidates[index].0) > iou_threshold);
        if !overlaps {
            candidates.swap(kept, index);
            kept += 1;
        }
    }
    candidates.truncate(kept);
}

/// 前フレームの人物からBBoxを推定（KP-based）
///
/// visibilityが閾値以上のキーポイントのmin/maxからBBoxを返す。
/// 有効なキーポイントが2個未満ならNone。
pub fn bbox_from_keypoints(
    person: &Person,
    frame_w: u32,
    frame_h: u32,
    visibility_threshold: f32,
) -> Option<BBox> {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    let mut count = 0u32;

    for kp in &person.keypoints {
        if kp.visibility >= visibility_threshold {
            let px = kp.x * frame_w as f32;
            let py = kp.y * frame_h as f32;
            min_x = min_x.min(px);
            min_y = min_y.min(py);
            max_x = max_x.max(px);
            max_y = max_y.max(py);
            count += 1;
        }
    }

    if count < 2 {
        return None;
    }

    Some(BBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x,
        height: max_y - min_y,
    })
}

/// BBoxからクロップ領域を計算し、フレームからクロップ
///
/// - BBoxを1.25倍に拡張（中心を保持）
/// - 正方形に調整（ランドマークモデルの入力は正方形）
/// - フレーム境界にクリップ
pub fn crop_for_pose(frame: &RgbImage, bbox: &BBox) -> (RgbImage, CropRegion) {
    let (frame_w, frame_h) = frame.dimensions();
    let fw = frame_w as f32;
    let fh = frame_h as f32;

    let expand = 1.25;
    let cx = bbox.x + bbox.width / 2.0;
    let cy = bbox.y + bbox.height / 2.0;
    let side = bbox.width.max(bbox.height) * expand;

    let x = (cx - side / 2.0).max(0.0);
    let y = (cy - side / 2.0).max(0.0);
    let w = side.min(fw - x);
    let h = side.min(fh - y);

    let rx = (x as u32).min(frame_w.saturating_sub(1));
    let ry = (y as u32).min(frame_h.saturating_sub(1));
    let rw = (w as u32).clamp(1, frame_w - rx);
    let rh = (h as u32).clamp(1, frame_h - ry);

    let cropped = imageops::crop_imm(frame, rx, ry, rw, rh).to_image();
    let region = CropRegion {
        x: rx as f32 / fw,
        y: ry as f32 / fh,
        width: rw as f32 / fw,
        height: rh as f32 / fh,
    };

    (cropped, region)
}

/// クロップ画像内の正規化座標をフレーム全体の正規化座標に変換
///
/// z はクロップ幅基準なので幅の比で縮める。
pub fn remap_person(person: &Person, crop: &CropRegion) -> Person {
    let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
    for (out, kp) in keypoints.iter_mut().zip(person.keypoints.iter()) {
        *out = Keypoint {
            x: crop.x + kp.x * crop.width,
            y: crop.y + kp.y * crop.height,
            z: kp.z * crop.width,
            visibility: kp.visibility,
        };
    }
    Person::new(keypoints)
}
