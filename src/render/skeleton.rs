use crate::config::RenderConfig;
use crate::pose::{KeypointIndex, Person};
use crate::tracker::NormalizedPoint;

use super::surface::Surface;

/// 骨格の接続定義 (開始キーポイント, 終了キーポイント)
pub const SKELETON_CONNECTIONS: [(KeypointIndex, KeypointIndex); 12] = [
    // 上半身
    (KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder),
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftElbow),
    (KeypointIndex::LeftElbow, KeypointIndex::LeftWrist),
    (KeypointIndex::RightShoulder, KeypointIndex::RightElbow),
    (KeypointIndex::RightElbow, KeypointIndex::RightWrist),
    // 胴体
    (KeypointIndex::LeftHip, KeypointIndex::RightHip),
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftHip),
    (KeypointIndex::RightShoulder, KeypointIndex::RightHip),
    // 下半身
    (KeypointIndex::LeftHip, KeypointIndex::LeftKnee),
    (KeypointIndex::LeftKnee, KeypointIndex::LeftAnkle),
    (KeypointIndex::RightHip, KeypointIndex::RightKnee),
    (KeypointIndex::RightKnee, KeypointIndex::RightAnkle),
];

/// キーポイントの色 (RGB)
pub const KEYPOINT_COLOR: u32 = 0x00FF00; // ライム

/// 注目人物の骨格線
pub const ACTIVE_COLOR: u32 = 0x00FF00; // ライム

/// 注目人物以外の骨格線
pub const INACTIVE_COLOR: u32 = 0xFF0000; // 赤

/// エクスポート画像の骨格線
pub const EXPORT_COLOR: u32 = 0x00FFFF; // シアン

/// 選択点の十字線
pub const CROSSHAIR_COLOR: u32 = 0xFFFF00; // 黄色

/// 1人分の描画結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub joints: usize,
    pub bones: usize,
}

/// 骨格オーバーレイの描画ポリシー
#[derive(Debug, Clone)]
pub struct SkeletonRenderer {
    min_confidence: f32,
    joint_radius: i32,
    line_width: u32,
    crosshair_half_size: i32,
}

impl SkeletonRenderer {
    pub fn new(min_confidence: f32) -> Self {
        Self {
            min_confidence,
            joint_radius: 3,
            line_width: 2,
            crosshair_half_size: 10,
        }
    }

    /// 設定から作成
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            joint_radius: config.joint_radius,
            line_width: config.line_width,
            crosshair_half_size: config.crosshair_half_size,
        }
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// 姿勢を描画
    ///
    /// 平均可視性が閾値未満の人物は何も描かない。
    /// 骨格線は両端のキーポイントが個別に閾値を超える場合のみ描く。
    pub fn draw_pose(&self, surface: &mut dyn Surface, person: &Person, bone_color: u32) -> DrawStats {
        let mut stats = DrawStats::default();
        if person.average_visibility() < self.min_confidence {
            return stats;
        }

        let w = surface.width();
        let h = surface.height();

        // キーポイントを描画
        for kp in person.keypoints.iter() {
            surface.fill_circle(kp.to_pixel(w, h), self.joint_radius, KEYPOINT_COLOR);
            stats.joints += 1;
        }

        // 骨格線を描画
        for (start_idx, end_idx) in SKELETON_CONNECTIONS.iter() {
            let start = person.get(*start_idx);
            let end = person.get(*end_idx);

            if start.is_visible(self.min_confidence) && end.is_visible(self.min_confidence) {
                surface.stroke_line(
                    start.to_pixel(w, h),
                    end.to_pixel(w, h),
                    self.line_width,
                    bone_color,
                );
                stats.bones += 1;
            }
        }

        stats
    }

    /// 選択点に十字線を描画
    pub fn draw_crosshair(&self, surface: &mut dyn Surface, point: NormalizedPoint) {
        let x = (point.x * surface.width() as f32) as i32;
        let y = (point.y * surface.height() as f32) as i32;
        let half = self.crosshair_half_size;

        surface.stroke_line((x - half, y), (x + half, y), self.line_width, CROSSHAIR_COLOR);
        surface.stroke_line((x, y - half), (x, y + half), self.line_width, CROSSHAIR_COLOR);
    }
}

impl Default for SkeletonRenderer {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spread_person, RecordingSurface};

    #[test]
    fn test_low_average_visibility_draws_nothing() {
        let renderer = SkeletonRenderer::new(0.5);
        let mut surface = RecordingSurface::new(640, 480);
        let stats = renderer.draw_pose(&mut surface, &spread_person(0.4), ACTIVE_COLOR);

        assert_eq!(stats, DrawStats::default());
        assert!(surface.ops.is_empty());
    }

    #[test]
    fn test_visible_person_draws_all_joints_and_bones() {
        let renderer = SkeletonRenderer::new(0.5);
        let mut surface = RecordingSurface::new(640, 480);
        let stats = renderer.draw_pose(&mut surface, &spread_person(0.9), INACTIVE_COLOR);

        assert_eq!(stats, DrawStats { joints: 33, bones: 12 });
        assert_eq!(surface.circles(), 33);
        let lines = surface.lines();
        assert_eq!(lines.len(), 12);
        assert!(lines.iter().all(|(_, _, color)| *color == INACTIVE_COLOR));
    }

    #[test]
    fn test_single_hidden_endpoint_drops_only_its_bones() {
        let renderer = SkeletonRenderer::new(0.5);
        let mut person = spread_person(0.95);
        person.keypoints[KeypointIndex::LeftWrist as usize].visibility = 0.3;
        assert!(person.average_visibility() > 0.9);

        let mut surface = RecordingSurface::new(640, 480);
        let stats = renderer.draw_pose(&mut surface, &person, ACTIVE_COLOR);

        // 見えない手首にも関節の円は描く
        assert_eq!(stats.joints, 33);
        assert_eq!(stats.bones, 11);

        let wrist = person.get(KeypointIndex::LeftWrist).to_pixel(640, 480);
        let elbow = person.get(KeypointIndex::LeftElbow).to_pixel(640, 480);
        let lines = surface.lines();
        assert!(!lines.iter().any(|(from, to, _)| *from == elbow && *to == wrist));
        assert!(surface
            .ops
            .iter()
            .any(|op| matches!(op, crate::test_support::DrawOp::Circle { center, .. } if *center == wrist)));
    }

    #[test]
    fn test_average_exactly_at_threshold_is_drawn() {
        let renderer = SkeletonRenderer::new(0.5);
        let mut surface = RecordingSurface::new(100, 100);
        let stats = renderer.draw_pose(&mut surface, &spread_person(0.5), ACTIVE_COLOR);

        // 平均は閾値を超えるが、どの骨格線も両端が 0.5 を超えない
        assert_eq!(stats.joints, 33);
        assert_eq!(stats.bones, 0);
    }

    #[test]
    fn test_joint_positions_scale_with_surface() {
        let renderer = SkeletonRenderer::new(0.5);
        let person = spread_person(0.9);
        let mut surface = RecordingSurface::new(200, 100);
        renderer.draw_pose(&mut surface, &person, ACTIVE_COLOR);

        let expected = person.keypoints[0].to_pixel(200, 100);
        assert_eq!(
            surface.ops[0],
            crate::test_support::DrawOp::Circle {
                center: expected,
                radius: 3,
                color: KEYPOINT_COLOR
            }
        );
    }

    #[test]
    fn test_crosshair() {
        let renderer = SkeletonRenderer::new(0.5);
        let mut surface = RecordingSurface::new(200, 100);
        renderer.draw_crosshair(&mut surface, NormalizedPoint::new(0.5, 0.5));

        let lines = surface.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], ((90, 50), (110, 50), CROSSHAIR_COLOR));
        assert_eq!(lines[1], ((100, 40), (100, 60), CROSSHAIR_COLOR));
    }
}
