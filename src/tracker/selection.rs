use crate::pose::Person;

/// 選択点がない場合のインデックス (最初に検出された人物)
pub const DEFAULT_SUBJECT_INDEX: usize = 0;

/// 正規化されたスクリーン座標 (0.0〜1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPoint {
    /// 範囲外の値は [0, 1] にクランプする
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
        }
    }

    /// ピクセル座標から変換
    pub fn from_pixel(px: f32, py: f32, width: u32, height: u32) -> Self {
        Self::new(px / width.max(1) as f32, py / height.max(1) as f32)
    }
}

/// 注目人物の選択状態
///
/// `point` はユーザー操作でのみ変わり、`active_index` は毎フレーム再計算される。
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    point: Option<NormalizedPoint>,
    active_index: usize,
}

impl SelectionState {
    pub fn point(&self) -> Option<NormalizedPoint> {
        self.point
    }

    pub fn set_point(&mut self, point: NormalizedPoint) {
        self.point = Some(point);
    }

    pub fn clear_point(&mut self) {
        self.point = None;
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    /// 現フレームの検出結果から注目人物を決め直す
    pub fn update(&mut self, people: &[Person]) -> usize {
        self.active_index = match self.point {
            Some(point) if people.len() > 1 => select_subject(people, Some(point)),
            _ => DEFAULT_SUBJECT_INDEX,
        };
        self.active_index
    }
}

/// 選択点に腰中心が最も近い人物のインデックスを返す
///
/// 距離は正規化座標での二乗ユークリッド距離。同距離なら先に検出された人物。
/// `point` が None なら常に 0。`people` が空の場合も 0 を返すので呼び出し側で確認すること。
pub fn select_subject(people: &[Person], point: Option<NormalizedPoint>) -> usize {
    let Some(point) = point else {
        return DEFAULT_SUBJECT_INDEX;
    };

    let mut closest_index = DEFAULT_SUBJECT_INDEX;
    let mut closest_dist = f32::INFINITY;

    for (i, person) in people.iter().enumerate() {
        let (hx, hy) = person.hip_center();
        let dx = hx - point.x;
        let dy = hy - point.y;
        let dist = dx * dx + dy * dy;
        if dist < closest_dist {
            closest_dist = dist;
            closest_index = i;
        }
    }

    closest_index
}
