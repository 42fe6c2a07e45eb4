use crate::error::ClipError;

/// ラベル未指定時のラベル
pub const UNKNOWN_LABEL: &str = "unknown";

/// エクスポート区間の開始・終了フレームとラベル
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeMarker {
    start_frame: Option<u32>,
    end_frame: Option<u32>,
    label: String,
}

impl RangeMarker {
    pub fn start_frame(&self) -> Option<u32> {
        self.start_frame
    }

    pub fn end_frame(&self) -> Option<u32> {
        self.end_frame
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// 開始フレームをマークし、ラベルを取り込む
    ///
    /// ラベルが渡されれば置き換える (空白のみなら "unknown")。
    /// 渡されなければ現在のラベルのまま。
    pub fn mark_start(&mut self, frame: u32, label: Option<&str>) {
        let label = match label {
            Some(label) => label.trim(),
            None => self.label.trim(),
        };
        let label = if label.is_empty() { UNKNOWN_LABEL } else { label }.to_string();
        self.label = label;
        self.start_frame = Some(frame);
    }

    pub fn mark_end(&mut self, frame: u32) {
        self.end_frame = Some(frame);
    }

    /// 両端が設定済みで `start < end` なら、両端を含む区間を返す
    pub fn validate(&self) -> Result<(u32, u32), ClipError> {
        match (self.start_frame, self.end_frame) {
            (Some(start), Some(end)) if start < end => Ok((start, end)),
            (start, end) => Err(ClipError::InvalidRange { start, end }),
        }
    }
}
