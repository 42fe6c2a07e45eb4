/// ソースが有効なフレームレートを報告しない場合の値
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// 検出器タイムスタンプの最小増分
const MIN_INCREMENT_MS: i64 = 1;

/// `time * fps` の浮動小数点誤差を吸収 (フレーム時刻がそのフレーム番号に戻るように)
const FRAME_EPSILON: f64 = 1e-6;

/// 揺らぎのある動画の時刻を狭義単調増加の検出器タイムスタンプに変換し、
/// フレーム番号と時刻を相互に換算する
#[derive(Debug, Clone)]
pub struct Timebase {
    frame_rate: f64,
    last_emitted_ms: i64,
}

impl Timebase {
    pub fn new(frame_rate: f64) -> Self {
        Self {
            frame_rate: sanitize_frame_rate(Some(frame_rate), DEFAULT_FRAME_RATE),
            last_emitted_ms: 0,
        }
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// ソースが報告したレートを採用。なし・0・非有限なら `fallback`
    pub fn set_frame_rate(&mut self, reported: Option<f64>, fallback: f64) {
        self.frame_rate = sanitize_frame_rate(reported, fallback);
    }

    /// 動画時刻 (秒) に対する次の検出器タイムスタンプ (ミリ秒)
    pub fn next_timestamp(&mut self, time: f64) -> i64 {
        let candidate = (time * 1000.0).floor() as i64;
        let emitted = if candidate <= self.last_emitted_ms {
            self.last_emitted_ms + MIN_INCREMENT_MS
        } else {
            candidate
        };
        self.last_emitted_ms = emitted;
        emitted
    }

    /// `floor(time * frame_rate)`。負の時刻は 0
    pub fn frame_at(&self, time: f64) -> u32 {
        let index = (time * self.frame_rate + FRAME_EPSILON).floor();
        if index <= 0.0 {
            0
        } else {
            index as u32
        }
    }

    /// `frame_index / frame_rate` (秒)
    pub fn time_of(&self, frame_index: u32) -> f64 {
        frame_index as f64 / self.frame_rate
    }

    /// 1フレームの長さ (秒)
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.frame_rate
    }
}

impl Default for Timebase {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_RATE)
    }
}

fn sanitize_frame_rate(reported: Option<f64>, fallback: f64) -> f64 {
    match reported {
        Some(fps) if fps.is_finite() && fps > 0.0 => fps,
        _ if fallback.is_finite() && fallback > 0.0 => fallback,
        _ => DEFAULT_FRAME_RATE,
    }
}
