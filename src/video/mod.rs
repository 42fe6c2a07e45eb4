#[cfg(feature = "desktop")]
pub mod capture;

#[cfg(feature = "desktop")]
pub use capture::OpenCvVideo;

use anyhow::Result;
use image::RgbImage;

/// 再生位置を持つ動画ソース
///
/// `seek` はシーク先のフレームがデコードされてから戻る。
/// 呼び出し側は前のシークが終わる前に次のシークを発行できない。
pub trait VideoSource {
    /// ソースが報告するフレームレート (不明なら None)
    fn frame_rate(&self) -> Option<f64>;

    /// 時刻とフレーム番号の換算に使うレートを設定
    ///
    /// 呼び出し側のタイムベースと同じ値を渡すこと。ソースがレートを
    /// 報告しない場合、これがないとシーク先のフレームがずれる。
    fn use_frame_rate(&mut self, fps: f64);

    /// ネイティブ解像度 (幅, 高さ)
    fn dimensions(&self) -> (u32, u32);

    /// 現在の再生位置 (秒)
    fn current_time(&self) -> f64;

    /// 指定時刻へシークし、そのフレームを現在フレームにする
    fn seek(&mut self, time: f64) -> Result<()>;

    /// 再生中の次フレームへ進む。終端なら false
    fn advance(&mut self) -> Result<bool>;

    /// 現在フレーム (RGB)
    fn current_frame(&self) -> &RgbImage;
}
