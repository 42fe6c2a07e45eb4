use anyhow::{anyhow, bail, Context, Result};
use image::RgbImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs},
};
use std::path::Path;

use super::VideoSource;
use crate::tracker::DEFAULT_FRAME_RATE;

/// OpenCVを使用した動画ファイル読み込み
pub struct OpenCvVideo {
    capture: VideoCapture,
    fps: Option<f64>,
    /// 時刻とフレーム番号の換算レート
    rate: f64,
    width: u32,
    height: u32,
    frame_count: u32,
    /// 現在フレームの番号
    position: u32,
    frame: RgbImage,
}

impl OpenCvVideo {
    /// 動画ファイルを開き、先頭フレームを読み込む
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("non UTF-8 path: {}", path.display()))?;
        let mut capture = VideoCapture::from_file(path_str, VideoCaptureAPIs::CAP_ANY as i32)
            .with_context(|| format!("Failed to open video {}", path.display()))?;

        if !capture.is_opened()? {
            bail!("Video {} could not be opened", path.display());
        }

        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT)?.max(0.0) as u32;

        let fps = (fps.is_finite() && fps > 0.0).then_some(fps);
        let mut video = Self {
            capture,
            fps,
            rate: fps.unwrap_or(DEFAULT_FRAME_RATE),
            width,
            height,
            frame_count,
            position: 0,
            frame: RgbImage::new(width, height),
        };
        video.frame = video.read_frame()?;
        Ok(video)
    }

    /// フレーム数 (コンテナが報告する値)
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    /// 次のフレームを読み込み RGB に変換
    fn read_frame(&mut self) -> Result<RgbImage> {
        let mut bgr = Mat::default();
        self.capture
            .read(&mut bgr)
            .context("Failed to read frame")?;

        if bgr.empty() {
            bail!("Empty frame received");
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB)?;

        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let bytes = rgb.data_bytes()?.to_vec();
        RgbImage::from_raw(width, height, bytes)
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", width, height))
    }
}

impl VideoSource for OpenCvVideo {
    fn frame_rate(&self) -> Option<f64> {
        self.fps
    }

    fn use_frame_rate(&mut self, fps: f64) {
        if fps.is_finite() && fps > 0.0 {
            self.rate = fps;
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn current_time(&self) -> f64 {
        self.position as f64 / self.rate()
    }

    fn seek(&mut self, time: f64) -> Result<()> {
        let mut target = (time.max(0.0) * self.rate()).round() as u32;
        if self.frame_count > 0 {
            target = target.min(self.frame_count - 1);
        }

        self.capture
            .set(videoio::CAP_PROP_POS_FRAMES, target as f64)
            .context("Failed to seek")?;
        self.frame = self
            .read_frame()
            .with_context(|| format!("Failed to decode frame {}", target))?;
        self.position = target;
        Ok(())
    }

    fn advance(&mut self) -> Result<bool> {
        if self.frame_count > 0 && self.position + 1 >= self.frame_count {
            return Ok(false);
        }
        match self.read_frame() {
            Ok(frame) => {
                self.frame = frame;
                self.position += 1;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    fn current_frame(&self) -> &RgbImage {
        &self.frame
    }
}
