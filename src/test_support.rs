//! Fakes shared by the unit tests: a scripted video, a scripted detector,
//! a drawing surface that records calls and an in-memory archive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{bail, Result};
use image::{Rgb, RgbImage};

use crate::export::ArchiveSink;
use crate::pose::{
    DetectionResult, Keypoint, KeypointIndex, LandmarkerFactory, Person, PoseLandmarker,
    RunningMode,
};
use crate::render::Surface;
use crate::video::VideoSource;

pub const FRAME_WIDTH: u32 = 64;
pub const FRAME_HEIGHT: u32 = 48;

/// 全キーポイントが `(x, y)` にある人物
pub fn person_at(x: f32, y: f32, visibility: f32) -> Person {
    Person::new([Keypoint::new(x, y, 0.0, visibility); KeypointIndex::COUNT])
}

/// キーポイントが対角線上に並ぶ人物 (可視性は全て同じ)
pub fn spread_person(visibility: f32) -> Person {
    let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
    for (i, kp) in keypoints.iter_mut().enumerate() {
        let t = 0.1 + 0.025 * i as f32;
        *kp = Keypoint::new(t, t, 0.0, visibility);
    }
    Person::new(keypoints)
}

/// 画素値にフレーム番号を埋め込んだフレーム
pub fn solid_frame(index: u32) -> RgbImage {
    let pixel = Rgb([(index & 0xff) as u8, ((index >> 8) & 0xff) as u8, 7]);
    RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, pixel)
}

pub fn frame_index_of(frame: &RgbImage) -> u32 {
    let p = frame.get_pixel(0, 0);
    p[0] as u32 | ((p[1] as u32) << 8)
}

/// `frame_count` フレームの動画。シークは即座に完了する
pub struct ScriptedVideo {
    pub fps: Option<f64>,
    pub frame_count: u32,
    pub time: f64,
    pub seeks: Vec<f64>,
    rate: f64,
    frame: RgbImage,
}

impl ScriptedVideo {
    pub fn new(fps: Option<f64>, frame_count: u32) -> Self {
        Self {
            fps,
            frame_count,
            time: 0.0,
            seeks: Vec::new(),
            rate: fps.unwrap_or(30.0),
            frame: solid_frame(0),
        }
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    pub fn frame_index(&self) -> u32 {
        (self.time * self.rate()).round() as u32
    }
}

impl VideoSource for ScriptedVideo {
    fn frame_rate(&self) -> Option<f64> {
        self.fps
    }

    fn use_frame_rate(&mut self, fps: f64) {
        self.rate = fps;
    }

    fn dimensions(&self) -> (u32, u32) {
        (FRAME_WIDTH, FRAME_HEIGHT)
    }

    fn current_time(&self) -> f64 {
        self.time
    }

    fn seek(&mut self, time: f64) -> Result<()> {
        let last = self.frame_count.saturating_sub(1) as f64 / self.rate();
        self.time = time.clamp(0.0, last);
        self.seeks.push(self.time);
        self.frame = solid_frame(self.frame_index());
        Ok(())
    }

    fn advance(&mut self) -> Result<bool> {
        let next = self.frame_index() + 1;
        if next >= self.frame_count {
            return Ok(false);
        }
        self.time = next as f64 / self.rate();
        self.frame = solid_frame(next);
        Ok(true)
    }

    fn current_frame(&self) -> &RgbImage {
        &self.frame
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectCall {
    Video { frame: u32, timestamp_ms: i64 },
    Single { frame: u32 },
}

/// フレームごとの検出結果。未指定のフレームは `default_people`
#[derive(Debug, Clone)]
pub struct Script {
    pub by_frame: HashMap<u32, Vec<Person>>,
    pub default_people: Vec<Person>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            by_frame: HashMap::new(),
            default_people: vec![person_at(0.5, 0.5, 0.9)],
        }
    }
}

impl Script {
    fn people_for(&self, frame: u32) -> Vec<Person> {
        self.by_frame
            .get(&frame)
            .cloned()
            .unwrap_or_else(|| self.default_people.clone())
    }
}

pub struct ScriptedLandmarker {
    mode: RunningMode,
    script: Script,
    calls: Rc<RefCell<Vec<DetectCall>>>,
}

impl PoseLandmarker for ScriptedLandmarker {
    fn detect_for_video(&mut self, frame: &RgbImage, timestamp_ms: i64) -> Result<DetectionResult> {
        if self.mode != RunningMode::Streaming {
            bail!("not a streaming landmarker");
        }
        let index = frame_index_of(frame);
        self.calls.borrow_mut().push(DetectCall::Video {
            frame: index,
            timestamp_ms,
        });
        Ok(DetectionResult::new(self.script.people_for(index)))
    }

    fn detect(&mut self, frame: &RgbImage) -> Result<DetectionResult> {
        if self.mode != RunningMode::SingleShot {
            bail!("not a single-shot landmarker");
        }
        let index = frame_index_of(frame);
        self.calls.borrow_mut().push(DetectCall::Single { frame: index });
        Ok(DetectionResult::new(self.script.people_for(index)))
    }
}

#[derive(Default)]
pub struct ScriptedFactory {
    pub script: Script,
    pub fail_mode: Option<RunningMode>,
    pub created: Rc<RefCell<Vec<RunningMode>>>,
    pub calls: Rc<RefCell<Vec<DetectCall>>>,
}

impl LandmarkerFactory for ScriptedFactory {
    fn create(&self, mode: RunningMode) -> Result<Box<dyn PoseLandmarker>> {
        if self.fail_mode == Some(mode) {
            bail!("model asset could not be loaded");
        }
        self.created.borrow_mut().push(mode);
        Ok(Box::new(ScriptedLandmarker {
            mode,
            script: self.script.clone(),
            calls: self.calls.clone(),
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Blit,
    Circle {
        center: (i32, i32),
        radius: i32,
        color: u32,
    },
    Line {
        from: (i32, i32),
        to: (i32, i32),
        color: u32,
    },
}

pub struct RecordingSurface {
    pub width: u32,
    pub height: u32,
    pub ops: Vec<DrawOp>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn circles(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Circle { .. }))
            .count()
    }

    pub fn lines(&self) -> Vec<((i32, i32), (i32, i32), u32)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Line { from, to, color } => Some((*from, *to, *color)),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn blit(&mut self, _frame: &RgbImage) {
        self.ops.push(DrawOp::Blit);
    }

    fn fill_circle(&mut self, center: (i32, i32), radius: i32, color: u32) {
        self.ops.push(DrawOp::Circle {
            center,
            radius,
            color,
        });
    }

    fn stroke_line(&mut self, from: (i32, i32), to: (i32, i32), _width: u32, color: u32) {
        self.ops.push(DrawOp::Line { from, to, color });
    }
}

#[derive(Default)]
pub struct MemoryArchive {
    pub entries: Vec<(String, Vec<u8>)>,
    pub finalized: bool,
}

impl MemoryArchive {
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl ArchiveSink for MemoryArchive {
    fn add_entry(&mut self, name: &str, content: &[u8]) -> Result<()> {
        self.entries.push((name.to_string(), content.to_vec()));
        Ok(())
    }

    fn finalize(&mut self) -> Result<Vec<u8>> {
        self.finalized = true;
        Ok(Vec::new())
    }
}
