//! Frame-exact export of a marked range.
//!
//! Each frame is seeked, detected, rendered and archived before the next
//! seek is issued, so the bundle contents depend only on the video and the
//! range.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};
use log::{debug, info, warn};

use super::archive::{bundle_name, frame_stem, ArchiveSink, FrameExportRecord};
use super::range::RangeMarker;
use crate::error::ClipError;
use crate::pose::{Session, SessionStatus};
use crate::render::{SkeletonRenderer, Surface, EXPORT_COLOR};
use crate::tracker::Timebase;
use crate::video::VideoSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Idle,
    Validating,
    Seeking,
    Detecting,
    Rendering,
    Archiving,
    Finalizing,
    Done,
    Rejected,
}

/// 進捗通知 (表示用)。各フレームの処理前に1回
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportProgress {
    pub frame: u32,
    pub end_frame: u32,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub file_name: String,
    pub frames_written: Vec<u32>,
    pub frames_skipped: Vec<u32>,
    pub bundle: Vec<u8>,
}

pub struct ClipExporter {
    renderer: SkeletonRenderer,
    phase: ExportPhase,
}

impl ClipExporter {
    pub fn new(renderer: SkeletonRenderer) -> Self {
        Self {
            renderer,
            phase: ExportPhase::Idle,
        }
    }

    pub fn phase(&self) -> ExportPhase {
        self.phase
    }

    /// `range` を `sink` にエクスポート
    ///
    /// 検証に失敗した場合、動画・検出器・sink には一切触れない。
    /// 人物が検出されなかったフレームは飛ばす。
    pub fn run(
        &mut self,
        range: &RangeMarker,
        timebase: &Timebase,
        video: &mut dyn VideoSource,
        detector: &mut Session,
        sink: &mut dyn ArchiveSink,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> Result<ExportSummary> {
        self.phase = ExportPhase::Validating;
        let (start, end) = match self.validate(range, detector) {
            Ok(bounds) => bounds,
            Err(err) => {
                self.phase = ExportPhase::Rejected;
                return Err(err.into());
            }
        };

        let result = self.export_frames(start, end, range.label(), timebase, video, detector, sink, progress);
        if result.is_err() {
            self.phase = ExportPhase::Idle;
        }
        result
    }

    fn validate(&self, range: &RangeMarker, detector: &Session) -> Result<(u32, u32), ClipError> {
        let bounds = range.validate()?;
        match detector.status() {
            SessionStatus::Ready => Ok(bounds),
            SessionStatus::Failed(reason) => Err(ClipError::DetectorUnavailable {
                session: detector.kind(),
                reason,
            }),
            _ => Err(ClipError::SessionNotReady(detector.kind())),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn export_frames(
        &mut self,
        start: u32,
        end: u32,
        label: &str,
        timebase: &Timebase,
        video: &mut dyn VideoSource,
        detector: &mut Session,
        sink: &mut dyn ArchiveSink,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> Result<ExportSummary> {
        info!("Exporting frames {}..={} as '{}'", start, end, label);
        let (width, height) = video.dimensions();
        let mut frames_written = Vec::new();
        let mut frames_skipped = Vec::new();

        for frame in start..=end {
            progress(ExportProgress {
                frame,
                end_frame: end,
            });
            debug!("Processing frame {} / {}", frame, end);

            self.phase = ExportPhase::Seeking;
            video
                .seek(timebase.time_of(frame))
                .with_context(|| format!("seek to frame {} failed", frame))?;

            self.phase = ExportPhase::Detecting;
            let result = detector
                .detect(video.current_frame())
                .with_context(|| format!("detection failed at frame {}", frame))?;
            let Some(person) = result.first() else {
                warn!("No person at frame {}, skipping", frame);
                frames_skipped.push(frame);
                continue;
            };

            self.phase = ExportPhase::Rendering;
            let mut canvas = RgbImage::new(width, height);
            canvas.blit(video.current_frame());
            self.renderer.draw_pose(&mut canvas, person, EXPORT_COLOR);
            let png = encode_png(&canvas)?;

            self.phase = ExportPhase::Archiving;
            let stem = frame_stem(frame);
            sink.add_entry(&format!("{}.png", stem), &png)?;
            let record = FrameExportRecord {
                frame,
                label: label.to_string(),
                landmarks: Some(person.clone()),
            };
            let json = serde_json::to_string_pretty(&record)?;
            sink.add_entry(&format!("{}.json", stem), json.as_bytes())?;
            frames_written.push(frame);
        }

        self.phase = ExportPhase::Finalizing;
        let bundle = sink.finalize()?;
        self.phase = ExportPhase::Done;

        let file_name = bundle_name(label);
        info!(
            "Export complete: {} ({} frames, {} skipped)",
            file_name,
            frames_written.len(),
            frames_skipped.len()
        );

        Ok(ExportSummary {
            file_name,
            frames_written,
            frames_skipped,
            bundle,
        })
    }
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("PNG encoding failed")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::archive::{read_records, ZipBundle};
    use crate::pose::{DetectorSessions, RunningMode};
    use crate::test_support::{
        solid_frame, DetectCall, MemoryArchive, ScriptedFactory, ScriptedVideo, FRAME_HEIGHT,
        FRAME_WIDTH,
    };

    struct Harness {
        sessions: DetectorSessions,
        calls: std::rc::Rc<std::cell::RefCell<Vec<DetectCall>>>,
        video: ScriptedVideo,
        timebase: Timebase,
        exporter: ClipExporter,
    }

    fn harness(factory: ScriptedFactory) -> Harness {
        let calls = factory.calls.clone();
        let mut sessions = DetectorSessions::new(Box::new(factory));
        let _ = sessions.initialize();
        Harness {
            sessions,
            calls,
            video: ScriptedVideo::new(Some(30.0), 100),
            timebase: Timebase::new(30.0),
            exporter: ClipExporter::new(SkeletonRenderer::new(0.5)),
        }
    }

    fn marked(start: u32, end: u32, label: &str) -> RangeMarker {
        let mut range = RangeMarker::default();
        range.mark_start(start, Some(label));
        range.mark_end(end);
        range
    }

    fn run(h: &mut Harness, range: &RangeMarker, sink: &mut dyn ArchiveSink) -> Result<ExportSummary> {
        let mut reported = Vec::new();
        let result = h.exporter.run(
            range,
            &h.timebase,
            &mut h.video,
            h.sessions.export(),
            sink,
            &mut |p| reported.push(p),
        );
        if let Ok(summary) = &result {
            assert_eq!(
                reported.len(),
                summary.frames_written.len() + summary.frames_skipped.len()
            );
        }
        result
    }

    #[test]
    fn test_exports_every_frame_in_range() {
        let mut h = harness(ScriptedFactory::default());
        let mut sink = MemoryArchive::default();
        let summary = run(&mut h, &marked(10, 12, "jab"), &mut sink).unwrap();

        assert_eq!(
            sink.names(),
            vec![
                "frame_0010.png",
                "frame_0010.json",
                "frame_0011.png",
                "frame_0011.json",
                "frame_0012.png",
                "frame_0012.json",
            ]
        );
        assert!(sink.finalized);
        assert_eq!(summary.frames_written, vec![10, 11, 12]);
        assert_eq!(summary.file_name, "annotated_clip_jab.zip");
        assert_eq!(h.exporter.phase(), ExportPhase::Done);

        for (name, content) in sink.entries.iter().filter(|(n, _)| n.ends_with(".json")) {
            let record: FrameExportRecord = serde_json::from_slice(content).unwrap();
            assert_eq!(name, &format!("frame_{:04}.json", record.frame));
            assert_eq!(record.label, "jab");
            assert!(record.landmarks.is_some());
        }
    }

    #[test]
    fn test_seeks_and_detections_are_sequential() {
        let mut h = harness(ScriptedFactory::default());
        let mut sink = MemoryArchive::default();
        run(&mut h, &marked(10, 12, "jab"), &mut sink).unwrap();

        let frames: Vec<u32> = h
            .video
            .seeks
            .iter()
            .map(|t| h.timebase.frame_at(*t))
            .collect();
        assert_eq!(frames, vec![10, 11, 12]);
        assert_eq!(
            *h.calls.borrow(),
            vec![
                DetectCall::Single { frame: 10 },
                DetectCall::Single { frame: 11 },
                DetectCall::Single { frame: 12 },
            ]
        );
    }

    #[test]
    fn test_invalid_range_has_no_side_effects() {
        let mut h = harness(ScriptedFactory::default());
        let mut sink = MemoryArchive::default();
        let err = run(&mut h, &marked(5, 3, "jab"), &mut sink).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ClipError>(),
            Some(ClipError::InvalidRange {
                start: Some(5),
                end: Some(3)
            })
        ));
        assert!(sink.entries.is_empty());
        assert!(!sink.finalized);
        assert!(h.video.seeks.is_empty());
        assert!(h.calls.borrow().is_empty());
        assert_eq!(h.exporter.phase(), ExportPhase::Rejected);
    }

    #[test]
    fn test_frame_without_person_is_skipped() {
        let mut factory = ScriptedFactory::default();
        factory.script.by_frame.insert(11, Vec::new());
        let mut h = harness(factory);
        let mut sink = MemoryArchive::default();
        let summary = run(&mut h, &marked(10, 12, "jab"), &mut sink).unwrap();

        assert_eq!(
            sink.names(),
            vec![
                "frame_0010.png",
                "frame_0010.json",
                "frame_0012.png",
                "frame_0012.json",
            ]
        );
        assert_eq!(summary.frames_written, vec![10, 12]);
        assert_eq!(summary.frames_skipped, vec![11]);
    }

    #[test]
    fn test_unavailable_detector_rejects_before_seeking() {
        let factory = ScriptedFactory {
            fail_mode: Some(RunningMode::SingleShot),
            ..Default::default()
        };
        let mut h = harness(factory);
        let mut sink = MemoryArchive::default();
        let err = run(&mut h, &marked(1, 4, "jab"), &mut sink).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ClipError>(),
            Some(ClipError::DetectorUnavailable { .. })
        ));
        assert!(h.video.seeks.is_empty());
        assert!(sink.entries.is_empty());
    }

    #[test]
    fn test_exported_image_has_native_size_and_overlay() {
        let mut h = harness(ScriptedFactory::default());
        let mut sink = MemoryArchive::default();
        run(&mut h, &marked(2, 3, "jab"), &mut sink).unwrap();

        let png = &sink.entries[0].1;
        let image = image::load_from_memory(png).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (FRAME_WIDTH, FRAME_HEIGHT));

        // 背景は元フレームのまま、人物の位置に重ね描きされる
        assert_eq!(image.get_pixel(0, 0), solid_frame(2).get_pixel(0, 0));
        assert_ne!(
            image.get_pixel(FRAME_WIDTH / 2, FRAME_HEIGHT / 2),
            solid_frame(2).get_pixel(0, 0)
        );
    }

    #[test]
    fn test_bundle_is_deterministic() {
        let mut first = harness(ScriptedFactory::default());
        let mut second = harness(ScriptedFactory::default());
        let range = marked(20, 24, "clinch");

        let a = run(&mut first, &range, &mut ZipBundle::new()).unwrap();
        // 再生位置を先に動かしておく。結果は再生位置に依存しない
        second.video.seek(3.0).unwrap();
        let b = run(&mut second, &range, &mut ZipBundle::new()).unwrap();

        assert_eq!(a.bundle, b.bundle);
        let records = read_records(&a.bundle).unwrap();
        let frames: Vec<u32> = records.iter().map(|r| r.frame).collect();
        assert_eq!(frames, vec![20, 21, 22, 23, 24]);
    }
}
