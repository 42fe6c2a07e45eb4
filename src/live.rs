//! Live-view tick, invoked once per display refresh by the host loop.
//!
//! A tick runs to completion before the next one starts: draw the frame,
//! detect if the video clock moved, resolve the subject, draw overlays.

use anyhow::Result;
use log::debug;

use crate::app::AppState;
use crate::pose::{DetectionResult, Person};
use crate::render::{SkeletonRenderer, Surface, ACTIVE_COLOR, INACTIVE_COLOR};
use crate::video::VideoSource;

/// 1ティック分の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// このティックで検出を実行した
    pub detected: bool,
    /// 現在フレームの人数
    pub people: usize,
    /// 対象人物のインデックス (誰もいなければ None)
    pub active_index: Option<usize>,
}

pub struct LiveView {
    renderer: SkeletonRenderer,
    last_video_time: Option<f64>,
    current: DetectionResult,
}

impl LiveView {
    pub fn new(renderer: SkeletonRenderer) -> Self {
        Self {
            renderer,
            last_video_time: None,
            current: DetectionResult::default(),
        }
    }

    /// 表示中フレームの検出結果
    pub fn current(&self) -> &DetectionResult {
        &self.current
    }

    /// 表示中フレームの対象人物
    pub fn active_person<'a>(&'a self, app: &AppState) -> Option<&'a Person> {
        self.current.people.get(app.selection.active_index())
    }

    /// フレーム描画 → (時刻が動いていれば) 検出 → 対象選択 → オーバーレイ描画
    pub fn tick(
        &mut self,
        app: &mut AppState,
        video: &dyn VideoSource,
        surface: &mut dyn Surface,
    ) -> Result<TickReport> {
        let frame = video.current_frame();
        surface.blit(frame);

        let time = video.current_time();
        let detected = self.last_video_time != Some(time);
        if detected {
            let timestamp_ms = app.timebase.next_timestamp(time);
            self.current = app.sessions.streaming().detect_for_video(frame, timestamp_ms)?;
            self.last_video_time = Some(time);
            app.selection.update(&self.current.people);
            debug!(
                "t={:.3}s ts={}ms people={} active={}",
                time,
                timestamp_ms,
                self.current.len(),
                app.selection.active_index()
            );
        }

        if let Some(point) = app.selection.point() {
            self.renderer.draw_crosshair(surface, point);
        }

        let active = app.selection.active_index();
        for (i, person) in self.current.people.iter().enumerate() {
            let color = if i == active { ACTIVE_COLOR } else { INACTIVE_COLOR };
            self.renderer.draw_pose(surface, person, color);
        }

        Ok(TickReport {
            detected,
            people: self.current.len(),
            active_index: (!self.current.is_empty()).then_some(active),
        })
    }
}
