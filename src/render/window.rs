use anyhow::Result;
use image::RgbImage;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use super::surface::{line_offsets, Surface};
use crate::tracker::NormalizedPoint;

/// minifbを使用したビューアウィンドウ
pub struct ViewerWindow {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
    mouse_was_down: bool,
}

impl ViewerWindow {
    /// ウィンドウを作成
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;
        window.set_target_fps(60);

        Ok(Self {
            window,
            buffer: vec![0u32; width * height],
            width,
            height,
            mouse_was_down: false,
        })
    }

    /// ウィンドウが開いているか
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    pub fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    /// 今回の更新で押されたキー（リピートなし）
    pub fn pressed_keys(&self) -> Vec<Key> {
        self.window.get_keys_pressed(KeyRepeat::No)
    }

    /// 左クリック（押した瞬間のみ）の位置を正規化座標で返す
    pub fn take_click(&mut self) -> Option<NormalizedPoint> {
        let down = self.window.get_mouse_down(MouseButton::Left);
        let pressed = down && !self.mouse_was_down;
        self.mouse_was_down = down;
        if !pressed {
            return None;
        }
        let (x, y) = self.window.get_mouse_pos(MouseMode::Discard)?;
        Some(NormalizedPoint::from_pixel(
            x,
            y,
            self.width as u32,
            self.height as u32,
        ))
    }

    /// バッファをウィンドウに表示
    pub fn present(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;
        Ok(())
    }

    /// Bresenhamのアルゴリズムで線を描画
    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        let mut x = x0;
        let mut y = y0;

        loop {
            self.set_pixel(x, y, color);

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// ピクセルをセット（境界チェック付き）
    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize * self.width + x as usize] = color;
        }
    }
}

impl Surface for ViewerWindow {
    fn width(&self) -> u32 {
        self.width as u32
    }

    fn height(&self) -> u32 {
        self.height as u32
    }

    /// 最近傍で拡大縮小して転写
    fn blit(&mut self, frame: &RgbImage) {
        let (fw, fh) = frame.dimensions();
        if fw == 0 || fh == 0 {
            return;
        }
        for y in 0..self.height {
            let sy = (y as u64 * fh as u64 / self.height as u64) as u32;
            for x in 0..self.width {
                let sx = (x as u64 * fw as u64 / self.width as u64) as u32;
                let p = frame.get_pixel(sx, sy);
                self.buffer[y * self.width + x] =
                    ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32;
            }
        }
    }

    /// 円を描画（塗りつぶし）
    fn fill_circle(&mut self, center: (i32, i32), radius: i32, color: u32) {
        let (cx, cy) = center;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn stroke_line(&mut self, from: (i32, i32), to: (i32, i32), width: u32, color: u32) {
        for (ox, oy) in line_offsets(from, to, width) {
            self.draw_line(from.0 + ox, from.1 + oy, to.0 + ox, to.1 + oy, color);
        }
    }
}
