use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

/// オーバーレイ描画先
///
/// 座標はピクセル、色は 0xRRGGBB。範囲外の描画は無視される。
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// 動画フレームを描画先サイズに合わせて転写
    fn blit(&mut self, frame: &RgbImage);

    /// 塗りつぶし円
    fn fill_circle(&mut self, center: (i32, i32), radius: i32, color: u32);

    /// 線分 (`width` ピクセル幅)
    fn stroke_line(&mut self, from: (i32, i32), to: (i32, i32), width: u32, color: u32);
}

/// 0xRRGGBB → Rgb
pub fn rgb(color: u32) -> Rgb<u8> {
    Rgb([
        ((color >> 16) & 0xFF) as u8,
        ((color >> 8) & 0xFF) as u8,
        (color & 0xFF) as u8,
    ])
}

/// 線幅分の平行オフセット (主方向と直交する軸にずらす)
pub(crate) fn line_offsets(from: (i32, i32), to: (i32, i32), width: u32) -> Vec<(i32, i32)> {
    let width = width.max(1) as i32;
    let steep = (to.1 - from.1).abs() > (to.0 - from.0).abs();
    (0..width)
        .map(|i| i - (width - 1) / 2)
        .map(|o| if steep { (o, 0) } else { (0, o) })
        .collect()
}

impl Surface for RgbImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn blit(&mut self, frame: &RgbImage) {
        *self = if frame.dimensions() == self.dimensions() {
            frame.clone()
        } else {
            let (w, h) = self.dimensions();
            imageops::resize(frame, w, h, FilterType::Triangle)
        };
    }

    fn fill_circle(&mut self, center: (i32, i32), radius: i32, color: u32) {
        draw_filled_circle_mut(self, center, radius, rgb(color));
    }

    fn stroke_line(&mut self, from: (i32, i32), to: (i32, i32), width: u32, color: u32) {
        let color = rgb(color);
        for (ox, oy) in line_offsets(from, to, width) {
            draw_line_segment_mut(
                self,
                ((from.0 + ox) as f32, (from.1 + oy) as f32),
                ((to.0 + ox) as f32, (to.1 + oy) as f32),
                color,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_unpacks_channels() {
        assert_eq!(rgb(0x00FF00), Rgb([0, 255, 0]));
        assert_eq!(rgb(0x12AB34), Rgb([0x12, 0xAB, 0x34]));
    }

    #[test]
    fn test_line_offsets() {
        assert_eq!(line_offsets((0, 0), (10, 1), 1), vec![(0, 0)]);
        assert_eq!(line_offsets((0, 0), (10, 1), 2), vec![(0, 0), (0, 1)]);
        assert_eq!(line_offsets((0, 0), (1, 10), 3), vec![(-1, 0), (0, 0), (1, 0)]);
    }

    #[test]
    fn test_image_surface_draws() {
        let mut img = RgbImage::new(20, 20);
        img.fill_circle((10, 10), 3, 0x00FF00);
        assert_eq!(*img.get_pixel(10, 10), Rgb([0, 255, 0]));

        img.stroke_line((0, 2), (19, 2), 2, 0xFF0000);
        assert_eq!(*img.get_pixel(5, 2), Rgb([255, 0, 0]));
        assert_eq!(*img.get_pixel(5, 3), Rgb([255, 0, 0]));

        // 範囲外は無視
        img.fill_circle((-50, -50), 3, 0x0000FF);
    }

    #[test]
    fn test_blit_resizes_to_surface() {
        let frame = RgbImage::from_pixel(8, 8, Rgb([9, 9, 9]));
        let mut surface = RgbImage::new(4, 4);
        surface.blit(&frame);
        assert_eq!(surface.dimensions(), (4, 4));
        let p = surface.get_pixel(1, 1);
        assert!(p.0.iter().all(|&c| (8..=10).contains(&c)), "{:?}", p);
    }
}
