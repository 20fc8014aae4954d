/// Image utilities for drawing tracking overlays
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut,
};
use kftrack::{PointSource, TrajectoryPoint};

use crate::types::Blob;

pub const RED: Rgb<u8> = Rgb([255, 50, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 50]);
pub const BLUE: Rgb<u8> = Rgb([0, 50, 255]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Dot radius for per-frame trajectory overlays
pub const TRACK_DOT_RADIUS: i32 = 5;
/// Dot radius on the final trajectory image
pub const FINAL_DOT_RADIUS: i32 = 3;

const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;

/// Overlay colour of a trajectory sequence
pub fn source_color(source: PointSource) -> Rgb<u8> {
    match source {
        PointSource::Measured => RED,
        PointSource::Predicted => GREEN,
        PointSource::Estimated => BLUE,
    }
}

/// 5x7 glyphs for the characters used by overlay labels
fn glyph(ch: char) -> [u8; 7] {
    match ch {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '#' => [0x0A, 0x0A, 0x1F, 0x0A, 0x1F, 0x0A, 0x0A],
        ' ' => [0; 7],
        _ => [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F],
    }
}

fn put_clipped(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Draw text with the 5x7 bitmap font, top-left anchored at (x, y)
pub fn draw_text(
    img: &mut RgbImage,
    text: &str,
    x: i32,
    y: i32,
    color: Rgb<u8>,
    bg_color: Option<Rgb<u8>>,
) {
    if let Some(bg) = bg_color {
        let width = text.chars().count() as i32 * (GLYPH_WIDTH + 1) + 2;
        for dy in 0..GLYPH_HEIGHT + 2 {
            for dx in 0..width {
                put_clipped(img, x + dx, y + dy, bg);
            }
        }
    }

    for (i, ch) in text.to_uppercase().chars().enumerate() {
        let origin_x = x + 1 + i as i32 * (GLYPH_WIDTH + 1);
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                    put_clipped(img, origin_x + col, y + 1 + row as i32, color);
                }
            }
        }
    }
}

/// Circle of half the blob width around its centre, with a cross of half that size
pub fn draw_blob(img: &mut RgbImage, blob: &Blob, color: Rgb<u8>) {
    if blob.is_empty() {
        return;
    }
    let (cx, cy) = blob.center();
    let (cx, cy) = (cx as i32, cy as i32);
    let radius = (blob.width / 2) as i32;

    // 3px outline
    for r in (radius - 1).max(1)..=radius + 1 {
        draw_hollow_circle_mut(img, (cx, cy), r, color);
    }

    let arm = (radius / 2) as f32;
    let (fx, fy) = (cx as f32, cy as f32);
    for offset in [-0.5f32, 0.5] {
        draw_line_segment_mut(img, (fx - arm, fy + offset), (fx + arm, fy + offset), color);
        draw_line_segment_mut(img, (fx + offset, fy - arm), (fx + offset, fy + arm), color);
    }
}

pub fn draw_dot(img: &mut RgbImage, point: TrajectoryPoint, radius: i32, color: Rgb<u8>) {
    draw_filled_circle_mut(
        img,
        (point.x.round() as i32, point.y.round() as i32),
        radius,
        color,
    );
}

/// Dots for every point of a sequence
pub fn draw_points(img: &mut RgbImage, points: &[TrajectoryPoint], radius: i32, color: Rgb<u8>) {
    for point in points {
        draw_dot(img, *point, radius, color);
    }
}

/// Consecutive points joined by 2px line segments
pub fn draw_polyline<I>(img: &mut RgbImage, points: I, color: Rgb<u8>)
where
    I: IntoIterator<Item = TrajectoryPoint>,
{
    let mut previous: Option<TrajectoryPoint> = None;
    for point in points {
        if let Some(prev) = previous {
            draw_line_segment_mut(img, (prev.x, prev.y), (point.x, point.y), color);
            draw_line_segment_mut(img, (prev.x + 1.0, prev.y), (point.x + 1.0, point.y), color);
        }
        previous = Some(point);
    }
}

/// Stacked colour-coded labels in the top-left corner
pub fn draw_legend(img: &mut RgbImage, entries: &[(&str, Rgb<u8>)]) {
    for (row, (label, color)) in entries.iter().enumerate() {
        draw_text(img, label, 5, 5 + row as i32 * (GLYPH_HEIGHT + 6), *color, Some(BLACK));
    }
}

/// Grey mask expanded to three channels
pub fn mask_to_rgb(mask: &GrayImage) -> RgbImage {
    RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
        let v = mask.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}

/// Two images of equal height placed next to each other
pub fn side_by_side(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let height = left.height().max(right.height());
    let mut canvas = RgbImage::new(left.width() + right.width(), height);
    image::imageops::replace(&mut canvas, left, 0, 0);
    image::imageops::replace(&mut canvas, right, left.width() as i64, 0);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_colors_are_distinct() {
        assert_eq!(source_color(PointSource::Measured), RED);
        assert_eq!(source_color(PointSource::Predicted), GREEN);
        assert_eq!(source_color(PointSource::Estimated), BLUE);
    }

    #[test]
    fn test_draw_text_clips_at_border() {
        let mut img = RgbImage::new(20, 10);
        draw_text(&mut img, "MEASURED", 10, 5, WHITE, Some(BLACK));
        // 'M' starts with a set pixel in its first column
        assert_eq!(*img.get_pixel(11, 6), WHITE);
    }

    #[test]
    fn test_draw_blob_marks_centre() {
        let mut img = RgbImage::new(60, 60);
        let blob = Blob::new(10, 10, 20, 20);
        draw_blob(&mut img, &blob, RED);
        assert_eq!(*img.get_pixel(20, 20), RED);
        // circle of radius 10 passes through (30, 20)
        assert_eq!(*img.get_pixel(30, 20), RED);
        assert_eq!(*img.get_pixel(0, 0), BLACK);
    }

    #[test]
    fn test_empty_blob_draws_nothing() {
        let mut img = RgbImage::new(10, 10);
        draw_blob(&mut img, &Blob::empty(), RED);
        assert!(img.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_polyline_and_dots() {
        let mut img = RgbImage::new(40, 40);
        let points = [TrajectoryPoint::new(5.0, 5.0), TrajectoryPoint::new(30.0, 5.0)];
        draw_polyline(&mut img, points, BLUE);
        assert_eq!(*img.get_pixel(18, 5), BLUE);

        draw_points(&mut img, &points[..1], FINAL_DOT_RADIUS, RED);
        assert_eq!(*img.get_pixel(5, 7), RED);
    }

    #[test]
    fn test_side_by_side_layout() {
        let left = RgbImage::from_pixel(4, 3, RED);
        let right = mask_to_rgb(&GrayImage::from_pixel(5, 3, image::Luma([255])));
        let joined = side_by_side(&left, &right);
        assert_eq!(joined.dimensions(), (9, 3));
        assert_eq!(*joined.get_pixel(3, 1), RED);
        assert_eq!(*joined.get_pixel(4, 1), WHITE);
    }
}
