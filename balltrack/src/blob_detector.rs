//! Connected-component blob selection on a binary foreground mask

use image::GrayImage;

use crate::foreground::FOREGROUND;
use crate::types::Blob;

/// Marks pixels already assigned to a component in the working copy
const VISITED: u8 = 1;

/// 8-neighbourhood offsets
const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// A labelled component: its bounding box and pixel count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub bbox: Blob,
    pub pixels: usize,
}

/// Selects the largest qualifying foreground component of a mask
#[derive(Debug, Clone, Copy)]
pub struct BlobDetector {
    /// Both sides of a blob's bounding box must be strictly larger than this (width, height)
    pub min_size: (u32, u32),
}

impl Default for BlobDetector {
    fn default() -> Self {
        Self { min_size: (10, 10) }
    }
}

impl BlobDetector {
    pub fn new(min_size: (u32, u32)) -> Self {
        Self { min_size }
    }

    /// Bounding box with the largest area among components exceeding `min_size`,
    /// or the empty blob. Ties keep the component found first in raster order.
    pub fn detect(&self, mask: &GrayImage) -> Blob {
        detect(mask, self.min_size)
    }

    /// All components exceeding `min_size`, in raster order of their first pixel
    pub fn detect_all(&self, mask: &GrayImage) -> Vec<Component> {
        let mut found = Vec::new();
        label_components(mask, |component| {
            if component.bbox.exceeds(self.min_size) {
                found.push(component);
            }
        });
        found
    }
}

/// Free-function form of [`BlobDetector::detect`]
pub fn detect(mask: &GrayImage, min_size: (u32, u32)) -> Blob {
    let mut best = Blob::empty();
    label_components(mask, |component| {
        let bbox = component.bbox;
        if bbox.exceeds(min_size) && bbox.area() > best.area() {
            best = bbox;
        }
    });
    best
}

/// Raster scan with an explicit-stack flood fill; calls `visit` once per
/// 8-connected component of `FOREGROUND` pixels
fn label_components<F: FnMut(Component)>(mask: &GrayImage, mut visit: F) {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);
    let mut work = mask.as_raw().clone();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if work[y * w + x] != FOREGROUND {
                continue;
            }

            work[y * w + x] = VISITED;
            stack.push((x, y));
            let (mut x0, mut y0, mut x1, mut y1) = (x, y, x, y);
            let mut pixels = 0usize;

            while let Some((px, py)) = stack.pop() {
                pixels += 1;
                x0 = x0.min(px);
                x1 = x1.max(px);
                y0 = y0.min(py);
                y1 = y1.max(py);

                for (dx, dy) in NEIGHBOURS {
                    let nx = px as i64 + dx;
                    let ny = py as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let idx = ny as usize * w + nx as usize;
                    if work[idx] == FOREGROUND {
                        work[idx] = VISITED;
                        stack.push((nx as usize, ny as usize));
                    }
                }
            }

            visit(Component {
                bbox: Blob::from_corners(x0 as u32, y0 as u32, x1 as u32, y1 as u32),
                pixels,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn fill(mask: &mut GrayImage, x: u32, y: u32, w: u32, h: u32) {
        for yy in y..y + h {
            for xx in x..x + w {
                mask.put_pixel(xx, yy, Luma([FOREGROUND]));
            }
        }
    }

    #[test]
    fn test_empty_mask() {
        let mask = GrayImage::new(32, 32);
        assert!(detect(&mask, (10, 10)).is_empty());
    }

    #[test]
    fn test_largest_region_wins() {
        let mut mask = GrayImage::new(100, 100);
        fill(&mut mask, 5, 5, 20, 20); // area 400, found first
        fill(&mut mask, 50, 40, 30, 30); // area 900
        let blob = detect(&mask, (10, 10));
        assert_eq!(blob, Blob::new(50, 40, 30, 30));
        assert_eq!(blob.area(), 900);
    }

    #[test]
    fn test_detection_is_idempotent_and_mask_untouched() {
        let mut mask = GrayImage::new(64, 48);
        fill(&mut mask, 3, 4, 15, 12);
        fill(&mut mask, 30, 20, 12, 25);
        let before = mask.clone();

        let detector = BlobDetector::new((10, 10));
        let first = detector.detect(&mask);
        let second = detector.detect(&mask);
        assert_eq!(first, second);
        assert_eq!(mask, before);
    }

    #[test]
    fn test_tie_keeps_first_in_raster_order() {
        let mut mask = GrayImage::new(80, 40);
        fill(&mut mask, 40, 5, 12, 12);
        fill(&mut mask, 5, 20, 12, 12);
        // The top-right block is reached first by the row-major scan
        assert_eq!(detect(&mask, (10, 10)), Blob::new(40, 5, 12, 12));
    }

    #[test]
    fn test_min_size_is_strict_on_both_sides() {
        let mut mask = GrayImage::new(60, 60);
        fill(&mut mask, 0, 0, 10, 40); // width equals the minimum
        fill(&mut mask, 20, 20, 11, 11);
        assert_eq!(detect(&mask, (10, 10)), Blob::new(20, 20, 11, 11));
        assert!(detect(&mask, (11, 11)).is_empty());
    }

    #[test]
    fn test_diagonal_pixels_are_connected() {
        let mut mask = GrayImage::new(30, 30);
        for i in 0..15 {
            mask.put_pixel(i, i, Luma([FOREGROUND]));
        }
        let components = BlobDetector::new((0, 0)).detect_all(&mask);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].bbox, Blob::new(0, 0, 15, 15));
        assert_eq!(components[0].pixels, 15);
    }

    #[test]
    fn test_area_uses_bounding_box() {
        let mut mask = GrayImage::new(100, 100);
        // Thin L shape: few pixels but a 40x40 box
        fill(&mut mask, 0, 0, 40, 2);
        fill(&mut mask, 0, 0, 2, 40);
        // Solid 30x30 block with more pixels but a smaller box
        fill(&mut mask, 60, 60, 30, 30);
        assert_eq!(detect(&mask, (10, 10)), Blob::new(0, 0, 40, 40));
    }

    #[test]
    fn test_ignores_non_foreground_values() {
        let mut mask = GrayImage::new(40, 40);
        for y in 5..25 {
            for x in 5..25 {
                mask.put_pixel(x, y, Luma([127]));
            }
        }
        assert!(detect(&mask, (10, 10)).is_empty());
    }

    #[test]
    fn test_large_region_does_not_overflow_stack() {
        let mut mask = GrayImage::new(800, 600);
        fill(&mut mask, 0, 0, 800, 600);
        assert_eq!(detect(&mask, (10, 10)), Blob::new(0, 0, 800, 600));
    }
}
