//! Adaptive mixture-of-Gaussians foreground extraction
//!
//! Every pixel keeps a small, weight-ordered set of Gaussian modes describing
//! the colours it has shown. A sample that matches one of the heaviest modes
//! (those covering `background_ratio` of the total weight) is background;
//! everything else is foreground. The model is updated on every frame with an
//! exponential learning rate, so a new static colour is absorbed into the
//! background after roughly `ln(1 / background_ratio) / learning_rate` frames.
//!
//! The raw classification is cleaned with a morphological opening before it is
//! handed to blob detection.

use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::open;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};
use crate::types::Frame;

/// Upper bound on Gaussian modes per pixel
pub const MAX_MODES: usize = 8;

/// Mask value of a foreground pixel
pub const FOREGROUND: u8 = 255;

/// Background model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForegroundConfig {
    /// Frames used for the automatic learning rate (negative rate passed to `extract`)
    pub history: u32,
    /// Squared Mahalanobis distance below which a sample is explained by a background mode
    pub var_threshold: f32,
    /// Label pixels that look like a darker copy of the background as shadows
    pub detect_shadows: bool,
    /// Gaussian modes kept per pixel (at most `MAX_MODES`)
    pub max_modes: usize,
    /// Share of the total weight that the background modes must cover
    pub background_ratio: f32,
    /// Squared distance below which a sample updates an existing mode
    pub var_threshold_gen: f32,
    /// Variance of a freshly created mode
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
    /// Complexity reduction prior, pushes unsupported modes to zero weight
    pub complexity_reduction: f32,
    /// Raw mask value for shadow pixels
    pub shadow_value: u8,
    /// Darkest accepted shadow, as a fraction of the background brightness
    pub shadow_threshold: f32,
    /// Opening structuring element is a (2r+1) x (2r+1) square; 0 disables it
    pub morph_radius: u8,
    /// Initial frames that only seed the model and report an empty mask
    pub warmup_frames: u32,
}

impl Default for ForegroundConfig {
    fn default() -> Self {
        Self {
            history: 50,
            var_threshold: 16.0,
            detect_shadows: true,
            max_modes: 5,
            background_ratio: 0.9,
            var_threshold_gen: 9.0,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
            complexity_reduction: 0.05,
            shadow_value: 127,
            shadow_threshold: 0.5,
            morph_radius: 3,
            warmup_frames: 1,
        }
    }
}

impl ForegroundConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_modes == 0 || self.max_modes > MAX_MODES {
            return Err(TrackingError::config(format!(
                "max_modes must be in 1..={}, got {}",
                MAX_MODES, self.max_modes
            )));
        }
        if self.history == 0 {
            return Err(TrackingError::config("history must be positive"));
        }
        if !(self.background_ratio > 0.0 && self.background_ratio <= 1.0) {
            return Err(TrackingError::config(format!(
                "background_ratio must be in (0, 1], got {}",
                self.background_ratio
            )));
        }
        if !(self.var_min > 0.0 && self.var_min <= self.var_max) {
            return Err(TrackingError::config(format!(
                "variance bounds must satisfy 0 < var_min <= var_max, got [{}, {}]",
                self.var_min, self.var_max
            )));
        }
        if self.var_threshold <= 0.0 || self.var_threshold_gen <= 0.0 || self.var_init <= 0.0 {
            return Err(TrackingError::config(
                "variance thresholds and var_init must be positive",
            ));
        }
        if self.shadow_value == FOREGROUND {
            return Err(TrackingError::config(
                "shadow_value must differ from the foreground value",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Gaussian {
    weight: f32,
    variance: f32,
    mean: [f32; 3],
}

/// Mixture of one pixel; `modes[..used]` is sorted by decreasing weight
#[derive(Debug, Clone, Copy, Default)]
struct PixelModel {
    modes: [Gaussian; MAX_MODES],
    used: u8,
}

/// Per-frame constants of the model update
struct UpdateParams {
    alpha: f32,
    prune: f32,
    max_modes: usize,
    background_ratio: f32,
    var_threshold: f32,
    var_threshold_gen: f32,
    var_init: f32,
    var_min: f32,
    var_max: f32,
    detect_shadows: bool,
    shadow_value: u8,
    shadow_threshold: f32,
}

#[inline]
fn dist2(mean: &[f32; 3], sample: &[f32; 3]) -> f32 {
    mean.iter()
        .zip(sample.iter())
        .map(|(m, s)| (m - s) * (m - s))
        .sum()
}

impl PixelModel {
    /// Update the mixture with one sample and classify it
    fn update(&mut self, sample: [f32; 3], p: &UpdateParams) -> u8 {
        let alpha1 = 1.0 - p.alpha;
        let mut n = self.used as usize;
        let mut background = false;
        let mut matched: Option<usize> = None;
        let mut total_weight = 0.0f32;

        for m in 0..n {
            let g = &mut self.modes[m];
            let mut weight = alpha1 * g.weight + p.prune;

            if matched.is_none() {
                let d2 = dist2(&g.mean, &sample);
                // Heavier modes visited so far must not already cover the background share
                if total_weight < p.background_ratio && d2 < p.var_threshold * g.variance {
                    background = true;
                }
                if d2 < p.var_threshold_gen * g.variance {
                    weight += p.alpha;
                    let k = p.alpha / weight;
                    for (mean, s) in g.mean.iter_mut().zip(sample.iter()) {
                        *mean += k * (s - *mean);
                    }
                    g.variance = (g.variance + k * (d2 - g.variance)).clamp(p.var_min, p.var_max);
                    matched = Some(m);
                }
            }

            if weight < -p.prune {
                weight = 0.0;
            }
            g.weight = weight;
            total_weight += weight;
        }

        // The matched mode gained weight, move it up to keep the order
        if let Some(mut i) = matched {
            while i > 0 && self.modes[i].weight >= self.modes[i - 1].weight {
                self.modes.swap(i, i - 1);
                i -= 1;
            }
        }

        // Drop pruned modes, they sit at the tail once sorted
        while n > 0 && self.modes[n - 1].weight <= 0.0 {
            n -= 1;
        }
        if total_weight > 0.0 {
            for g in &mut self.modes[..n] {
                g.weight /= total_weight;
            }
        }

        if matched.is_none() {
            let slot = if n == p.max_modes {
                p.max_modes - 1
            } else {
                n += 1;
                n - 1
            };
            if n == 1 {
                self.modes[slot].weight = 1.0;
            } else {
                self.modes[slot].weight = p.alpha;
                for g in &mut self.modes[..n - 1] {
                    g.weight *= alpha1;
                }
            }
            self.modes[slot].mean = sample;
            self.modes[slot].variance = p.var_init;

            let mut i = slot;
            while i > 0 && p.alpha >= self.modes[i - 1].weight {
                self.modes.swap(i, i - 1);
                i -= 1;
            }
        }
        self.used = n as u8;

        if background {
            0
        } else if p.detect_shadows && self.is_shadow(&sample, p) {
            p.shadow_value
        } else {
            FOREGROUND
        }
    }

    /// A shadow is a darker, scaled copy of one of the background modes
    fn is_shadow(&self, sample: &[f32; 3], p: &UpdateParams) -> bool {
        let mut cumulative = 0.0f32;
        for g in &self.modes[..self.used as usize] {
            let numerator: f32 = g.mean.iter().zip(sample.iter()).map(|(m, s)| m * s).sum();
            let denominator: f32 = g.mean.iter().map(|m| m * m).sum();
            if denominator == 0.0 {
                return false;
            }

            if numerator <= denominator && numerator >= p.shadow_threshold * denominator {
                let a = numerator / denominator;
                let dist2a: f32 = g
                    .mean
                    .iter()
                    .zip(sample.iter())
                    .map(|(m, s)| (a * m - s) * (a * m - s))
                    .sum();
                if dist2a < p.var_threshold * g.variance * a * a {
                    return true;
                }
            }

            cumulative += g.weight;
            if cumulative > p.background_ratio {
                return false;
            }
        }
        false
    }
}

/// Per-pixel adaptive background model producing foreground masks
pub struct ForegroundExtractor {
    config: ForegroundConfig,
    dimensions: Option<(u32, u32)>,
    pixels: Vec<PixelModel>,
    frames_seen: u64,
}

impl ForegroundExtractor {
    pub fn new(config: ForegroundConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            dimensions: None,
            pixels: Vec::new(),
            frames_seen: 0,
        })
    }

    pub fn config(&self) -> &ForegroundConfig {
        &self.config
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Forget the learned background; the next frame starts a new model
    pub fn reset(&mut self) {
        self.dimensions = None;
        self.pixels.clear();
        self.frames_seen = 0;
    }

    /// Update the model with `frame` and return the cleaned binary foreground mask.
    ///
    /// A negative `learning_rate` selects the automatic rate derived from `history`.
    pub fn extract(&mut self, frame: &Frame, learning_rate: f64) -> Result<GrayImage> {
        let raw = self.apply(&frame.image, learning_rate)?;
        if self.frames_seen <= self.config.warmup_frames as u64 {
            log::debug!("Frame {}: seeding background model", frame.frame_id);
            let (w, h) = raw.dimensions();
            return Ok(GrayImage::new(w, h));
        }
        Ok(clean_mask(&raw, self.config.morph_radius))
    }

    /// Update the model and return the raw classification
    /// (0 background, `shadow_value` shadow, 255 foreground)
    pub fn apply(&mut self, image: &RgbImage, learning_rate: f64) -> Result<GrayImage> {
        let (width, height) = image.dimensions();
        match self.dimensions {
            Some(expected) if expected != (width, height) => {
                return Err(TrackingError::dimensions(expected, (width, height)));
            }
            Some(_) => {}
            None => {
                log::info!(
                    "Background model allocated for {}x{} frames ({} modes per pixel)",
                    width,
                    height,
                    self.config.max_modes
                );
                self.dimensions = Some((width, height));
                self.pixels = vec![PixelModel::default(); width as usize * height as usize];
            }
        }

        self.frames_seen += 1;
        let params = self.update_params(learning_rate);

        let mut mask = vec![0u8; width as usize * height as usize];
        if width == 0 || height == 0 {
            return Ok(GrayImage::new(width, height));
        }
        let row_len = width as usize;

        // Pixels are independent, rows are updated in parallel
        self.pixels
            .par_chunks_mut(row_len)
            .zip(mask.par_chunks_mut(row_len))
            .zip(image.as_raw().par_chunks(row_len * 3))
            .for_each(|((models, out), rgb)| {
                for ((model, label), px) in models.iter_mut().zip(out.iter_mut()).zip(rgb.chunks_exact(3)) {
                    let sample = [px[0] as f32, px[1] as f32, px[2] as f32];
                    *label = model.update(sample, &params);
                }
            });

        GrayImage::from_raw(width, height, mask)
            .ok_or_else(|| TrackingError::other("foreground mask buffer size mismatch"))
    }

    fn update_params(&self, learning_rate: f64) -> UpdateParams {
        let c = &self.config;
        // The first frames always use the automatic rate
        let alpha = if learning_rate >= 0.0 && self.frames_seen > 1 {
            learning_rate as f32
        } else {
            1.0 / (2 * self.frames_seen).min(c.history as u64).max(1) as f32
        };

        UpdateParams {
            alpha,
            prune: -alpha * c.complexity_reduction,
            max_modes: c.max_modes,
            background_ratio: c.background_ratio,
            var_threshold: c.var_threshold,
            var_threshold_gen: c.var_threshold_gen,
            var_init: c.var_init,
            var_min: c.var_min,
            var_max: c.var_max,
            detect_shadows: c.detect_shadows,
            shadow_value: c.shadow_value,
            shadow_threshold: c.shadow_threshold,
        }
    }
}

/// Keep only confident foreground (shadows dropped) and remove specks with an opening
pub fn clean_mask(raw: &GrayImage, morph_radius: u8) -> GrayImage {
    let binary = threshold(raw, FOREGROUND - 1, ThresholdType::Binary);
    if morph_radius == 0 {
        return binary;
    }
    open(&binary, Norm::LInf, morph_radius)
}

/// Number of foreground pixels in a mask
pub fn foreground_count(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| **p == Luma([FOREGROUND])).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn uniform(w: u32, h: u32, v: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([v, v, v]))
    }

    /// Feed `stable` frames of 50 followed by frames of 200 and return the
    /// raw label of pixel (0, 0) for each post-jump frame
    fn labels_after_jump(learning_rate: f64, stable: usize, after: usize) -> Vec<u8> {
        let mut fg = ForegroundExtractor::new(ForegroundConfig::default()).unwrap();
        for _ in 0..stable {
            fg.apply(&uniform(4, 4, 50), learning_rate).unwrap();
        }
        (0..after)
            .map(|_| fg.apply(&uniform(4, 4, 200), learning_rate).unwrap().get_pixel(0, 0).0[0])
            .collect()
    }

    #[test]
    fn test_stable_scene_is_background() {
        let mut fg = ForegroundExtractor::new(ForegroundConfig::default()).unwrap();
        let first = fg.apply(&uniform(8, 8, 80), 0.01).unwrap();
        // The new mode equals the sample, so it passes the shadow test
        assert!(first.pixels().all(|p| p.0[0] == 127));
        assert_eq!(foreground_count(&first), 0);
        for _ in 0..5 {
            let mask = fg.apply(&uniform(8, 8, 80), 0.01).unwrap();
            assert_eq!(foreground_count(&mask), 0);
        }
    }

    #[test]
    fn test_first_frame_without_shadows_is_foreground() {
        let config = ForegroundConfig {
            detect_shadows: false,
            morph_radius: 0,
            ..ForegroundConfig::default()
        };
        let mut fg = ForegroundExtractor::new(config.clone()).unwrap();
        let first = fg.apply(&uniform(8, 8, 80), 0.01).unwrap();
        assert_eq!(foreground_count(&first), 64);

        // Without warm-up the first extracted mask is all foreground
        let mut no_warmup = ForegroundExtractor::new(ForegroundConfig {
            warmup_frames: 0,
            ..config.clone()
        })
        .unwrap();
        let mask = no_warmup.extract(&Frame::new(0, uniform(8, 8, 80)), 0.01).unwrap();
        assert_eq!(foreground_count(&mask), 64);

        let mut with_warmup = ForegroundExtractor::new(config).unwrap();
        let mask = with_warmup.extract(&Frame::new(0, uniform(8, 8, 80)), 0.01).unwrap();
        assert_eq!(foreground_count(&mask), 0);
    }

    #[test]
    fn test_intensity_jump_is_foreground_until_absorbed() {
        let labels = labels_after_jump(0.01, 100, 40);
        assert_eq!(labels[0], FOREGROUND, "jump frame must be foreground");
        assert!(labels[..4].iter().all(|&l| l == FOREGROUND));
        // With rate 0.01 the new colour takes over after about ten frames
        assert!(labels[30..].iter().all(|&l| l == 0), "labels: {:?}", labels);
    }

    #[test]
    fn test_lower_learning_rate_adapts_slower() {
        let fast = labels_after_jump(0.01, 100, 40);
        let slow = labels_after_jump(0.001, 100, 40);
        assert_eq!(fast[35], 0);
        assert!(slow.iter().all(|&l| l == FOREGROUND));
    }

    #[test]
    fn test_shadow_is_labelled_and_dropped_from_mask() {
        let mut fg = ForegroundExtractor::new(ForegroundConfig::default()).unwrap();
        for _ in 0..50 {
            fg.apply(&uniform(4, 4, 100), 0.01).unwrap();
        }
        let raw = fg.apply(&uniform(4, 4, 60), 0.01).unwrap();
        assert_eq!(raw.get_pixel(1, 1).0[0], 127);
        assert_eq!(foreground_count(&clean_mask(&raw, 0)), 0);
    }

    #[test]
    fn test_shadow_detection_disabled() {
        let config = ForegroundConfig {
            detect_shadows: false,
            ..ForegroundConfig::default()
        };
        let mut fg = ForegroundExtractor::new(config).unwrap();
        for _ in 0..50 {
            fg.apply(&uniform(4, 4, 100), 0.01).unwrap();
        }
        let raw = fg.apply(&uniform(4, 4, 60), 0.01).unwrap();
        assert_eq!(raw.get_pixel(1, 1).0[0], FOREGROUND);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let mut fg = ForegroundExtractor::new(ForegroundConfig::default()).unwrap();
        fg.apply(&uniform(8, 8, 10), 0.01).unwrap();
        match fg.apply(&uniform(8, 6, 10), 0.01) {
            Err(TrackingError::InvalidDimensions { expected, actual }) => {
                assert_eq!(expected, (8, 8));
                assert_eq!(actual, (8, 6));
            }
            other => panic!("expected dimension error, got {:?}", other.map(|_| ())),
        }
        assert_eq!(fg.frames_seen(), 1);

        fg.reset();
        assert!(fg.apply(&uniform(8, 6, 10), 0.01).is_ok());
    }

    #[test]
    fn test_extract_warmup_and_cleaning() {
        let mut fg = ForegroundExtractor::new(ForegroundConfig::default()).unwrap();
        let background = Frame::new(0, uniform(40, 40, 20));

        let seeded = fg.extract(&background, 0.01).unwrap();
        assert_eq!(foreground_count(&seeded), 0, "warm-up frame reports no foreground");

        for i in 1..5 {
            let mask = fg.extract(&Frame::new(i, background.image.clone()), 0.01).unwrap();
            assert_eq!(foreground_count(&mask), 0);
        }

        // A 20x20 bright block plus a 2x2 speck
        let mut image = background.image.clone();
        for y in 10..30 {
            for x in 10..30 {
                image.put_pixel(x, y, Rgb([220, 220, 220]));
            }
        }
        for y in 2..4 {
            for x in 34..36 {
                image.put_pixel(x, y, Rgb([220, 220, 220]));
            }
        }
        let mask = fg.extract(&Frame::new(5, image), 0.01).unwrap();
        assert_eq!(mask.get_pixel(20, 20).0[0], FOREGROUND);
        assert_eq!(mask.get_pixel(10, 10).0[0], FOREGROUND);
        assert_eq!(mask.get_pixel(34, 2).0[0], 0, "speck removed by the opening");
        assert_eq!(foreground_count(&mask), 400);
    }

    #[test]
    fn test_mode_count_is_bounded() {
        let mut fg = ForegroundExtractor::new(ForegroundConfig::default()).unwrap();
        for v in 0..20u8 {
            fg.apply(&uniform(2, 2, v * 12), 0.05).unwrap();
        }
        assert!(fg.pixels.iter().all(|p| p.used as usize <= 5));
        let modes = &fg.pixels[0].modes[..fg.pixels[0].used as usize];
        assert!(modes.windows(2).all(|w| w[0].weight >= w[1].weight));
    }

    #[test]
    fn test_invalid_config() {
        let config = ForegroundConfig {
            max_modes: MAX_MODES + 1,
            ..ForegroundConfig::default()
        };
        assert!(matches!(
            ForegroundExtractor::new(config),
            Err(TrackingError::ConfigError(_))
        ));
    }
}
