//! Screenshot baseline comparison

use std::path::{Path, PathBuf};
use image::{GenericImageView, Pixel, RgbaImage};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{SmokeError, SmokeResult};

/// Per-channel tolerance for anti-aliasing and compression noise.
const CHANNEL_TOLERANCE: i32 = 5;

/// Result of comparing one screenshot against its baseline
#[derive(Debug, Clone)]
pub struct PixelDiff {
    pub matches: bool,
    pub diff_percent: f64,
    pub diff_pixels: u64,
    pub total_pixels: u64,
    pub diff_image_path: Option<PathBuf>,
}

/// Compares screenshots against stored baselines
pub struct VisualCheck {
    baseline_dir: PathBuf,
    actual_dir: PathBuf,
    diff_dir: PathBuf,
    threshold: f64,
    auto_update: bool,
}

impl VisualCheck {
    pub fn new(config: VisualConfig) -> SmokeResult<Self> {
        std::fs::create_dir_all(&config.baseline_dir)?;
        std::fs::create_dir_all(&config.actual_dir)?;
        std::fs::create_dir_all(&config.diff_dir)?;

        Ok(Self {
            baseline_dir: config.baseline_dir,
            actual_dir: config.actual_dir,
            diff_dir: config.diff_dir,
            threshold: config.threshold,
            auto_update: config.auto_update,
        })
    }

    /// Compare a named screenshot against its baseline.
    pub fn compare(&self, name: &str, threshold: Option<f64>) -> SmokeResult<PixelDiff> {
        let threshold = threshold.unwrap_or(self.threshold);

        let actual_path = self.actual_dir.join(format!("{}.png", name));
        let baseline_path = self.baseline_dir.join(format!("{}.png", name));

        if !actual_path.exists() {
            return Err(SmokeError::ScreenshotMissing(
                actual_path.to_string_lossy().to_string(),
            ));
        }

        if !baseline_path.exists() {
            if self.auto_update {
                info!("Creating baseline for '{}'", name);
                std::fs::copy(&actual_path, &baseline_path)?;
                return Ok(PixelDiff {
                    matches: true,
                    diff_percent: 0.0,
                    diff_pixels: 0,
                    total_pixels: 0,
                    diff_image_path: None,
                });
            }
            return Err(SmokeError::BaselineNotFound(
                baseline_path.to_string_lossy().to_string(),
            ));
        }

        // Byte-identical files need no pixel walk
        if hash_file(&actual_path)? == hash_file(&baseline_path)? {
            debug!("Screenshots for '{}' are byte-identical", name);
            let img = image::open(&actual_path)?;
            let (w, h) = img.dimensions();
            return Ok(PixelDiff {
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: (w as u64) * (h as u64),
                diff_image_path: None,
            });
        }

        let actual = image::open(&actual_path)?.to_rgba8();
        let baseline = image::open(&baseline_path)?.to_rgba8();

        if actual.dimensions() != baseline.dimensions() {
            warn!(
                "Screenshot '{}' dimensions differ: actual {:?} vs baseline {:?}",
                name,
                actual.dimensions(),
                baseline.dimensions()
            );
        }

        // The diff covers the union of both images so a screenshot that
        // shrank or grew can never pass as a perfect match.
        let (aw, ah) = actual.dimensions();
        let (bw, bh) = baseline.dimensions();
        let union_w = aw.max(bw);
        let union_h = ah.max(bh);
        let overlap_w = aw.min(bw);
        let overlap_h = ah.min(bh);

        let mut diff_img = RgbaImage::new(union_w, union_h);
        let mut diff_pixels = 0u64;
        let total_pixels = (union_w as u64) * (union_h as u64);

        for y in 0..union_h {
            for x in 0..union_w {
                if x >= overlap_w || y >= overlap_h {
                    // Present in only one of the two images
                    diff_pixels += 1;
                    diff_img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
                    continue;
                }

                let a = actual.get_pixel(x, y);
                let b = baseline.get_pixel(x, y);

                if pixels_differ(a, b) {
                    diff_pixels += 1;
                    diff_img.put_pixel(x, y, image::Rgba([255, 0, 0, 255]));
                } else {
                    let c = a.channels();
                    diff_img.put_pixel(x, y, image::Rgba([c[0] / 2, c[1] / 2, c[2] / 2, 128]));
                }
            }
        }

        let diff_percent = (diff_pixels as f64 / total_pixels as f64) * 100.0;
        let matches = diff_percent <= threshold;

        let diff_image_path = if diff_pixels > 0 {
            let path = self.diff_dir.join(format!("{}-diff.png", name));
            diff_img.save(&path)?;
            Some(path)
        } else {
            None
        };

        if !matches {
            warn!(
                "Visual regression in '{}': {:.2}% pixels differ (threshold: {:.2}%)",
                name, diff_percent, threshold
            );
        }

        Ok(PixelDiff {
            matches,
            diff_percent,
            diff_pixels,
            total_pixels,
            diff_image_path,
        })
    }

    /// Promote the current screenshot to baseline.
    pub fn update_baseline(&self, name: &str) -> SmokeResult<()> {
        let actual_path = self.actual_dir.join(format!("{}.png", name));
        if !actual_path.exists() {
            return Err(SmokeError::ScreenshotMissing(
                actual_path.to_string_lossy().to_string(),
            ));
        }

        let baseline_path = self.baseline_dir.join(format!("{}.png", name));
        std::fs::copy(&actual_path, &baseline_path)?;
        info!("Updated baseline for '{}'", name);
        Ok(())
    }

    /// Promote every screenshot in the actual dir.
    pub fn update_all_baselines(&self) -> SmokeResult<Vec<String>> {
        let mut updated = Vec::new();
        for name in png_stems(&self.actual_dir)? {
            self.update_baseline(&name)?;
            updated.push(name);
        }
        Ok(updated)
    }

    pub fn list_baselines(&self) -> SmokeResult<Vec<String>> {
        png_stems(&self.baseline_dir)
    }
}

fn png_stems(dir: &Path) -> SmokeResult<Vec<String>> {
    let mut stems = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "png").unwrap_or(false) {
            if let Some(stem) = path.file_stem() {
                stems.push(stem.to_string_lossy().to_string());
            }
        }
    }
    stems.sort();
    Ok(stems)
}

fn pixels_differ(a: &image::Rgba<u8>, b: &image::Rgba<u8>) -> bool {
    a.channels()
        .iter()
        .zip(b.channels())
        .any(|(&x, &y)| (x as i32 - y as i32).abs() > CHANNEL_TOLERANCE)
}

fn hash_file(path: &Path) -> SmokeResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Configuration for visual comparison
#[derive(Debug, Clone)]
pub struct VisualConfig {
    pub baseline_dir: PathBuf,
    pub actual_dir: PathBuf,
    pub diff_dir: PathBuf,
    pub threshold: f64,
    pub auto_update: bool,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            baseline_dir: PathBuf::from("smoke-results/baselines"),
            actual_dir: PathBuf::from("smoke-results/screenshots"),
            diff_dir: PathBuf::from("smoke-results/diffs"),
            threshold: 0.5,
            auto_update: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_tolerance() {
        let a = image::Rgba([100, 100, 100, 255]);
        let b = image::Rgba([104, 100, 100, 255]);
        let c = image::Rgba([110, 100, 100, 255]);
        assert!(!pixels_differ(&a, &b));
        assert!(pixels_differ(&a, &c));
    }

    #[test]
    fn test_visual_config_default() {
        let config = VisualConfig::default();
        assert_eq!(config.threshold, 0.5);
        assert!(!config.auto_update);
    }
}
