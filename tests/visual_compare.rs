//! Baseline comparison against synthesized screenshots

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

use gestor_e2e::error::SmokeError;
use gestor_e2e::visual::{VisualCheck, VisualConfig};

fn setup(auto_update: bool) -> (TempDir, VisualCheck) {
    let dir = TempDir::new().unwrap();
    let config = VisualConfig {
        baseline_dir: dir.path().join("baselines"),
        actual_dir: dir.path().join("screenshots"),
        diff_dir: dir.path().join("diffs"),
        threshold: 0.5,
        auto_update,
    };
    let check = VisualCheck::new(config).unwrap();
    (dir, check)
}

fn solid_image(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}

fn save(dir: &TempDir, subdir: &str, name: &str, img: &RgbaImage) {
    img.save(dir.path().join(subdir).join(format!("{}.png", name)))
        .unwrap();
}

#[test]
fn identical_screenshots_match() {
    let (dir, check) = setup(false);
    let img = solid_image(20, 20, [10, 20, 30, 255]);
    save(&dir, "screenshots", "home", &img);
    save(&dir, "baselines", "home", &img);

    let diff = check.compare("home", None).unwrap();
    assert!(diff.matches);
    assert_eq!(diff.diff_pixels, 0);
    assert!(diff.diff_image_path.is_none());
}

#[test]
fn small_channel_noise_is_tolerated() {
    let (dir, check) = setup(false);
    save(&dir, "screenshots", "home", &solid_image(20, 20, [100, 100, 100, 255]));
    save(&dir, "baselines", "home", &solid_image(20, 20, [103, 100, 98, 255]));

    let diff = check.compare("home", None).unwrap();
    assert!(diff.matches);
    assert_eq!(diff.diff_pixels, 0);
}

#[test]
fn changed_region_fails_threshold() {
    let (dir, check) = setup(false);
    let actual = solid_image(10, 10, [0, 0, 0, 255]);
    let mut baseline = actual.clone();
    // repaint half the image
    for y in 0..5 {
        for x in 0..10 {
            baseline.put_pixel(x, y, Rgba([255, 255, 255, 255]));
        }
    }
    save(&dir, "screenshots", "home", &actual);
    save(&dir, "baselines", "home", &baseline);

    let diff = check.compare("home", None).unwrap();
    assert!(!diff.matches);
    assert_eq!(diff.diff_pixels, 50);
    assert_eq!(diff.total_pixels, 100);
    assert!((diff.diff_percent - 50.0).abs() < f64::EPSILON);
    assert!(diff.diff_image_path.unwrap().exists());
}

#[test]
fn generous_threshold_accepts_changes() {
    let (dir, check) = setup(false);
    let actual = solid_image(10, 10, [0, 0, 0, 255]);
    let mut baseline = actual.clone();
    baseline.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
    save(&dir, "screenshots", "home", &actual);
    save(&dir, "baselines", "home", &baseline);

    // one pixel of a hundred, threshold 1%
    let diff = check.compare("home", Some(1.0)).unwrap();
    assert!(diff.matches);
    assert_eq!(diff.diff_pixels, 1);
}

#[test]
fn dimension_mismatch_counts_missing_area() {
    let (dir, check) = setup(false);
    save(&dir, "screenshots", "home", &solid_image(10, 10, [5, 5, 5, 255]));
    save(&dir, "baselines", "home", &solid_image(10, 5, [5, 5, 5, 255]));

    let diff = check.compare("home", Some(10.0)).unwrap();
    assert_eq!(diff.diff_pixels, 50);
    assert!(!diff.matches);
}

#[test]
fn shrunken_screenshot_fails_against_larger_baseline() {
    let (dir, check) = setup(false);
    // The screen lost its lower half: the overlap is identical but the
    // baseline's extra area must still count as different.
    save(&dir, "screenshots", "home", &solid_image(10, 10, [5, 5, 5, 255]));
    save(&dir, "baselines", "home", &solid_image(10, 20, [5, 5, 5, 255]));

    let diff = check.compare("home", None).unwrap();
    assert!(!diff.matches);
    assert_eq!(diff.diff_pixels, 100);
    assert_eq!(diff.total_pixels, 200);
    assert!((diff.diff_percent - 50.0).abs() < f64::EPSILON);
    assert!(diff.diff_image_path.unwrap().exists());
}

#[test]
fn missing_baseline_is_an_error_without_auto_update() {
    let (dir, check) = setup(false);
    save(&dir, "screenshots", "home", &solid_image(4, 4, [1, 2, 3, 255]));

    match check.compare("home", None) {
        Err(SmokeError::BaselineNotFound(_)) => {}
        other => panic!("expected BaselineNotFound, got {:?}", other),
    }
}

#[test]
fn auto_update_creates_baseline() {
    let (dir, check) = setup(true);
    save(&dir, "screenshots", "home", &solid_image(4, 4, [1, 2, 3, 255]));

    let diff = check.compare("home", None).unwrap();
    assert!(diff.matches);
    assert_eq!(check.list_baselines().unwrap(), vec!["home".to_string()]);
}

#[test]
fn update_all_baselines_promotes_screenshots() {
    let (dir, check) = setup(false);
    save(&dir, "screenshots", "a", &solid_image(4, 4, [1, 1, 1, 255]));
    save(&dir, "screenshots", "b", &solid_image(4, 4, [2, 2, 2, 255]));

    let updated = check.update_all_baselines().unwrap();
    assert_eq!(updated, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(check.list_baselines().unwrap().len(), 2);
}
