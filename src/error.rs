//! Error types for the smoke runner

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmokeError {
    #[error("No dev server reachable (tried: {0})")]
    ServerUnreachable(String),

    #[error("Dev server failed to start: {0}")]
    ServerStartup(String),

    #[error("Dev server not ready after {0} attempts")]
    ServerNotReady(usize),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright script failed: {0}")]
    Script(String),

    #[error("Flow spec parse error: {0}")]
    SpecParse(String),

    #[error("Invalid locator: {0}")]
    Locator(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Screenshot not produced: {0}")]
    ScreenshotMissing(String),

    #[error("Baseline not found: {0}")]
    BaselineNotFound(String),

    #[error("Screenshot mismatch: {name} differs by {diff_percent:.2}% (threshold: {threshold:.2}%)")]
    ScreenshotMismatch {
        name: String,
        diff_percent: f64,
        threshold: f64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type SmokeResult<T> = Result<T, SmokeError>;
