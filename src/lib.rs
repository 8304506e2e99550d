//! Gestor front-end smoke tests
//!
//! Rust-controlled browser verification of the Gestor dev build:
//! - Probes candidate dev-server URLs and picks the first that answers
//! - Drives a headless browser through Playwright (via node) with a
//!   phone-sized viewport and mobile user agent
//! - Executes declarative YAML flows (or the built-in premium flow):
//!   assert the Dashboard heading, click through to the subscription
//!   screen, verify it, screenshot it
//! - Captures a fallback screenshot when a step fails
//! - Optionally compares screenshots against stored baselines
//!
//! ```text
//! SmokeRunner
//!   ├── probe_candidates() / DevServer::spawn()  -> base URL
//!   ├── PlaywrightDriver::run_flow(FlowSpec)     -> StepOutcomes
//!   ├── VisualCheck::compare(screenshot)         -> PixelDiff
//!   └── write_report()                           -> smoke-results.json
//! ```

pub mod error;
pub mod probe;
pub mod runner;
pub mod script;
pub mod server;
pub mod spec;
pub mod visual;

pub use error::{SmokeError, SmokeResult};
pub use runner::SmokeRunner;
pub use spec::{FlowSpec, FlowStep, Locator};
