//! Orchestration: server discovery, flow execution, reporting

use std::path::PathBuf;
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{SmokeError, SmokeResult};
use crate::probe;
use crate::script::{BrowserConfig, BrowserKind, PlaywrightDriver};
use crate::server::{DevServer, DevServerConfig};
use crate::spec::FlowSpec;
use crate::visual::{VisualCheck, VisualConfig};

/// Report for one executed flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowReport {
    pub name: String,
    pub success: bool,
    pub connected_url: Option<String>,
    pub started_at: String,
    pub duration_ms: u64,
    pub steps: Vec<StepReport>,
    pub visual_diffs: Vec<VisualDiffReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualDiffReport {
    pub name: String,
    pub matches: bool,
    pub diff_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_image_path: Option<String>,
}

/// Report for a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub reports: Vec<FlowReport>,
}

/// Configuration for the smoke runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Candidate dev-server URLs, probed in order
    pub candidates: Vec<String>,

    /// Per-candidate connect timeout
    pub connect_timeout: Duration,

    pub browser: BrowserKind,
    pub headless: bool,

    /// When set, overrides every step's visibility timeout
    pub assert_timeout_ms: Option<u64>,

    /// Viewport overrides applied on top of each flow's own viewport
    pub viewport_width: Option<u32>,
    pub viewport_height: Option<u32>,

    /// User-agent override applied to every flow
    pub user_agent: Option<String>,

    pub screenshot_dir: PathBuf,
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,

    /// When set, the runner spawns the dev server itself
    pub spawn_server: Option<DevServerConfig>,

    pub visual: VisualConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            candidates: probe::default_candidates(),
            connect_timeout: Duration::from_secs(15),
            browser: BrowserKind::Chromium,
            headless: true,
            assert_timeout_ms: None,
            viewport_width: None,
            viewport_height: None,
            user_agent: None,
            screenshot_dir: PathBuf::from("smoke-results/screenshots"),
            specs_dir: PathBuf::from("specs"),
            output_dir: PathBuf::from("smoke-results"),
            spawn_server: None,
            visual: VisualConfig::default(),
        }
    }
}

/// Runs verification flows against the dev server
pub struct SmokeRunner {
    config: RunnerConfig,
    server: Option<DevServer>,
    connected_url: Option<String>,
}

impl SmokeRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            server: None,
            connected_url: None,
        }
    }

    /// Find (or start) the dev server. The discovered URL is cached for
    /// the rest of the run.
    pub async fn ensure_server(&mut self) -> SmokeResult<String> {
        if let Some(url) = &self.connected_url {
            return Ok(url.clone());
        }

        let url = if let Some(server_config) = &self.config.spawn_server {
            let server = DevServer::spawn(server_config.clone()).await?;
            let url = server.base_url.clone();
            self.server = Some(server);
            url
        } else {
            probe::probe_candidates(&self.config.candidates, self.config.connect_timeout).await?
        };

        self.connected_url = Some(url.clone());
        Ok(url)
    }

    /// Stop a spawned dev server, if any.
    pub fn shutdown(&mut self) -> SmokeResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop()?;
        }
        Ok(())
    }

    /// Apply CLI-level viewport and user-agent overrides to a flow.
    fn apply_overrides(&self, spec: &FlowSpec) -> FlowSpec {
        let mut spec = spec.clone();
        if let Some(width) = self.config.viewport_width {
            spec.viewport.width = width;
        }
        if let Some(height) = self.config.viewport_height {
            spec.viewport.height = height;
        }
        if let Some(user_agent) = &self.config.user_agent {
            spec.user_agent = Some(user_agent.clone());
        }
        spec
    }

    /// Execute one flow end to end.
    pub async fn run_flow(&mut self, spec: &FlowSpec) -> SmokeResult<FlowReport> {
        let start = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();
        debug!("Running flow: {}", spec.name);

        let spec = &self.apply_overrides(spec);
        let base_url = self.ensure_server().await?;

        let driver = PlaywrightDriver::new(BrowserConfig {
            base_url: base_url.clone(),
            screenshot_dir: self.config.screenshot_dir.clone(),
            browser: self.config.browser,
            headless: self.config.headless,
            connect_timeout_ms: self.config.connect_timeout.as_millis() as u64,
            assert_timeout_ms: self.config.assert_timeout_ms,
        })?;

        let names = driver.step_names(spec);
        let output = driver.run_flow(spec).await?;

        let mut steps: Vec<StepReport> = output
            .steps
            .iter()
            .map(|s| StepReport {
                name: s.name.clone(),
                success: true,
                duration_ms: s.duration_ms,
                error: None,
            })
            .collect();

        let mut flow_error = None;
        if let Some(failure) = &output.failure {
            let name = names
                .get(failure.failed_step)
                .cloned()
                .unwrap_or_else(|| format!("step {}", failure.failed_step));
            steps.push(StepReport {
                name,
                success: false,
                duration_ms: 0,
                error: Some(failure.message.clone()),
            });
            flow_error = Some(failure.message.clone());
            info!(
                "Failure screenshot saved to {}",
                self.config.screenshot_dir.join("error.png").display()
            );
        }

        // Baseline comparison only for flows that ran to completion
        let mut visual_diffs = Vec::new();
        if spec.visual_regression && flow_error.is_none() {
            let check = VisualCheck::new(self.config.visual.clone())?;

            for screenshot in spec.screenshot_names() {
                match check.compare(&screenshot, spec.visual_threshold) {
                    Ok(diff) => {
                        if !diff.matches {
                            flow_error = Some(format!(
                                "visual regression in '{}': {:.2}% pixels differ",
                                screenshot, diff.diff_percent
                            ));
                        }
                        visual_diffs.push(VisualDiffReport {
                            name: screenshot,
                            matches: diff.matches,
                            diff_percent: diff.diff_percent,
                            diff_image_path: diff
                                .diff_image_path
                                .map(|p| p.to_string_lossy().to_string()),
                        });
                    }
                    Err(SmokeError::BaselineNotFound(_)) => {
                        info!(
                            "No baseline for '{}' - run with --update-baselines to create it",
                            screenshot
                        );
                    }
                    Err(e) => {
                        flow_error = Some(format!("visual comparison failed: {}", e));
                    }
                }
            }
        }

        let success = flow_error.is_none();
        Ok(FlowReport {
            name: spec.name.clone(),
            success,
            connected_url: Some(base_url),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            visual_diffs,
            error: flow_error,
        })
    }

    /// Run a list of flows, continuing past failures.
    pub async fn run_flows(&mut self, specs: &[FlowSpec]) -> SmokeResult<SuiteReport> {
        let start = Instant::now();
        let mut reports = Vec::new();
        let mut passed = 0;
        let mut failed = 0;

        info!("Running {} flow(s)...", specs.len());

        for spec in specs {
            match self.run_flow(spec).await {
                Ok(report) => {
                    if report.success {
                        passed += 1;
                        info!("✓ {} ({} ms)", report.name, report.duration_ms);
                    } else {
                        failed += 1;
                        error!(
                            "✗ {} - {}",
                            report.name,
                            report.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                    reports.push(report);
                }
                Err(e) => {
                    failed += 1;
                    error!("✗ {} - {}", spec.name, e);
                    reports.push(FlowReport {
                        name: spec.name.clone(),
                        success: false,
                        connected_url: self.connected_url.clone(),
                        started_at: chrono::Utc::now().to_rfc3339(),
                        duration_ms: 0,
                        steps: vec![],
                        visual_diffs: vec![],
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        Ok(SuiteReport {
            total: specs.len(),
            passed,
            failed,
            duration_ms,
            reports,
        })
    }

    /// Run every flow in the specs directory, or the built-in premium
    /// flow when there are none.
    pub async fn run_all(&mut self) -> SmokeResult<SuiteReport> {
        let specs = self.load_specs()?;
        self.run_flows(&specs).await
    }

    /// Run flows carrying a tag.
    pub async fn run_tagged(&mut self, tag: &str) -> SmokeResult<SuiteReport> {
        let specs: Vec<FlowSpec> = self
            .load_specs()?
            .into_iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect();
        self.run_flows(&specs).await
    }

    /// Run a single flow by name.
    pub async fn run_named(&mut self, name: &str) -> SmokeResult<SuiteReport> {
        let spec = self
            .load_specs()?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SmokeError::SpecParse(format!("flow not found: {}", name)))?;
        self.run_flows(std::slice::from_ref(&spec)).await
    }

    fn load_specs(&self) -> SmokeResult<Vec<FlowSpec>> {
        let specs = if self.config.specs_dir.is_dir() {
            FlowSpec::load_all(&self.config.specs_dir)?
        } else {
            vec![]
        };

        if specs.is_empty() {
            info!("No flow specs found, using the built-in premium flow");
            return Ok(vec![FlowSpec::premium_flow()]);
        }
        Ok(specs)
    }

    /// Promote current screenshots to baselines.
    pub fn update_baselines(&self) -> SmokeResult<()> {
        let check = VisualCheck::new(VisualConfig {
            auto_update: true,
            ..self.config.visual.clone()
        })?;
        for name in check.update_all_baselines()? {
            debug!("Baseline updated: {}", name);
        }
        Ok(())
    }

    /// Write the suite report as JSON.
    pub fn write_report(&self, report: &SuiteReport) -> SmokeResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("smoke-results.json");
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, json)?;

        info!("Report written to: {}", path.display());
        Ok(path)
    }
}

impl Drop for SmokeRunner {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
