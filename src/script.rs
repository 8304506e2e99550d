//! Playwright script generation and execution
//!
//! A whole flow renders to a single Node.js script: one browser launch, all
//! steps inside one try block, a fallback screenshot in the catch, and a
//! guaranteed `browser.close()` in the finally. Each completed step prints a
//! JSON line on stdout, which the runner parses back into step outcomes.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command as TokioCommand;
use tracing::debug;

use crate::error::{SmokeError, SmokeResult};
use crate::spec::{FlowSpec, FlowStep, Locator, WaitState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

/// Configuration for the generated script
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Base URL of the dev server
    pub base_url: String,

    /// Directory screenshots are written to
    pub screenshot_dir: PathBuf,

    /// Browser engine
    pub browser: BrowserKind,

    pub headless: bool,

    /// Timeout for the initial page load
    pub connect_timeout_ms: u64,

    /// When set, overrides every step's visibility timeout
    pub assert_timeout_ms: Option<u64>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            screenshot_dir: PathBuf::from("smoke-results/screenshots"),
            browser: BrowserKind::Chromium,
            headless: true,
            connect_timeout_ms: 15_000,
            assert_timeout_ms: None,
        }
    }
}

/// Outcome of one completed step, parsed from the script's stdout
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub index: usize,
    pub name: String,
    pub duration_ms: u64,
}

/// Failure record for a flow that did not run to completion
#[derive(Debug, Clone)]
pub struct ScriptFailure {
    pub failed_step: usize,
    pub message: String,
}

/// Everything the script reported back
#[derive(Debug, Clone)]
pub struct ScriptOutput {
    pub steps: Vec<StepOutcome>,
    pub failure: Option<ScriptFailure>,
}

/// Drives a headless browser through a flow via Playwright and node
pub struct PlaywrightDriver {
    config: BrowserConfig,
}

impl PlaywrightDriver {
    pub fn new(config: BrowserConfig) -> SmokeResult<Self> {
        check_installed()?;
        std::fs::create_dir_all(&config.screenshot_dir)?;
        Ok(Self { config })
    }

    /// Build a driver without probing the Playwright installation.
    /// Script generation needs no toolchain.
    pub fn new_unchecked(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// Names of the steps the script will report, in order. Index 0 is the
    /// implicit connect step.
    pub fn step_names(&self, spec: &FlowSpec) -> Vec<String> {
        let mut names = vec![format!("connect:{}", self.config.base_url)];
        names.extend(spec.steps.iter().map(|s| s.step_name()));
        names
    }

    /// Render the Node.js script for a flow.
    pub fn build_script(&self, spec: &FlowSpec) -> SmokeResult<String> {
        spec.validate()?;

        let user_agent = spec
            .user_agent
            .as_deref()
            .unwrap_or(crate::spec::MOBILE_USER_AGENT);
        let error_path = self.config.screenshot_dir.join("error.png");

        let mut script = format!(
            r#"const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }},
    userAgent: {user_agent}
  }});
  const page = await context.newPage();
  const baseUrl = {base_url};
  const emit = (step, name, ms) => console.log(JSON.stringify({{ step, name, ms }}));
  let current = 0;
  let t = Date.now();

  try {{
    await page.goto(baseUrl, {{ waitUntil: 'domcontentloaded', timeout: {connect_timeout} }});
    emit(0, 'connect', Date.now() - t);
"#,
            browser = self.config.browser.as_str(),
            headless = self.config.headless,
            width = spec.viewport.width,
            height = spec.viewport.height,
            user_agent = js_quote(user_agent),
            base_url = js_quote(&self.config.base_url),
            connect_timeout = self.config.connect_timeout_ms,
        );

        for (i, step) in spec.steps.iter().enumerate() {
            let index = i + 1;
            script.push_str(&format!(
                "\n    // Step {}: {}\n    current = {}; t = Date.now();\n",
                index,
                step.step_name(),
                index
            ));
            script.push_str(&self.step_js(step, index)?);
            script.push_str(&format!(
                "    emit({}, {}, Date.now() - t);\n",
                index,
                js_quote(&step.step_name())
            ));
        }

        script.push_str(&format!(
            r#"
    console.log(JSON.stringify({{ done: true }}));
  }} catch (error) {{
    try {{ await page.screenshot({{ path: {error_path} }}); }} catch (_) {{}}
    console.log(JSON.stringify({{ done: false, failed_step: current, error: error.message }}));
    process.exitCode = 1;
  }} finally {{
    await browser.close();
  }}
}})();
"#,
            error_path = js_quote(&error_path.to_string_lossy()),
        ));

        Ok(script)
    }

    fn step_js(&self, step: &FlowStep, index: usize) -> SmokeResult<String> {
        let js = match step {
            FlowStep::Navigate { path, wait_for } => {
                let mut code = format!(
                    "    await page.goto(baseUrl + {}, {{ waitUntil: 'domcontentloaded', timeout: {} }});\n",
                    js_quote(path),
                    self.config.connect_timeout_ms
                );
                if let Some(locator) = wait_for {
                    code.push_str(&format!(
                        "    await {}.waitFor({{ state: 'visible', timeout: {} }});\n",
                        locator_js(locator)?,
                        self.timeout(crate::spec::DEFAULT_ASSERT_TIMEOUT_MS)
                    ));
                }
                code
            }
            FlowStep::Click { target, timeout_ms } => format!(
                "    await {}.click({{ timeout: {} }});\n",
                locator_js(target)?,
                self.timeout(timeout_ms.unwrap_or(crate::spec::DEFAULT_ASSERT_TIMEOUT_MS))
            ),
            FlowStep::Fill { target, value } => format!(
                "    await {}.fill({});\n",
                locator_js(target)?,
                js_quote(value)
            ),
            FlowStep::Wait {
                target,
                timeout_ms,
                state,
            } => {
                let state_str = match state {
                    WaitState::Visible => "visible",
                    WaitState::Hidden => "hidden",
                    WaitState::Attached => "attached",
                    WaitState::Detached => "detached",
                };
                format!(
                    "    await {}.waitFor({{ state: '{}', timeout: {} }});\n",
                    locator_js(target)?,
                    state_str,
                    self.timeout(*timeout_ms)
                )
            }
            FlowStep::Assert {
                target,
                visible,
                text_contains,
                timeout_ms,
            } => {
                let state = if *visible { "visible" } else { "hidden" };
                let mut code = format!(
                    "    await {}.waitFor({{ state: '{}', timeout: {} }});\n",
                    locator_js(target)?,
                    state,
                    self.timeout(*timeout_ms)
                );
                if let Some(expected) = text_contains {
                    code.push_str(&format!(
                        "    const text{idx} = await {loc}.innerText();\n    if (!text{idx}.includes({expected})) {{ throw new Error('text mismatch: ' + text{idx}); }}\n",
                        idx = index,
                        loc = locator_js(target)?,
                        expected = js_quote(expected)
                    ));
                }
                code
            }
            FlowStep::Screenshot { name, full_page } => {
                let path = self.config.screenshot_dir.join(format!("{}.png", name));
                format!(
                    "    await page.screenshot({{ path: {}, fullPage: {} }});\n",
                    js_quote(&path.to_string_lossy()),
                    full_page
                )
            }
            FlowStep::Sleep { ms } => format!("    await page.waitForTimeout({});\n", ms),
        };
        Ok(js)
    }

    fn timeout(&self, step_timeout: u64) -> u64 {
        self.config.assert_timeout_ms.unwrap_or(step_timeout)
    }

    /// Run the script with node and parse step outcomes from stdout.
    pub async fn run_flow(&self, spec: &FlowSpec) -> SmokeResult<ScriptOutput> {
        let script = self.build_script(spec)?;
        let names = self.step_names(spec);

        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("flow.js");
        std::fs::write(&script_path, &script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let output = TokioCommand::new("node")
            .arg(&script_path)
            .output()
            .await
            .map_err(|e| SmokeError::Script(format!("failed to run node: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed = parse_events(&stdout, &names);

        match parsed {
            Some(result) => Ok(result),
            None => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(SmokeError::Script(format!(
                    "no result from script:\nstdout: {}\nstderr: {}",
                    stdout, stderr
                )))
            }
        }
    }
}

/// Render a locator as a Playwright locator expression.
fn locator_js(locator: &Locator) -> SmokeResult<String> {
    locator.validate()?;
    match (&locator.selector, &locator.role, &locator.name) {
        (Some(selector), _, _) => Ok(format!("page.locator({})", js_quote(selector))),
        (None, Some(role), Some(name)) => Ok(format!(
            "page.getByRole({}, {{ name: {} }})",
            js_quote(role),
            js_quote(name)
        )),
        _ => unreachable!("validated above"),
    }
}

/// Quote a string as a single-quoted JS literal.
fn js_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptEvent {
    Step {
        step: usize,
        name: String,
        ms: u64,
    },
    Terminal {
        done: bool,
        #[serde(default)]
        failed_step: Option<usize>,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Parse JSON lines emitted by the script. Returns None if no terminal
/// record was seen (the script crashed before reporting).
fn parse_events(stdout: &str, names: &[String]) -> Option<ScriptOutput> {
    let mut steps = Vec::new();
    let mut terminal = None;

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ScriptEvent>(line) {
            Ok(ScriptEvent::Step { step, name, ms }) => {
                let name = if name == "connect" {
                    names.first().cloned().unwrap_or(name)
                } else {
                    name
                };
                steps.push(StepOutcome {
                    index: step,
                    name,
                    duration_ms: ms,
                });
            }
            Ok(ScriptEvent::Terminal {
                done,
                failed_step,
                error,
            }) => {
                terminal = Some(if done {
                    None
                } else {
                    let failed_step = failed_step.unwrap_or(0);
                    let step_name = names
                        .get(failed_step)
                        .cloned()
                        .unwrap_or_else(|| format!("step {}", failed_step));
                    Some(ScriptFailure {
                        failed_step,
                        message: format!(
                            "{}: {}",
                            step_name,
                            error.unwrap_or_else(|| "unknown error".to_string())
                        ),
                    })
                });
            }
            // Anything else on stdout (node warnings etc.) is ignored
            Err(_) => continue,
        }
    }

    terminal.map(|failure| ScriptOutput { steps, failure })
}

/// Check that Playwright is installed and return its version.
pub fn check_installed() -> SmokeResult<String> {
    let output = Command::new("npx")
        .args(["playwright", "--version"])
        .stdin(Stdio::null())
        .output();

    match output {
        Ok(out) if out.status.success() => {
            let banner = String::from_utf8_lossy(&out.stdout);
            let re = Regex::new(r"(\d+\.\d+\.\d+)").expect("static regex");
            Ok(re
                .captures(&banner)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| banner.trim().to_string()))
        }
        _ => Err(SmokeError::PlaywrightNotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FlowSpec;
    use test_case::test_case;

    fn driver() -> PlaywrightDriver {
        PlaywrightDriver::new_unchecked(BrowserConfig::default())
    }

    #[test_case(Locator::css("a[href=\"/premium\"]"), "page.locator('a[href=\"/premium\"]')"; "css")]
    #[test_case(Locator::role("heading", "Dashboard"), "page.getByRole('heading', { name: 'Dashboard' })"; "role")]
    fn test_locator_js(locator: Locator, expected: &str) {
        assert_eq!(locator_js(&locator).unwrap(), expected);
    }

    #[test]
    fn test_js_quote_escapes() {
        assert_eq!(js_quote("it's"), r"'it\'s'");
        assert_eq!(js_quote(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn test_build_premium_flow_script() {
        let script = driver().build_script(&FlowSpec::premium_flow()).unwrap();

        assert!(script.contains("chromium.launch({ headless: true })"));
        assert!(script.contains("viewport: { width: 400, height: 800 }"));
        assert!(script.contains("iPhone"));
        assert!(script.contains("waitUntil: 'domcontentloaded', timeout: 15000"));
        assert!(script.contains("page.getByRole('heading', { name: 'Dashboard' })"));
        assert!(script.contains("page.locator('a[href=\"/premium\"]').click"));
        assert!(script.contains("page.getByRole('button', { name: 'Restore Purchases' })"));
        assert!(script.contains("subscription-screen.png"));
        assert!(script.contains("error.png"));
        assert!(script.contains("await browser.close()"));
    }

    #[test]
    fn test_assert_timeout_override() {
        let config = BrowserConfig {
            assert_timeout_ms: Some(5_000),
            ..Default::default()
        };
        let driver = PlaywrightDriver::new_unchecked(config);
        let script = driver.build_script(&FlowSpec::premium_flow()).unwrap();
        assert!(script.contains("timeout: 5000"));
        assert!(!script.contains("timeout: 30000"));
    }

    #[test]
    fn test_parse_success_events() {
        let names = vec!["connect:http://localhost:8081".to_string(), "click:a".to_string()];
        let stdout = r#"
{"step":0,"name":"connect","ms":812}
{"step":1,"name":"click:a","ms":40}
{"done":true}
"#;
        let output = parse_events(stdout, &names).unwrap();
        assert_eq!(output.steps.len(), 2);
        assert_eq!(output.steps[0].name, "connect:http://localhost:8081");
        assert!(output.failure.is_none());
    }

    #[test]
    fn test_parse_failure_events() {
        let names = vec![
            "connect:http://localhost:8081".to_string(),
            "assert:role=heading[name=Dashboard]".to_string(),
        ];
        let stdout = r#"
{"step":0,"name":"connect","ms":812}
some stray node warning
{"done":false,"failed_step":1,"error":"Timeout 30000ms exceeded"}
"#;
        let output = parse_events(stdout, &names).unwrap();
        assert_eq!(output.steps.len(), 1);
        let failure = output.failure.unwrap();
        assert_eq!(failure.failed_step, 1);
        assert!(failure.message.contains("assert:role=heading[name=Dashboard]"));
        assert!(failure.message.contains("Timeout"));
    }

    #[test]
    fn test_parse_no_terminal() {
        assert!(parse_events("garbage\n", &[]).is_none());
    }
}
