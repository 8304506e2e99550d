//! Declarative YAML flow specification

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{SmokeError, SmokeResult};

/// User agent sent by default, matching a small-screen phone.
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 13_5 like Mac OS X) \
AppleWebKit/605.1.15 (KHTML, like Gecko) Version/13.1.1 Mobile/15E148 Safari/604.1";

/// Default per-assertion visibility timeout.
pub const DEFAULT_ASSERT_TIMEOUT_MS: u64 = 30_000;

/// A complete verification flow parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    /// Unique name for this flow
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering flows
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport size for the browser
    #[serde(default = "default_viewport")]
    pub viewport: Viewport,

    /// User agent override (defaults to a mobile UA)
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Steps to execute in order
    pub steps: Vec<FlowStep>,

    /// Whether screenshots are compared against baselines
    #[serde(default)]
    pub visual_regression: bool,

    /// Threshold for visual diff (0.0 - 100.0 percent). When absent the
    /// runner-wide threshold applies.
    #[serde(default)]
    pub visual_threshold: Option<f64>,
}

fn default_viewport() -> Viewport {
    // Phone-sized; the front-end is mobile-first
    Viewport { width: 400, height: 800 }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Element addressing: either a raw CSS selector or an ARIA role plus
/// accessible name. Exactly one of the two forms must be given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Locator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator {
            selector: Some(selector.into()),
            ..Default::default()
        }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Locator {
            role: Some(role.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Check that exactly one addressing form is present.
    pub fn validate(&self) -> SmokeResult<()> {
        match (&self.selector, &self.role) {
            (Some(_), None) => Ok(()),
            (None, Some(_)) if self.name.is_some() => Ok(()),
            (None, Some(_)) => Err(SmokeError::Locator(
                "role locator requires an accessible name".to_string(),
            )),
            (Some(_), Some(_)) => Err(SmokeError::Locator(
                "locator has both a selector and a role".to_string(),
            )),
            (None, None) => Err(SmokeError::Locator(
                "locator needs a selector or a role".to_string(),
            )),
        }
    }

    /// Short form used in step names and logs.
    pub fn describe(&self) -> String {
        match (&self.selector, &self.role, &self.name) {
            (Some(sel), _, _) => sel.clone(),
            (None, Some(role), Some(name)) => format!("role={}[name={}]", role, name),
            _ => "<invalid locator>".to_string(),
        }
    }
}

/// A single step in a flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FlowStep {
    /// Load a path relative to the discovered base URL
    Navigate {
        #[serde(default)]
        path: String,
        #[serde(default)]
        wait_for: Option<Locator>,
    },

    /// Click an element
    Click {
        #[serde(flatten)]
        target: Locator,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Fill an input field
    Fill {
        #[serde(flatten)]
        target: Locator,
        value: String,
    },

    /// Wait for an element to reach a state
    Wait {
        #[serde(flatten)]
        target: Locator,
        #[serde(default = "default_assert_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },

    /// Assert visibility (and optionally text) of an element
    Assert {
        #[serde(flatten)]
        target: Locator,
        #[serde(default = "default_true")]
        visible: bool,
        #[serde(default)]
        text_contains: Option<String>,
        #[serde(default = "default_assert_timeout")]
        timeout_ms: u64,
    },

    /// Take a screenshot
    Screenshot {
        name: String,
        #[serde(default)]
        full_page: bool,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep { ms: u64 },
}

fn default_assert_timeout() -> u64 {
    DEFAULT_ASSERT_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl FlowStep {
    /// Name used in logs and step outcomes.
    pub fn step_name(&self) -> String {
        match self {
            FlowStep::Navigate { path, .. } => format!("navigate:{}", path),
            FlowStep::Click { target, .. } => format!("click:{}", target.describe()),
            FlowStep::Fill { target, .. } => format!("fill:{}", target.describe()),
            FlowStep::Wait { target, .. } => format!("wait:{}", target.describe()),
            FlowStep::Assert { target, .. } => format!("assert:{}", target.describe()),
            FlowStep::Screenshot { name, .. } => format!("screenshot:{}", name),
            FlowStep::Sleep { ms } => format!("sleep:{}ms", ms),
        }
    }

    fn locator(&self) -> Option<&Locator> {
        match self {
            FlowStep::Navigate { wait_for, .. } => wait_for.as_ref(),
            FlowStep::Click { target, .. }
            | FlowStep::Fill { target, .. }
            | FlowStep::Wait { target, .. }
            | FlowStep::Assert { target, .. } => Some(target),
            FlowStep::Screenshot { .. } | FlowStep::Sleep { .. } => None,
        }
    }
}

impl FlowSpec {
    /// Parse a flow spec from YAML
    pub fn from_yaml(yaml: &str) -> SmokeResult<Self> {
        let spec: FlowSpec = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a flow spec from a YAML file
    pub fn from_file(path: &Path) -> SmokeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all flow specs from a directory
    pub fn load_all(dir: &Path) -> SmokeResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }

        specs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(specs)
    }

    /// Check every locator in the flow.
    pub fn validate(&self) -> SmokeResult<()> {
        if self.steps.is_empty() {
            return Err(SmokeError::SpecParse(format!(
                "flow '{}' has no steps",
                self.name
            )));
        }
        for step in &self.steps {
            if let Some(locator) = step.locator() {
                locator.validate().map_err(|e| {
                    SmokeError::SpecParse(format!(
                        "flow '{}', step '{}': {}",
                        self.name,
                        step.step_name(),
                        e
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Screenshot names this flow produces, in order.
    pub fn screenshot_names(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                FlowStep::Screenshot { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Built-in flow verifying the dashboard header and the premium
    /// subscription screen. Used when no specs directory is present.
    pub fn premium_flow() -> Self {
        FlowSpec {
            name: "premium-flow".to_string(),
            description: "Dashboard header and subscription screen verification".to_string(),
            tags: vec!["smoke".to_string(), "premium".to_string()],
            viewport: default_viewport(),
            user_agent: Some(MOBILE_USER_AGENT.to_string()),
            steps: vec![
                FlowStep::Assert {
                    target: Locator::role("heading", "Dashboard"),
                    visible: true,
                    text_contains: None,
                    timeout_ms: DEFAULT_ASSERT_TIMEOUT_MS,
                },
                FlowStep::Assert {
                    target: Locator::css(r#"a[href="/premium"]"#),
                    visible: true,
                    text_contains: None,
                    timeout_ms: DEFAULT_ASSERT_TIMEOUT_MS,
                },
                FlowStep::Click {
                    target: Locator::css(r#"a[href="/premium"]"#),
                    timeout_ms: None,
                },
                FlowStep::Assert {
                    target: Locator::role("heading", "Choose a Plan"),
                    visible: true,
                    text_contains: None,
                    timeout_ms: DEFAULT_ASSERT_TIMEOUT_MS,
                },
                FlowStep::Assert {
                    target: Locator::role("button", "Restore Purchases"),
                    visible: true,
                    text_contains: None,
                    timeout_ms: DEFAULT_ASSERT_TIMEOUT_MS,
                },
                FlowStep::Screenshot {
                    name: "subscription-screen".to_string(),
                    full_page: false,
                },
            ],
            visual_regression: false,
            visual_threshold: None,
        }
    }
}
