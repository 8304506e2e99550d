//! Shipped flow specs stay loadable and render to valid scripts

use std::path::Path;

use gestor_e2e::script::{BrowserConfig, PlaywrightDriver};
use gestor_e2e::spec::{FlowSpec, FlowStep};

#[test]
fn shipped_specs_load_and_validate() {
    let specs = FlowSpec::load_all(Path::new("specs")).unwrap();
    assert_eq!(specs.len(), 2);

    // load_all sorts by name
    assert_eq!(specs[0].name, "login-screen");
    assert_eq!(specs[1].name, "premium-flow");

    for spec in &specs {
        spec.validate().unwrap();
        assert!(spec.tags.contains(&"smoke".to_string()));
        assert_eq!(spec.viewport.width, 400);
        assert_eq!(spec.viewport.height, 800);
    }
}

#[test]
fn shipped_premium_flow_matches_builtin() {
    let specs = FlowSpec::load_all(Path::new("specs")).unwrap();
    let shipped = specs.iter().find(|s| s.name == "premium-flow").unwrap();
    let builtin = FlowSpec::premium_flow();

    assert_eq!(shipped.steps.len(), builtin.steps.len());
    let names: Vec<String> = shipped.steps.iter().map(|s| s.step_name()).collect();
    let builtin_names: Vec<String> = builtin.steps.iter().map(|s| s.step_name()).collect();
    assert_eq!(names, builtin_names);
}

#[test]
fn shipped_specs_render_to_scripts() {
    let driver = PlaywrightDriver::new_unchecked(BrowserConfig::default());

    for spec in FlowSpec::load_all(Path::new("specs")).unwrap() {
        let script = driver.build_script(&spec).unwrap();
        assert!(script.contains("require('playwright')"));
        assert!(script.contains("await browser.close()"));

        for name in spec.screenshot_names() {
            assert!(script.contains(&format!("{}.png", name)));
        }
    }
}

#[test]
fn login_flow_navigates_before_asserting() {
    let specs = FlowSpec::load_all(Path::new("specs")).unwrap();
    let login = specs.iter().find(|s| s.name == "login-screen").unwrap();

    match &login.steps[0] {
        FlowStep::Navigate { path, .. } => assert_eq!(path, "/login"),
        other => panic!("expected navigate first, got {:?}", other),
    }
}
