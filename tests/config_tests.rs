use std::time::Duration;

use earth_canvas::config::Configuration;

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
server:
  base-url: "http://127.0.0.1:8188"
workflow:
  template-path: "workflow_api.json"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.server.base_url, "http://127.0.0.1:8188");
    assert_eq!(cfg.canvas.max_width, 800);
    assert_eq!(cfg.render.timeout, Duration::from_secs(600));
    assert_eq!(
        cfg.workflow.template_path,
        std::path::PathBuf::from("workflow_api.json")
    );
}

#[test]
fn parse_with_canvas_and_render_overrides() {
    let yaml = r#"
server:
  base-url: "http://render.local:8188"
canvas:
  max-width: 1024
render:
  timeout: 90s
workflow:
  template-path: "BuildingEditFast.json"
  slots:
    prompt-node: "6"
    image-node: "10"
    mask-node: "12"
    original-node: "14"
    seed-node: "3"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.canvas.max_width, 1024);
    assert_eq!(cfg.render.timeout, Duration::from_secs(90));
    assert_eq!(cfg.workflow.slots.prompt_node, "6");
    assert_eq!(cfg.workflow.slots.seed_node, "3");
}

#[test]
fn default_slots_match_building_edit_template() {
    let yaml = r#"
server:
  base-url: "http://127.0.0.1:8188"
workflow:
  template-path: "workflow_api.json"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.workflow.slots.prompt_node, "159");
    assert_eq!(cfg.workflow.slots.image_node, "18");
    assert_eq!(cfg.workflow.slots.mask_node, "11");
    assert_eq!(cfg.workflow.slots.original_node, "151");
}

#[test]
fn validation_rejects_non_http_url() {
    let yaml = r#"
server:
  base-url: "render.local:8188"
workflow:
  template-path: "workflow_api.json"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn validation_rejects_zero_canvas_width() {
    let yaml = r#"
server:
  base-url: "http://127.0.0.1:8188"
canvas:
  max-width: 0
workflow:
  template-path: "workflow_api.json"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn from_yaml_file_reports_missing_file() {
    let err = earth_canvas::config::from_yaml_file("/nonexistent/config.yaml").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/config.yaml"));
}
