//! Layering of config file, environment and CLI flags.

use clap::Parser;
use reelgen::cli::{load_config, Args, Command};
use reelgen::config::Config;
use reelgen::visuals::VisualKind;

fn write_json_config(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("reelgen.json");
    std::fs::write(
        &path,
        serde_json::json!({
            "output_dir": "from-file",
            "style": "watercolor",
            "music": "file-track",
            "duration": 20.0,
            "visuals": {"api_key": "file-key", "clips": 2}
        })
        .to_string(),
    )
    .unwrap();
    path
}

#[test]
fn test_file_then_env_then_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_json_config(dir.path());

    let mut config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.style.as_deref(), Some("watercolor"));
    assert_eq!(config.visuals.clips, 2);

    config
        .apply_env_from(|key| match key {
            "REELGEN_STYLE" => Some("noir".to_string()),
            "REELGEN_DURATION" => Some("30".to_string()),
            "FAL_API_KEY" => Some("env-key".to_string()),
            _ => None,
        })
        .unwrap();
    assert_eq!(config.style.as_deref(), Some("noir"));
    assert_eq!(config.duration, 30.0);
    assert_eq!(config.visuals.api_key.as_deref(), Some("env-key"));
    assert_eq!(config.music.as_deref(), Some("file-track"));

    let args = Args::parse_from([
        "reelgen", "generate", "a prompt", "--duration", "12", "--kind", "image",
    ]);
    let Command::Generate(generate) = args.command else {
        panic!("expected generate");
    };
    generate.apply_to(&mut config);
    assert_eq!(config.duration, 12.0);
    assert_eq!(config.style.as_deref(), Some("noir"));
    assert_eq!(config.visuals.kind, VisualKind::Image);
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_config_requires_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let err = load_config(Some(&missing)).unwrap_err();
    assert!(err.contains("does not exist"));
}

#[test]
fn test_toml_file_with_speakers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
narrate = true

[[speakers]]
name = "Peter"
voice_id = "abc"
side = "left"

[[speakers]]
name = "Stewie"
voice_id = "def"
speed = 1.2
side = "right"
"#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert!(config.narrate);
    assert_eq!(config.speakers.len(), 2);
    assert_eq!(config.speaker("stewie").unwrap().speed, 1.2);
    assert!(config.validate().is_ok());
}
