// The shipped defaults file must parse, validate, and match the built-in
// defaults.

use std::path::PathBuf;

use volley_app::config::{load_config_file, AppConfig};

fn defaults_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("defaults")
        .join("volley.toml")
}

#[test]
fn shipped_defaults_load() {
    let config = load_config_file(&defaults_path()).expect("defaults/volley.toml should load");
    let builtin = AppConfig::default();

    assert_eq!(config.engine, builtin.engine);
    assert_eq!(config.commentary.enabled, builtin.commentary.enabled);
    assert_eq!(config.commentary.timeout_secs, builtin.commentary.timeout_secs);
    assert_eq!(config.logging.filter, builtin.logging.filter);
    assert!(config.logging.log_file.is_none());
}
