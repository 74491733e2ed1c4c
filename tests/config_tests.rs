use sql_source_tracer::config::{BackendKind, Config, LimitsConfig, SearchConfig, Thresholds};

#[test]
fn test_default_config() {
    let config = Config::default();

    assert!(config.project_root.is_none());
    assert_eq!(config.search.backend, BackendKind::Ripgrep);
    assert_eq!(config.search.ripgrep_path, "rg");
    assert_eq!(config.limits.max_results, 10);
    assert_eq!(config.limits.max_patterns, 5);
}

#[test]
fn test_default_thresholds() {
    let thresholds = Thresholds::default();

    assert_eq!(thresholds.cascade_window_ms, 50);
    assert_eq!(thresholds.min_identifier_digits, 4);
    assert_eq!(thresholds.min_quoted_token_len, 3);
    assert_eq!(thresholds.rule_base_confidence, 0.6);
    assert_eq!(thresholds.high_band, 0.9);
    assert_eq!(thresholds.medium_band, 0.7);
    assert_eq!(thresholds.partial_band, 0.4);
}

#[test]
fn test_from_toml_partial() {
    let config = Config::from_toml(
        r#"
project_root = "/srv/app"

[search]
backend = "walk"

[thresholds]
cascade_window_ms = 120
"#
    )
    .unwrap();

    assert_eq!(config.project_root.as_deref(), Some(std::path::Path::new("/srv/app")));
    assert_eq!(config.search.backend, BackendKind::Walk);
    assert_eq!(config.search.timeout_secs, SearchConfig::default().timeout_secs);
    assert_eq!(config.thresholds.cascade_window_ms, 120);
    assert_eq!(config.thresholds.min_identifier_digits, 4);
    assert_eq!(config.limits.max_results, LimitsConfig::default().max_results);
}

#[test]
fn test_from_toml_rejects_unknown_backend() {
    assert!(Config::from_toml("[search]\nbackend = \"grep\"\n").is_err());
}

#[test]
fn test_from_toml_empty() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config.thresholds, Thresholds::default());
}

#[test]
fn test_backend_from_str() {
    assert_eq!("ripgrep".parse::<BackendKind>(), Ok(BackendKind::Ripgrep));
    assert_eq!("RG".parse::<BackendKind>(), Ok(BackendKind::Ripgrep));
    assert_eq!("walk".parse::<BackendKind>(), Ok(BackendKind::Walk));
    assert!("ag".parse::<BackendKind>().is_err());
}
