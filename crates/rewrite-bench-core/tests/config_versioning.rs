use rewrite_bench_core::config::{load_config, ProviderKind, SAMPLE_CONFIG};
use rewrite_bench_core::model::PromptMode;
use rewrite_bench_core::on_error::RewriteFailurePolicy;
use rewrite_bench_core::stats::OutlierPolicy;
use std::path::Path;
use tempfile::tempdir;

fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, body).unwrap();
    p
}

const MINIMAL: &str = r#"
corpus: queries.sql
database:
  name: tpch
rewrite:
  provider: fake
  model: org/model:7b
"#;

#[test]
fn test_minimal_config_gets_defaults() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "bench.yaml", MINIMAL);

    let cfg = load_config(&path, true).unwrap();
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.rewrite.provider, ProviderKind::Fake);
    assert_eq!(cfg.rewrite.mode, PromptMode::ZeroShot);
    assert_eq!(cfg.rewrite.on_failure, RewriteFailurePolicy::Skip);
    assert_eq!(cfg.rewrite.retry.max_attempts, 5);
    assert_eq!(cfg.rewrite.retry.delay_ms, 5000);
    assert_eq!(cfg.database.url_env, "DATABASE_URL");
    assert!(cfg.database.explain);
    assert!(!cfg.energy.enabled);
    assert_eq!(cfg.stats.outliers, OutlierPolicy::FixedThreshold);
    assert_eq!(cfg.stats.ceilings.speedup, Some(3.0));
}

#[test]
fn test_relative_paths_resolve_against_config_dir() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "bench.yaml", MINIMAL);

    let cfg = load_config(&path, false).unwrap();
    assert_eq!(Path::new(&cfg.corpus), dir.path().join("queries.sql"));
    assert!(Path::new(&cfg.results).starts_with(dir.path()));
}

#[test]
fn test_results_placeholders_are_filled_and_sanitized() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "bench.yaml", MINIMAL);

    let cfg = load_config(&path, false).unwrap();
    let results = cfg.results_path();
    let name = results.file_name().unwrap().to_string_lossy().to_string();
    assert_eq!(name, "org_model_7b_zero-shot.csv");
}

#[test]
fn test_unknown_keys_warn_or_fail() {
    let dir = tempdir().unwrap();
    let body = format!("{}\nunexpected: true\nx-team: data\n_anchor: 1\n", MINIMAL);
    let path = write(dir.path(), "bench.yaml", &body);

    assert!(load_config(&path, false).is_ok());

    let err = load_config(&path, true).unwrap_err();
    assert!(err.to_string().contains("unexpected"));
    assert!(!err.to_string().contains("x-team"));
}

#[test]
fn test_unsupported_version_is_rejected() {
    let dir = tempdir().unwrap();
    let body = format!("version: 2\n{}", MINIMAL);
    let path = write(dir.path(), "bench.yaml", &body);

    let err = load_config(&path, false).unwrap_err();
    assert!(err.to_string().contains("unsupported config version 2"));
}

#[test]
fn test_replay_requires_a_file() {
    let dir = tempdir().unwrap();
    let body = MINIMAL.replace("provider: fake", "provider: replay");
    let path = write(dir.path(), "bench.yaml", &body);

    let err = load_config(&path, false).unwrap_err();
    assert!(err.to_string().contains("replay_file"));
}

#[test]
fn test_zero_attempts_is_invalid() {
    let dir = tempdir().unwrap();
    let body = format!("{}  retry:\n    max_attempts: 0\n", MINIMAL);
    let path = write(dir.path(), "bench.yaml", &body);

    let err = load_config(&path, false).unwrap_err();
    assert!(err.to_string().contains("rewrite.retry.max_attempts"));
}

#[test]
fn test_energy_intensity_must_be_a_non_negative_number() {
    let dir = tempdir().unwrap();
    for value in ["-1.0", ".nan", ".inf"] {
        let body = format!(
            "{}energy:\n  enabled: true\n  carbon_intensity_g_per_kwh: {}\n",
            MINIMAL, value
        );
        let path = write(dir.path(), "bench.yaml", &body);
        let err = load_config(&path, false).unwrap_err();
        assert!(
            err.to_string().contains("carbon_intensity_g_per_kwh"),
            "{} accepted",
            value
        );
    }

    let body = format!(
        "{}energy:\n  enabled: false\n  carbon_intensity_g_per_kwh: -1.0\n",
        MINIMAL
    );
    let path = write(dir.path(), "bench.yaml", &body);
    assert!(load_config(&path, false).is_ok());
}

#[test]
fn test_sample_config_loads_strictly() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "rewrite-bench.yaml", SAMPLE_CONFIG);

    let cfg = load_config(&path, true).unwrap();
    assert_eq!(cfg.rewrite.provider, ProviderKind::Openai);
    assert!(cfg.schema_hint_text().unwrap().contains("customer("));
}
