use super::exit_codes;
use crate::cli::args::StatsArgs;
use rewrite_bench_core::config::load_config;
use rewrite_bench_core::report::{render_stats_json, render_stats_text};
use rewrite_bench_core::stats::{aggregate, OutlierPolicy, StatsSettings};
use std::path::PathBuf;

pub fn cmd_stats(args: StatsArgs) -> anyhow::Result<i32> {
    let (path, mut settings): (PathBuf, StatsSettings) = match (&args.results, &args.config) {
        (Some(results), _) => (results.clone(), StatsSettings::default()),
        (None, Some(config)) => match load_config(config, false) {
            Ok(cfg) => (cfg.results_path(), cfg.stats.clone()),
            Err(e) => {
                eprintln!("config error: {}", e);
                return Ok(exit_codes::CONFIG_ERROR);
            }
        },
        (None, None) => {
            eprintln!("config error: pass --config or --results");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    if let Some(policy) = &args.outliers {
        settings.outliers = match policy.parse::<OutlierPolicy>() {
            Ok(p) => p,
            Err(e) => {
                eprintln!("config error: {}", e);
                return Ok(exit_codes::CONFIG_ERROR);
            }
        };
    }
    if args.require_signature {
        settings.require_signature = true;
    }

    let records = match rewrite_bench_core::storage::load_records(&path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    let report = aggregate(&records, &settings, &path.display().to_string());

    let rendered = match args.format.as_str() {
        "json" => render_stats_json(&report)?,
        "text" => render_stats_text(&report),
        other => {
            eprintln!("config error: unknown format '{}' (expected text or json)", other);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    match &args.out {
        Some(out) => {
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, &rendered)?;
            eprintln!("wrote {}", out.display());
        }
        None => print!("{}", rendered),
    }
    Ok(exit_codes::OK)
}
