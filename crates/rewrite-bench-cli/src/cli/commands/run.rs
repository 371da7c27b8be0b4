use super::exit_codes;
use crate::cli::args::RunArgs;
use rewrite_bench_core::config::{load_config, EvalConfig};
use rewrite_bench_core::db::postgres::PgDatabase;
use rewrite_bench_core::energy::RaplMeter;
use rewrite_bench_core::engine::{Evaluator, RunAborted, RunSettings};
use rewrite_bench_core::model::PromptMode;
use rewrite_bench_core::on_error::RewriteFailurePolicy;
use rewrite_bench_core::rewrite::RewriteInvoker;
use std::path::Path;
use std::sync::Arc;

fn apply_overrides(cfg: &mut EvalConfig, args: &RunArgs) -> Result<(), String> {
    if let Some(mode) = &args.mode {
        cfg.rewrite.mode = mode.parse::<PromptMode>()?;
    }
    if let Some(policy) = &args.on_rewrite_failure {
        cfg.rewrite.on_failure = policy.parse::<RewriteFailurePolicy>()?;
    }
    if let Some(results) = &args.results {
        cfg.results = results.to_string_lossy().to_string();
    }
    Ok(())
}

pub async fn cmd_run(args: RunArgs) -> anyhow::Result<i32> {
    let mut cfg = match load_config(&args.config, args.strict) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    if let Err(e) = apply_overrides(&mut cfg, &args) {
        eprintln!("config error: {}", e);
        return Ok(exit_codes::CONFIG_ERROR);
    }

    let mut queries = rewrite_bench_core::corpus::read_queries(Path::new(&cfg.corpus))?;
    if let Some(limit) = args.limit {
        queries.truncate(limit);
    }
    if queries.is_empty() {
        eprintln!("config error: corpus {} contains no queries", cfg.corpus);
        return Ok(exit_codes::CONFIG_ERROR);
    }

    let client = match rewrite_bench_core::providers::build_client(&cfg.rewrite) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {:#}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    let invoker = RewriteInvoker::new(client, cfg.rewrite.retry.clone());

    let settings = match RunSettings::from_config(&cfg) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let url = match cfg.database.connection_url() {
        Ok(u) => u,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    let db = match PgDatabase::connect(&cfg.database.name, &url, cfg.database.statement_timeout_ms)
        .await
    {
        Ok(db) => db,
        Err(e) => {
            eprintln!("database error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let mut evaluator = Evaluator::new(Arc::new(db), invoker, settings).with_progress(!args.quiet);
    if cfg.energy.enabled {
        match RaplMeter::discover(
            Path::new(&cfg.energy.powercap_root),
            cfg.energy.carbon_intensity_g_per_kwh,
        ) {
            Ok(meter) => evaluator = evaluator.with_energy(Arc::new(meter)),
            Err(e) => tracing::warn!(
                event = "energy.unavailable",
                error = %format!("{:#}", e),
                "energy measurement disabled; emission columns stay empty"
            ),
        }
    }

    let results = cfg.results_path();
    let mut sink = rewrite_bench_core::storage::open_sink(&results)?;

    match evaluator.run_corpus(&queries, sink.as_mut()).await {
        Ok(summary) => {
            rewrite_bench_core::report::print_run_summary(&summary);
            Ok(exit_codes::OK)
        }
        Err(e) => match e.downcast_ref::<RunAborted>() {
            Some(aborted) => {
                rewrite_bench_core::report::print_run_summary(&aborted.summary);
                eprintln!("{}", aborted);
                Ok(exit_codes::RUN_ABORTED)
            }
            None => Err(e),
        },
    }
}
