use super::args::*;
use std::path::Path;

pub mod run;
pub mod stats;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const RUN_ABORTED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Init(args) => cmd_init(args),
        Command::Run(args) => run::cmd_run(args).await,
        Command::Stats(args) => stats::cmd_stats(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_init(args: InitArgs) -> anyhow::Result<i32> {
    write_file_if_missing(&args.config, rewrite_bench_core::config::SAMPLE_CONFIG)?;

    // The sample config names `queries.sql` next to itself.
    let corpus = match args.config.parent() {
        Some(dir) if args.corpus.is_relative() => dir.join(&args.corpus),
        _ => args.corpus.clone(),
    };
    write_file_if_missing(&corpus, rewrite_bench_core::config::SAMPLE_CORPUS)?;

    if args.gitignore {
        let dir = args.config.parent().unwrap_or(Path::new("."));
        write_file_if_missing(&dir.join(".gitignore"), crate::templates::GITIGNORE)?;
    }
    Ok(exit_codes::OK)
}

fn write_file_if_missing(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::write(path, content)?;
        eprintln!("created {}", path.display());
    } else {
        eprintln!("note: {} already exists (skipped)", path.display());
    }
    Ok(())
}
