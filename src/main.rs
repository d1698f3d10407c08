use anyhow::Context;
use clap::Parser;
use sheetsync::cli::{Cli, Command};
use sheetsync::config::Config;
use sheetsync::fetch::HttpSource;
use sheetsync::pipeline;
use sheetsync::report;
use sheetsync::util;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn log_memory_usage() {
    if let Some(usage) = memory_stats::memory_stats() {
        tracing::debug!("resident memory: {}", util::format_bytes(usage.physical_mem as u64));
    }
}

fn deployment_id(secret: &str) -> Option<String> {
    std::env::var(secret).ok()
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_args(&cli.global).context("failed to load configuration")?;

    match cli.command {
        Command::Run(args) => {
            config.ensure_dirs().context("failed to create working directories")?;
            let source = HttpSource::new(config.fetch_timeout)?;
            let result = pipeline::run(&config, &source, deployment_id, args.force)
                .context("run failed")?;
            print!("{}", report::table::render_fetch(&result.fetch));
            print!("{}", report::table::render_outcome(&result.sync));
        }
        Command::Fetch => {
            config.ensure_dirs().context("failed to create working directories")?;
            let source = HttpSource::new(config.fetch_timeout)?;
            let result = sheetsync::fetch::fetch_all(&config, &source, deployment_id)
                .context("fetch failed")?;
            print!("{}", report::table::render_fetch(&result));
        }
        Command::Sync(args) => {
            config.ensure_dirs().context("failed to create working directories")?;
            let outcome = pipeline::sync(&config, args.force).context("sync failed")?;
            print!("{}", report::table::render_outcome(&outcome));
        }
        Command::Status(args) => {
            let status = report::collect(&config).context("failed to read status")?;
            report::print_status(&status, args.json);
        }
    }

    log_memory_usage();
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
