mod config;
mod main_lib;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use config::Config;
use main_lib::{init_tracing, render, today_in_vietnam};
use sbv_rate_market_data::{LogReporter, SourceRegistry, SourceSet};

/// Look up the State Bank of Vietnam USD-VND central rate.
#[derive(Parser, Debug)]
#[command(name = "sbv-rate", version, about)]
struct Cli {
    /// Date to look up (YYYY-MM-DD). Defaults to today in Vietnam.
    date: Option<String>,

    /// Report every source attempt as it happens.
    #[arg(long)]
    debug: bool,

    /// "portal", "all", or a comma list such as "portal,xml,intl".
    #[arg(long)]
    sources: Option<SourceSet>,

    /// Print the full result as JSON.
    #[arg(long)]
    json: bool,

    /// Save the portal pages seen during a --debug lookup to this directory.
    #[arg(long, value_name = "DIR")]
    page_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(sources) = cli.sources {
        config.source.sources = sources;
    }

    let date = cli.date.unwrap_or_else(today_in_vietnam);
    let registry = SourceRegistry::from_config(&config.source);
    tracing::debug!("Sources: {:?}", registry.source_ids());

    let reporter = match cli.page_dir.or(config.page_dir) {
        Some(dir) => LogReporter::with_page_dir(dir),
        None => LogReporter::default(),
    };

    let result = match registry.get_rate(&date, cli.debug, &reporter).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(ExitCode::from(2));
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", render(&result));
    }

    Ok(if result.is_found() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
