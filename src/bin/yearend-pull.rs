use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use yearend_pull::{logging, write_report, PullConfig, ReportFormat, YearEndPullController};

#[derive(Parser)]
#[command(
    name = "yearend-pull",
    version,
    about = "Pull year-end work periods and compute per-year windows"
)]
struct Cli {
    /// TOML config file. Flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// First pull year (also the month-offset reference year).
    #[arg(long)]
    start_year: Option<i32>,

    /// Last pull year, inclusive.
    #[arg(long)]
    end_year: Option<i32>,

    /// Directory holding the query extracts.
    #[arg(long)]
    source: Option<PathBuf>,

    /// Directory the report is written to.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report format: csv or parquet.
    #[arg(long)]
    format: Option<ReportFormat>,

    /// Skip the transaction checks.
    #[arg(long)]
    no_check: bool,
}

impl Cli {
    fn into_config(self) -> Result<PullConfig> {
        let mut config = match &self.config {
            Some(path) => PullConfig::from_file(path)?,
            None => PullConfig::default(),
        };

        if let Some(year) = self.start_year {
            config.pull.start_year = Some(year);
        }
        if let Some(year) = self.end_year {
            config.pull.end_year = Some(year);
        }
        if let Some(path) = self.source {
            config.source.base_path = path;
        }
        if let Some(path) = self.output {
            config.pull.output_path = path;
        }
        if let Some(format) = self.format {
            config.pull.format = format;
        }
        if self.no_check {
            config.pull.check_for_errors = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() {
    logging::init("info");
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = Cli::parse().into_config().context("load configuration")?;

    let controller = YearEndPullController::from_config(&config)?;
    info!(
        base_path = %controller.source().base_path().display(),
        "reading query extracts"
    );
    let pull = controller
        .pull_year_end(config.pull.check_for_errors)
        .context("year end pull")?;

    for (year, window) in &pull.windows {
        info!(pull_year = year, active = window.height(), "window");
    }

    let written = write_report(&pull, &config.pull.output_path, config.pull.format)
        .with_context(|| format!("write report to {}", config.pull.output_path.display()))?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}
