use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;

use crate::client::CiClient;
use crate::config::{
    AzureDurations, ClientConfig, Endpoints, PipelineConfig, DEFAULT_ARTIFACTS_URL,
    DEFAULT_CONCURRENCY, DEFAULT_GITHUB_URL, DEFAULT_PROW_URL, DEFAULT_RETRIES,
    DEFAULT_RETRY_BACKOFF, DEFAULT_TIMEOUT_SECS,
};
use crate::cost::CostRates;
use crate::pipeline::CostPipeline;

#[derive(Parser)]
#[command(name = "prcost")]
#[command(author, version, about = "Pull request CI cost estimator", long_about = None)]
pub struct Cli {
    /// GitHub organization
    org: String,

    /// GitHub repository
    repo: String,

    /// First day of the closed-date window (MM-DD-YYYY)
    #[arg(value_parser = parse_date)]
    start: DateTime<Utc>,

    /// Last day of the closed-date window (MM-DD-YYYY)
    #[arg(value_parser = parse_date)]
    end: DateTime<Utc>,

    /// Output file path
    #[arg(short, long, default_value = "pr_costs.json")]
    output: PathBuf,

    /// Pretty print JSON output
    #[arg(short, long, default_value_t = false)]
    pretty: bool,

    /// Number of pull requests processed concurrently
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Retries for transient HTTP failures
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    retries: u32,

    /// Do not look up Azure job durations (bills them at zero hours)
    #[arg(long, default_value_t = false)]
    skip_azure_durations: bool,

    /// GitHub API URL
    #[arg(long, env = "PRCOST_GITHUB_URL", default_value = DEFAULT_GITHUB_URL)]
    github_url: String,

    /// Prow dashboard URL
    #[arg(long, env = "PRCOST_PROW_URL", default_value = DEFAULT_PROW_URL)]
    prow_url: String,

    /// Job artifacts bucket URL
    #[arg(long, env = "PRCOST_ARTIFACTS_URL", default_value = DEFAULT_ARTIFACTS_URL)]
    artifacts_url: String,
}

fn parse_date(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    NaiveDate::parse_from_str(value, "%m-%d-%Y")
        .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
        .map_err(|e| format!("expected MM-DD-YYYY: {e}"))
}

impl Cli {
    fn client_config(&self) -> Result<ClientConfig> {
        let endpoints = Endpoints::new(&self.github_url, &self.prow_url, &self.artifacts_url)?;
        Ok(ClientConfig {
            endpoints,
            timeout: Duration::from_secs(self.timeout),
            retries: self.retries,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        })
    }

    fn pipeline_config(&self) -> PipelineConfig {
        let azure_durations = if self.skip_azure_durations {
            AzureDurations::Skip
        } else {
            AzureDurations::Resolve
        };

        PipelineConfig {
            concurrency: self.concurrency,
            rates: CostRates::default(),
            azure_durations,
        }
    }

    pub async fn execute(&self) -> Result<()> {
        if self.start > self.end {
            bail!("Start date {} is after end date {}", self.start, self.end);
        }
        if self.concurrency == 0 {
            bail!("Concurrency must be at least 1");
        }
        if self.skip_azure_durations {
            warn!("Azure job durations will not be resolved; Azure jobs are billed at zero hours");
        }

        info!("Collecting PR costs for {}/{}", self.org, self.repo);

        let client = CiClient::new(self.client_config()?)?;
        let config = self.pipeline_config();
        let rates = config.rates;
        let pipeline = CostPipeline::new(&client, config);

        let reports = pipeline
            .run(&self.org, &self.repo, self.start, self.end)
            .await
            .context("Failed to get pull requests")?;

        reports
            .write_json(&self.output, self.pretty)
            .with_context(|| format!("Failed to write {}", self.output.display()))?;
        info!(
            "Report of {} pull requests written to: {}",
            reports.len(),
            self.output.display()
        );

        if reports.is_empty() {
            println!("No pull requests closed between {} and {}", self.start, self.end);
        } else {
            print!("{}", reports.summary(&rates));
        }

        Ok(())
    }
}
