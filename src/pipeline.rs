mod worker;

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use log::{info, warn};

use crate::client::CiClient;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::{PullRequestRef, ReportCollection};

pub struct CostPipeline<'a> {
    client: &'a CiClient,
    config: PipelineConfig,
}

impl<'a> CostPipeline<'a> {
    pub fn new(client: &'a CiClient, config: PipelineConfig) -> Self {
        Self { client, config }
    }

    /// List the PRs closed in `[start, end]` and cost each of them.
    /// A listing failure aborts the run; PR-level failures only degrade reports.
    pub async fn run(
        &self,
        org: &str,
        repo: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ReportCollection> {
        info!("Listing pull requests of {org}/{repo} closed between {start} and {end}");

        let pull_requests = self
            .client
            .list_closed_pull_requests(org, repo, start, end)
            .await?;

        if pull_requests.is_empty() {
            warn!("No pull requests found for {org}/{repo}");
        }

        Ok(self.aggregate(pull_requests).await)
    }

    /// Run one worker per PR with at most `concurrency` in flight, then sort by cost.
    pub async fn aggregate(&self, pull_requests: Vec<PullRequestRef>) -> ReportCollection {
        let launched = pull_requests.len();
        let concurrency = self.config.concurrency.max(1);
        info!("Costing {launched} pull requests ({concurrency} at a time)...");

        let reports: Vec<_> = stream::iter(pull_requests)
            .map(|pr| async move { self.process_pull_request(&pr).await })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        info!("Collected {} of {launched} reports", reports.len());
        ReportCollection::new(reports)
    }
}
