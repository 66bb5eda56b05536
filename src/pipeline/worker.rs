use log::{debug, info, warn};

use super::CostPipeline;
use crate::cost::{CloudProvider, JobDuration};
use crate::models::{JobCostEntry, JobLink, PrCostReport, PullRequestRef};
use crate::retest::count_retests_in_comments;

impl CostPipeline<'_> {
    /// Build the cost report of one PR. Failures of the external calls degrade
    /// the report (no jobs, unknown durations, zero retests) instead of failing it.
    pub async fn process_pull_request(&self, pr: &PullRequestRef) -> PrCostReport {
        let links = match self.client.discover_job_links(pr).await {
            Ok(links) => links,
            Err(e) => {
                warn!("{pr}: job discovery failed, reporting no jobs: {e}");
                Vec::new()
            }
        };

        let mut jobs = Vec::with_capacity(links.len());
        for link in links {
            jobs.push(self.cost_job(pr, link).await);
        }

        let retest_count = match self.client.fetch_comment_bodies(pr).await {
            Ok(bodies) => count_retests_in_comments(bodies.iter().map(String::as_str)),
            Err(e) => {
                warn!("{pr}: comment fetch failed, counting no retests: {e}");
                0
            }
        };

        let report = PrCostReport::new(pr, jobs, retest_count, &self.config.rates);
        info!(
            "{pr}: {} jobs, {retest_count} retests, ${:.2}",
            report.jobs.len(),
            report.total_cost
        );
        report
    }

    async fn cost_job(&self, pr: &PullRequestRef, link: JobLink) -> JobCostEntry {
        let provider = link.provider();

        let duration = if self.config.resolves_duration(provider) {
            self.client.resolve_duration(pr, &link).await
        } else {
            if provider == CloudProvider::Unclassified {
                info!("{pr}: unknown job type, cannot calculate costs for {}", link.url);
            } else {
                debug!("{pr}: skipping duration lookup for {} job {}", provider.label(), link.job_name);
            }
            JobDuration::Skipped
        };

        JobCostEntry::new(link, provider, duration, &self.config.rates)
    }
}
