use log::{debug, warn};
use serde::Deserialize;
use url::Url;

use super::core::CiClient;
use crate::cost::JobDuration;
use crate::error::{CostError, Result};
use crate::models::{JobLink, PullRequestRef};

#[derive(Debug, Deserialize)]
struct TimingArtifact {
    timestamp: Option<f64>,
}

impl CiClient {
    fn artifact_url(&self, pr: &PullRequestRef, job: &JobLink, file: &str) -> Result<Url> {
        Self::join(
            &self.endpoints().artifacts,
            &format!(
                "pr-logs/pull/{}_{}/{}/{}/{}/{file}",
                pr.org, pr.repo, pr.number, job.job_name, job.run_id
            ),
        )
    }

    async fn fetch_timestamp(&self, url: Url) -> Result<f64> {
        let artifact = self.get(url.clone(), None).await?.json::<TimingArtifact>().await?;
        artifact
            .timestamp
            .ok_or_else(|| CostError::Api(format!("No timestamp in {url}")))
    }

    /// Billable duration of a job run from its `started.json` and `finished.json`.
    ///
    /// Aborted or still-running jobs may lack either artifact, so every failure
    /// here yields [`JobDuration::Unknown`] instead of an error.
    pub async fn resolve_duration(&self, pr: &PullRequestRef, job: &JobLink) -> JobDuration {
        match self.fetch_run_window(pr, job).await {
            Ok((started, finished)) => {
                let duration = JobDuration::from_timestamps(started, finished);
                debug!("{pr}: {} run {} took {duration:?}", job.job_name, job.run_id);
                duration
            }
            Err(e) => {
                warn!(
                    "{pr}: unknown duration for {} run {}: {e}",
                    job.job_name, job.run_id
                );
                JobDuration::Unknown
            }
        }
    }

    async fn fetch_run_window(&self, pr: &PullRequestRef, job: &JobLink) -> Result<(f64, f64)> {
        let started_url = self.artifact_url(pr, job, "started.json")?;
        let finished_url = self.artifact_url(pr, job, "finished.json")?;

        tokio::try_join!(
            self.fetch_timestamp(started_url),
            self.fetch_timestamp(finished_url)
        )
    }
}
