use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::cost::{CloudProvider, CostRates, JobDuration, ProviderHours};
use crate::error::Result;

/// A closed pull request selected for analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequestRef {
    pub org: String,
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl PullRequestRef {
    /// Days between creation and close; zero when the PR has no close time
    /// or the close precedes creation.
    pub fn lifespan_days(&self) -> f64 {
        let Some(closed) = self.closed_at else {
            return 0.0;
        };
        if closed < self.created_at {
            warn!("{self}: closed at {closed} before it was created at {}", self.created_at);
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let days = (closed - self.created_at).num_seconds() as f64 / 3600.0 / 24.0;
        days
    }
}

impl std::fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.org, self.repo, self.number)
    }
}

/// One job run discovered on a PR's CI history page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLink {
    pub url: String,
    pub job_name: String,
    pub run_id: String,
}

impl JobLink {
    pub fn provider(&self) -> CloudProvider {
        CloudProvider::classify(&self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCostEntry {
    pub url: String,
    pub job_name: String,
    pub run_id: String,
    pub provider: CloudProvider,
    pub duration: JobDuration,
    pub cost: f64,
}

impl JobCostEntry {
    pub fn new(
        link: JobLink,
        provider: CloudProvider,
        duration: JobDuration,
        rates: &CostRates,
    ) -> Self {
        Self {
            cost: rates.job_cost(provider, duration),
            url: link.url,
            job_name: link.job_name,
            run_id: link.run_id,
            provider,
            duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrCostReport {
    pub org: String,
    pub repo: String,
    pub number: u64,
    pub lifespan_days: f64,
    pub retest_count: usize,
    pub jobs: Vec<JobCostEntry>,
    pub provider_hours: ProviderHours,
    pub total_cost: f64,
}

impl PrCostReport {
    pub fn new(
        pr: &PullRequestRef,
        jobs: Vec<JobCostEntry>,
        retest_count: usize,
        rates: &CostRates,
    ) -> Self {
        let provider_hours = jobs.iter().fold(ProviderHours::default(), |mut hours, job| {
            hours.add(job.provider, job.duration);
            hours
        });

        Self {
            org: pr.org.clone(),
            repo: pr.repo.clone(),
            number: pr.number,
            lifespan_days: pr.lifespan_days(),
            retest_count,
            jobs,
            total_cost: provider_hours.total_cost(rates),
            provider_hours,
        }
    }

    pub fn unknown_durations(&self) -> usize {
        self.jobs.iter().filter(|j| j.duration.is_unknown()).count()
    }
}

/// Every report of a run, most expensive first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportCollection {
    reports: Vec<PrCostReport>,
}

impl ReportCollection {
    pub fn new(mut reports: Vec<PrCostReport>) -> Self {
        reports.sort_by(|a, b| {
            b.total_cost
                .partial_cmp(&a.total_cost)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self { reports }
    }

    pub fn reports(&self) -> &[PrCostReport] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn total_cost(&self) -> f64 {
        self.reports.iter().map(|r| r.total_cost).sum()
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    pub fn write_json(&self, path: &Path, pretty: bool) -> Result<()> {
        std::fs::write(path, self.to_json(pretty)?)?;
        Ok(())
    }

    pub fn summary(&self, rates: &CostRates) -> String {
        let mut out = String::from("PR Costs (sorted from most expensive to least):\n");

        for report in &self.reports {
            let _ = writeln!(out);
            let _ = writeln!(out, "\tTOTAL PR COST:  ${:.2}", report.total_cost);
            let _ = writeln!(
                out,
                "\tTOTAL CLOUD USAGE FOR PR {}/{}/{}",
                report.org, report.repo, report.number
            );
            for provider in CloudProvider::BILLABLE {
                let hours = report.provider_hours.hours(provider);
                let _ = writeln!(out, "\t\t{}", provider.label());
                let _ = writeln!(out, "\t\t\tHOURS: {hours:.2}");
                let _ = writeln!(out, "\t\t\tCOSTS: ${:.2}", rates.cost(provider, hours));
            }
        }

        let unknown: usize = self.reports.iter().map(PrCostReport::unknown_durations).sum();
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} PRs analyzed, total cost ${:.2} ({unknown} jobs with unknown duration)",
            self.reports.len(),
            self.total_cost()
        );

        out
    }
}
