use std::time::Duration;

use url::Url;

use crate::cost::{CloudProvider, CostRates};
use crate::error::{CostError, Result};

pub const DEFAULT_GITHUB_URL: &str = "https://api.github.com";
pub const DEFAULT_PROW_URL: &str = "https://prow.ci.openshift.org";
pub const DEFAULT_ARTIFACTS_URL: &str =
    "https://gcsweb-ci.apps.ci.l2s4.p1.openshiftapps.com/gcs/origin-ci-test";

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Base URLs of the three external data sources.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub github: Url,
    pub prow: Url,
    pub artifacts: Url,
}

impl Endpoints {
    pub fn new(github: &str, prow: &str, artifacts: &str) -> Result<Self> {
        Ok(Self {
            github: parse_base_url("GitHub", github)?,
            prow: parse_base_url("Prow", prow)?,
            artifacts: parse_base_url("artifacts", artifacts)?,
        })
    }
}

// Url::join drops the last path segment unless the base ends with a slash.
fn parse_base_url(name: &str, raw: &str) -> Result<Url> {
    let normalized = format!("{}/", raw.trim_end_matches('/'));
    Url::parse(&normalized).map_err(|e| CostError::Config(format!("Invalid {name} URL: {e}")))
}

/// Behaviour of the HTTP client shared by every worker.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoints: Endpoints,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_backoff: Duration,
}

/// Which classified providers have their job durations looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AzureDurations {
    /// Resolve durations for all four classified providers.
    #[default]
    Resolve,
    /// Skip lookups for Azure jobs, recording them with zero hours.
    Skip,
}

/// Immutable settings of one aggregation run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub concurrency: usize,
    pub rates: CostRates,
    pub azure_durations: AzureDurations,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            rates: CostRates::default(),
            azure_durations: AzureDurations::default(),
        }
    }
}

impl PipelineConfig {
    pub fn resolves_duration(&self, provider: CloudProvider) -> bool {
        match provider {
            CloudProvider::Aws | CloudProvider::Gcp | CloudProvider::Vsphere => true,
            CloudProvider::Azure => self.azure_durations == AzureDurations::Resolve,
            CloudProvider::Unclassified => false,
        }
    }
}
