use serde::{Deserialize, Serialize};

/// Hours subtracted from every measured run to account for node provisioning.
pub const PROVISIONING_OVERHEAD_HOURS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudProvider {
    Aws,
    Gcp,
    Vsphere,
    Azure,
    Unclassified,
}

impl CloudProvider {
    /// Classified providers in precedence order.
    pub const BILLABLE: [CloudProvider; 4] = [Self::Aws, Self::Gcp, Self::Vsphere, Self::Azure];

    /// Classify a job link by its provider tag. First match wins, case-sensitive.
    pub fn classify(job_link: &str) -> Self {
        [
            ("aws", Self::Aws),
            ("gcp", Self::Gcp),
            ("vsphere", Self::Vsphere),
            ("azure", Self::Azure),
        ]
        .into_iter()
        .find(|(tag, _)| job_link.contains(tag))
        .map_or(Self::Unclassified, |(_, provider)| provider)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Aws => "AWS",
            Self::Gcp => "GCP",
            Self::Vsphere => "VSPHERE",
            Self::Azure => "AZURE",
            Self::Unclassified => "UNCLASSIFIED",
        }
    }
}

/// Hourly rates per provider, in currency units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostRates {
    pub aws: f64,
    pub gcp: f64,
    pub vsphere: f64,
    pub azure: f64,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            aws: 0.90,
            gcp: 1.70,
            vsphere: 4.10,
            azure: 2.30,
        }
    }
}

impl CostRates {
    pub fn rate(&self, provider: CloudProvider) -> f64 {
        match provider {
            CloudProvider::Aws => self.aws,
            CloudProvider::Gcp => self.gcp,
            CloudProvider::Vsphere => self.vsphere,
            CloudProvider::Azure => self.azure,
            CloudProvider::Unclassified => 0.0,
        }
    }

    pub fn cost(&self, provider: CloudProvider, hours: f64) -> f64 {
        hours * self.rate(provider)
    }

    /// Cost of a single job. Unknown or skipped durations cost nothing.
    pub fn job_cost(&self, provider: CloudProvider, duration: JobDuration) -> f64 {
        self.cost(provider, duration.billable_hours())
    }
}

/// Billable duration of a job run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "hours", rename_all = "snake_case")]
pub enum JobDuration {
    /// Measured runtime after the provisioning correction, in hours.
    Measured(f64),
    /// Timing artifacts were missing or unreadable.
    Unknown,
    /// No lookup was attempted for this job.
    Skipped,
}

impl JobDuration {
    /// Convert raw start/finish epoch seconds into billable hours, rounded to one decimal.
    pub fn from_timestamps(started: f64, finished: f64) -> Self {
        let hours = (finished - started) / 3600.0 - PROVISIONING_OVERHEAD_HOURS;
        Self::Measured((hours.max(0.0) * 10.0).round() / 10.0)
    }

    pub fn billable_hours(self) -> f64 {
        match self {
            Self::Measured(hours) => hours,
            Self::Unknown | Self::Skipped => 0.0,
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

/// Per-provider billable hours accumulated over a PR's jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderHours {
    pub aws: f64,
    pub gcp: f64,
    pub vsphere: f64,
    pub azure: f64,
}

impl ProviderHours {
    pub fn add(&mut self, provider: CloudProvider, duration: JobDuration) {
        let hours = duration.billable_hours();
        match provider {
            CloudProvider::Aws => self.aws += hours,
            CloudProvider::Gcp => self.gcp += hours,
            CloudProvider::Vsphere => self.vsphere += hours,
            CloudProvider::Azure => self.azure += hours,
            CloudProvider::Unclassified => {}
        }
    }

    pub fn hours(&self, provider: CloudProvider) -> f64 {
        match provider {
            CloudProvider::Aws => self.aws,
            CloudProvider::Gcp => self.gcp,
            CloudProvider::Vsphere => self.vsphere,
            CloudProvider::Azure => self.azure,
            CloudProvider::Unclassified => 0.0,
        }
    }

    pub fn total_cost(&self, rates: &CostRates) -> f64 {
        CloudProvider::BILLABLE
            .iter()
            .map(|&p| rates.cost(p, self.hours(p)))
            .sum()
    }
}
