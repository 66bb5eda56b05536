use log::warn;
use regex::Regex;
use reqwest::header::{HeaderMap, ACCEPT, LINK};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::{ClientConfig, Endpoints};
use crate::error::{CostError, Result};

pub const GITHUB_JSON: &str = "application/vnd.github.v3+json";

// Log path under the CI logging root: pull/{org}_{repo}/{pr}/{job}/{run id}
const JOB_PATH_PATTERN: &str =
    r"/view/gs/origin-ci-test/pr-logs/pull/[^/\s<>'\x22]+/\d+/(?P<job>[^/\s<>'\x22]+)/(?P<run_id>\d+)";

pub struct CiClient {
    pub client: Client,
    pub config: ClientConfig,
    pub job_path: Regex,
}

impl CiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("prcost/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| CostError::Config(format!("Failed to create HTTP client: {e}")))?;

        let job_path = Regex::new(JOB_PATH_PATTERN)
            .map_err(|e| CostError::Config(format!("Invalid job path pattern: {e}")))?;

        Ok(Self {
            client,
            config,
            job_path,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.config.endpoints
    }

    pub fn join(base: &Url, path: &str) -> Result<Url> {
        base.join(path)
            .map_err(|e| CostError::Config(format!("Invalid URL {base}{path}: {e}")))
    }

    /// GET with retry on transient failures; any final non-success status is an error.
    pub async fn get(&self, url: Url, accept: Option<&str>) -> Result<Response> {
        let mut attempt = 0;

        loop {
            let mut request = self.client.get(url.clone());
            if let Some(accept) = accept {
                request = request.header(ACCEPT, accept);
            }

            let outcome = request.send().await;
            let transient = match &outcome {
                Ok(response) => is_transient(response.status()),
                Err(e) => e.is_timeout() || e.is_connect(),
            };

            if transient && attempt < self.config.retries {
                let delay = self.config.retry_backoff * 2u32.saturating_pow(attempt);
                attempt += 1;
                warn!(
                    "GET {url} failed transiently (attempt {attempt}/{}), retrying in {delay:?}",
                    self.config.retries + 1
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let response = outcome?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(CostError::Api(format!("GET {url} returned {status}: {body}")));
            }

            return Ok(response);
        }
    }

    /// Fetch one JSON page and the URL of the page after it, if any.
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        url: Url,
        accept: Option<&str>,
    ) -> Result<(T, Option<Url>)> {
        let response = self.get(url, accept).await?;
        let next = match parse_link_next(response.headers()) {
            Some(next) => Some(
                Url::parse(&next)
                    .map_err(|e| CostError::Api(format!("Invalid next page link {next}: {e}")))?,
            ),
            None => None,
        };

        let page = response.json::<T>().await?;
        Ok((page, next))
    }

    /// Follow `rel="next"` links and concatenate every page of a JSON array endpoint.
    pub async fn get_all_pages<T: DeserializeOwned>(
        &self,
        url: Url,
        accept: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut all = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next {
            let (page, next_url) = self.get_page::<Vec<T>>(url, accept).await?;
            all.extend(page);
            next = next_url;
        }

        Ok(all)
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn parse_link_next(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let mut sections = part.split(';');
        let target = sections.next()?.trim();
        sections
            .any(|param| param.trim() == "rel=\"next\"")
            .then(|| target.trim_start_matches('<').trim_end_matches('>').to_string())
    })
}
