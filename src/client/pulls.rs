use chrono::{DateTime, Datelike, Days, Months, Utc};
use log::{debug, info};
use serde::Deserialize;
use url::Url;

use super::core::{CiClient, GITHUB_JSON};
use crate::error::{CostError, Result};
use crate::models::PullRequestRef;

/// PRs created this long before the window start are left out.
const MAX_PR_AGE: Months = Months::new(6);

#[derive(Debug, Deserialize)]
struct SearchPage {
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    title: String,
    html_url: String,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Comment {
    #[serde(default)]
    body: Option<String>,
}

impl CiClient {
    fn search_url(&self, org: &str, repo: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Url> {
        let mut url = Self::join(&self.endpoints().github, "search/issues")?;
        let query = format!(
            "repo:{org}/{repo} is:pr is:closed closed:{}..{}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );
        url.query_pairs_mut()
            .append_pair("q", &query)
            .append_pair("per_page", "100");
        Ok(url)
    }

    /// List every PR of `org/repo` closed within `[start, end]` and created
    /// less than six months before `start`. Any failing page aborts the listing.
    pub async fn list_closed_pull_requests(
        &self,
        org: &str,
        repo: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PullRequestRef>> {
        let mut all_pull_requests = Vec::new();
        let mut next = Some(self.search_url(org, repo, start, end)?);
        let mut page = 1;

        while let Some(url) = next {
            let (search, next_url) = self.get_page::<SearchPage>(url, Some(GITHUB_JSON)).await?;
            let returned = search.items.len();

            let pull_requests = search
                .items
                .into_iter()
                .filter(|item| created_within_window(item.created_at, start))
                .map(SearchItem::into_pull_request)
                .collect::<Result<Vec<_>>>()?;

            info!(
                "Page {page}: kept {} of {returned} pull requests (total: {})",
                pull_requests.len(),
                all_pull_requests.len() + pull_requests.len()
            );
            all_pull_requests.extend(pull_requests);

            next = next_url;
            page += 1;
        }

        Ok(all_pull_requests)
    }

    /// Bodies of every comment on a PR, following pagination.
    pub async fn fetch_comment_bodies(&self, pr: &PullRequestRef) -> Result<Vec<String>> {
        let mut url = Self::join(
            &self.endpoints().github,
            &format!("repos/{}/{}/issues/{}/comments", pr.org, pr.repo, pr.number),
        )?;
        url.query_pairs_mut().append_pair("per_page", "100");

        let comments = self
            .get_all_pages::<Comment>(url, Some(GITHUB_JSON))
            .await?;
        debug!("{pr}: fetched {} comments", comments.len());

        Ok(comments.into_iter().filter_map(|c| c.body).collect())
    }
}

impl SearchItem {
    fn into_pull_request(self) -> Result<PullRequestRef> {
        let (org, repo, number) = parse_pr_url(&self.html_url)?;
        Ok(PullRequestRef {
            org,
            repo,
            number,
            title: self.title,
            created_at: self.created_at,
            closed_at: self.closed_at,
        })
    }
}

/// True when `created_at` falls strictly after six months before `start`.
pub fn created_within_window(created_at: DateTime<Utc>, start: DateTime<Utc>) -> bool {
    age_cutoff(start).map_or(true, |cutoff| created_at > cutoff)
}

/// `start` moved back six months, keeping its day of month. Days past the end
/// of the target month roll over into the next one, so Aug 31 maps to Mar 2
/// in a leap year instead of being clamped to Feb 29.
fn age_cutoff(start: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let month_start = start.date_naive().with_day(1)?.checked_sub_months(MAX_PR_AGE)?;
    let date = month_start.checked_add_days(Days::new(u64::from(start.day0())))?;
    Some(date.and_time(start.time()).and_utc())
}

/// Split `https://github.com/{org}/{repo}/pull/{number}` into its parts.
fn parse_pr_url(html_url: &str) -> Result<(String, String, u64)> {
    let invalid = || CostError::Api(format!("Invalid pull request URL: {html_url}"));

    let parsed = Url::parse(html_url).map_err(|_| invalid())?;
    let segments: Vec<_> = parsed
        .path_segments()
        .ok_or_else(invalid)?
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() != 4 || segments[2] != "pull" {
        return Err(invalid());
    }

    let number = segments[3].parse::<u64>().map_err(|_| invalid())?;
    if number == 0 {
        return Err(invalid());
    }

    Ok((segments[0].to_string(), segments[1].to_string(), number))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use mockito::Matcher;

    use super::*;
    use crate::client::test_client;

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn item(number: u64, created: &str) -> serde_json::Value {
        serde_json::json!({
            "title": format!("PR {number}"),
            "html_url": format!("https://github.com/openshift/installer/pull/{number}"),
            "created_at": created,
            "closed_at": "2024-07-10T12:00:00Z",
        })
    }

    #[test]
    fn test_created_within_window_boundaries() {
        let start = date(2024, 7, 1);

        assert!(!created_within_window(date(2023, 12, 1), start));
        assert!(created_within_window(date(2024, 2, 1), start));
        assert!(!created_within_window(date(2024, 1, 1), start));
        assert!(created_within_window(
            date(2024, 1, 1) + chrono::Duration::seconds(1),
            start
        ));
    }

    #[test]
    fn test_age_cutoff_rolls_month_end_forward() {
        assert_eq!(age_cutoff(date(2024, 8, 31)), Some(date(2024, 3, 2)));
        assert_eq!(age_cutoff(date(2023, 8, 31)), Some(date(2023, 3, 3)));
        assert_eq!(age_cutoff(date(2024, 7, 1)), Some(date(2024, 1, 1)));
        assert_eq!(age_cutoff(date(2024, 3, 15)), Some(date(2023, 9, 15)));
    }

    #[test]
    fn test_created_within_window_at_month_end() {
        let start = date(2024, 8, 31);
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        assert!(!created_within_window(created, start));
        assert!(!created_within_window(date(2024, 3, 2), start));
        assert!(created_within_window(
            date(2024, 3, 2) + chrono::Duration::seconds(1),
            start
        ));
    }

    #[test]
    fn test_parse_pr_url() {
        assert_eq!(
            parse_pr_url("https://github.com/openshift/installer/pull/42").unwrap(),
            ("openshift".to_string(), "installer".to_string(), 42)
        );
    }

    #[test]
    fn test_parse_invalid_pr_url() {
        assert!(parse_pr_url("not-a-url").is_err());
        assert!(parse_pr_url("https://github.com/openshift/installer/issues/42").is_err());
        assert!(parse_pr_url("https://github.com/openshift/installer/pull/abc").is_err());
        assert!(parse_pr_url("https://github.com/openshift/installer/pull/0").is_err());
    }

    #[tokio::test]
    async fn test_list_follows_pagination_and_filters_each_page() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        let first = server
            .mock("GET", "/search/issues")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "q".into(),
                    "repo:openshift/installer is:pr is:closed closed:2024-07-01..2024-07-31".into(),
                ),
                Matcher::UrlEncoded("per_page".into(), "100".into()),
            ]))
            .match_header("accept", GITHUB_JSON)
            .with_header("link", &format!("<{base}/search/issues?page=2>; rel=\"next\""))
            .with_body(
                serde_json::json!({
                    "items": [item(1, "2024-06-20T00:00:00Z"), item(2, "2023-11-01T00:00:00Z")]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/search/issues?page=2")
            .with_body(
                serde_json::json!({
                    "items": [item(3, "2024-02-15T00:00:00Z"), item(4, "2023-12-01T00:00:00Z")]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = test_client(&base);
        let prs = client
            .list_closed_pull_requests("openshift", "installer", date(2024, 7, 1), date(2024, 7, 31))
            .await
            .unwrap();

        let numbers: Vec<u64> = prs.iter().map(|pr| pr.number).collect();
        assert_eq!(numbers, vec![1, 3]);
        assert_eq!(prs[0].org, "openshift");
        assert_eq!(prs[0].repo, "installer");
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_fails_when_any_page_fails() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        let _mock1 = server
            .mock("GET", "/search/issues")
            .match_query(Matcher::Any)
            .with_header("link", &format!("<{base}/next-page>; rel=\"next\""))
            .with_body(serde_json::json!({ "items": [item(1, "2024-06-20T00:00:00Z")] }).to_string())
            .create_async()
            .await;
        let _mock2 = server
            .mock("GET", "/next-page")
            .with_status(422)
            .create_async()
            .await;

        let client = test_client(&base);
        let result = client
            .list_closed_pull_requests("openshift", "installer", date(2024, 7, 1), date(2024, 7, 31))
            .await;

        assert!(matches!(result, Err(CostError::Api(_))));
    }

    #[tokio::test]
    async fn test_list_fails_on_malformed_page() {
        let mut server = mockito::Server::new_async().await;
        let _mock3 = server
            .mock("GET", "/search/issues")
            .match_query(Matcher::Any)
            .with_body(r#"{"total_count": 3}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client
            .list_closed_pull_requests("openshift", "installer", date(2024, 7, 1), date(2024, 7, 31))
            .await;

        assert!(matches!(result, Err(CostError::Network(_))));
    }

    #[tokio::test]
    async fn test_fetch_comment_bodies_across_pages() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        let _mock4 = server
            .mock("GET", "/repos/openshift/installer/issues/7/comments")
            .match_query(Matcher::UrlEncoded("per_page".into(), "100".into()))
            .with_header("link", &format!("<{base}/comments-page-2>; rel=\"next\""))
            .with_body(r#"[{"body": "/retest"}, {"body": null}]"#)
            .create_async()
            .await;
        let _mock5 = server
            .mock("GET", "/comments-page-2")
            .with_body(r#"[{"body": "lgtm\n/retest-required"}]"#)
            .create_async()
            .await;

        let client = test_client(&base);
        let pr = PullRequestRef {
            org: "openshift".to_string(),
            repo: "installer".to_string(),
            number: 7,
            title: "PR 7".to_string(),
            created_at: date(2024, 7, 1),
            closed_at: None,
        };
        let bodies = client.fetch_comment_bodies(&pr).await.unwrap();

        assert_eq!(bodies, vec!["/retest".to_string(), "lgtm\n/retest-required".to_string()]);
    }
}
