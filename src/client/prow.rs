use log::debug;
use url::Url;

use super::core::CiClient;
use crate::error::Result;
use crate::models::{JobLink, PullRequestRef};

impl CiClient {
    fn history_url(&self, pr: &PullRequestRef) -> Result<Url> {
        let mut url = Self::join(&self.endpoints().prow, "pr-history/")?;
        url.query_pairs_mut()
            .append_pair("org", &pr.org)
            .append_pair("repo", &pr.repo)
            .append_pair("pr", &pr.number.to_string());
        Ok(url)
    }

    /// Job runs listed on the PR's CI history page, in page order.
    pub async fn discover_job_links(&self, pr: &PullRequestRef) -> Result<Vec<JobLink>> {
        let url = self.history_url(pr)?;
        let page = self.get(url, None).await?.text().await?;

        let links = self.extract_job_links(&page);
        debug!("{pr}: discovered {} job links", links.len());
        Ok(links)
    }

    /// Job paths are appended to the Prow base as-is so a path prefix on the
    /// base survives.
    fn extract_job_links(&self, page: &str) -> Vec<JobLink> {
        let base = self.endpoints().prow.as_str().trim_end_matches('/');
        self.job_path
            .captures_iter(page)
            .map(|captures| JobLink {
                url: format!("{base}{}", &captures[0]),
                job_name: captures["job"].to_string(),
                run_id: captures["run_id"].to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mockito::Matcher;

    use super::*;
    use crate::client::test_client;
    use crate::error::CostError;

    const HISTORY_PAGE: &str = r#"
        <script>
        var allBuilds = [
          {"SpyglassLink":"/view/gs/origin-ci-test/pr-logs/pull/openshift_installer/42/pull-ci-openshift-installer-master-e2e-aws/1001","ID":"1001"},
          {"SpyglassLink":"/view/gs/origin-ci-test/pr-logs/pull/openshift_installer/42/pull-ci-openshift-installer-master-unit/1002","ID":"1002"},
          {"SpyglassLink":"/view/gs/origin-ci-test/logs/periodic-ci-e2e-gcp/77","ID":"77"}
        ];
        </script>
        <a href="/view/gs/origin-ci-test/pr-logs/pull/openshift_installer/42/pull-ci-openshift-installer-master-e2e-vsphere/1003">vsphere</a>
    "#;

    fn pr() -> PullRequestRef {
        PullRequestRef {
            org: "openshift".to_string(),
            repo: "installer".to_string(),
            number: 42,
            title: "Fix installer".to_string(),
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    #[test]
    fn test_history_url() {
        let client = test_client("https://prow.ci.openshift.org");
        assert_eq!(
            client.history_url(&pr()).unwrap().as_str(),
            "https://prow.ci.openshift.org/pr-history/?org=openshift&repo=installer&pr=42"
        );
    }

    #[test]
    fn test_extract_job_links_preserves_order() {
        let client = test_client("https://prow.ci.openshift.org");
        let links = client.extract_job_links(HISTORY_PAGE);

        assert_eq!(links.len(), 3);
        assert_eq!(
            links[0].url,
            "https://prow.ci.openshift.org/view/gs/origin-ci-test/pr-logs/pull/openshift_installer/42/pull-ci-openshift-installer-master-e2e-aws/1001"
        );
        assert_eq!(links[0].job_name, "pull-ci-openshift-installer-master-e2e-aws");
        assert_eq!(links[0].run_id, "1001");
        assert_eq!(links[1].job_name, "pull-ci-openshift-installer-master-unit");
        assert_eq!(links[2].job_name, "pull-ci-openshift-installer-master-e2e-vsphere");
        assert_eq!(links[2].run_id, "1003");
    }

    #[test]
    fn test_job_links_keep_prow_path_prefix() {
        let client = test_client("https://ci.example/prow");

        assert_eq!(
            client.history_url(&pr()).unwrap().as_str(),
            "https://ci.example/prow/pr-history/?org=openshift&repo=installer&pr=42"
        );

        let links = client.extract_job_links(HISTORY_PAGE);
        assert_eq!(
            links[0].url,
            "https://ci.example/prow/view/gs/origin-ci-test/pr-logs/pull/openshift_installer/42/pull-ci-openshift-installer-master-e2e-aws/1001"
        );
    }

    #[test]
    fn test_extract_job_links_from_plain_text() {
        let client = test_client("https://prow.ci.openshift.org");
        let links = client
            .extract_job_links("no jobs here, only /view/gs/origin-ci-test/pr-logs/pull/batch/job/abc");
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn test_discover_job_links() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pr-history/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("org".into(), "openshift".into()),
                Matcher::UrlEncoded("repo".into(), "installer".into()),
                Matcher::UrlEncoded("pr".into(), "42".into()),
            ]))
            .with_body(HISTORY_PAGE)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let links = client.discover_job_links(&pr()).await.unwrap();

        assert_eq!(links.len(), 3);
        assert!(links[0].url.starts_with(&server.url()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_discover_job_links_non_success_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/pr-history/")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client.discover_job_links(&pr()).await;

        assert!(matches!(result, Err(CostError::Api(_))));
    }
}
