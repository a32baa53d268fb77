use crate::error::{FetchError, Result};
use crate::fetcher::PageFetcher;
use crate::page::PageMetadata;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";
pub const DEFAULT_USER_AGENT: &str = "Linkweave/0.1 (https://github.com/trapdoorsec/linkweave)";

/// MediaWiki `action=query` client. One request per topic returns the
/// plaintext extract, canonical URL, links, categories, images, external
/// links and the disambiguation flag.
pub struct WikipediaFetcher {
    client: Client,
    endpoint: Url,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<QueryBody>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    #[serde(default)]
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    fullurl: String,
    #[serde(default)]
    links: Vec<TitleRef>,
    #[serde(default)]
    categories: Vec<TitleRef>,
    #[serde(default)]
    images: Vec<TitleRef>,
    #[serde(default)]
    extlinks: Vec<ExtLink>,
    #[serde(default)]
    pageprops: Option<PageProps>,
}

#[derive(Debug, Deserialize)]
struct TitleRef {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ExtLink {
    url: String,
}

#[derive(Debug, Deserialize)]
struct PageProps {
    #[serde(default)]
    disambiguation: Option<String>,
}

impl WikipediaFetcher {
    pub fn new() -> Result<Self> {
        Self::with_options(DEFAULT_ENDPOINT, 10, DEFAULT_USER_AGENT)
    }

    pub fn with_options(endpoint: &str, timeout_secs: u64, user_agent: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs((timeout_secs / 2).max(1)))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn query_url(&self, title: &str) -> Result<Url> {
        let params = [
            ("action", "query"),
            ("format", "json"),
            ("formatversion", "2"),
            ("redirects", "1"),
            ("titles", title),
            (
                "prop",
                "extracts|info|links|categories|images|extlinks|pageprops",
            ),
            ("explaintext", "1"),
            ("exsectionformat", "wiki"),
            ("inprop", "url"),
            ("ppprop", "disambiguation"),
            ("clshow", "!hidden"),
            ("plnamespace", "0"),
            ("pllimit", "max"),
            ("cllimit", "max"),
            ("imlimit", "max"),
            ("ellimit", "max"),
        ];
        Ok(Url::parse_with_params(self.endpoint.as_str(), &params)?)
    }

    fn file_url(&self, file_title: &str) -> String {
        let name = file_title
            .split_once(':')
            .map(|(_, rest)| rest)
            .unwrap_or(file_title)
            .replace(' ', "_");
        let host = self.endpoint.host_str().unwrap_or("en.wikipedia.org");
        let port = self
            .endpoint
            .port()
            .map(|p| format!(":{}", p))
            .unwrap_or_default();
        format!(
            "{}://{}{}/wiki/Special:FilePath/{}",
            self.endpoint.scheme(),
            host,
            port,
            name
        )
    }

    fn page_metadata(&self, requested: &str, page: ApiPage) -> Result<PageMetadata> {
        if page.missing || page.invalid {
            return Err(FetchError::NotFound(requested.to_string()));
        }

        let links: Vec<String> = page.links.into_iter().map(|l| l.title).collect();

        if page
            .pageprops
            .as_ref()
            .is_some_and(|p| p.disambiguation.is_some())
        {
            let title = if page.title.is_empty() {
                requested.to_string()
            } else {
                page.title
            };
            return Err(FetchError::Ambiguous {
                title,
                options: links,
            });
        }

        let mut metadata =
            PageMetadata::with_body(page.fullurl, lead_section(&page.extract), &page.extract);
        metadata.links = links;
        metadata.sections = section_titles(&page.extract);
        metadata.categories = page
            .categories
            .into_iter()
            .map(|c| strip_namespace(&c.title, "Category:"))
            .collect();
        metadata.images = page
            .images
            .iter()
            .map(|i| self.file_url(&i.title))
            .collect();
        metadata.references = page.extlinks.into_iter().map(|e| e.url).collect();

        Ok(metadata.bounded())
    }
}

#[async_trait]
impl PageFetcher for WikipediaFetcher {
    async fn fetch(&self, title: &str) -> Result<PageMetadata> {
        debug!("Fetching {}", title);

        let start = Instant::now();
        let response = self
            .client
            .get(self.query_url(title)?)
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        debug!("Fetched {} in {:?}", title, start.elapsed());

        let parsed: QueryResponse = serde_json::from_str(&body)?;
        if let Some(err) = parsed.error {
            return Err(FetchError::Other(format!("API error {}: {}", err.code, err.info)));
        }

        let page = parsed
            .query
            .and_then(|q| q.pages.into_iter().next())
            .ok_or_else(|| FetchError::NotFound(title.to_string()))?;

        self.page_metadata(title, page)
    }
}

fn is_heading(line: &str) -> bool {
    let line = line.trim();
    line.len() > 4 && line.starts_with("==") && line.ends_with("==")
}

/// Text before the first section heading.
fn lead_section(extract: &str) -> String {
    let mut lead = Vec::new();
    for line in extract.lines() {
        if is_heading(line) {
            break;
        }
        lead.push(line);
    }
    lead.join("\n").trim().to_string()
}

fn section_titles(extract: &str) -> Vec<String> {
    extract
        .lines()
        .filter(|line| is_heading(line))
        .map(|line| line.trim().trim_matches('=').trim().to_string())
        .filter(|title| !title.is_empty())
        .collect()
}

fn strip_namespace(title: &str, prefix: &str) -> String {
    title.strip_prefix(prefix).unwrap_or(title).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    const ROBOTICS_EXTRACT: &str = "Robotics is the interdisciplinary study of robots.\nIt spans mechanical engineering and computer science.\n\n== History ==\nEarly automata.\n\n=== Modern era ===\nIndustrial arms.\n\n== Applications ==\nManufacturing.";

    fn fetcher_for(server: &MockServer) -> WikipediaFetcher {
        WikipediaFetcher::with_options(&format!("{}/w/api.php", server.uri()), 5, DEFAULT_USER_AGENT)
            .unwrap()
    }

    #[test]
    fn test_lead_section_and_headings() {
        assert_eq!(
            lead_section(ROBOTICS_EXTRACT),
            "Robotics is the interdisciplinary study of robots.\nIt spans mechanical engineering and computer science."
        );
        assert_eq!(
            section_titles(ROBOTICS_EXTRACT),
            vec!["History", "Modern era", "Applications"]
        );
    }

    #[test]
    fn test_lead_section_without_headings() {
        assert_eq!(lead_section("  Just a stub.  "), "Just a stub.");
        assert!(section_titles("Just a stub.").is_empty());
    }

    #[tokio::test]
    async fn test_fetch_page_metadata() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "batchcomplete": true,
            "query": {
                "pages": [{
                    "pageid": 1,
                    "ns": 0,
                    "title": "Robotics",
                    "extract": ROBOTICS_EXTRACT,
                    "fullurl": "https://en.wikipedia.org/wiki/Robotics",
                    "links": [
                        {"ns": 0, "title": "Automation"},
                        {"ns": 0, "title": "Control theory"}
                    ],
                    "categories": [{"ns": 14, "title": "Category:Robotics"}],
                    "images": [{"ns": 6, "title": "File:Shadow Hand.jpg"}],
                    "extlinks": [{"url": "https://ieee.org/robotics"}]
                }]
            }
        });

        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("titles", "Robotics"))
            .and(query_param("action", "query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let page = fetcher_for(&server).fetch("Robotics").await.unwrap();

        assert_eq!(page.url, "https://en.wikipedia.org/wiki/Robotics");
        assert_eq!(page.links, vec!["Automation", "Control theory"]);
        assert_eq!(page.categories, vec!["Robotics"]);
        assert_eq!(page.sections, vec!["History", "Modern era", "Applications"]);
        assert_eq!(page.references, vec!["https://ieee.org/robotics"]);
        assert_eq!(page.images.len(), 1);
        assert!(page.images[0].ends_with("/wiki/Special:FilePath/Shadow_Hand.jpg"));
        assert!(page.summary.starts_with("Robotics is the interdisciplinary"));
        assert_eq!(page.content_length, ROBOTICS_EXTRACT.chars().count());
        assert_eq!(page.word_count, ROBOTICS_EXTRACT.split_whitespace().count());
    }

    #[test]
    fn test_query_requests_article_namespace_links_only() {
        let fetcher = WikipediaFetcher::new().unwrap();
        let url = fetcher.query_url("Robotics").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("plnamespace".to_string(), "0".to_string())));
        assert!(pairs.contains(&("titles".to_string(), "Robotics".to_string())));
    }

    #[tokio::test]
    async fn test_fetch_sends_article_namespace_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("titles", "Robotics"))
            .and(query_param("plnamespace", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"pages": [{
                    "ns": 0,
                    "title": "Robotics",
                    "extract": "Robotics is engineering.",
                    "fullurl": "https://en.wikipedia.org/wiki/Robotics",
                    "links": [{"ns": 0, "title": "Mechatronics engineering"}]
                }]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = fetcher_for(&server).fetch("Robotics").await.unwrap();
        assert_eq!(page.links, vec!["Mechatronics engineering"]);
    }

    #[tokio::test]
    async fn test_fetch_missing_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"pages": [{"ns": 0, "title": "Nope", "missing": true}]}
            })))
            .mount(&server)
            .await;

        let err = fetcher_for(&server).fetch("Nope").await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_fetch_disambiguation_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"pages": [{
                    "ns": 0,
                    "title": "Mercury",
                    "extract": "Mercury may refer to:",
                    "links": [{"ns": 0, "title": "Mercury (planet)"}],
                    "pageprops": {"disambiguation": ""}
                }]}
            })))
            .mount(&server)
            .await;

        match fetcher_for(&server).fetch("Mercury").await {
            Err(FetchError::Ambiguous { title, options }) => {
                assert_eq!(title, "Mercury");
                assert_eq!(options, vec!["Mercury (planet)"]);
            }
            other => panic!("expected ambiguous, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_other() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = fetcher_for(&server).fetch("Robotics").await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Other);
    }

    #[tokio::test]
    async fn test_fetch_api_error_is_other() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": {"code": "ratelimited", "info": "slow down"}
            })))
            .mount(&server)
            .await;

        let err = fetcher_for(&server).fetch("Robotics").await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Other);
        assert!(err.to_string().contains("ratelimited"));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body_is_other() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let err = fetcher_for(&server).fetch("Robotics").await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Other);
    }
}
