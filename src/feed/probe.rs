use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use std::time::Duration;

/// Checks whether an entry's link resolves.
///
/// Answers with a status description such as `"200 OK"` or
/// `"404 Not Found"`. Probing never fails as such: transport problems come
/// back as a description without a leading 2xx code.
#[async_trait]
pub trait LinkProber: Send + Sync {
    async fn probe(&self, url: &str) -> String;
}

/// True when a probe description starts with a 2xx status code.
pub fn is_success_description(description: &str) -> bool {
    status_code(description).is_some_and(|code| (200..300).contains(&code))
}

/// The leading three-digit status code of a probe description, if any.
pub fn status_code(description: &str) -> Option<u16> {
    let digits: String = description
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    if digits.len() != 3 {
        return None;
    }
    digits.parse().ok()
}

/// Redirect policy for link probes: limited hops with loop detection.
fn probe_redirect_policy(max_hops: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_hops {
            return attempt.error(format!("Too many redirects (max {max_hops})"));
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::trace!(
            to = %url,
            hop = attempt.previous().len() + 1,
            "Probe following redirect"
        );
        attempt.follow()
    })
}

/// HEAD-based prober. Servers that refuse HEAD (405/501) get a GET.
#[derive(Debug, Clone)]
pub struct HttpLinkProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpLinkProber {
    pub fn new(user_agent: &str, timeout: Duration, max_redirects: usize) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(probe_redirect_policy(max_redirects))
            .pool_max_idle_per_host(4)
            .build()?;
        Ok(Self { client, timeout })
    }

    async fn request(&self, method: reqwest::Method, url: &str) -> Result<StatusCode, String> {
        let send = self.client.request(method, url).send();
        match tokio::time::timeout(self.timeout, send).await {
            Err(_) => Err("Request timed out".to_string()),
            Ok(Err(e)) => Err(format!("Request failed: {e}")),
            Ok(Ok(response)) => Ok(response.status()),
        }
    }
}

#[async_trait]
impl LinkProber for HttpLinkProber {
    async fn probe(&self, url: &str) -> String {
        let status = match self.request(reqwest::Method::HEAD, url).await {
            Ok(StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED) => {
                self.request(reqwest::Method::GET, url).await
            }
            other => other,
        };

        match status {
            Ok(status) => status.to_string(),
            Err(description) => {
                tracing::debug!(url = %url, error = %description, "Link probe failed");
                description
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prober() -> HttpLinkProber {
        HttpLinkProber::new("feedcrawl-test", Duration::from_secs(5), 3).unwrap()
    }

    #[test]
    fn test_status_code_parsing() {
        assert_eq!(status_code("200 OK"), Some(200));
        assert_eq!(status_code("404 Not Found"), Some(404));
        assert_eq!(status_code("  503"), Some(503));
        assert_eq!(status_code("Request timed out"), None);
        assert_eq!(status_code("2000 odd"), None);
        assert!(is_success_description("204 No Content"));
        assert!(!is_success_description("301 Moved Permanently"));
        assert!(!is_success_description("Request failed: dns error"));
    }

    #[tokio::test]
    async fn test_probe_ok() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/post"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let status = prober().probe(&format!("{}/post", mock_server.uri())).await;
        assert_eq!(status, "200 OK");
    }

    #[tokio::test]
    async fn test_probe_not_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let status = prober().probe(&format!("{}/missing", mock_server.uri())).await;
        assert_eq!(status, "404 Not Found");
    }

    #[tokio::test]
    async fn test_probe_falls_back_to_get() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("page"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let status = prober().probe(&mock_server.uri()).await;
        assert_eq!(status, "200 OK");
    }

    #[tokio::test]
    async fn test_probe_follows_redirects() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
            .mount(&mock_server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let status = prober().probe(&format!("{}/old", mock_server.uri())).await;
        assert_eq!(status, "200 OK");
    }

    #[tokio::test]
    async fn test_probe_unreachable_is_a_description() {
        let status = prober().probe("http://127.0.0.1:1/nothing").await;
        assert!(status.starts_with("Request failed"), "got {status}");
        assert!(!is_success_description(&status));
    }
}
