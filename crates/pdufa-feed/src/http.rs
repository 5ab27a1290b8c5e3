//! HTTP client for published iCalendar feeds.

use std::time::Duration;

use pdufa_core::RawEvent;
use tracing::{info, warn};

use crate::FeedError;
use crate::ics::parse_calendar_str;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches feeds one after another.
pub struct FeedClient {
    client: reqwest::Client,
}

/// Events from the feeds that worked, and the URLs that did not.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub events: Vec<RawEvent>,
    pub failed: Vec<String>,
}

impl FeedClient {
    pub fn new() -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .user_agent(concat!("pdufa/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Download one feed's body.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FeedError> {
        info!(url, "fetching calendar feed");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FeedError::Server {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.text().await?)
    }

    pub async fn fetch_events(&self, url: &str) -> Result<Vec<RawEvent>, FeedError> {
        let text = self.fetch_text(url).await?;
        parse_calendar_str(&text, url)
    }

    /// Fetch every feed; a feed that fails is logged and skipped.
    pub async fn fetch_all(&self, urls: &[String]) -> FetchReport {
        let mut report = FetchReport::default();
        for url in urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
            match self.fetch_events(url).await {
                Ok(events) => {
                    info!(url, count = events.len(), "fetched feed");
                    report.events.extend(events);
                }
                Err(e) => {
                    warn!(url, error = %e, "skipping feed");
                    report.failed.push(url.to_string());
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds() {
        assert!(FeedClient::new().is_ok());
    }

    #[tokio::test]
    async fn unreachable_feed_is_skipped() {
        let client = FeedClient::new().unwrap();
        let urls = vec!["http://127.0.0.1:9/pdufa.ics".to_string(), "  ".to_string()];
        let report = client.fetch_all(&urls).await;
        assert!(report.events.is_empty());
        assert_eq!(report.failed, vec!["http://127.0.0.1:9/pdufa.ics".to_string()]);
    }
}
