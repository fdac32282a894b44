use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{FetcherKind, Settings};
use crate::error::{LinklyticsError, Result};

/// Returns the rendered HTML of a page. Post pages build their content
/// client-side, so implementations must run the page's scripts.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
    fn name(&self) -> &str;
}

pub fn from_settings(settings: &Settings) -> Result<Box<dyn PageFetcher>> {
    let render_wait = Duration::from_millis(settings.render_wait_ms);
    let timeout = Duration::from_secs(settings.fetch_timeout_secs);

    match settings.fetcher {
        FetcherKind::Chrome => Ok(Box::new(ChromeFetcher::new(
            &settings.chrome_bin,
            render_wait,
            timeout,
        ))),
        FetcherKind::Browserless => {
            let base_url = settings.browserless_url.as_deref().ok_or_else(|| {
                LinklyticsError::Config("browserless_url must be set for the browserless fetcher".into())
            })?;
            Ok(Box::new(BrowserlessFetcher::new(
                base_url,
                settings.browserless_token.as_deref(),
                render_wait,
                timeout,
            )?))
        }
    }
}

fn check_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|e| LinklyticsError::fetch(url, format!("invalid URL: {}", e)))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(LinklyticsError::fetch(
            url,
            format!("only http/https URLs are allowed, got {}", parsed.scheme()),
        ));
    }
    Ok(())
}

// --- Headless Chromium ---

/// Runs `chromium --headless --dump-dom` once per page.
pub struct ChromeFetcher {
    chrome_bin: String,
    render_wait: Duration,
    timeout: Duration,
}

impl ChromeFetcher {
    pub fn new(chrome_bin: &str, render_wait: Duration, timeout: Duration) -> Self {
        info!(chrome_bin, timeout_secs = timeout.as_secs(), "Using headless Chromium fetcher");
        Self {
            chrome_bin: chrome_bin.to_string(),
            render_wait,
            timeout,
        }
    }
}

#[async_trait]
impl PageFetcher for ChromeFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        check_url(url)?;

        // Fresh profile per run so no session state leaks between posts.
        let profile = tempfile::tempdir()?;
        let user_data_dir = format!("--user-data-dir={}", profile.path().display());
        let time_budget = format!("--virtual-time-budget={}", self.render_wait.as_millis());
        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.chrome_bin)
                .args([
                    "--headless",
                    "--no-sandbox",
                    "--disable-gpu",
                    "--disable-dev-shm-usage",
                    "--log-level=3",
                    user_data_dir.as_str(),
                    time_budget.as_str(),
                    "--dump-dom",
                    url,
                ])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| LinklyticsError::fetch(url, format!("timed out after {}s", self.timeout.as_secs())))?
        .map_err(|e| LinklyticsError::fetch(url, format!("failed to run {}: {}", self.chrome_bin, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LinklyticsError::fetch(
                url,
                format!("chromium exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(url, bytes = html.len(), "Dumped DOM");
        Ok(html)
    }

    fn name(&self) -> &str {
        "chrome"
    }
}

// --- Browserless /content ---

pub struct BrowserlessFetcher {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    render_wait: Duration,
}

impl BrowserlessFetcher {
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        render_wait: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        info!(base_url, "Using Browserless fetcher");
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            render_wait,
        })
    }

    fn endpoint(&self) -> String {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }
}

#[async_trait]
impl PageFetcher for BrowserlessFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        check_url(url)?;

        let body = serde_json::json!({
            "url": url,
            "waitForTimeout": self.render_wait.as_millis() as u64,
        });

        let resp = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| LinklyticsError::fetch(url, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(LinklyticsError::fetch(
                url,
                format!("browserless returned {}: {}", status.as_u16(), message),
            ));
        }

        let html = resp
            .text()
            .await
            .map_err(|e| LinklyticsError::fetch(url, e.to_string()))?;
        debug!(url, bytes = html.len(), "Fetched rendered page");
        Ok(html)
    }

    fn name(&self) -> &str {
        "browserless"
    }
}
