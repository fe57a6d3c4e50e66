//! Headless Chrome session for page captures.
//!
//! One session is launched per refresh batch and every capture goes through
//! it sequentially. The window size is fixed at launch, which is what sizes
//! the rendered screenshot.

use std::path::Path;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::config::CaptureConfig;
use crate::error::CaptureError;

pub struct CaptureSession {
    browser: Browser,
    page: Page,
    nav_timeout: Duration,
    settle: Duration,
    // Drains CDP events for the lifetime of the browser.
    _handler_task: JoinHandle<()>,
}

impl CaptureSession {
    pub async fn launch(
        config: &CaptureConfig,
        viewport: (u32, u32),
    ) -> Result<Self, CaptureError> {
        let (width, height) = viewport;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(width, height);
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.executable_path {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(CaptureError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|error| CaptureError::Launch(error.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while handler.next().await.is_some() {}
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|error| CaptureError::Launch(error.to_string()))?;

        tracing::debug!(width, height, "browser session launched");

        Ok(Self {
            browser,
            page,
            nav_timeout: Duration::from_secs(config.nav_timeout_secs),
            settle: Duration::from_millis(config.settle_ms),
            _handler_task: handler_task,
        })
    }

    /// Navigate to `url`, let the page settle, and write a viewport-sized
    /// PNG to `output`.
    pub async fn capture(&self, url: &str, output: &Path) -> Result<(), CaptureError> {
        let navigation = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(self.nav_timeout, navigation).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                return Err(CaptureError::Navigation {
                    url: url.to_string(),
                    reason: error.to_string(),
                })
            }
            Err(_) => {
                return Err(CaptureError::Navigation {
                    url: url.to_string(),
                    reason: "timed out".to_string(),
                })
            }
        }

        tokio::time::sleep(self.settle).await;

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(false)
            .build();
        let bytes = self
            .page
            .screenshot(params)
            .await
            .map_err(|error| CaptureError::Screenshot(error.to_string()))?;

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| CaptureError::Screenshot(error.to_string()))?;
        }
        tokio::fs::write(output, bytes)
            .await
            .map_err(|error| CaptureError::Screenshot(error.to_string()))?;

        tracing::debug!(url, output = %output.display(), "captured page");
        Ok(())
    }

    pub async fn close(mut self) {
        if let Err(error) = self.browser.close().await {
            tracing::warn!(%error, "browser close returned an error");
        }
    }
}
