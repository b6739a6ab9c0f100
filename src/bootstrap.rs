//! Per-page initialization shared by every controller.
//!
//! A [`Page`] runs its bootstrap once, when content has loaded, and hands out
//! the resulting [`PageContext`]. Controllers receive the context explicitly
//! instead of reaching for process-wide state.

use crate::settings::AppSettings;
use anyhow::{anyhow, Result};
use log::{debug, info};
use once_cell::sync::OnceCell;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};

/// Stylesheets every page pulls in.
pub const GLOBAL_STYLESHEETS: [&str; 2] = ["normalize.css", "skeleton.css"];

/// Lets pointer events reach links and labels inside embedded SVG.
pub const SVG_POINTER_EVENTS_RULE: &str =
    "svg a, svg text, svg tspan { pointer-events: auto !important; }";

#[derive(Debug, Clone)]
pub struct PageContext {
    http: reqwest::Client,
    base_url: String,
    stylesheets: Vec<&'static str>,
    style_rules: Vec<String>,
}

impl PageContext {
    /// Shared HTTP client; cheap to clone.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path on the page's origin.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn stylesheets(&self) -> &[&'static str] {
        &self.stylesheets
    }

    pub fn style_rules(&self) -> &[String] {
        &self.style_rules
    }
}

fn build_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("sentiment-demo/", env!("CARGO_PKG_VERSION"))),
    );
    headers
}

fn bootstrap(settings: &AppSettings) -> Result<PageContext> {
    let http = reqwest::Client::builder()
        .default_headers(build_headers())
        .build()
        .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

    let mut style_rules = Vec::new();
    if settings.inject_svg_pointer_events {
        style_rules.push(SVG_POINTER_EVENTS_RULE.to_string());
        debug!("Injected SVG pointer-events rule");
    }

    info!("Main script loaded");

    Ok(PageContext {
        http,
        base_url: settings.base_url.trim_end_matches('/').to_string(),
        stylesheets: GLOBAL_STYLESHEETS.to_vec(),
        style_rules,
    })
}

/// One page load.
pub struct Page {
    settings: AppSettings,
    context: OnceCell<PageContext>,
}

impl Page {
    pub fn new(settings: AppSettings) -> Self {
        Self {
            settings,
            context: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Run the bootstrap if it has not run yet and return its context.
    pub fn content_loaded(&self) -> Result<&PageContext> {
        self.context.get_or_try_init(|| bootstrap(&self.settings))
    }

    pub fn is_loaded(&self) -> bool {
        self.context.get().is_some()
    }
}
