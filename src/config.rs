use serde::{Deserialize, Serialize};

const DEFAULT_CLOUD_URL: &str =
    "https://us-central1-storefront-services.cloudfunctions.net/shopping-assistant";
const DEFAULT_LOCAL_URL: &str = "http://localhost:3002";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BackendMode {
    Cloud,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub mode: BackendMode,
}

impl BackendConfig {
    pub fn from_env() -> Self {
        let mode = std::env::var("ASSISTANT_BACKEND_MODE").ok();
        Self::from_mode(mode.as_deref())
    }

    pub fn from_mode(mode: Option<&str>) -> Self {
        match mode {
            Some("local") => Self {
                base_url: std::env::var("ASSISTANT_LOCAL_URL")
                    .unwrap_or_else(|_| DEFAULT_LOCAL_URL.into()),
                mode: BackendMode::Local,
            },
            // "cloud", legacy "firebase", and unset all resolve to the hosted function
            _ => Self {
                base_url: std::env::var("ASSISTANT_CLOUD_URL")
                    .unwrap_or_else(|_| DEFAULT_CLOUD_URL.into()),
                mode: BackendMode::Cloud,
            },
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let mode = if host_is_cloud_function(&base_url) {
            BackendMode::Cloud
        } else {
            BackendMode::Local
        };
        Self { base_url, mode }
    }

    pub fn is_cloud_function(&self) -> bool {
        host_is_cloud_function(&self.base_url)
    }
}

fn host_is_cloud_function(base_url: &str) -> bool {
    url::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .map(|h| h == "cloudfunctions.net" || h.ends_with(".cloudfunctions.net"))
        .unwrap_or(false)
}
