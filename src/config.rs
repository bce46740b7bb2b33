use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings of a remote API.
///
/// Requests for a feature go to `{base_url}/{feature}` and `{base_url}/{feature}/{id}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    pub base_url: String,
    /// Request timeout in milliseconds. No timeout if `None`.
    pub timeout_ms: Option<u64>,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Returns the url of the collection of `feature`, or of the entity `id` in it.
    pub fn url(&self, feature: &str, id: Option<&str>) -> String {
        let base = self.base_url.trim_end_matches('/');
        match id {
            Some(id) => format!("{base}/{feature}/{id}"),
            None => format!("{base}/{feature}"),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".into(),
            timeout_ms: Some(30_000),
        }
    }
}
