use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/openmrs";
pub const BASE_URL_ENV: &str = "LABTREND_BASE_URL";
pub const TIMEOUT_ENV: &str = "LABTREND_TIMEOUT_SECS";

/// Where the OpenMRS server lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub fhir_path: String,
    pub rest_path: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            fhir_path: "/ws/fhir2/R4".to_string(),
            rest_path: "/ws/rest/v1".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Defaults, overridden by `LABTREND_BASE_URL` and `LABTREND_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|value| !value.trim().is_empty()) {
            config.base_url = base_url;
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout_secs = secs,
                _ => tracing::warn!(value = %raw, "Ignoring invalid {TIMEOUT_ENV}"),
            }
        }
        config
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn fhir_url(&self, resource: &str) -> String {
        format!(
            "{}{}/{resource}",
            self.base_url.trim_end_matches('/'),
            self.fhir_path
        )
    }

    pub fn rest_url(&self, resource: &str) -> String {
        format!(
            "{}{}/{resource}",
            self.base_url.trim_end_matches('/'),
            self.rest_path
        )
    }
}
