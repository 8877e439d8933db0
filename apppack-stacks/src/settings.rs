//! Engine settings with environment overrides

use std::time::Duration;

use log::warn;

pub const DEFAULT_TEMPLATE_BUCKET: &str = "apppack-cloudformations";
pub const DEFAULT_TABLE: &str = "apppack";
pub const DEFAULT_POLL_SECONDS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Bucket holding the versioned template artifacts
    pub template_bucket: String,
    /// Directory table name
    pub table_name: String,
    pub poll_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            template_bucket: DEFAULT_TEMPLATE_BUCKET.to_string(),
            table_name: DEFAULT_TABLE.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECONDS),
        }
    }
}

impl Settings {
    /// Read `APPPACK_TEMPLATE_BUCKET`, `APPPACK_TABLE` and `APPPACK_POLL_SECONDS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        if let Some(bucket) = lookup("APPPACK_TEMPLATE_BUCKET").filter(|v| !v.is_empty()) {
            settings.template_bucket = bucket;
        }
        if let Some(table) = lookup("APPPACK_TABLE").filter(|v| !v.is_empty()) {
            settings.table_name = table;
        }
        if let Some(raw) = lookup("APPPACK_POLL_SECONDS") {
            match raw.parse::<u64>() {
                Ok(seconds) => settings.poll_interval = Duration::from_secs(seconds),
                Err(_) => warn!("ignoring APPPACK_POLL_SECONDS={}: not a number", raw),
            }
        }
        settings
    }
}
