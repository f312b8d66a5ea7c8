//! Client configuration
//!
//! Configuration is an immutable value handed to the client at construction.
//! It can be built in code or loaded from JSON; every field has a default.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::{SearchError, SearchResult};
use crate::observability::Severity;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Index used by bulk targets that name none (default: none)
    #[serde(default)]
    pub default_index: Option<String>,

    /// Page size for plain searches and sort cursors (default: 10)
    #[serde(default = "default_search_page_size")]
    pub search_page_size: usize,

    /// Page size for stateful cursors (default: 1000)
    #[serde(default = "default_scroll_page_size")]
    pub scroll_page_size: usize,

    /// Keep-alive for stateful cursors (default: "5m")
    #[serde(default = "default_scroll_keep_alive")]
    pub scroll_keep_alive: KeepAlive,

    /// Bulk auto-flush threshold (default: disabled)
    #[serde(default)]
    pub bulk_auto_flush: Option<usize>,

    /// Per-request timeout forwarded to the transport (default: none)
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    /// Minimum log severity (default: logging disabled)
    #[serde(default)]
    pub log_level: Option<Severity>,
}

fn default_search_page_size() -> usize {
    10
}

fn default_scroll_page_size() -> usize {
    1000
}

fn default_scroll_keep_alive() -> KeepAlive {
    KeepAlive::minutes(5)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_index: None,
            search_page_size: default_search_page_size(),
            scroll_page_size: default_scroll_page_size(),
            scroll_keep_alive: default_scroll_keep_alive(),
            bulk_auto_flush: None,
            request_timeout_ms: None,
            log_level: None,
        }
    }
}

impl ClientConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json_str(json: &str) -> SearchResult<Self> {
        let config: ClientConfig = serde_json::from_str(json)
            .map_err(|e| SearchError::Config(format!("Invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> SearchResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SearchError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Set the default index
    pub fn with_default_index(mut self, index: impl Into<String>) -> Self {
        self.default_index = Some(index.into());
        self
    }

    /// Set the bulk auto-flush threshold
    pub fn with_bulk_auto_flush(mut self, threshold: usize) -> Self {
        self.bulk_auto_flush = Some(threshold);
        self
    }

    /// Set the minimum log severity
    pub fn with_log_level(mut self, level: Severity) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Set the per-request timeout
    pub fn with_request_timeout(mut self, timeout: StdDuration) -> Self {
        self.request_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Per-request timeout as a std duration
    pub fn request_timeout(&self) -> Option<StdDuration> {
        self.request_timeout_ms.map(StdDuration::from_millis)
    }

    /// Reject zero page sizes and a zero flush threshold
    pub fn validate(&self) -> SearchResult<()> {
        if self.search_page_size == 0 {
            return Err(SearchError::Config("search_page_size must be > 0".into()));
        }
        if self.scroll_page_size == 0 {
            return Err(SearchError::Config("scroll_page_size must be > 0".into()));
        }
        if self.bulk_auto_flush == Some(0) {
            return Err(SearchError::Config("bulk_auto_flush must be > 0".into()));
        }
        Ok(())
    }
}

/// Keep-alive duration in the engine's time-unit grammar (`30s`, `5m`, `1h`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeepAlive(Duration);

impl KeepAlive {
    /// Wrap a positive duration
    pub fn new(duration: Duration) -> SearchResult<Self> {
        if duration <= Duration::zero() {
            return Err(SearchError::Config(format!(
                "keep-alive must be positive, got {}ms",
                duration.num_milliseconds()
            )));
        }
        Ok(Self(duration))
    }

    pub fn seconds(secs: u32) -> Self {
        Self(Duration::seconds(i64::from(secs.max(1))))
    }

    pub fn minutes(mins: u32) -> Self {
        Self(Duration::minutes(i64::from(mins.max(1))))
    }

    pub fn hours(hours: u32) -> Self {
        Self(Duration::hours(i64::from(hours.max(1))))
    }

    /// The underlying duration
    pub fn duration(&self) -> Duration {
        self.0
    }

    /// Render with the largest unit that divides the duration exactly
    pub fn as_param(&self) -> String {
        let ms = self.0.num_milliseconds();
        const UNITS: [(i64, &str); 4] = [
            (86_400_000, "d"),
            (3_600_000, "h"),
            (60_000, "m"),
            (1_000, "s"),
        ];
        for (size, unit) in UNITS {
            if ms % size == 0 {
                return format!("{}{}", ms / size, unit);
            }
        }
        format!("{}ms", ms)
    }
}

impl fmt::Display for KeepAlive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_param())
    }
}

impl FromStr for KeepAlive {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| SearchError::Config(format!("keep-alive '{}' has no unit", s)))?;
        let (digits, unit) = s.split_at(split);
        let amount: i64 = digits
            .parse()
            .map_err(|_| SearchError::Config(format!("keep-alive '{}' has no amount", s)))?;

        let duration = match unit {
            "ms" => Duration::try_milliseconds(amount),
            "s" => Duration::try_seconds(amount),
            "m" => Duration::try_minutes(amount),
            "h" => Duration::try_hours(amount),
            "d" => Duration::try_days(amount),
            other => {
                return Err(SearchError::Config(format!(
                    "keep-alive unit '{}' not supported",
                    other
                )))
            }
        };
        let duration = duration
            .ok_or_else(|| SearchError::Config(format!("keep-alive '{}' is out of range", s)))?;
        Self::new(duration)
    }
}

impl TryFrom<String> for KeepAlive {
    type Error = SearchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeepAlive> for String {
    fn from(value: KeepAlive) -> Self {
        value.as_param()
    }
}
