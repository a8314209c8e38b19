use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Which stored items a monitor cycle re-checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorScope {
    /// Only items with a watch entry
    #[default]
    Watchlist,
    /// Every stored item
    Catalog,
}

impl MonitorScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Watchlist => "watchlist",
            Self::Catalog => "catalog",
        }
    }
}

impl fmt::Display for MonitorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MonitorScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "watchlist" => Ok(Self::Watchlist),
            "catalog" => Ok(Self::Catalog),
            other => Err(format!(
                "unknown monitor scope '{}', expected watchlist or catalog",
                other
            )),
        }
    }
}

/// Selection strategy handed to `Repository::list_monitored_items`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonitorStrategy {
    pub scope: MonitorScope,
    /// Whether items on the exclusion list are checked too
    pub include_excluded: bool,
}

impl MonitorStrategy {
    pub fn watchlist() -> Self {
        Self {
            scope: MonitorScope::Watchlist,
            include_excluded: false,
        }
    }

    pub fn catalog() -> Self {
        Self {
            scope: MonitorScope::Catalog,
            include_excluded: false,
        }
    }

    pub fn with_excluded(mut self, include_excluded: bool) -> Self {
        self.include_excluded = include_excluded;
        self
    }
}

impl fmt::Display for MonitorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.include_excluded {
            write!(f, "{} (including excluded)", self.scope)
        } else {
            write!(f, "{}", self.scope)
        }
    }
}
