//! Run configuration.
//!
//! Deserialized by the binary from YAML; the core only validates and
//! interprets it.

use std::sync::LazyLock;

use chrono::{Days, Months, NaiveDate};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::normalize::DateTimePolicy;

static RELATIVE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@today(?:([+-])(\d+)([dwmy]))?$").expect("valid relative date regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Calendar feed URLs.
    #[serde(alias = "ics_urls", default)]
    pub feeds: Vec<String>,

    /// IANA zone used for date resolution and the run timestamp.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub datetime_policy: DateTimePolicy,

    /// Earliest decision date kept (`YYYY-MM-DD`, `@today`, `@today-30d`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date: Option<String>,

    /// Latest decision date kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date: Option<String>,

    #[serde(default)]
    pub debug: bool,
}

fn default_timezone() -> String {
    "UTC".into()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            timezone: default_timezone(),
            datetime_policy: DateTimePolicy::default(),
            min_date: None,
            max_date: None,
            debug: false,
        }
    }
}

impl RunConfig {
    /// Config with the given feeds and defaults elsewhere.
    pub fn with_feeds<I, S>(feeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            feeds: feeds.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A config must name at least one non-blank feed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feeds.iter().all(|f| f.trim().is_empty()) {
            return Err(ConfigError::NoFeeds);
        }
        Ok(())
    }

    /// Configured zone, or UTC when the name is not a known IANA zone.
    pub fn resolve_timezone(&self) -> Tz {
        match self.timezone.trim().parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(timezone = %self.timezone, "unknown timezone, falling back to UTC");
                Tz::UTC
            }
        }
    }

    /// Resolve `min_date`/`max_date` against `today`.
    pub fn date_window(&self, today: NaiveDate) -> Result<DateWindow, ConfigError> {
        let resolve = |expr: &Option<String>| {
            expr.as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(|e| resolve_date_expr(e, today))
                .transpose()
        };
        Ok(DateWindow {
            min: resolve(&self.min_date)?,
            max: resolve(&self.max_date)?,
        })
    }
}

/// Inclusive decision-date bounds; a missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub min: Option<NaiveDate>,
    pub max: Option<NaiveDate>,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.min.is_none_or(|min| date >= min) && self.max.is_none_or(|max| date <= max)
    }
}

/// `YYYY-MM-DD`, `@today`, or `@today±N` with a `d`/`w`/`m`/`y` unit.
pub fn resolve_date_expr(expr: &str, today: NaiveDate) -> Result<NaiveDate, ConfigError> {
    let invalid = || ConfigError::InvalidDateExpr {
        expr: expr.to_string(),
    };

    let normalized = expr.trim().to_ascii_lowercase();
    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        return Ok(date);
    }

    let caps = RELATIVE_DATE.captures(&normalized).ok_or_else(invalid)?;
    let (Some(sign), Some(amount), Some(unit)) = (caps.get(1), caps.get(2), caps.get(3)) else {
        return Ok(today);
    };
    let amount: u32 = amount.as_str().parse().map_err(|_| invalid())?;
    let forward = sign.as_str() == "+";

    let shifted = match unit.as_str() {
        "d" | "w" => {
            let days = if unit.as_str() == "w" {
                u64::from(amount) * 7
            } else {
                u64::from(amount)
            };
            let days = Days::new(days);
            if forward {
                today.checked_add_days(days)
            } else {
                today.checked_sub_days(days)
            }
        }
        _ => {
            let months = if unit.as_str() == "y" {
                amount.checked_mul(12)
            } else {
                Some(amount)
            };
            months.map(Months::new).and_then(|m| {
                if forward {
                    today.checked_add_months(m)
                } else {
                    today.checked_sub_months(m)
                }
            })
        }
    };
    shifted.ok_or_else(invalid)
}
