//! Server-side procedures the platform exposes, as typed operations.
//!
//! Each variant carries its full parameter set; rendering produces the wire
//! name and the `p_`-prefixed parameter map the backend expects. Results are
//! procedure-specific JSON and stay opaque to this layer.

use chrono::NaiveDate;
use serde_json::Value;

/// One invocation of a known platform procedure.
#[derive(Clone, Debug, PartialEq)]
pub enum Procedure {
    /// Current pause/run state and counters of the automation system.
    GetSystemState,
    /// Best-selling products over a trailing window.
    GetTopProducts { limit: u32, days: u32 },
    /// Per-agent task throughput over a trailing window.
    GetAgentStats { days: u32 },
    /// Aggregated metrics for one day; `None` means the backend's "today".
    GetDailyAnalytics { date: Option<NaiveDate> },
    /// Check a proposed listing price against the allowed change percentage.
    ValidatePriceChange {
        listing_id: i64,
        new_price: f64,
        max_change_percent: f64,
    },
}

impl Procedure {
    /// Wire name of the server-side function.
    pub fn name(&self) -> &'static str {
        match self {
            Procedure::GetSystemState => "get_system_state",
            Procedure::GetTopProducts { .. } => "get_top_products",
            Procedure::GetAgentStats { .. } => "get_agent_stats",
            Procedure::GetDailyAnalytics { .. } => "get_daily_analytics",
            Procedure::ValidatePriceChange { .. } => "validate_price_change",
        }
    }

    /// Parameter map in declaration order. Names match the function
    /// signatures deployed on the backend.
    pub fn params(&self) -> Vec<(&'static str, Value)> {
        match self {
            Procedure::GetSystemState => Vec::new(),
            Procedure::GetTopProducts { limit, days } => vec![
                ("p_limit", Value::from(*limit)),
                ("p_days", Value::from(*days)),
            ],
            Procedure::GetAgentStats { days } => vec![("p_days", Value::from(*days))],
            Procedure::GetDailyAnalytics { date } => {
                let v = date
                    .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                    .unwrap_or(Value::Null);
                vec![("p_date", v)]
            }
            Procedure::ValidatePriceChange {
                listing_id,
                new_price,
                max_change_percent,
            } => vec![
                ("p_listing_id", Value::from(*listing_id)),
                ("p_new_price", Value::from(*new_price)),
                ("p_max_change_percent", Value::from(*max_change_percent)),
            ],
        }
    }
}

/// Default parameter values shared by the convenience wrappers. One place to
/// change policy instead of constants scattered per call site.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RpcDefaults {
    pub top_products_limit: u32,
    pub top_products_days: u32,
    pub agent_stats_days: u32,
    pub max_price_change_percent: f64,
}

impl Default for RpcDefaults {
    fn default() -> Self {
        RpcDefaults {
            top_products_limit: 10,
            top_products_days: 30,
            agent_stats_days: 7,
            max_price_change_percent: 30.0,
        }
    }
}

impl RpcDefaults {
    /// Built-in defaults overridden by `DROPSHIP_*` env vars where set.
    /// Unparseable values fall back silently to the built-ins.
    pub fn from_env() -> Self {
        let base = RpcDefaults::default();
        RpcDefaults {
            top_products_limit: env_parse("DROPSHIP_TOP_PRODUCTS_LIMIT", base.top_products_limit),
            top_products_days: env_parse("DROPSHIP_TOP_PRODUCTS_DAYS", base.top_products_days),
            agent_stats_days: env_parse("DROPSHIP_AGENT_STATS_DAYS", base.agent_stats_days),
            max_price_change_percent: env_parse(
                "DROPSHIP_MAX_PRICE_CHANGE_PERCENT",
                base.max_price_change_percent,
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn top_products_params_carry_both_knobs() {
        let p = Procedure::GetTopProducts { limit: 10, days: 30 };
        assert_eq!(p.name(), "get_top_products");
        assert_eq!(
            p.params(),
            vec![("p_limit", json!(10)), ("p_days", json!(30))]
        );
    }

    #[test]
    fn daily_analytics_date_none_is_null() {
        let p = Procedure::GetDailyAnalytics { date: None };
        assert_eq!(p.params(), vec![("p_date", Value::Null)]);
    }

    #[test]
    fn daily_analytics_date_renders_iso() {
        let d = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let p = Procedure::GetDailyAnalytics { date: Some(d) };
        assert_eq!(p.params(), vec![("p_date", json!("2026-08-01"))]);
    }

    #[test]
    fn system_state_takes_no_params() {
        assert!(Procedure::GetSystemState.params().is_empty());
    }
}
