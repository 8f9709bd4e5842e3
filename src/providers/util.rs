use chrono::NaiveDate;
use serde_json::Value;

/// Parses a reported amount. Alpha Vantage reports numbers as strings and
/// uses `"None"` or `"-"` for missing values.
pub fn parse_reported_value(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s == "None" || s == "-" {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}

pub fn parse_fiscal_date(value: Option<&Value>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value?.as_str()?.trim(), "%Y-%m-%d").ok()
}

/// Whether an informational message from the provider is about quota.
pub fn is_rate_limit_message(message: &str) -> bool {
    let message = message.to_lowercase();
    ["rate limit", "call frequency", "requests per day", "premium"]
        .iter()
        .any(|needle| message.contains(needle))
}
