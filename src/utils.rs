/// Utility functions
use chrono::{DateTime, NaiveDateTime, Timelike};
use serde_json::Value;

/// Extract number from JSON value
pub fn num(v: &Value) -> Option<f64> {
    if let Some(x) = v.as_f64() {
        return Some(x);
    }
    if let Some(s) = v.as_str() {
        return s.parse::<f64>().ok();
    }
    None
}

/// Pick string value from JSON by trying multiple keys
pub fn s_pick(v: &Value, keys: &[&str]) -> Option<String> {
    for k in keys {
        if let Some(x) = v.get(*k) {
            if let Some(s) = x.as_str() {
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            } else if x.is_number() {
                return Some(x.to_string());
            }
        }
    }
    None
}

/// Round to one decimal place
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Hour of day of a provider timestamp, in the timestamp's own offset
pub fn scheduled_hour(s: &str) -> Option<u32> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.hour());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|ndt| ndt.hour())
}

/// Normalize a phone number to `+<digits>`; None when it can't be a valid number
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let mut digits = String::with_capacity(body.len());
    for c in body.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return None,
        }
    }
    if !(10..=15).contains(&digits.len()) {
        return None;
    }
    Some(format!("+{}", digits))
}
