//! Field validators for values that need more than a type and a range.
//!
//! Each validator takes the raw (already trimmed) string and returns the reason
//! for rejecting it. The schema wraps the reason into a `FieldError`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Audio container formats the generation pipelines can ingest
pub static SUPPORTED_AUDIO_FORMATS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["mp3", "wav", "m4a", "flac", "ogg", "aac"]
        .iter()
        .copied()
        .collect()
});

/// Schemes accepted for DATABASE_URL
pub const DATABASE_URL_SCHEMES: &[&str] = &["postgresql", "postgres"];

static SIZE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\d+(?:\.\d+)?)(B|KB|MB|GB|TB)$").unwrap());

pub type Check = fn(&str) -> Result<(), String>;

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim)
}

/// Every comma-separated origin must be an http(s) origin.
pub fn validate_origins(value: &str) -> Result<(), String> {
    for origin in split_list(value) {
        if !(origin.starts_with("http://") || origin.starts_with("https://")) {
            return Err(format!("Invalid origin format: {}", origin));
        }
    }
    Ok(())
}

/// Every comma-separated format must be a supported audio format (case-insensitive).
pub fn validate_audio_formats(value: &str) -> Result<(), String> {
    for format in split_list(value) {
        let normalized = format.to_ascii_lowercase();
        if !SUPPORTED_AUDIO_FORMATS.contains(normalized.as_str()) {
            return Err(format!("Unsupported audio format: {}", normalized));
        }
    }
    Ok(())
}

/// Sizes are `<number><unit>` with unit in B, KB, MB, GB, TB (e.g. `100MB`, `1.5gb`).
pub fn validate_size_format(value: &str) -> Result<(), String> {
    if SIZE_PATTERN.is_match(value) {
        Ok(())
    } else {
        Err(format!("Invalid size format: {}", value))
    }
}

pub fn validate_redis_url(value: &str) -> Result<(), String> {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "redis" => Ok(()),
        _ => Err("Redis URL must start with 'redis://'".to_string()),
    }
}

pub fn validate_database_url(value: &str) -> Result<(), String> {
    match Url::parse(value) {
        Ok(url) if DATABASE_URL_SCHEMES.contains(&url.scheme()) => Ok(()),
        _ => Err("Database URL must use postgresql:// scheme".to_string()),
    }
}

/// Absolute URL with a host, so `mailto:` style values are refused.
pub fn validate_url(value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("Invalid URL: {}", e))?;
    if url.host().is_none() {
        return Err("URL must include a host".to_string());
    }
    Ok(())
}

/// Converts a size string such as `8GB` into bytes using binary multiples.
pub fn parse_size_to_bytes(value: &str) -> Result<u64, String> {
    let captures = SIZE_PATTERN
        .captures(value.trim())
        .ok_or_else(|| format!("Invalid size format: {}", value))?;

    let number: f64 = captures[1]
        .parse()
        .map_err(|_| format!("Invalid size format: {}", value))?;

    let multiplier: u64 = match captures[2].to_ascii_uppercase().as_str() {
        "B" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        "TB" => 1024 * 1024 * 1024 * 1024,
        _ => return Err(format!("Invalid size format: {}", value)),
    };

    Ok((number * multiplier as f64) as u64)
}

/// Accepts the usual truthy/falsy spellings, case-insensitively.
pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "t" | "y" => Ok(true),
        "false" | "0" | "no" | "off" | "f" | "n" => Ok(false),
        _ => Err(format!("'{}' is not a valid boolean", value)),
    }
}

/// Splits a comma-separated list, dropping empty entries.
pub fn parse_list(value: &str) -> Vec<String> {
    split_list(value)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
