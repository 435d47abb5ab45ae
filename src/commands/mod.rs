//! Interactive subcommands

use chrono::NaiveDateTime;

pub mod list;
pub mod org;
pub mod resource;
pub mod search;
pub mod show;
pub mod stats;
pub mod tool;

/// Human readable byte size; unknown or zero sizes print as "Unknown"
pub fn format_size(size: Option<u64>) -> String {
    let Some(bytes) = size.filter(|b| *b > 0) else {
        return "Unknown".to_string();
    };
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{:.2} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.2} TB", value)
}

/// `2024-03-01`, or "N/A"
pub fn format_date(value: Option<NaiveDateTime>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// `2024-03-01 12:30:00`, or "N/A"
pub fn format_datetime(value: Option<NaiveDateTime>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

/// First `max` characters, on a char boundary
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
