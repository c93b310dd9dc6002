//! Formatting helpers for the view

/// `m:ss` for a position in seconds
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0) as u64 } else { 0 };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Width of the index column for `item_count` rows, including padding
pub fn num_width(item_count: usize) -> usize {
    item_count.max(1).to_string().len() + 1
}

/// Pad or cut `s` to exactly `max_width` characters
pub fn truncate_string(s: &str, max_width: usize) -> String {
    if s.chars().count() > max_width {
        let truncated: String = s.chars().take(max_width.saturating_sub(3)).collect();
        format!("{:<width$}", format!("{}...", truncated), width = max_width)
    } else {
        format!("{:<width$}", s, width = max_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(59.9), "0:59");
        assert_eq!(format_duration(200.0), "3:20");
        assert_eq!(format_duration(f64::NAN), "0:00");
    }

    #[test]
    fn truncation_pads_and_cuts() {
        assert_eq!(truncate_string("abc", 5), "abc  ");
        assert_eq!(truncate_string("abcdefgh", 6), "abc...");
    }

    #[test]
    fn index_column_width() {
        assert_eq!(num_width(0), 2);
        assert_eq!(num_width(9), 2);
        assert_eq!(num_width(10), 3);
    }
}
