const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Format a byte count with 1024-based units, e.g. `1.5 KB`.
/// Trailing zeros are dropped: `1024` is `1 KB`, not `1.00 KB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exponent = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && exponent < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        exponent += 1;
    }

    let formatted = format!("{:.2}", value);
    let formatted = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", formatted, SIZE_UNITS[exponent])
}

/// Initials for an avatar placeholder: first letter of the first and last
/// word, or of the only word.
pub fn initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let first_letter = |w: &str| w.chars().next().map(|c| c.to_uppercase().to_string());

    match words.as_slice() {
        [] => String::new(),
        [only] => first_letter(only).unwrap_or_default(),
        [first, .., last] => {
            let mut out = first_letter(first).unwrap_or_default();
            out.push_str(&first_letter(last).unwrap_or_default());
            out
        }
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an API timestamp as `dd/mm/yyyy HH:MM`
pub fn format_date(date: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date) {
        dt.format("%d/%m/%Y %H:%M").to_string()
    } else if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S%.f") {
        dt.format("%d/%m/%Y %H:%M").to_string()
    } else {
        date.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(536_870_912), "512 MB");
        assert_eq!(format_file_size(2_500_000), "2.38 MB");
        assert_eq!(format_file_size(1 << 40), "1 TB");
    }

    #[test]
    fn test_initials() {
        assert_eq!(initials("Bob Builder"), "BB");
        assert_eq!(initials("ada lovelace byron"), "AB");
        assert_eq!(initials("  cher "), "C");
        assert_eq!(initials(""), "");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Résumé final.pdf", 9), "Résumé...");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2024-03-05T14:07:00Z"), "05/03/2024 14:07");
        assert_eq!(format_date("2024-03-05T14:07:00.123"), "05/03/2024 14:07");
        assert_eq!(format_date("yesterday"), "yesterday");
    }
}
