//! Human-readable number formatting for hosts.

const SUFFIXES: [(f64, &str); 5] = [
    (1e15, "Q"),
    (1e12, "T"),
    (1e9, "B"),
    (1e6, "M"),
    (1e3, "K"),
];

/// Two decimals, scaled to the largest suffix the value reaches.
pub fn format_number(value: f64) -> String {
    for (scale, suffix) in SUFFIXES {
        if value >= scale {
            return format!("{:.2}{suffix}", value / scale);
        }
    }
    format!("{value:.2}")
}
