// src/process/numeric.rs

/// Parse a monetary string in Brazilian locale convention (`.` thousands,
/// `,` decimal) into an `f64`. Total over all inputs: missing markers and
/// anything unparseable come back as `0.0` — aggregation over these files is
/// large-volume and individually low-stakes per cell, so malformed cells are
/// zeroed, never fatal.
pub fn clean_numeric(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let lower = trimmed.to_lowercase();
    if lower == "nan" || lower == "none" {
        return 0.0;
    }

    let mut s = trimmed.to_string();
    if s.contains(',') {
        // `.` is the thousands separator whenever a decimal comma is present.
        s = s.replace('.', "").replace(',', ".");
    }
    let scrubbed: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    scrubbed.parse::<f64>().unwrap_or(0.0)
}
