// src/process/period.rs
use once_cell::sync::Lazy;
use regex::Regex;

/// A reporting period, e.g. `1T2024` in `1T2024.zip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Period {
    pub year: i32,
    /// 1..=4
    pub quarter: u8,
}

static PERIOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([1-4])T(20\d{2})").expect("period regex is valid"));

impl Period {
    /// Extract the period encoded in an archive name. Names observed on the
    /// ANS FTP look like `1T2024.zip`, `4T2024.zip`, `2T2025.zip`; anything
    /// without that marker is not a statement bundle and yields `None`.
    pub fn from_file_name(name: &str) -> Option<Period> {
        let caps = PERIOD_RE.captures(name)?;
        let quarter: u8 = caps.get(1)?.as_str().parse().ok()?;
        let year: i32 = caps.get(2)?.as_str().parse().ok()?;
        Some(Period { year, quarter })
    }

    /// Folder name for extracted contents, e.g. `1T`.
    pub fn quarter_dir(&self) -> String {
        format!("{}T", self.quarter)
    }
}
