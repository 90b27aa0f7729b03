// src/process/deaccumulate.rs
//! Conversion of cumulative quarterly balances into per-period values.
//!
//! The regulator's closing balances accumulate across the calendar year, so
//! the real spend of a quarter is the difference against the previous
//! quarter of the same operator and year. Q1 (or any quarter with no prior
//! value in its group) is taken as-is: the accumulation restarts every year.

/// A row carrying the numeric closing balance plus its de-accumulated
/// period value. Built from canonical records downstream of consolidation;
/// never persisted as part of the consolidated dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRow {
    /// Operator registration id, zero-padded to 6 digits.
    pub reg_ans: String,
    pub ano: i32,
    pub trimestre: u8,
    /// Parsed cumulative closing balance.
    pub saldo_final: f64,
    /// Per-period value derived by lag subtraction.
    pub valor_real: f64,
}

impl DerivedRow {
    pub fn new(reg_ans: String, ano: i32, trimestre: u8, saldo_final: f64) -> Self {
        Self {
            reg_ans,
            ano,
            trimestre,
            saldo_final,
            valor_real: saldo_final,
        }
    }
}

/// Sort rows by (operator, year, quarter) and fill in `valor_real`:
/// the cumulative balance for quarter 1, otherwise the difference against
/// the previous row of the same (operator, year) group. A quarter with no
/// prior value in its group falls back to the cumulative balance unchanged
/// rather than going null.
pub fn deaccumulate(rows: &mut [DerivedRow]) {
    rows.sort_by(|a, b| {
        (a.reg_ans.as_str(), a.ano, a.trimestre).cmp(&(b.reg_ans.as_str(), b.ano, b.trimestre))
    });

    for i in 0..rows.len() {
        rows[i].valor_real = rows[i].saldo_final;
        if rows[i].trimestre > 1 && i > 0 {
            let same_group =
                rows[i - 1].reg_ans == rows[i].reg_ans && rows[i - 1].ano == rows[i].ano;
            if same_group {
                rows[i].valor_real = rows[i].saldo_final - rows[i - 1].saldo_final;
            }
        }
    }
}

/// Pad a registration id to the 6-digit form used for registry joins.
/// Strips a spurious trailing `.0` left over from numeric round-trips.
pub fn pad_reg_ans(raw: &str) -> String {
    let mut s = raw.trim();
    if let Some(stripped) = s.strip_suffix(".0") {
        s = stripped;
    }
    format!("{:0>6}", s)
}
