// src/process/normalize.rs
//! Projection of a raw statement table onto the canonical seven-column
//! schema. Pure: no I/O, total over its inputs.

use crate::process::columns::{pick_column, Role};
use crate::process::period::Period;
use crate::process::read::RawTable;

/// Header of the consolidated dataset, in output order.
pub const CANONICAL_HEADERS: [&str; 7] = [
    "ano",
    "trimestre",
    "reg_ans",
    "cd_conta_contabil",
    "descricao_conta",
    "vl_saldo_inicial",
    "vl_saldo_final",
];

/// One normalized statement row. All values stay strings at this stage; the
/// numeric reading happens downstream where it is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalRecord {
    pub ano: String,
    pub trimestre: String,
    pub reg_ans: Option<String>,
    pub cd_conta_contabil: Option<String>,
    pub descricao_conta: Option<String>,
    pub vl_saldo_inicial: Option<String>,
    pub vl_saldo_final: Option<String>,
}

/// Which raw column filled each target role, for the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedColumns {
    pub reg_ans: Option<String>,
    pub cd_conta_contabil: Option<String>,
    pub descricao_conta: Option<String>,
    pub vl_saldo_inicial: Option<String>,
    pub vl_saldo_final: Option<String>,
}

/// Resolve all five target columns against `headers`, purely for audit
/// visibility; `None` entries mean the role went unresolved.
pub fn detect_columns(headers: &[String]) -> DetectedColumns {
    DetectedColumns {
        reg_ans: pick_column(Role::RegAns, headers).map(str::to_string),
        cd_conta_contabil: pick_column(Role::AccountCode, headers).map(str::to_string),
        descricao_conta: pick_column(Role::AccountDescription, headers).map(str::to_string),
        vl_saldo_inicial: pick_column(Role::OpeningBalance, headers).map(str::to_string),
        vl_saldo_final: pick_column(Role::ClosingBalance, headers).map(str::to_string),
    }
}

/// Trim a cell and coerce the sentinel values to `None`.
fn clean_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "nan" || trimmed == "None" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Project `table` into canonical records stamped with `period`.
///
/// Returns `None` when the table is empty or when either the account-code or
/// the description column cannot be resolved — such a file is presumed to be
/// a different artifact bundled in the same archive (a data dictionary, say),
/// not an error.
pub fn normalize_statement(table: &RawTable, period: Period) -> Option<Vec<CanonicalRecord>> {
    if table.rows.is_empty() {
        return None;
    }

    let detected = detect_columns(&table.headers);
    let cd_conta_col = detected.cd_conta_contabil.as_deref()?;
    let desc_col = detected.descricao_conta.as_deref()?;

    let index_of = |name: &str| table.headers.iter().position(|h| h == name);
    let cd_conta_idx = index_of(cd_conta_col)?;
    let desc_idx = index_of(desc_col)?;
    let reg_ans_idx = detected.reg_ans.as_deref().and_then(index_of);
    let saldo_ini_idx = detected.vl_saldo_inicial.as_deref().and_then(index_of);
    let saldo_fim_idx = detected.vl_saldo_final.as_deref().and_then(index_of);

    let cell = |row: &[String], idx: Option<usize>| -> Option<String> {
        idx.and_then(|i| row.get(i)).and_then(|v| clean_cell(v))
    };

    let ano = period.year.to_string();
    let trimestre = period.quarter.to_string();

    let records = table
        .rows
        .iter()
        .map(|row| CanonicalRecord {
            ano: ano.clone(),
            trimestre: trimestre.clone(),
            reg_ans: cell(row, reg_ans_idx),
            cd_conta_contabil: cell(row, Some(cd_conta_idx)),
            descricao_conta: cell(row, Some(desc_idx)),
            vl_saldo_inicial: cell(row, saldo_ini_idx),
            vl_saldo_final: cell(row, saldo_fim_idx),
        })
        .collect();

    Some(records)
}
