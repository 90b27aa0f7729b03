// src/registry.rs
//! Loader for the CADOP operator registry CSV.
//!
//! The published file opens with a human-readable title line, is typically
//! latin1-encoded, and its header names drift between exports, so loading
//! reuses the same reading strategies and column heuristics as the statement
//! pipeline.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::process::columns::{normalize_header, pick_column, Role};
use crate::process::deaccumulate::pad_reg_ans;
use crate::process::read;

/// One registered health-plan operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryRecord {
    pub registro_ans: String,
    pub cnpj: String,
    pub razao_social: String,
    pub nome_fantasia: String,
    pub modalidade: String,
}

fn strip_quotes(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().to_string()
}

/// Load the registry from `path`. The first line is a discardable title;
/// the registration-number and corporate-name columns are required (resolved
/// by the usual substring heuristic) — without both, loading declines and
/// the caller proceeds without names. The remaining fields are best-effort.
pub fn load_registry(path: &Path) -> Result<Vec<RegistryRecord>> {
    let bytes =
        fs::read(path).with_context(|| format!("reading registry {}", path.display()))?;

    // Drop the title row before handing the rest to the delimited reader.
    let newline = bytes
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(bytes.len());
    let body = &bytes[newline..];

    let Some((table, encoding)) = read::read_delimited_bytes(body) else {
        bail!("registry {} is not parseable as delimited text", path.display());
    };

    let headers: Vec<String> = table
        .headers
        .iter()
        .map(|h| strip_quotes(h).to_uppercase())
        .collect();

    let reg_col = pick_column(Role::RegistrationNumber, &headers);
    let razao_col = pick_column(Role::CorporateName, &headers);
    let (Some(reg_col), Some(razao_col)) = (reg_col, razao_col) else {
        bail!(
            "registry {} is missing registration/corporate-name columns (headers: {:?})",
            path.display(),
            headers
        );
    };

    let index_of = |name: &str| headers.iter().position(|h| h == name);
    let reg_idx = index_of(reg_col).expect("picked header exists");
    let razao_idx = index_of(razao_col).expect("picked header exists");
    let find_loose = |needle: &str| {
        headers
            .iter()
            .position(|h| normalize_header(h).contains(needle))
    };
    let cnpj_idx = find_loose("cnpj");
    let fantasia_idx = find_loose("fantasia");
    let modalidade_idx = find_loose("modalidade");

    let cell = |row: &[String], idx: Option<usize>| -> String {
        idx.and_then(|i| row.get(i)).map(|v| strip_quotes(v)).unwrap_or_default()
    };

    let records: Vec<RegistryRecord> = table
        .rows
        .iter()
        .map(|row| RegistryRecord {
            registro_ans: cell(row, Some(reg_idx)),
            cnpj: cell(row, cnpj_idx),
            razao_social: cell(row, Some(razao_idx)),
            nome_fantasia: cell(row, fantasia_idx),
            modalidade: cell(row, modalidade_idx),
        })
        .filter(|r| !r.registro_ans.is_empty())
        .collect();

    info!(
        path = %path.display(),
        encoding,
        operators = records.len(),
        "loaded registry"
    );
    Ok(records)
}

/// Index corporate names by zero-padded registration id for ranking joins.
pub fn name_index(records: &[RegistryRecord]) -> HashMap<String, String> {
    records
        .iter()
        .map(|r| (pad_reg_ans(&r.registro_ans), r.razao_social.clone()))
        .collect()
}
