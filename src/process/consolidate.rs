// src/process/consolidate.rs
//! Archive extraction and dataset consolidation.
//!
//! Every statement archive is unpacked, every contained CSV is read and
//! normalized, and the results are concatenated into one dataset plus one
//! audit trail with an entry per file examined. Per-file problems are
//! captured as audit statuses and never abort the run.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};
use zip::ZipArchive;

use crate::config::PipelineConfig;
use crate::process::normalize::{
    detect_columns, normalize_statement, CanonicalRecord, DetectedColumns, CANONICAL_HEADERS,
};
use crate::process::period::Period;
use crate::process::read::read_delimited;

/// Outcome of examining one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Ok,
    ReadError,
    SkippedNotMatchingSchema,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Ok => "ok",
            AuditStatus::ReadError => "read_error",
            AuditStatus::SkippedNotMatchingSchema => "skipped_not_matching_schema",
        }
    }
}

/// One audit row per source file examined. Created once during consolidation
/// and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub arquivo: String,
    pub ano: i32,
    pub trimestre: u8,
    pub status: AuditStatus,
    pub encoding: Option<&'static str>,
    pub linhas_raw: Option<usize>,
    pub colunas_raw: Option<usize>,
    pub linhas_normalizadas: Option<usize>,
    pub detected: DetectedColumns,
}

/// Find every statement archive under the configured download directory,
/// unpack the ones whose name carries a recognizable period, and return the
/// (extracted folder, period) pairs. Archives without a period marker are
/// logged and skipped — they are not statement bundles.
pub fn extract_archives(cfg: &PipelineConfig) -> Result<Vec<(PathBuf, Period)>> {
    let zips_root = cfg.statements_dir();
    if !zips_root.is_dir() {
        warn!(dir = %zips_root.display(), "statements directory not found");
        return Ok(Vec::new());
    }

    let pattern = format!("{}/**/*.zip", zips_root.display());
    let mut zip_paths: Vec<PathBuf> = glob::glob(&pattern)
        .context("building glob pattern for statement archives")?
        .filter_map(|entry| entry.ok())
        .collect();
    zip_paths.sort();

    if zip_paths.is_empty() {
        warn!(dir = %zips_root.display(), "no statement archives found");
        return Ok(Vec::new());
    }

    let mut extracted = Vec::new();
    for zip_path in zip_paths {
        let name = zip_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let Some(period) = Period::from_file_name(&name) else {
            warn!(archive = %name, "no period marker in archive name, skipping");
            continue;
        };

        let out_dir = cfg
            .extracted_dir()
            .join(period.year.to_string())
            .join(period.quarter_dir());
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("creating extraction dir {}", out_dir.display()))?;

        info!(archive = %name, dest = %out_dir.display(), "extracting");
        let file = File::open(&zip_path)
            .with_context(|| format!("opening archive {}", zip_path.display()))?;
        let mut archive = ZipArchive::new(file)
            .with_context(|| format!("reading archive {}", zip_path.display()))?;
        archive
            .extract(&out_dir)
            .with_context(|| format!("extracting archive {}", zip_path.display()))?;

        extracted.push((out_dir, period));
    }

    Ok(extracted)
}

/// Walk every file in every extracted folder (lexicographic path order) and
/// build the consolidated dataset plus the audit trail. Exact duplicate rows
/// are dropped, keeping the first occurrence. The audit trail is produced
/// even when the dataset comes out empty.
pub fn consolidate(extracted: &[(PathBuf, Period)]) -> (Vec<CanonicalRecord>, Vec<AuditEntry>) {
    let mut records: Vec<CanonicalRecord> = Vec::new();
    let mut audit: Vec<AuditEntry> = Vec::new();

    for (folder, period) in extracted {
        let pattern = format!("{}/**/*.csv", folder.display());
        let mut csv_paths: Vec<PathBuf> = match glob::glob(&pattern) {
            Ok(paths) => paths.filter_map(|entry| entry.ok()).collect(),
            Err(err) => {
                warn!(folder = %folder.display(), %err, "unreadable folder pattern");
                continue;
            }
        };
        csv_paths.sort();

        if csv_paths.is_empty() {
            warn!(folder = %folder.display(), "no CSV files in extracted folder");
            continue;
        }

        for csv_path in csv_paths {
            audit.push(examine_file(&csv_path, *period, &mut records));
        }
    }

    (dedup(records), audit)
}

fn examine_file(
    csv_path: &Path,
    period: Period,
    records: &mut Vec<CanonicalRecord>,
) -> AuditEntry {
    let arquivo = csv_path.display().to_string();

    let Some((table, encoding)) = read_delimited(csv_path) else {
        warn!(file = %arquivo, "failed to read CSV under every encoding/delimiter strategy");
        return AuditEntry {
            arquivo,
            ano: period.year,
            trimestre: period.quarter,
            status: AuditStatus::ReadError,
            encoding: None,
            linhas_raw: None,
            colunas_raw: None,
            linhas_normalizadas: None,
            detected: DetectedColumns::default(),
        };
    };

    let detected = detect_columns(&table.headers);
    match normalize_statement(&table, period) {
        Some(normalized) => {
            info!(file = %arquivo, rows = normalized.len(), "ok");
            let entry = AuditEntry {
                arquivo,
                ano: period.year,
                trimestre: period.quarter,
                status: AuditStatus::Ok,
                encoding: Some(encoding),
                linhas_raw: Some(table.row_count()),
                colunas_raw: Some(table.col_count()),
                linhas_normalizadas: Some(normalized.len()),
                detected,
            };
            records.extend(normalized);
            entry
        }
        None => {
            // Likely a bundled non-statement file (data dictionary etc).
            info!(file = %arquivo, "does not match the statement schema, skipping");
            AuditEntry {
                arquivo,
                ano: period.year,
                trimestre: period.quarter,
                status: AuditStatus::SkippedNotMatchingSchema,
                encoding: Some(encoding),
                linhas_raw: Some(table.row_count()),
                colunas_raw: Some(table.col_count()),
                linhas_normalizadas: None,
                detected,
            }
        }
    }
}

/// Remove exact duplicate rows, keeping first occurrences in order.
fn dedup(records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    let mut seen: HashSet<CanonicalRecord> = HashSet::with_capacity(records.len());
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        if seen.insert(record.clone()) {
            out.push(record);
        }
    }
    out
}

fn opt(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("")
}

/// Write the consolidated dataset as UTF-8-with-signature CSV. The canonical
/// header row is written even for an empty dataset.
pub fn write_consolidated(path: &Path, records: &[CanonicalRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(b"\xef\xbb\xbf").context("writing BOM")?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(CANONICAL_HEADERS)?;
    for r in records {
        writer.write_record([
            r.ano.as_str(),
            r.trimestre.as_str(),
            opt(&r.reg_ans),
            opt(&r.cd_conta_contabil),
            opt(&r.descricao_conta),
            opt(&r.vl_saldo_inicial),
            opt(&r.vl_saldo_final),
        ])?;
    }
    writer.flush().context("flushing consolidated CSV")?;
    Ok(())
}

/// Write the audit trail as UTF-8-with-signature CSV, one row per file.
pub fn write_audit(path: &Path, entries: &[AuditEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(b"\xef\xbb\xbf").context("writing BOM")?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record([
        "arquivo",
        "ano",
        "trimestre",
        "status",
        "encoding",
        "linhas_raw",
        "colunas_raw",
        "linhas_normalizadas",
        "det_reg_ans_col",
        "det_cd_conta_contabil_col",
        "det_descricao_conta_col",
        "det_vl_saldo_inicial_col",
        "det_vl_saldo_final_col",
    ])?;

    let count = |v: &Option<usize>| v.map(|n| n.to_string()).unwrap_or_default();
    for e in entries {
        writer.write_record([
            e.arquivo.clone(),
            e.ano.to_string(),
            e.trimestre.to_string(),
            e.status.as_str().to_string(),
            e.encoding.unwrap_or_default().to_string(),
            count(&e.linhas_raw),
            count(&e.colunas_raw),
            count(&e.linhas_normalizadas),
            opt(&e.detected.reg_ans).to_string(),
            opt(&e.detected.cd_conta_contabil).to_string(),
            opt(&e.detected.descricao_conta).to_string(),
            opt(&e.detected.vl_saldo_inicial).to_string(),
            opt(&e.detected.vl_saldo_final).to_string(),
        ])?;
    }
    writer.flush().context("flushing audit CSV")?;
    Ok(())
}
