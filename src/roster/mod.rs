// src/roster/mod.rs
//! Extraction of the procedure roster from the Anexo I PDF.
//!
//! The heavy lifting (PDF text extraction) is delegated to `pdf_extract`;
//! everything on top is text pattern matching: find the OD/AMB legend in
//! the document, keep the lines that look like roster rows, and expand the
//! abbreviations to their legend descriptions.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};
use zip::write::FileOptions;
use zip::CompressionMethod;

/// Coverage-segment markers that terminate a roster line. Only OD and AMB
/// are carried into the output; the rest are recognized so they do not end
/// up glued to procedure names.
const SEGMENT_MARKERS: &[&str] = &["OD", "AMB", "HCO", "HSO", "PAC", "DUT"];

/// Line prefixes that are layout noise, not roster rows.
const NOISE_PREFIXES: &[&str] = &[
    "PROCEDIMENTO",
    "ANEXO",
    "ROL DE",
    "LEGENDA",
    "CAPITULO",
    "CAPÍTULO",
    "GRUPO",
    "SUBGRUPO",
    "VIGENCIA",
    "VIGÊNCIA",
    "PAGINA",
    "PÁGINA",
    "RN ",
];

/// One roster row: the procedure name plus its OD/AMB coverage cells.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RosterRow {
    pub procedimento: String,
    pub od: Option<String>,
    pub amb: Option<String>,
}

static OD_LEGEND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bOD\b\s*[-:]\s*([^.;\n]+)").expect("OD legend regex is valid"));
static AMB_LEGEND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bAMB\b\s*[-:]\s*([^.;\n]+)").expect("AMB legend regex is valid")
});

/// Extract the whole text of a PDF.
pub fn extract_text(pdf_path: &Path) -> Result<String> {
    info!(pdf = %pdf_path.display(), "extracting PDF text");
    pdf_extract::extract_text(pdf_path)
        .map_err(|e| anyhow!("extracting text from {}: {}", pdf_path.display(), e))
}

/// Find the OD/AMB legend ("OD: ..." / "AMB - ...") anywhere in the
/// document text. The annex layout drifts between editions, so missing
/// entries fall back to the well-known meanings instead of failing.
pub fn extract_legend(text: &str) -> BTreeMap<String, String> {
    let mut legend = BTreeMap::new();

    if let Some(caps) = OD_LEGEND_RE.captures(text) {
        legend.insert("OD".to_string(), caps[1].trim().to_string());
    }
    if let Some(caps) = AMB_LEGEND_RE.captures(text) {
        legend.insert("AMB".to_string(), caps[1].trim().to_string());
    }

    legend
        .entry("OD".to_string())
        .or_insert_with(|| "Odontológico".to_string());
    legend
        .entry("AMB".to_string())
        .or_insert_with(|| "Ambulatorial".to_string());
    legend
}

fn is_noise_line(line: &str) -> bool {
    let upper = line.to_uppercase();
    NOISE_PREFIXES.iter().any(|p| upper.starts_with(p))
}

/// Keep the lines of the extracted text that look like roster rows: a
/// procedure name followed by one or more coverage-segment markers. Exact
/// duplicate rows (procedures repeated across page breaks) are dropped.
pub fn parse_roster(text: &str) -> Vec<RosterRow> {
    let mut rows: Vec<RosterRow> = Vec::new();
    let mut seen: std::collections::HashSet<RosterRow> = std::collections::HashSet::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || is_noise_line(line) {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let mut first_marker = tokens.len();
        while first_marker > 0 && SEGMENT_MARKERS.contains(&tokens[first_marker - 1]) {
            first_marker -= 1;
        }
        let markers = &tokens[first_marker..];
        if markers.is_empty() {
            continue;
        }

        let procedimento = tokens[..first_marker].join(" ");
        if procedimento.len() < 3 {
            continue;
        }

        let row = RosterRow {
            procedimento,
            od: markers.contains(&"OD").then(|| "OD".to_string()),
            amb: markers.contains(&"AMB").then(|| "AMB".to_string()),
        };
        if seen.insert(row.clone()) {
            rows.push(row);
        }
    }

    rows
}

/// Replace the OD/AMB abbreviation cells with their legend descriptions.
pub fn expand_abbreviations(rows: &mut [RosterRow], legend: &BTreeMap<String, String>) {
    for row in rows {
        if let (Some(od), Some(desc)) = (row.od.as_mut(), legend.get("OD")) {
            if *od == "OD" {
                *od = desc.clone();
            }
        }
        if let (Some(amb), Some(desc)) = (row.amb.as_mut(), legend.get("AMB")) {
            if *amb == "AMB" {
                *amb = desc.clone();
            }
        }
    }
}

/// Write the roster as UTF-8-with-signature CSV.
pub fn write_roster_csv(path: &Path, rows: &[RosterRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(b"\xef\xbb\xbf").context("writing BOM")?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(["procedimento", "od", "amb"])?;
    for row in rows {
        writer.write_record([
            row.procedimento.as_str(),
            row.od.as_deref().unwrap_or(""),
            row.amb.as_deref().unwrap_or(""),
        ])?;
    }
    writer.flush().context("flushing roster CSV")?;
    Ok(())
}

/// Package one file into the deliverable ZIP under `arcname`.
pub fn package_zip(input_file: &Path, out_zip: &Path, arcname: &str) -> Result<()> {
    if let Some(parent) = out_zip.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let file = File::create(out_zip).with_context(|| format!("creating {}", out_zip.display()))?;
    let mut zip = zip::ZipWriter::new(file);
    let options: FileOptions<'_, ()> =
        FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(arcname, options)?;
    let bytes =
        fs::read(input_file).with_context(|| format!("reading {}", input_file.display()))?;
    zip.write_all(&bytes)?;
    zip.finish()?;
    Ok(())
}

/// Locate the Anexo I PDF in the raw directory: the canonical download name
/// first, then a name heuristic that accepts roster-looking PDFs and rejects
/// the Anexo II / DUT one.
pub fn find_anexo_i(raw_dir: &Path) -> Option<PathBuf> {
    let canonical = raw_dir.join("Anexo_I_Rol_Procedimentos.pdf");
    if canonical.is_file() {
        return Some(canonical);
    }

    let pattern = format!("{}/*.pdf", raw_dir.display());
    let candidates: Vec<PathBuf> = glob::glob(&pattern)
        .ok()?
        .filter_map(|entry| entry.ok())
        .collect();

    for path in candidates {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_lowercase();
        if !name.contains("anexo") {
            continue;
        }
        if name.contains("dut") || name.contains("ii") {
            continue;
        }
        if name.contains("_i") || name.contains('1') || name.contains("rol") {
            return Some(path);
        }
    }

    warn!(dir = %raw_dir.display(), "Anexo I PDF not found");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE_TEXT: &str = "\
ANEXO I - ROL DE PROCEDIMENTOS E EVENTOS EM SAUDE
PROCEDIMENTO OD AMB
CONSULTA ODONTOLOGICA OD
HEMOGRAMA COMPLETO AMB
ATENDIMENTO AMBULATORIAL EM PRONTO SOCORRO OD AMB
CAPÍTULO II
Legenda: OD: Procedimentos odontológicos; AMB - Procedimentos ambulatoriais.
";

    #[test]
    fn legend_is_found_by_pattern() {
        let legend = extract_legend(SAMPLE_TEXT);
        assert_eq!(legend["OD"], "Procedimentos odontológicos");
        assert_eq!(legend["AMB"], "Procedimentos ambulatoriais");
    }

    #[test]
    fn legend_falls_back_to_defaults() {
        let legend = extract_legend("um pdf sem legenda");
        assert_eq!(legend["OD"], "Odontológico");
        assert_eq!(legend["AMB"], "Ambulatorial");
    }

    #[test]
    fn parses_rows_with_trailing_markers() {
        let rows = parse_roster(SAMPLE_TEXT);
        assert_eq!(
            rows,
            vec![
                RosterRow {
                    procedimento: "CONSULTA ODONTOLOGICA".to_string(),
                    od: Some("OD".to_string()),
                    amb: None,
                },
                RosterRow {
                    procedimento: "HEMOGRAMA COMPLETO".to_string(),
                    od: None,
                    amb: Some("AMB".to_string()),
                },
                RosterRow {
                    procedimento: "ATENDIMENTO AMBULATORIAL EM PRONTO SOCORRO".to_string(),
                    od: Some("OD".to_string()),
                    amb: Some("AMB".to_string()),
                },
            ]
        );
    }

    #[test]
    fn duplicate_rows_across_page_breaks_collapse() {
        let text = "CONSULTA OD\nPágina 2\nCONSULTA OD\n";
        let rows = parse_roster(text);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn lines_without_markers_are_ignored() {
        let rows = parse_roster("texto corrido qualquer\noutra linha\n");
        assert!(rows.is_empty());
    }

    #[test]
    fn abbreviations_expand_via_legend() {
        let mut rows = parse_roster(SAMPLE_TEXT);
        let legend = extract_legend(SAMPLE_TEXT);
        expand_abbreviations(&mut rows, &legend);
        assert_eq!(rows[0].od.as_deref(), Some("Procedimentos odontológicos"));
        assert_eq!(rows[1].amb.as_deref(), Some("Procedimentos ambulatoriais"));
    }

    #[test]
    fn roster_csv_and_zip_round_trip() {
        let tmp = tempdir().unwrap();
        let csv_path = tmp.path().join("rol.csv");
        let zip_path = tmp.path().join("Teste_resultadofinal.zip");

        let mut rows = parse_roster(SAMPLE_TEXT);
        expand_abbreviations(&mut rows, &extract_legend(SAMPLE_TEXT));
        write_roster_csv(&csv_path, &rows).unwrap();
        package_zip(&csv_path, &zip_path, "rol_procedimentos_ans.csv").unwrap();

        let text = fs::read_to_string(&csv_path).unwrap();
        assert!(text.contains("procedimento,od,amb"));
        assert!(text.contains("HEMOGRAMA COMPLETO,,Procedimentos ambulatoriais"));

        let zip_file = File::open(&zip_path).unwrap();
        let mut archive = zip::ZipArchive::new(zip_file).unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.by_index(0).unwrap().name(), "rol_procedimentos_ans.csv");
    }

    #[test]
    fn anexo_i_lookup_prefers_canonical_then_heuristic() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("Anexo_II_DUT.pdf"), b"x").unwrap();
        assert_eq!(find_anexo_i(tmp.path()), None);

        fs::write(tmp.path().join("anexo_rol_465.pdf"), b"x").unwrap();
        let found = find_anexo_i(tmp.path()).unwrap();
        assert!(found.ends_with("anexo_rol_465.pdf"));

        fs::write(tmp.path().join("Anexo_I_Rol_Procedimentos.pdf"), b"x").unwrap();
        let found = find_anexo_i(tmp.path()).unwrap();
        assert!(found.ends_with("Anexo_I_Rol_Procedimentos.pdf"));
    }
}
