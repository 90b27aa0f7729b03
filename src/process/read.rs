// src/process/read.rs
//! Best-effort loading of one delimited text file.
//!
//! Government-published CSVs arrive with inconsistent encodings and both
//! comma and semicolon delimiters, so reading is an ordered list of
//! (encoding, sniffed-delimiter) strategies; the first one that yields a
//! parseable table wins. Every cell is kept as an opaque string at this
//! layer.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use tracing::warn;

const UTF8_BOM: &[u8] = &[0xef, 0xbb, 0xbf];

/// Encoding attempts, in fixed priority order. The labels are recorded
/// verbatim in the audit trail.
const ENCODING_PRIORITY: &[&str] = &["utf-8-sig", "utf-8", "latin1"];

/// Delimiters the sniffer considers, in tie-break order.
const DELIMITERS: &[u8] = &[b';', b',', b'\t', b'|'];

/// An untyped in-memory table: the column names as found in the source file
/// (case, accents and whitespace untouched) and zero or more string rows.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.headers.len()
    }
}

/// Read `path` as delimited text. Returns the parsed table together with the
/// encoding label that succeeded, or `None` when every strategy fails — the
/// caller records that as a `read_error`, it is not an exception.
pub fn read_delimited(path: &Path) -> Option<(RawTable, &'static str)> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(err) => {
            warn!(path = %path.display(), %err, "could not read file");
            return None;
        }
    };
    read_delimited_bytes(&bytes)
}

/// Same as [`read_delimited`] but over an in-memory buffer.
pub fn read_delimited_bytes(bytes: &[u8]) -> Option<(RawTable, &'static str)> {
    for &label in ENCODING_PRIORITY {
        let Some(text) = decode(bytes, label) else {
            continue;
        };
        let Some(delimiter) = sniff_delimiter(&text) else {
            continue;
        };
        if let Some(table) = parse_table(&text, delimiter) {
            return Some((table, label));
        }
    }
    None
}

/// Decode `bytes` under one encoding label, or `None` when the bytes do not
/// conform. `latin1` always succeeds, which makes it the natural last resort.
fn decode<'a>(bytes: &'a [u8], label: &str) -> Option<Cow<'a, str>> {
    match label {
        "utf-8-sig" => {
            let body = bytes.strip_prefix(UTF8_BOM)?;
            std::str::from_utf8(body).ok().map(Cow::Borrowed)
        }
        "utf-8" => std::str::from_utf8(bytes).ok().map(Cow::Borrowed),
        "latin1" => Some(encoding_rs::mem::decode_latin1(bytes)),
        _ => None,
    }
}

/// Pick the field delimiter by counting occurrences in the header line.
/// Returns `None` when no known delimiter appears at all, so a free-text
/// file fails the strategy instead of parsing as a one-column table.
pub fn sniff_delimiter(text: &str) -> Option<u8> {
    let header_line = text.lines().find(|l| !l.trim().is_empty())?;
    let mut best: Option<(u8, usize)> = None;
    for &delim in DELIMITERS {
        let count = header_line.bytes().filter(|&b| b == delim).count();
        if count > 0 && best.map_or(true, |(_, n)| count > n) {
            best = Some((delim, count));
        }
    }
    best.map(|(d, _)| d)
}

fn parse_table(text: &str, delimiter: u8) -> Option<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers().ok()?.iter().map(|h| h.to_string()).collect();
    if headers.is_empty() {
        return None;
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.ok()?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }
    Some(RawTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_plain_utf8_with_comma_delimiter() {
        let (table, encoding) =
            read_delimited_bytes("A,B\n1,2\n3,4\n".as_bytes()).expect("should parse");
        assert_eq!(encoding, "utf-8");
        assert_eq!(table.headers, vec!["A", "B"]);
        assert_eq!(table.rows, vec![vec!["1", "2"], vec!["3", "4"]]);
    }

    #[test]
    fn detects_utf8_signature() {
        let mut bytes = vec![0xef, 0xbb, 0xbf];
        bytes.extend_from_slice("COL;OUTRA\nx;y\n".as_bytes());
        let (table, encoding) = read_delimited_bytes(&bytes).expect("should parse");
        assert_eq!(encoding, "utf-8-sig");
        assert_eq!(table.headers, vec!["COL", "OUTRA"]);
    }

    #[test]
    fn falls_back_to_latin1_for_legacy_bytes() {
        // "DESCRIÇÃO" in latin1 is not valid UTF-8.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"DESCRI\xc7\xc3O;VALOR\n");
        bytes.extend_from_slice(b"Despesa m\xe9dica;10,5\n");
        let (table, encoding) = read_delimited_bytes(&bytes).expect("should parse");
        assert_eq!(encoding, "latin1");
        assert_eq!(table.headers[0], "DESCRIÇÃO");
        assert_eq!(table.rows[0][0], "Despesa médica");
    }

    #[test]
    fn semicolon_wins_over_commas_inside_fields() {
        let text = "REG_ANS;DESCRICAO\n123;\"despesas, gerais\"\n";
        assert_eq!(sniff_delimiter(text), Some(b';'));
        let (table, _) = read_delimited_bytes(text.as_bytes()).unwrap();
        assert_eq!(table.rows[0], vec!["123", "despesas, gerais"]);
    }

    #[test]
    fn empty_and_delimiterless_inputs_are_read_failures() {
        assert!(read_delimited_bytes(b"").is_none());
        assert!(read_delimited_bytes(b"   \n  \n").is_none());
        assert!(read_delimited_bytes(b"apenas texto corrido\nsem tabela\n").is_none());
    }

    #[test]
    fn missing_file_is_a_read_failure_not_a_panic() {
        assert!(read_delimited(Path::new("/nonexistent/definitely/absent.csv")).is_none());
    }

    #[test]
    fn reads_from_disk() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all("H1,H2\na,b\n".as_bytes()).unwrap();
        let (table, _) = read_delimited(tmp.path()).expect("should parse");
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.col_count(), 2);
    }
}
