// src/process/columns.rs
//! Heuristic column discovery.
//!
//! The quarterly statement files rename the same logical field over and over
//! ("CD_CONTA_CONTABIL", "Código Conta", "cod conta contabil", ...), so
//! resolution is substring-based over a normalized form of the header rather
//! than an exact match. The candidate lists below are the versioned source of
//! truth for that mapping; everything here is pure and I/O-free.

/// Semantic roles a raw column can fill. The first five cover the statement
/// files; the last two cover the CADOP registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    RegAns,
    AccountCode,
    AccountDescription,
    OpeningBalance,
    ClosingBalance,
    RegistrationNumber,
    CorporateName,
}

impl Role {
    /// Candidate substrings, in priority order, matched against normalized
    /// header names. Collapsed variants (no space) cover headers that join
    /// words with `_` or nothing.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            Role::RegAns => &[
                "registro ans",
                "registroans",
                "reg ans",
                "regans",
                "cod operadora",
                "codigo operadora",
                "operadora",
            ],
            Role::AccountCode => &[
                "cd conta",
                "cdconta",
                "codigo conta",
                "codigoconta",
                "conta contabil",
                "contacontabil",
                "cod conta",
                "codconta",
            ],
            Role::AccountDescription => &[
                "descricao conta",
                "descricaoconta",
                "descricao",
                "ds conta",
                "dsconta",
                "nome conta",
                "nomeconta",
            ],
            Role::OpeningBalance => &[
                "saldo inicial",
                "saldoinicial",
                "vl saldo inicial",
                "vlsaldoinicial",
                "valor saldo inicial",
            ],
            Role::ClosingBalance => &[
                "saldo final",
                "saldofinal",
                "vl saldo final",
                "vlsaldofinal",
                "valor saldo final",
            ],
            Role::RegistrationNumber => &["registro ans", "registroans", "reg ans", "regans"],
            Role::CorporateName => &["razao social", "razaosocial"],
        }
    }
}

/// Fold an accented Latin letter to its base letter. Covers the accents that
/// actually occur in the source headers (Portuguese).
pub fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Normalize a header for matching: lowercase, accents folded to base Latin
/// letters, everything that is not alphanumeric-or-space removed, whitespace
/// collapsed.
pub fn normalize_header(raw: &str) -> String {
    let folded: String = raw
        .to_lowercase()
        .chars()
        .map(fold_accent)
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve `role` against the raw header list. Returns the first raw header
/// (in source column order) whose normalized name contains any candidate
/// substring, or `None`; never fabricates a default.
pub fn pick_column<'a>(role: Role, headers: &'a [String]) -> Option<&'a str> {
    let candidates = role.candidates();
    for header in headers {
        let norm = normalize_header(header);
        if candidates.iter().any(|cand| norm.contains(cand)) {
            return Some(header.as_str());
        }
    }
    None
}
