// src/analytics/mod.rs
//! Leaderboards over the de-accumulated statement data.
//!
//! Two rankings are produced: the single most recent quarter present in the
//! data, and the trailing four distinct quarters. Both are top-10 by summed
//! period value per operator, joined against the CADOP registry for display
//! names; operators missing from the registry keep a null name rather than
//! being dropped.

use std::collections::HashMap;

use crate::process::deaccumulate::DerivedRow;

pub const TOP_N: usize = 10;

/// One leaderboard line.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedOperator {
    pub reg_ans: String,
    pub razao_social: Option<String>,
    pub valor_real: f64,
}

/// The known-claims-expense account filter: the hospital/medical claims
/// line of the statement plan, matched on the normalized description.
pub fn is_claims_expense(descricao: &str) -> bool {
    let norm = descricao.trim().to_uppercase();
    norm.contains("SINISTROS CONHECIDOS") && norm.contains("HOSPITALAR")
}

/// Distinct (year, quarter) pairs present, most recent first.
pub fn periods_desc(rows: &[DerivedRow]) -> Vec<(i32, u8)> {
    let mut periods: Vec<(i32, u8)> = Vec::new();
    for row in rows {
        let key = (row.ano, row.trimestre);
        if !periods.contains(&key) {
            periods.push(key);
        }
    }
    periods.sort_by(|a, b| b.cmp(a));
    periods
}

/// Group `rows` by operator, summing `valor_real`, preserving first-seen
/// operator order so that equal sums rank in stable input order.
fn sum_by_operator(rows: impl Iterator<Item = (String, f64)>) -> Vec<(String, f64)> {
    let mut order: Vec<String> = Vec::new();
    let mut sums: HashMap<String, f64> = HashMap::new();
    for (reg, valor) in rows {
        if !sums.contains_key(&reg) {
            order.push(reg.clone());
        }
        *sums.entry(reg).or_insert(0.0) += valor;
    }
    order
        .into_iter()
        .map(|reg| {
            let total = sums[&reg];
            (reg, total)
        })
        .collect()
}

fn top_n(mut totals: Vec<(String, f64)>) -> Vec<(String, f64)> {
    totals.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    totals.truncate(TOP_N);
    totals
}

/// Top operators over the single most recent (year, quarter) present.
pub fn latest_quarter_ranking(rows: &[DerivedRow]) -> Vec<(String, f64)> {
    let Some(&latest) = periods_desc(rows).first() else {
        return Vec::new();
    };
    top_n(sum_by_operator(
        rows.iter()
            .filter(|r| (r.ano, r.trimestre) == latest)
            .map(|r| (r.reg_ans.clone(), r.valor_real)),
    ))
}

/// Top operators over the four most recent distinct (year, quarter) pairs,
/// regardless of an operator's presence in all four.
pub fn trailing_year_ranking(rows: &[DerivedRow]) -> Vec<(String, f64)> {
    let periods = periods_desc(rows);
    let window: Vec<(i32, u8)> = periods.into_iter().take(4).collect();
    if window.is_empty() {
        return Vec::new();
    }
    top_n(sum_by_operator(
        rows.iter()
            .filter(|r| window.contains(&(r.ano, r.trimestre)))
            .map(|r| (r.reg_ans.clone(), r.valor_real)),
    ))
}

/// Attach corporate names from the registry index; unmatched operators keep
/// a null name.
pub fn attach_names(
    ranking: Vec<(String, f64)>,
    names: &HashMap<String, String>,
) -> Vec<RankedOperator> {
    ranking
        .into_iter()
        .map(|(reg_ans, valor_real)| RankedOperator {
            razao_social: names.get(&reg_ans).cloned(),
            reg_ans,
            valor_real,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::deaccumulate::DerivedRow;

    fn row(reg: &str, ano: i32, tri: u8, valor: f64) -> DerivedRow {
        DerivedRow {
            reg_ans: reg.to_string(),
            ano,
            trimestre: tri,
            saldo_final: valor,
            valor_real: valor,
        }
    }

    #[test]
    fn claims_filter_matches_the_account_description() {
        assert!(is_claims_expense(
            "EVENTOS/ SINISTROS CONHECIDOS OU AVISADOS DE ASSISTÊNCIA A SAÚDE MEDICO HOSPITALAR"
        ));
        assert!(is_claims_expense("  sinistros conhecidos medico hospitalar "));
        assert!(!is_claims_expense("SINISTROS CONHECIDOS ODONTO"));
        assert!(!is_claims_expense("DESPESAS ADMINISTRATIVAS"));
    }

    #[test]
    fn latest_quarter_uses_only_the_most_recent_period() {
        let rows = vec![
            row("000001", 2024, 1, 100.0),
            row("000001", 2024, 2, 50.0),
            row("000002", 2024, 2, 70.0),
            row("000003", 2024, 1, 999.0),
        ];
        let ranking = latest_quarter_ranking(&rows);
        assert_eq!(ranking, vec![("000002".to_string(), 70.0), ("000001".to_string(), 50.0)]);
    }

    #[test]
    fn trailing_year_spans_four_periods_across_year_boundary() {
        let rows = vec![
            row("000001", 2023, 4, 10.0),
            row("000001", 2024, 1, 10.0),
            row("000001", 2024, 2, 10.0),
            row("000001", 2024, 3, 10.0),
            row("000001", 2023, 3, 500.0), // fifth-most-recent, excluded
            row("000002", 2024, 3, 35.0),
        ];
        let ranking = trailing_year_ranking(&rows);
        assert_eq!(ranking[0], ("000001".to_string(), 40.0));
        assert_eq!(ranking[1], ("000002".to_string(), 35.0));
    }

    #[test]
    fn operators_missing_some_quarters_still_rank() {
        let rows = vec![
            row("000001", 2024, 1, 5.0),
            row("000002", 2024, 2, 3.0),
        ];
        let ranking = trailing_year_ranking(&rows);
        assert_eq!(ranking.len(), 2);
    }

    #[test]
    fn truncates_to_top_ten_with_stable_ties() {
        let mut rows: Vec<DerivedRow> = (0..15)
            .map(|i| row(&format!("{:06}", i), 2024, 1, 100.0 - i as f64))
            .collect();
        // Two equal sums: 000020 enters before 000021 and must stay first.
        rows.push(row("000020", 2024, 1, 100.0));
        rows.push(row("000021", 2024, 1, 100.0));
        let ranking = latest_quarter_ranking(&rows);
        assert_eq!(ranking.len(), TOP_N);
        let regs: Vec<&str> = ranking.iter().map(|(r, _)| r.as_str()).collect();
        let pos20 = regs.iter().position(|r| *r == "000020").unwrap();
        let pos21 = regs.iter().position(|r| *r == "000021").unwrap();
        let pos0 = regs.iter().position(|r| *r == "000000").unwrap();
        assert!(pos0 < pos20, "earlier equal sum keeps input order");
        assert!(pos20 < pos21);
    }

    #[test]
    fn attach_names_keeps_unmatched_operators() {
        let names = HashMap::from([("000001".to_string(), "AMIL".to_string())]);
        let ranked = attach_names(
            vec![("000001".to_string(), 10.0), ("000099".to_string(), 5.0)],
            &names,
        );
        assert_eq!(ranked[0].razao_social.as_deref(), Some("AMIL"));
        assert_eq!(ranked[1].razao_social, None);
        assert_eq!(ranked[1].reg_ans, "000099");
    }
}
