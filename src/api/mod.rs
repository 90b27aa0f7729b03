// src/api/mod.rs
//! Read-only HTTP service over the pipeline outputs.
//!
//! Two consumers: a weighted substring search over the CADOP registry, and
//! an analytics endpoint that re-reads the consolidated dataset file on
//! every request (no cache) to recompute the claims-expense leaderboard.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::analytics::{self, attach_names, RankedOperator, TOP_N};
use crate::process::columns::{fold_accent, pick_column, Role};
use crate::process::deaccumulate::pad_reg_ans;
use crate::process::numeric::clean_numeric;
use crate::process::read::read_delimited_bytes;
use crate::registry::RegistryRecord;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 200;

/// Normalize free text for matching: lowercase, accents folded, whitespace
/// collapsed. Punctuation is kept so tax-id queries with separators still
/// match the stored form.
pub fn normalize_text(raw: &str) -> String {
    let folded: String = raw.to_lowercase().chars().map(fold_accent).collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pre-normalized search fields for one registry record.
#[derive(Debug, Clone)]
struct IndexEntry {
    registro_ans: String,
    cnpj: String,
    nome_fantasia: String,
    razao_social: String,
}

/// In-memory substring search over the operator registry.
#[derive(Debug, Default)]
pub struct SearchService {
    items: Vec<RegistryRecord>,
    index: Vec<IndexEntry>,
}

/// One scored search result.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchHit {
    pub score: u32,
    pub registro_ans: String,
    pub cnpj: String,
    pub razao_social: String,
    pub nome_fantasia: String,
    pub modalidade: String,
}

impl SearchService {
    pub fn new(items: Vec<RegistryRecord>) -> Self {
        let index = items
            .iter()
            .map(|r| IndexEntry {
                registro_ans: normalize_text(&r.registro_ans),
                cnpj: normalize_text(&r.cnpj),
                nome_fantasia: normalize_text(&r.nome_fantasia),
                razao_social: normalize_text(&r.razao_social),
            })
            .collect();
        Self { items, index }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Corporate names by padded registration id, for leaderboard joins.
    pub fn name_index(&self) -> HashMap<String, String> {
        crate::registry::name_index(&self.items)
    }

    /// Score every record against `query` and return the best `limit` hits.
    /// Weights: registration number 10, tax id 9, trade name 5, corporate
    /// name 4, summed per record; zero-score records are excluded and ties
    /// keep source order.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let q = normalize_text(query);
        if q.is_empty() {
            return Vec::new();
        }
        let limit = limit.clamp(1, MAX_LIMIT);

        let mut hits: Vec<SearchHit> = self
            .items
            .iter()
            .zip(&self.index)
            .filter_map(|(item, idx)| {
                let mut score = 0u32;
                if idx.registro_ans.contains(&q) {
                    score += 10;
                }
                if idx.cnpj.contains(&q) {
                    score += 9;
                }
                if idx.nome_fantasia.contains(&q) {
                    score += 5;
                }
                if idx.razao_social.contains(&q) {
                    score += 4;
                }
                (score > 0).then(|| SearchHit {
                    score,
                    registro_ans: item.registro_ans.clone(),
                    cnpj: item.cnpj.clone(),
                    razao_social: item.razao_social.clone(),
                    nome_fantasia: item.nome_fantasia.clone(),
                    modalidade: item.modalidade.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits.truncate(limit);
        hits
    }
}

/// Recompute the claims-expense top 10 from the consolidated dataset bytes.
/// Returns an empty leaderboard when the file does not look like the
/// consolidated schema — the endpoint degrades, it does not error.
pub fn top10_claims(bytes: &[u8], names: &HashMap<String, String>) -> Vec<RankedOperator> {
    let Some((table, _encoding)) = read_delimited_bytes(bytes) else {
        warn!("consolidated dataset is not parseable");
        return Vec::new();
    };

    let reg_col = pick_column(Role::RegAns, &table.headers);
    let desc_col = pick_column(Role::AccountDescription, &table.headers);
    let value_col = pick_column(Role::ClosingBalance, &table.headers);
    let (Some(reg_col), Some(desc_col), Some(value_col)) = (reg_col, desc_col, value_col) else {
        warn!(headers = ?table.headers, "consolidated dataset is missing expected columns");
        return Vec::new();
    };

    let index_of = |name: &str| table.headers.iter().position(|h| h == name);
    let (Some(reg_idx), Some(desc_idx), Some(value_idx)) =
        (index_of(reg_col), index_of(desc_col), index_of(value_col))
    else {
        return Vec::new();
    };

    let mut order: Vec<String> = Vec::new();
    let mut sums: HashMap<String, f64> = HashMap::new();
    for row in &table.rows {
        let descricao = row.get(desc_idx).map(String::as_str).unwrap_or("");
        if !analytics::is_claims_expense(descricao) {
            continue;
        }
        let reg = pad_reg_ans(row.get(reg_idx).map(String::as_str).unwrap_or(""));
        let valor = clean_numeric(row.get(value_idx).map(String::as_str).unwrap_or(""));
        if !sums.contains_key(&reg) {
            order.push(reg.clone());
        }
        *sums.entry(reg).or_insert(0.0) += valor;
    }

    let mut totals: Vec<(String, f64)> =
        order.into_iter().map(|reg| (reg.clone(), sums[&reg])).collect();
    totals.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    totals.truncate(TOP_N);
    attach_names(totals, names)
}

// ---------------------------------------------------------------------------
// HTTP layer
// ---------------------------------------------------------------------------

pub struct ApiState {
    pub service: SearchService,
    pub consolidated_csv: PathBuf,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
struct SearchParams {
    query: String,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    count: usize,
    results: Vec<SearchHit>,
}

#[derive(Serialize)]
struct TopOperator {
    reg_ans: String,
    razao_social: Option<String>,
    valor_real: f64,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn search_handler(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let results = state.service.search(&params.query, limit);
    Json(SearchResponse {
        query: params.query,
        count: results.len(),
        results,
    })
}

async fn top10_handler(State(state): State<Arc<ApiState>>) -> Json<Vec<TopOperator>> {
    // Re-read the dataset on every request so the endpoint always reflects
    // the latest pipeline run.
    let bytes = match tokio::fs::read(&state.consolidated_csv).await {
        Ok(b) => b,
        Err(err) => {
            warn!(path = %state.consolidated_csv.display(), %err, "consolidated dataset unavailable");
            return Json(Vec::new());
        }
    };
    let names = state.service.name_index();
    let ranked = top10_claims(&bytes, &names)
        .into_iter()
        .map(|r| TopOperator {
            reg_ans: r.reg_ans,
            razao_social: r.razao_social,
            valor_real: r.valor_real,
        })
        .collect();
    Json(ranked)
}

pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/search", get(search_handler))
        .route("/analytics/top-10", get(top10_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(state: Arc<ApiState>, addr: SocketAddr) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "search API listening");
    axum::serve(listener, app).await.context("serving API")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(reg: &str, cnpj: &str, razao: &str, fantasia: &str) -> RegistryRecord {
        RegistryRecord {
            registro_ans: reg.to_string(),
            cnpj: cnpj.to_string(),
            razao_social: razao.to_string(),
            nome_fantasia: fantasia.to_string(),
            modalidade: "Medicina de Grupo".to_string(),
        }
    }

    fn service() -> SearchService {
        SearchService::new(vec![
            record("123456", "11222333000181", "AMIL ASSISTENCIA MEDICA", "AMIL SAUDE"),
            record("654321", "99888777000166", "COOPERATIVA FAMILIAR DE SAUDE", ""),
            record("000777", "55444333000122", "OUTRA OPERADORA", "VIDA PLENA"),
        ])
    }

    #[test]
    fn normalizes_case_accents_and_whitespace() {
        assert_eq!(normalize_text("  AMIL   Saúde "), "amil saude");
        assert_eq!(normalize_text("Médico-Hospitalar"), "medico-hospitalar");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn trade_name_hits_outrank_corporate_name_hits() {
        let svc = service();
        let hits = svc.search("amil", 50);
        // "AMIL SAUDE" scores 5 (trade) + 4 (corporate contains "amil");
        // "FAMILIAR" scores 4 via corporate-name substring only.
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].registro_ans, "123456");
        assert_eq!(hits[0].score, 9);
        assert_eq!(hits[1].registro_ans, "654321");
        assert_eq!(hits[1].score, 4);
    }

    #[test]
    fn registration_and_tax_id_weights_dominate() {
        let svc = service();
        let hits = svc.search("654321", 50);
        assert_eq!(hits[0].registro_ans, "654321");
        assert_eq!(hits[0].score, 10);

        let hits = svc.search("11222333000181", 50);
        assert_eq!(hits[0].registro_ans, "123456");
        assert_eq!(hits[0].score, 9);
    }

    #[test]
    fn zero_score_records_are_excluded() {
        let svc = service();
        assert!(svc.search("inexistente", 50).is_empty());
        assert!(svc.search("   ", 50).is_empty());
    }

    #[test]
    fn limit_is_clamped_and_ties_keep_source_order() {
        let svc = SearchService::new(vec![
            record("1", "", "SAUDE A", ""),
            record("2", "", "SAUDE B", ""),
            record("3", "", "SAUDE C", ""),
        ]);
        let hits = svc.search("saude", 0);
        assert_eq!(hits.len(), 1, "limit 0 clamps up to 1");
        assert_eq!(hits[0].registro_ans, "1", "ties keep source order");

        let all = svc.search("saude", 9999);
        assert_eq!(all.len(), 3);
        let regs: Vec<&str> = all.iter().map(|h| h.registro_ans.as_str()).collect();
        assert_eq!(regs, vec!["1", "2", "3"]);
    }

    #[test]
    fn top10_recomputes_from_consolidated_bytes() {
        let csv = "\u{feff}ano,trimestre,reg_ans,cd_conta_contabil,descricao_conta,vl_saldo_inicial,vl_saldo_final\n\
            2024,1,123456,411,EVENTOS/ SINISTROS CONHECIDOS OU AVISADOS MEDICO HOSPITALAR,0,\"1.000,00\"\n\
            2024,1,654321,411,EVENTOS/ SINISTROS CONHECIDOS OU AVISADOS MEDICO HOSPITALAR,0,\"2.500,50\"\n\
            2024,1,123456,311,RECEITAS DE PLANOS,0,\"9.999,99\"\n";
        let names = HashMap::from([("654321".to_string(), "COOPERATIVA".to_string())]);
        let ranked = top10_claims(csv.as_bytes(), &names);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].reg_ans, "654321");
        assert_eq!(ranked[0].razao_social.as_deref(), Some("COOPERATIVA"));
        assert_eq!(ranked[0].valor_real, 2500.5);
        assert_eq!(ranked[1].reg_ans, "123456");
        assert_eq!(ranked[1].razao_social, None);
        assert_eq!(ranked[1].valor_real, 1000.0);
    }

    #[test]
    fn search_hits_serialize_with_score_and_operator_fields() {
        let svc = service();
        let hit = &svc.search("amil", 1)[0];
        let value = serde_json::to_value(hit).unwrap();
        assert_eq!(value["score"], 9);
        assert_eq!(value["registro_ans"], "123456");
        assert_eq!(value["nome_fantasia"], "AMIL SAUDE");
        assert_eq!(value["modalidade"], "Medicina de Grupo");
    }

    #[test]
    fn top10_degrades_to_empty_on_unusable_input() {
        let names = HashMap::new();
        assert!(top10_claims(b"", &names).is_empty());
        assert!(top10_claims(b"colA,colB\n1,2\n", &names).is_empty());
    }
}
