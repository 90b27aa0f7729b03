use std::collections::HashMap;

use ansscraper::analytics::{
    self, attach_names, latest_quarter_ranking, trailing_year_ranking, RankedOperator,
};
use ansscraper::config::PipelineConfig;
use ansscraper::fetch;
use ansscraper::process::consolidate::{
    consolidate, extract_archives, write_audit, write_consolidated,
};
use ansscraper::process::deaccumulate::{deaccumulate, pad_reg_ans, DerivedRow};
use ansscraper::process::numeric::clean_numeric;
use ansscraper::process::CanonicalRecord;
use ansscraper::registry;
use anyhow::Result;
use reqwest::Client;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    let cfg = PipelineConfig::from_env();
    cfg.ensure_dirs()?;

    // ─── 2) download source files (best effort; reruns retry) ────────
    match fetch::build_client() {
        Ok(client) => download_sources(&client, &cfg).await,
        Err(err) => warn!(%err, "no HTTP client; working from files already on disk"),
    }

    // ─── 3) extract + consolidate ────────────────────────────────────
    let extracted = extract_archives(&cfg)?;
    if extracted.is_empty() {
        warn!("nothing to process: no statement archives with a recognizable period");
        write_consolidated(&cfg.consolidated_csv(), &[])?;
        write_audit(&cfg.audit_csv(), &[])?;
        return Ok(());
    }

    let (records, audit) = consolidate(&extracted);
    write_consolidated(&cfg.consolidated_csv(), &records)?;
    write_audit(&cfg.audit_csv(), &audit)?;
    info!(
        rows = records.len(),
        files = audit.len(),
        consolidated = %cfg.consolidated_csv().display(),
        "consolidation done"
    );

    // ─── 4) de-accumulate the claims-expense subset ──────────────────
    let mut rows = claims_rows(&records);
    if rows.is_empty() {
        warn!("claims-expense category not found in the consolidated data");
        return Ok(());
    }
    deaccumulate(&mut rows);

    // ─── 5) rankings joined against the registry ─────────────────────
    let names = match registry::load_registry(&cfg.registry_csv()) {
        Ok(operators) => registry::name_index(&operators),
        Err(err) => {
            warn!(%err, "registry unavailable; rankings will carry no names");
            HashMap::new()
        }
    };

    let latest_period = analytics::periods_desc(&rows)[0];
    let latest = attach_names(latest_quarter_ranking(&rows), &names);
    let trailing = attach_names(trailing_year_ranking(&rows), &names);

    print_leaderboard(
        &format!(
            "TOP 10 OPERADORAS - GASTO REAL NO {}T/{}",
            latest_period.1, latest_period.0
        ),
        &latest,
    );
    print_leaderboard(
        "TOP 10 OPERADORAS - GASTO ACUMULADO (ULTIMOS 4 TRI)",
        &trailing,
    );

    info!("all done");
    Ok(())
}

/// Download the statement archives, skipping files already on disk, plus the
/// CADOP registry. Every network failure is logged and skipped: the pipeline
/// runs with whatever is on disk, and a rerun retries.
async fn download_sources(client: &Client, cfg: &PipelineConfig) {
    let feeds = match fetch::urls::fetch_statement_zip_urls(
        client,
        fetch::urls::STATEMENTS_BASE_URL,
        fetch::urls::DEFAULT_YEARS,
    )
    .await
    {
        Ok(feeds) => feeds,
        Err(err) => {
            warn!(%err, "could not list statement archives");
            Default::default()
        }
    };

    for (year, urls) in feeds {
        let dest_dir = cfg.statements_dir().join(year.to_string());
        for url in urls {
            let name = url.rsplit('/').next().unwrap_or("download.zip");
            if dest_dir.join(name).is_file() {
                info!(name, "already downloaded");
                continue;
            }
            info!(name, "downloading");
            if let Err(err) = fetch::zips::download(client, &url, &dest_dir).await {
                warn!(%url, %err, "download failed");
            }
        }
    }

    let registry_csv = cfg.registry_csv();
    if !registry_csv.is_file() {
        info!("downloading CADOP registry");
        if let Err(err) =
            fetch::zips::download_to(client, fetch::urls::CADOP_URL, &registry_csv).await
        {
            warn!(%err, "CADOP download failed");
        }
    }
}

/// Claims-expense rows of the consolidated dataset, numeric and keyed for
/// de-accumulation.
fn claims_rows(records: &[CanonicalRecord]) -> Vec<DerivedRow> {
    records
        .iter()
        .filter(|r| {
            r.descricao_conta
                .as_deref()
                .is_some_and(analytics::is_claims_expense)
        })
        .filter_map(|r| {
            let ano: i32 = r.ano.parse().ok()?;
            let trimestre: u8 = r.trimestre.parse().ok()?;
            let reg = pad_reg_ans(r.reg_ans.as_deref().unwrap_or(""));
            let saldo = clean_numeric(r.vl_saldo_final.as_deref().unwrap_or(""));
            Some(DerivedRow::new(reg, ano, trimestre, saldo))
        })
        .collect()
}

fn print_leaderboard(title: &str, ranked: &[RankedOperator]) {
    println!("\n{}", "=".repeat(70));
    println!("{title}");
    println!("{}", "=".repeat(70));
    if ranked.is_empty() {
        println!("(sem dados)");
        return;
    }
    for op in ranked {
        println!(
            "{:<8} {:<45} {:>14.2}",
            op.reg_ans,
            op.razao_social.as_deref().unwrap_or("-"),
            op.valor_real
        );
    }
}
