// src/bin/extract_roster.rs
//! Extract the procedure roster from the Anexo I PDF and package the
//! deliverable ZIP.

use ansscraper::config::PipelineConfig;
use ansscraper::fetch;
use ansscraper::roster;
use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cfg = PipelineConfig::from_env();
    cfg.ensure_dirs()?;

    // Fetch the annex PDFs if they are not on disk yet; a failed download is
    // not fatal when a previous run already left the file behind.
    match fetch::build_client() {
        Ok(client) => {
            for &(url, name) in fetch::urls::ANNEX_URLS {
                let dest = cfg.raw_dir().join(name);
                if dest.is_file() {
                    info!(name, "already downloaded");
                    continue;
                }
                info!(name, "downloading annex");
                if let Err(err) = fetch::zips::download_to(&client, url, &dest).await {
                    warn!(%url, %err, "annex download failed");
                }
            }
        }
        Err(err) => warn!(%err, "no HTTP client; working from files already on disk"),
    }

    let Some(pdf_path) = roster::find_anexo_i(&cfg.raw_dir()) else {
        warn!(dir = %cfg.raw_dir().display(), "Anexo I PDF not found; nothing to extract");
        return Ok(());
    };

    let text = roster::extract_text(&pdf_path)?;
    let legend = roster::extract_legend(&text);
    info!(od = %legend["OD"], amb = %legend["AMB"], "legend resolved");

    let mut rows = roster::parse_roster(&text);
    if rows.is_empty() {
        warn!(pdf = %pdf_path.display(), "no roster rows recognized in the PDF text");
        return Ok(());
    }
    roster::expand_abbreviations(&mut rows, &legend);

    let csv_path = cfg.roster_csv();
    roster::write_roster_csv(&csv_path, &rows)?;

    let zip_path = cfg.roster_zip();
    roster::package_zip(&csv_path, &zip_path, "rol_procedimentos_ans.csv")?;

    info!(
        rows = rows.len(),
        csv = %csv_path.display(),
        zip = %zip_path.display(),
        "roster extraction done"
    );
    Ok(())
}
