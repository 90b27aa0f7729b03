// src/fetch/urls.rs
use anyhow::Result;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;
use url::Url;

/// Directory listing of the quarterly statement archives, one subfolder per
/// year.
pub static STATEMENTS_BASE_URL: &str =
    "https://dadosabertos.ans.gov.br/FTP/PDA/demonstracoes_contabeis/";

/// The CADOP operator-registry CSV.
pub static CADOP_URL: &str = "https://www.gov.br/ans/pt-br/arquivos/acesso-a-informacao/perfil-do-setor/dados-e-indicadores-do-setor/operadoras-de-planos-privados-de-saude/relatorio_cadop.csv";

/// Direct links to the procedure-roster annex PDFs, with the local names
/// they are saved under.
pub static ANNEX_URLS: &[(&str, &str)] = &[
    (
        "https://www.ans.gov.br/images/stories/Legislacao/rn/Anexo_I_Rol_2021RN_465.2021_RN654.2025L.pdf",
        "Anexo_I_Rol_Procedimentos.pdf",
    ),
    (
        "https://www.ans.gov.br/images/stories/Legislacao/rn/Anexo_II_DUT_2021_RN_465.2021_RN660.2025.pdf",
        "Anexo_II_DUT.pdf",
    ),
];

/// Years fetched by default. The regulator is slow to publish the current
/// year, so the default window trails it.
pub static DEFAULT_YEARS: &[i32] = &[2023, 2024];

const MAX_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Scrape the statement listing for each requested year and collect every
/// `.zip` link. A year whose listing cannot be fetched is logged and
/// skipped — the pipeline works with whatever is available.
pub async fn fetch_statement_zip_urls(
    client: &Client,
    base_url: &str,
    years: &[i32],
) -> Result<BTreeMap<i32, Vec<String>>> {
    let mut map = BTreeMap::new();

    for &year in years {
        let year_url = format!("{}{}/", base_url.trim_end_matches('/'), year);
        match fetch_listing_zip_links(client, &year_url).await {
            Ok(links) if links.is_empty() => {
                warn!(year, url = %year_url, "no ZIP links in listing");
            }
            Ok(links) => {
                map.insert(year, links);
            }
            Err(err) => {
                warn!(year, url = %year_url, %err, "year listing unavailable");
            }
        }
    }

    Ok(map)
}

/// Fetch one directory listing page and extract its `.zip` links, retrying
/// transient failures a fixed number of times.
async fn fetch_listing_zip_links(client: &Client, listing_url: &str) -> Result<Vec<String>> {
    let selector =
        Selector::parse(r#"a[href$=".zip"]"#).expect("CSS selector for ZIP links is valid");

    let mut attempt = 0;
    loop {
        attempt += 1;

        let resp = client.get(listing_url).send().await;
        match resp {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(html) => {
                    let base = Url::parse(listing_url)?;
                    return Ok(extract_zip_links(&html, &base, &selector));
                }
                Err(_) if attempt < MAX_RETRIES => {
                    sleep(RETRY_DELAY).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            },
            Err(_) if attempt < MAX_RETRIES => {
                sleep(RETRY_DELAY).await;
                continue;
            }
            Ok(resp) => return Err(anyhow::anyhow!("HTTP error: {}", resp.status())),
            Err(e) => return Err(e.into()),
        }
    }
}

fn extract_zip_links(html: &str, base: &Url, selector: &Selector) -> Vec<String> {
    Html::parse_document(html)
        .select(selector)
        .filter_map(|e| e.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(|u| u.to_string())
        .collect()
}

/// PDF links for the two roster annexes found on a legislation page, by
/// link-text pattern. Either entry may be absent.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AnnexLinks {
    pub anexo_i: Option<String>,
    pub anexo_ii: Option<String>,
}

/// Locate the Anexo I / Anexo II PDF links in a legislation page. Matching
/// is on the link text (`ANEXO I`, `ANEXO 1`, ...) and only `.pdf` targets
/// count; used when the direct links in [`ANNEX_URLS`] go stale.
pub fn find_annex_pdf_links(html: &str, base_url: &str) -> AnnexLinks {
    let mut links = AnnexLinks::default();
    let Ok(base) = Url::parse(base_url) else {
        return links;
    };
    let selector = Selector::parse("a[href]").expect("anchor selector is valid");

    let doc = Html::parse_document(html);
    for element in doc.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if !href.to_lowercase().ends_with(".pdf") {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        let text = element.text().collect::<String>().trim().to_uppercase();

        let is_anexo_ii =
            text.contains("ANEXO II") || text.contains("ANEXO 2") || text.contains("ANEXOII");
        let is_anexo_i = !is_anexo_ii
            && (text.contains("ANEXO I") || text.contains("ANEXO 1") || text.contains("ANEXOI"));

        if is_anexo_ii && links.anexo_ii.is_none() {
            links.anexo_ii = Some(resolved.to_string());
        } else if is_anexo_i && links.anexo_i.is_none() {
            links.anexo_i = Some(resolved.to_string());
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_zip_links_from_a_listing_page() {
        let html = r#"
            <html><body>
              <a href="1T2024.zip">1T2024.zip</a>
              <a href="2T2024.zip">2T2024.zip</a>
              <a href="leiame.txt">leiame.txt</a>
            </body></html>
        "#;
        let base = Url::parse("https://dadosabertos.ans.gov.br/FTP/PDA/demonstracoes_contabeis/2024/").unwrap();
        let selector = Selector::parse(r#"a[href$=".zip"]"#).unwrap();
        let links = extract_zip_links(html, &base, &selector);
        assert_eq!(
            links,
            vec![
                "https://dadosabertos.ans.gov.br/FTP/PDA/demonstracoes_contabeis/2024/1T2024.zip",
                "https://dadosabertos.ans.gov.br/FTP/PDA/demonstracoes_contabeis/2024/2T2024.zip",
            ]
        );
    }

    #[test]
    fn finds_annex_pdfs_by_link_text() {
        let html = r#"
            <html><body>
              <a href="/docs/rol_anexo_i.pdf">Anexo I - Rol de Procedimentos</a>
              <a href="/docs/dut.pdf">ANEXO II - DUT</a>
              <a href="/docs/outros.pdf">Outros documentos</a>
              <a href="/paginas/anexo_i.html">Anexo I em HTML</a>
            </body></html>
        "#;
        let links = find_annex_pdf_links(html, "https://www.ans.gov.br/legislacao/");
        assert_eq!(
            links.anexo_i.as_deref(),
            Some("https://www.ans.gov.br/docs/rol_anexo_i.pdf")
        );
        assert_eq!(
            links.anexo_ii.as_deref(),
            Some("https://www.ans.gov.br/docs/dut.pdf")
        );
    }

    #[test]
    fn annex_lookup_tolerates_pages_without_matches() {
        let links = find_annex_pdf_links("<html><body>nada</body></html>", "https://example.com/");
        assert_eq!(links, AnnexLinks::default());
    }
}
