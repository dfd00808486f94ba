use super::util::{RetryPolicy, with_retry};
use crate::core::catalog::{CatalogEntry, CatalogSource};
use crate::core::error::FundError;
use crate::core::extract::{first_array, first_object};
use crate::core::quote::{Quote, QuoteFetchOutcome, QuoteProvider};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, instrument};

pub const DEFAULT_CATALOG_URL: &str = "http://fund.eastmoney.com/js/fundcode_search.js";
pub const DEFAULT_QUOTE_BASE_URL: &str = "http://fundgz.1234567.com.cn/js";
pub const DEFAULT_DETAIL_BASE_URL: &str = "http://fund.eastmoney.com";

async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    retry: RetryPolicy,
) -> reqwest::Result<String> {
    with_retry(
        || async move { client.get(url).send().await?.error_for_status() },
        retry,
    )
    .await?
    .text()
    .await
}

/// Full fund list published as `var r = [[code, abbr, name, category, pinyin], ...];`.
pub struct EastmoneyCatalogSource {
    catalog_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl EastmoneyCatalogSource {
    pub fn new(catalog_url: &str, client: reqwest::Client) -> Self {
        Self {
            catalog_url: catalog_url.to_string(),
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Decodes the catalog script body into entries.
pub fn parse_catalog(body: &str) -> Result<Vec<CatalogEntry>, FundError> {
    let span = first_array(body)
        .ok_or_else(|| FundError::upstream("catalog response contains no array"))?;
    let rows: Vec<Vec<serde_json::Value>> =
        serde_json::from_str(span).map_err(FundError::upstream)?;

    let total = rows.len();
    let entries: Vec<CatalogEntry> = rows.into_iter().filter_map(entry_from_row).collect();
    if entries.len() < total {
        debug!("Skipped {} malformed catalog rows", total - entries.len());
    }
    Ok(entries)
}

fn entry_from_row(row: Vec<serde_json::Value>) -> Option<CatalogEntry> {
    let field = |i: usize| row.get(i).and_then(|v| v.as_str());
    let code = field(0)?;
    let name = field(2)?;
    let searchable_aliases = [field(1), field(4)]
        .into_iter()
        .flatten()
        .filter(|alias| !alias.is_empty())
        .map(str::to_string)
        .collect();

    Some(CatalogEntry {
        code: code.to_string(),
        name: name.to_string(),
        category: field(3).unwrap_or_default().to_string(),
        searchable_aliases,
    })
}

#[async_trait]
impl CatalogSource for EastmoneyCatalogSource {
    #[instrument(name = "CatalogFetch", skip(self), fields(url = %self.catalog_url))]
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, FundError> {
        debug!("Requesting fund catalog");
        let body = fetch_text(&self.client, &self.catalog_url, self.retry)
            .await
            .map_err(|e| {
                error!(error = %e, "Catalog request failed");
                FundError::upstream(e)
            })?;
        parse_catalog(&body)
    }
}

/// Per-fund real-time valuation served as `jsonpgz({...});`.
pub struct EastmoneyQuoteProvider {
    base_url: String,
    detail_base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl EastmoneyQuoteProvider {
    pub fn new(base_url: &str, detail_base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            detail_base_url: detail_base_url.trim_end_matches('/').to_string(),
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn quote_url(&self, code: &str) -> String {
        format!(
            "{}/{}.js?rt={}",
            self.base_url,
            urlencoding::encode(code),
            chrono::Utc::now().timestamp_millis()
        )
    }

    fn parse_quote(&self, body: &str) -> QuoteFetchOutcome {
        let Some(span) = first_object(body) else {
            return QuoteFetchOutcome::NotFound;
        };

        let raw: ValuationResponse = match serde_json::from_str(span) {
            Ok(raw) => raw,
            Err(e) => {
                return QuoteFetchOutcome::TransientError(format!("malformed valuation: {e}"));
            }
        };

        let change_percent = match raw.gszzl.trim().parse::<f64>() {
            Ok(change) => change,
            Err(e) => {
                return QuoteFetchOutcome::TransientError(format!(
                    "invalid change '{}': {e}",
                    raw.gszzl
                ));
            }
        };

        QuoteFetchOutcome::Found(Quote {
            detail_url: self.detail_url(&raw.fundcode),
            code: raw.fundcode,
            display_name: raw.name,
            change_percent,
            estimated_net_value: raw.gsz,
            previous_net_value: raw.dwjz,
            valuation_time: raw.gztime,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ValuationResponse {
    fundcode: String,
    name: String,
    /// Previous unit net value.
    dwjz: String,
    /// Estimated net value.
    gsz: String,
    /// Estimated change, percent.
    gszzl: String,
    gztime: Option<String>,
}

#[async_trait]
impl QuoteProvider for EastmoneyQuoteProvider {
    #[instrument(name = "QuoteFetch", skip(self), fields(code = %code))]
    async fn fetch_quote(&self, code: &str) -> QuoteFetchOutcome {
        let url = self.quote_url(code);
        debug!("Requesting valuation from {}", url);

        match fetch_text(&self.client, &url, self.retry).await {
            Ok(body) => self.parse_quote(&body),
            Err(e) => QuoteFetchOutcome::TransientError(e.to_string()),
        }
    }

    fn detail_url(&self, code: &str) -> String {
        format!(
            "{}/{}.html?spm=search",
            self.detail_base_url,
            urlencoding::encode(code)
        )
    }
}
