//! Provider reconciliation
//!
//! Pulls the payment provider's transaction history and issues tickets for any
//! successful transaction whose webhook never arrived. Each transaction goes
//! through the same resolver and issuance engine as a webhook delivery, so
//! orders that were already issued are reported and left untouched.

use crate::issuance::{IssuanceEngine, IssueOutcome};
use crate::resolver::{self, PaymentData};
use admit_common::config::ProviderConfig;
use admit_common::db::IssueSource;
use admit_common::TicketIdGenerator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("admit-gate/", env!("CARGO_PKG_VERSION"));

/// Upper bound on pages fetched in one run
const MAX_PAGES: u32 = 500;

/// Reconciliation errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network communication error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Provider returned an error response
    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    /// Failed to parse provider response JSON
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Local store failure while issuing
    #[error(transparent)]
    Store(#[from] admit_common::Error),
}

/// One page of the provider's transaction listing
#[derive(Debug, Deserialize)]
pub struct TransactionPage {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

impl TransactionPage {
    fn has_more(&self, page: u32) -> bool {
        self.meta
            .as_ref()
            .and_then(|m| m.page_info.as_ref())
            .and_then(|p| p.total_pages)
            .map(|total| page < total)
            .unwrap_or(false)
    }
}

/// Outcome counts of one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub issued_orders: usize,
    pub tickets_created: usize,
    pub already_processed: usize,
    pub not_successful: usize,
    pub rejected: usize,
}

/// Payment provider transaction API client
pub struct ProviderClient {
    http_client: reqwest::Client,
    config: ProviderConfig,
}

impl ProviderClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        Ok(Self { http_client, config })
    }

    /// Fetch one page of transactions (pages start at 1)
    pub async fn fetch_page(&self, page: u32) -> Result<TransactionPage, ProviderError> {
        debug!(url = %self.config.api_url, page, "Fetching provider transactions");

        let response = self
            .http_client
            .get(&self.config.api_url)
            .bearer_auth(&self.config.secret_key)
            .query(&[("page", page)])
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    /// Fetch every page of the transaction listing
    pub async fn fetch_all(&self) -> Result<Vec<Value>, ProviderError> {
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let batch = self.fetch_page(page).await?;
            let more = batch.has_more(page);
            records.extend(batch.data);

            if !more || page >= MAX_PAGES {
                break;
            }
            page += 1;
        }

        info!(transactions = records.len(), pages = page, "Fetched provider transactions");
        Ok(records)
    }
}

/// Fetch the provider's history and issue whatever is missing
pub async fn reconcile(
    client: &ProviderClient,
    engine: &IssuanceEngine,
    ids: &TicketIdGenerator,
) -> Result<ReconcileReport, ProviderError> {
    let records = client.fetch_all().await?;
    apply_transactions(engine, ids, records).await
}

/// Run each provider transaction record through resolution and issuance
pub async fn apply_transactions(
    engine: &IssuanceEngine,
    ids: &TicketIdGenerator,
    records: Vec<Value>,
) -> Result<ReconcileReport, ProviderError> {
    let mut report = ReconcileReport::default();

    for record in records {
        report.scanned += 1;

        let data: PaymentData = match serde_json::from_value(record) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Skipping malformed provider transaction");
                report.rejected += 1;
                continue;
            }
        };

        if resolver::is_successful(&data.status) && engine.is_issued(data.tx_ref.trim()).await? {
            debug!(tx_ref = %data.tx_ref, "Already issued");
            report.already_processed += 1;
            continue;
        }

        let order = match resolver::resolve(&data, ids) {
            Ok(Some(order)) => order,
            Ok(None) => {
                report.not_successful += 1;
                continue;
            }
            Err(e) => {
                warn!(tx_ref = %data.tx_ref, error = %e, "Skipping unresolvable transaction");
                report.rejected += 1;
                continue;
            }
        };

        match engine.issue(&order, IssueSource::Reconcile).await? {
            IssueOutcome::Issued(tickets) => {
                info!(tx_ref = %order.order_ref, tickets = tickets.len(), "Recovered missing order");
                report.issued_orders += 1;
                report.tickets_created += tickets.len();
            }
            IssueOutcome::AlreadyProcessed(_) => report.already_processed += 1,
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_info_drives_pagination() {
        let page: TransactionPage = serde_json::from_value(json!({
            "status": "success",
            "meta": {"page_info": {"total": 25, "current_page": 1, "total_pages": 3}},
            "data": [{"tx_ref": "A"}]
        }))
        .unwrap();

        assert!(page.has_more(1));
        assert!(page.has_more(2));
        assert!(!page.has_more(3));
        assert_eq!(page.data.len(), 1);
    }

    #[test]
    fn test_missing_meta_means_single_page() {
        let page: TransactionPage = serde_json::from_value(json!({"data": []})).unwrap();
        assert!(!page.has_more(1));
    }

    #[test]
    fn test_client_creation() {
        let client = ProviderClient::new(ProviderConfig {
            api_url: "http://127.0.0.1:9/v3/transactions".to_string(),
            secret_key: "FLWSECK_TEST".to_string(),
        });
        assert!(client.is_ok());
    }
}
