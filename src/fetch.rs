use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::classify::{classify, FailureClass};
use crate::config::PortalConfig;
use crate::identifier::ProcessIdentifier;
use crate::parse::parse_process_page;
use crate::record::{FetchOutcome, ProcessRecord};
use crate::request::request_process_html;
use crate::Result;

/// Anything that can turn one identifier into a `FetchOutcome`.
///
/// Implementations must not fail: network problems come back as
/// `ConnectionError` and an observed cancellation as `Cancelled`.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(
        &self,
        id: &ProcessIdentifier,
        first_only: bool,
        cancel: &CancellationToken,
    ) -> FetchOutcome;
}

/// Fetches process records from the portal over HTTP.
#[derive(Debug, Clone)]
pub struct PortalClient {
    // Client uses Arc internally so we can clone cheaply
    client: Client,
    portal: PortalConfig,
}

impl PortalClient {
    pub fn new(portal: PortalConfig) -> Result<Self> {
        let client = Client::builder().user_agent(&portal.user_agent).build()?;
        Ok(Self { client, portal })
    }

    pub fn with_client(client: Client, portal: PortalConfig) -> Self {
        Self { client, portal }
    }

    pub fn portal(&self) -> &PortalConfig {
        &self.portal
    }

    async fn fetch_records(
        &self,
        id: &ProcessIdentifier,
        first_only: bool,
    ) -> Result<Option<Vec<ProcessRecord>>> {
        let html = request_process_html(&self.client, &self.portal, id).await?;
        parse_process_page(html, id.clone(), first_only).await
    }
}

#[async_trait]
impl RecordSource for PortalClient {
    async fn fetch(
        &self,
        id: &ProcessIdentifier,
        first_only: bool,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return FetchOutcome::Cancelled,
            res = self.fetch_records(id, first_only) => res,
        };

        match result {
            Ok(Some(records)) => {
                tracing::debug!(process = %id, records = records.len(), "fetched process");
                FetchOutcome::Success(records)
            }
            Ok(None) => {
                tracing::debug!(process = %id, "no such process");
                FetchOutcome::EmptyResult
            }
            Err(err) => match classify(&err, cancel) {
                FailureClass::Cancelled => FetchOutcome::Cancelled,
                FailureClass::ConnectionError => {
                    tracing::warn!(process = %id, error = %err, "connection failure");
                    FetchOutcome::ConnectionError(id.clone())
                }
                FailureClass::Unexpected => {
                    tracing::warn!(process = %id, error = %err, "unexpected failure, skipping process");
                    FetchOutcome::EmptyResult
                }
            },
        }
    }
}
