//! GraphQL subgraph client for bridge transfer events

use super::{DestinationLookup, TransferIndex};
use crate::config::IndexerConfig;
use crate::error::{SwapError, SwapResult};
use crate::models::ChainDescriptor;

use async_trait::async_trait;
use ethers::types::H256;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const TRANSFER_SENT_QUERY: &str = r#"query TransferSent($txHash: String!) {
  transferSents(where: { transactionHash: $txHash }) {
    transferId
    transactionHash
    timestamp
  }
}"#;

const WITHDRAWAL_BONDED_QUERY: &str = r#"query WithdrawalBonded($transferId: String!) {
  withdrawalBondeds(where: { transferId: $transferId }) {
    transactionHash
    timestamp
  }
}"#;

const TRANSFER_FROM_L1_QUERY: &str = r#"query TransferFromL1Completed($recipient: String!, $since: BigInt!) {
  transferFromL1Completeds(
    where: { recipient: $recipient, timestamp_gte: $since }
    orderBy: timestamp
    orderDirection: desc
  ) {
    transactionHash
    timestamp
  }
}"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferSent {
    transfer_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DestinationEvent {
    transaction_hash: String,
}

/// Subgraph-backed transfer index; one named dataset per chain
pub struct SubgraphIndex {
    base_url: String,
    datasets: HashMap<String, String>,
    client: reqwest::Client,
}

impl SubgraphIndex {
    pub fn new(config: &IndexerConfig) -> SwapResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            datasets: config.datasets.clone(),
            client,
        })
    }

    fn endpoint(&self, chain: &ChainDescriptor) -> SwapResult<String> {
        let dataset = self.datasets.get(&chain.slug).ok_or_else(|| SwapError::Indexer {
            chain: chain.slug.clone(),
            message: "No dataset configured".to_string(),
        })?;
        Ok(format!("{}/{}", self.base_url, dataset))
    }

    /// Run a query and return the first record of `field`
    async fn first_record<T: DeserializeOwned>(
        &self,
        chain: &ChainDescriptor,
        field: &str,
        query: &str,
        variables: Value,
    ) -> SwapResult<Option<T>> {
        let result = self.fetch_first(chain, field, query, variables).await;
        let outcome = match &result {
            Ok(Some(_)) => "found",
            Ok(None) => "empty",
            Err(_) => "error",
        };
        crate::metrics::record_indexer_query(&chain.slug, outcome);
        result
    }

    async fn fetch_first<T: DeserializeOwned>(
        &self,
        chain: &ChainDescriptor,
        field: &str,
        query: &str,
        variables: Value,
    ) -> SwapResult<Option<T>> {
        let url = self.endpoint(chain)?;
        let indexer_error = |message: String| SwapError::Indexer {
            chain: chain.slug.clone(),
            message,
        };

        let response = self
            .client
            .post(&url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| indexer_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(indexer_error(format!("HTTP {}", response.status())));
        }

        let body: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| indexer_error(format!("Malformed response: {}", e)))?;

        parse_first(field, body).map_err(indexer_error)
    }
}

/// Extract the first element of `data.<field>`. An empty list is `None`.
fn parse_first<T: DeserializeOwned>(field: &str, body: GraphQlResponse) -> Result<Option<T>, String> {
    if !body.errors.is_empty() {
        let messages: Vec<_> = body.errors.into_iter().map(|e| e.message).collect();
        return Err(messages.join("; "));
    }

    let records = body
        .data
        .as_ref()
        .and_then(|data| data.get(field))
        .and_then(Value::as_array)
        .ok_or_else(|| format!("Response has no {} list", field))?;

    match records.first() {
        None => Ok(None),
        Some(record) => serde_json::from_value(record.clone())
            .map(Some)
            .map_err(|e| format!("Malformed {} record: {}", field, e)),
    }
}

/// Query, result field and variables for a destination lookup
fn destination_query(lookup: &DestinationLookup) -> (&'static str, &'static str, Value) {
    match lookup {
        DestinationLookup::ByTransferId(transfer_id) => (
            WITHDRAWAL_BONDED_QUERY,
            "withdrawalBondeds",
            json!({ "transferId": transfer_id }),
        ),
        DestinationLookup::ByRecipient { recipient, since } => (
            TRANSFER_FROM_L1_QUERY,
            "transferFromL1Completeds",
            // BigInt variables travel as strings
            json!({ "recipient": format!("{:?}", recipient), "since": since.to_string() }),
        ),
    }
}

fn parse_hash(chain: &ChainDescriptor, raw: &str) -> SwapResult<H256> {
    raw.parse().map_err(|_| SwapError::Indexer {
        chain: chain.slug.clone(),
        message: format!("Invalid transaction hash {}", raw),
    })
}

#[async_trait]
impl TransferIndex for SubgraphIndex {
    async fn find_transfer_id(
        &self,
        chain_from: &ChainDescriptor,
        tx_hash: H256,
    ) -> SwapResult<Option<String>> {
        let record: Option<TransferSent> = self
            .first_record(
                chain_from,
                "transferSents",
                TRANSFER_SENT_QUERY,
                json!({ "txHash": format!("{:?}", tx_hash) }),
            )
            .await?;

        match &record {
            Some(sent) => debug!("Transfer {} sent by {:?}", sent.transfer_id, tx_hash),
            None => debug!("Send {:?} not indexed on {} yet", tx_hash, chain_from.slug),
        }
        Ok(record.map(|sent| sent.transfer_id))
    }

    async fn find_destination_tx_hash(
        &self,
        chain_to: &ChainDescriptor,
        lookup: &DestinationLookup,
    ) -> SwapResult<Option<H256>> {
        if let DestinationLookup::ByRecipient { recipient, since } = lookup {
            warn!(
                "Matching destination transfer on {} by recipient {:?} since {}",
                chain_to.slug, recipient, since
            );
        }

        let (query, field, variables) = destination_query(lookup);
        let record: Option<DestinationEvent> =
            self.first_record(chain_to, field, query, variables).await?;

        record
            .map(|event| parse_hash(chain_to, &event.transaction_hash))
            .transpose()
    }
}
