//! In-process fakes for driving swaps without a chain, a bridge or an indexer

use super::{BalanceUpdater, HopSwapProvider};
use crate::bridge::{BridgeSdk, BridgeTokenAddresses, ChainBridgeGateway, SendData, SendRequest, SignerContext};
use crate::chain::{ChainClient, ChainTransaction, ClientFactory, PrivateKey, ProviderCache, TxStatus};
use crate::error::{SwapError, SwapResult};
use crate::indexer::{DestinationLookup, TransferIndex};
use crate::models::{AssetRegistry, ChainDescriptor, Network};
use crate::scheduler::{BackoffPolicy, RetryScheduler};

pub(crate) use crate::models::sample_swap;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use dashmap::DashMap;
use ethers::types::{Address, H256, U256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Account 0 of the `test test ... junk` mnemonic
pub(crate) const TEST_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub(crate) const APPROVE_HASH: H256 = H256::repeat_byte(0xaa);
pub(crate) const SEND_HASH: H256 = H256::repeat_byte(0xbb);
pub(crate) const RECEIVE_HASH: H256 = H256::repeat_byte(0xcc);

pub(crate) fn test_address() -> Address {
    "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap()
}

pub(crate) fn registry() -> Arc<AssetRegistry> {
    let settings = crate::config::Settings::from_toml(crate::config::SAMPLE_CONFIG).unwrap();
    Arc::new(AssetRegistry::from_settings(&settings).unwrap())
}

pub(crate) fn scheduler() -> Arc<RetryScheduler> {
    Arc::new(RetryScheduler::new(BackoffPolicy {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        multiplier: 2,
        max_attempts: Some(3),
    }))
}

/// Transactions visible on chain, shared by every fake client
#[derive(Default)]
pub(crate) struct Ledger {
    txs: DashMap<H256, ChainTransaction>,
}

impl Ledger {
    pub fn mine(&self, hash: H256, confirmations: u64, status: TxStatus) {
        self.txs.insert(
            hash,
            ChainTransaction {
                hash,
                confirmations,
                status,
            },
        );
    }
}

pub(crate) struct FakeChainClient {
    ledger: Arc<Ledger>,
    failure: Option<String>,
}

#[async_trait]
impl ChainClient for FakeChainClient {
    async fn get_transaction_by_hash(&self, hash: H256) -> SwapResult<ChainTransaction> {
        if let Some(message) = &self.failure {
            return Err(SwapError::ChainClient(message.clone()));
        }
        self.ledger
            .txs
            .get(&hash)
            .map(|tx| tx.value().clone())
            .ok_or_else(|| SwapError::TransactionNotFound {
                tx_hash: format!("{:?}", hash),
            })
    }

    async fn export_private_key(&self) -> SwapResult<PrivateKey> {
        Ok(PrivateKey::new(TEST_KEY.to_string()))
    }

    async fn get_addresses(&self, start: u32, count: u32) -> SwapResult<Vec<Address>> {
        Ok((start..start + count)
            .map(|i| Address::from_low_u64_be(u64::from(i) + 1))
            .collect())
    }
}

pub(crate) struct FakeClients {
    ledger: Arc<Ledger>,
    failure: Option<String>,
}

impl ClientFactory for FakeClients {
    fn client(
        &self,
        _network: Network,
        _wallet_id: &str,
        _asset: &str,
        _account_id: &str,
    ) -> SwapResult<Arc<dyn ChainClient>> {
        Ok(Arc::new(FakeChainClient {
            ledger: self.ledger.clone(),
            failure: self.failure.clone(),
        }))
    }
}

/// Bridge with a fixed 0.98 rate. Submitted transactions land on the
/// ledger with one confirmation when `auto_mine` is set.
pub(crate) struct FakeBridgeSdk {
    ledger: Arc<Ledger>,
    needs_approval: bool,
    auto_mine: bool,
    send_status: TxStatus,
    approvals: AtomicU32,
    sends: AtomicU32,
}

impl FakeBridgeSdk {
    pub fn approvals(&self) -> u32 {
        self.approvals.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> u32 {
        self.sends.load(Ordering::SeqCst)
    }
}

fn fake_chain(slug: &str) -> Option<ChainDescriptor> {
    let (chain_id, is_layer1) = match slug {
        "ethereum" => (1, true),
        "polygon" => (137, false),
        _ => return None,
    };
    Some(ChainDescriptor {
        slug: slug.to_string(),
        chain_id,
        is_layer1,
    })
}

#[async_trait]
impl BridgeSdk for FakeBridgeSdk {
    fn chain(&self, slug: &str) -> Option<ChainDescriptor> {
        fake_chain(slug)
    }

    fn supported_assets_for_chain(&self, slug: &str) -> Vec<String> {
        match fake_chain(slug) {
            Some(_) => vec!["USDC".to_string()],
            None => Vec::new(),
        }
    }

    fn canonical_tokens(&self) -> HashMap<String, HashMap<String, BridgeTokenAddresses>> {
        let mut usdc = HashMap::new();
        usdc.insert(
            "ethereum".to_string(),
            BridgeTokenAddresses {
                l1_canonical_token: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".parse().ok(),
                ..Default::default()
            },
        );
        usdc.insert(
            "polygon".to_string(),
            BridgeTokenAddresses {
                l2_canonical_token: "0x2791bca1f2de4661ed88a30c99a7a9449aa84174".parse().ok(),
                ..Default::default()
            },
        );
        HashMap::from([("USDC".to_string(), usdc)])
    }

    async fn get_send_data(
        &self,
        _bridge_asset: &str,
        _amount: &BigDecimal,
        _chain_from: &ChainDescriptor,
        _chain_to: &ChainDescriptor,
    ) -> SwapResult<Option<SendData>> {
        Ok(Some(SendData {
            rate: "0.98".parse().unwrap(),
            adjusted_bonder_fee: BigDecimal::from(1),
            adjusted_destination_tx_fee: "0.5".parse().unwrap(),
        }))
    }

    async fn send_approval(
        &self,
        _signer: &SignerContext,
        _bridge_asset: &str,
        _chain_from: &ChainDescriptor,
        _chain_to: &ChainDescriptor,
        _amount: U256,
    ) -> SwapResult<Option<H256>> {
        tokio::task::yield_now().await;
        self.approvals.fetch_add(1, Ordering::SeqCst);
        if !self.needs_approval {
            return Ok(None);
        }
        if self.auto_mine {
            self.ledger.mine(APPROVE_HASH, 1, TxStatus::Success);
        }
        Ok(Some(APPROVE_HASH))
    }

    async fn send(&self, _signer: &SignerContext, _request: &SendRequest) -> SwapResult<H256> {
        // let overlapping triggers interleave with the submission
        tokio::task::yield_now().await;
        self.sends.fetch_add(1, Ordering::SeqCst);
        if self.auto_mine {
            self.ledger.mine(SEND_HASH, 1, self.send_status);
        }
        Ok(SEND_HASH)
    }
}

/// Indexer that has already seen every transfer
#[derive(Default)]
pub(crate) struct FakeIndex {
    lookups: Mutex<Vec<DestinationLookup>>,
}

impl FakeIndex {
    pub fn lookups(&self) -> Vec<DestinationLookup> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransferIndex for FakeIndex {
    async fn find_transfer_id(
        &self,
        _chain_from: &ChainDescriptor,
        _tx_hash: H256,
    ) -> SwapResult<Option<String>> {
        Ok(Some("0xtransfer".to_string()))
    }

    async fn find_destination_tx_hash(
        &self,
        _chain_to: &ChainDescriptor,
        lookup: &DestinationLookup,
    ) -> SwapResult<Option<H256>> {
        self.lookups.lock().unwrap().push(lookup.clone());
        Ok(Some(RECEIVE_HASH))
    }
}

#[derive(Default)]
pub(crate) struct RecordingBalances {
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingBalances {
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BalanceUpdater for RecordingBalances {
    async fn update_balances(&self, _network: Network, _wallet_id: &str, assets: &[String]) {
        self.calls.lock().unwrap().push(assets.to_vec());
    }
}

/// A provider wired to fakes, plus handles to inspect them
pub(crate) struct Harness {
    pub ledger: Arc<Ledger>,
    pub sdk: Arc<FakeBridgeSdk>,
    pub balances: Arc<RecordingBalances>,
    pub provider: Arc<HopSwapProvider>,
}

impl Harness {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            ledger: None,
            needs_approval: true,
            auto_mine: true,
            send_status: TxStatus::Success,
            chain_failure: None,
            index: None,
        }
    }
}

pub(crate) struct HarnessBuilder {
    ledger: Option<Arc<Ledger>>,
    needs_approval: bool,
    auto_mine: bool,
    send_status: TxStatus,
    chain_failure: Option<String>,
    index: Option<Arc<dyn TransferIndex>>,
}

impl HarnessBuilder {
    /// Share chain state with another harness, e.g. across a restart
    pub fn ledger(mut self, ledger: Arc<Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn needs_approval(mut self, needs_approval: bool) -> Self {
        self.needs_approval = needs_approval;
        self
    }

    pub fn auto_mine(mut self, auto_mine: bool) -> Self {
        self.auto_mine = auto_mine;
        self
    }

    pub fn send_status(mut self, status: TxStatus) -> Self {
        self.send_status = status;
        self
    }

    pub fn chain_failure(mut self, message: &str) -> Self {
        self.chain_failure = Some(message.to_string());
        self
    }

    pub fn index(mut self, index: Arc<dyn TransferIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn build(self) -> Harness {
        let ledger = self.ledger.unwrap_or_default();
        ledger.mine(RECEIVE_HASH, 1, TxStatus::Success);

        let sdk = Arc::new(FakeBridgeSdk {
            ledger: ledger.clone(),
            needs_approval: self.needs_approval,
            auto_mine: self.auto_mine,
            send_status: self.send_status,
            approvals: AtomicU32::new(0),
            sends: AtomicU32::new(0),
        });

        let endpoints = HashMap::from([
            (1, vec!["http://localhost:8545".to_string()]),
            (137, vec!["http://localhost:8546".to_string()]),
        ]);
        let gateway = Arc::new(ChainBridgeGateway::new(
            sdk.clone(),
            Arc::new(ProviderCache::new(endpoints)),
            7 * 24 * 3600,
        ));

        let clients = Arc::new(FakeClients {
            ledger: ledger.clone(),
            failure: self.chain_failure,
        });
        let balances = Arc::new(RecordingBalances::default());
        let index = self
            .index
            .unwrap_or_else(|| Arc::new(FakeIndex::default()) as Arc<dyn TransferIndex>);

        let provider = Arc::new(HopSwapProvider::new(
            gateway,
            index,
            clients,
            registry(),
            balances.clone(),
            50,
        ));

        Harness {
            ledger,
            sdk,
            balances,
            provider,
        }
    }
}
