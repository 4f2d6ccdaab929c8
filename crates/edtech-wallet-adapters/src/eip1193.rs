use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alloy::primitives::{address, keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use edtech_wallet_core::domain::{HandlerId, ProviderId, ReceiptStatus, TxRequest};
use edtech_wallet_core::network::SEPOLIA_CHAIN_ID;
use edtech_wallet_core::ports::{UNKNOWN_CHAIN_CODE, USER_REJECTED_CODE};
use edtech_wallet_core::{
    ChainId, EventHandler, EventKind, NetworkSpec, PortError, ProviderEvent, ProviderPort,
};

use crate::WalletAdapterConfig;

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(1);

/// Methods that wait on a wallet prompt. They run without the request
/// timeout; only connecting to the proxy is bounded.
const PROMPT_METHODS: [&str; 4] = [
    "eth_requestAccounts",
    "eth_sendTransaction",
    "wallet_switchEthereumChain",
    "wallet_addEthereumChain",
];

/// Account the simulated wallet exposes.
pub const DETERMINISTIC_ACCOUNT: Address = address!("1000000000000000000000000000000000000001");

/// Wallet provider adapter.
///
/// `Proxy` forwards EIP-1193 requests as JSON-RPC to a bridge in front of a
/// real wallet. `Deterministic` is an in-process wallet for development and
/// tests. `Disabled` refuses every request, which is what production gets
/// when no real provider is configured.
#[derive(Clone)]
pub struct Eip1193Adapter {
    id: ProviderId,
    mode: ProviderMode,
    state: Arc<Mutex<ProviderState>>,
}

#[derive(Debug, Clone)]
enum ProviderMode {
    Disabled(String),
    Deterministic,
    Proxy(ProxyRuntime),
}

#[derive(Debug, Clone)]
struct ProxyRuntime {
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
    poll_interval: Duration,
    next_request_id: Arc<AtomicU64>,
}

/// Call counts recorded by the adapter, for assertions in tests and
/// diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCounters {
    pub account_requests: u64,
    pub balance_queries: u64,
    pub subscribe_calls: u64,
    pub unsubscribe_calls: u64,
    pub switch_calls: u64,
    pub register_calls: u64,
    pub estimate_calls: u64,
    pub send_calls: u64,
}

#[derive(Debug, Default)]
struct Faults {
    reject_accounts: bool,
    reject_next_signature: bool,
    fail_estimation: bool,
    fail_balance: bool,
    reject_switch: bool,
    reject_registration: bool,
    revert_next: bool,
}

struct ProviderState {
    accounts: Vec<Address>,
    authorized: bool,
    chain_id: ChainId,
    known_chains: BTreeSet<ChainId>,
    balances: HashMap<Address, U256>,
    handlers: BTreeMap<EventKind, BTreeMap<HandlerId, EventHandler>>,
    next_handler: u64,
    nonce: u64,
    block_number: u64,
    gas_estimate: u64,
    call_responses: HashMap<[u8; 4], Bytes>,
    receipts: HashMap<B256, ReceiptStatus>,
    faults: Faults,
    counters: ProviderCounters,
}

impl ProviderState {
    fn empty() -> Self {
        Self {
            accounts: Vec::new(),
            authorized: false,
            chain_id: 0,
            known_chains: BTreeSet::new(),
            balances: HashMap::new(),
            handlers: BTreeMap::new(),
            next_handler: 0,
            nonce: 0,
            block_number: 0,
            gas_estimate: 21_000,
            call_responses: HashMap::new(),
            receipts: HashMap::new(),
            faults: Faults::default(),
            counters: ProviderCounters::default(),
        }
    }

    /// One funded account on Sepolia; mainnet and Sepolia are known chains,
    /// anything else has to be registered first.
    fn deterministic() -> Self {
        let mut state = Self::empty();
        state.accounts = vec![DETERMINISTIC_ACCOUNT];
        state.chain_id = SEPOLIA_CHAIN_ID;
        state.known_chains = BTreeSet::from([1, SEPOLIA_CHAIN_ID]);
        state.balances.insert(
            DETERMINISTIC_ACCOUNT,
            U256::from(10u64) * U256::from(10u64).pow(U256::from(18u64)),
        );
        state.block_number = 1;
        state
    }
}

impl fmt::Debug for Eip1193Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Eip1193Adapter")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl Default for Eip1193Adapter {
    fn default() -> Self {
        Self::with_config(WalletAdapterConfig::from_env())
    }
}

impl Eip1193Adapter {
    pub fn with_config(config: WalletAdapterConfig) -> Self {
        let mode = if let Some(ref base_url) = config.eip1193_proxy_url {
            let timeout = Duration::from_millis(config.request_timeout_ms);
            match reqwest::Client::builder().connect_timeout(timeout).build() {
                Ok(client) => ProviderMode::Proxy(ProxyRuntime {
                    base_url: base_url.clone(),
                    client,
                    request_timeout: timeout,
                    poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
                    next_request_id: Arc::new(AtomicU64::new(1)),
                }),
                Err(e) => {
                    if config.strict_runtime_required() {
                        ProviderMode::Disabled(format!(
                            "failed to initialize EIP-1193 proxy client in production profile: {e}"
                        ))
                    } else {
                        ProviderMode::Deterministic
                    }
                }
            }
        } else if config.strict_runtime_required() {
            ProviderMode::Disabled(
                "EIP-1193 proxy URL not configured in production runtime profile".to_owned(),
            )
        } else {
            ProviderMode::Deterministic
        };

        let state = match mode {
            ProviderMode::Deterministic => ProviderState::deterministic(),
            _ => ProviderState::empty(),
        };
        Self::from_parts(mode, state)
    }

    /// Simulated wallet, independent of the environment.
    pub fn deterministic() -> Self {
        Self::from_parts(ProviderMode::Deterministic, ProviderState::deterministic())
    }

    pub fn disabled(reason: impl Into<String>) -> Self {
        Self::from_parts(ProviderMode::Disabled(reason.into()), ProviderState::empty())
    }

    fn from_parts(mode: ProviderMode, state: ProviderState) -> Self {
        Self {
            id: ProviderId(NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed)),
            mode,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self.mode {
            ProviderMode::Disabled(_) => "disabled",
            ProviderMode::Deterministic => "deterministic",
            ProviderMode::Proxy(_) => "proxy",
        }
    }

    fn check_mode(&self) -> Result<(), PortError> {
        if let ProviderMode::Disabled(reason) = &self.mode {
            return Err(PortError::Unavailable(reason.clone()));
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ProviderState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))
    }

    /// Invokes the handlers for the event's kind outside the state lock.
    fn emit(&self, event: ProviderEvent) -> Result<(), PortError> {
        let handlers: Vec<EventHandler> = {
            let g = self.lock()?;
            g.handlers
                .get(&event.kind())
                .map(|m| m.values().cloned().collect())
                .unwrap_or_default()
        };
        debug!(
            event = event.kind().rpc_name(),
            handlers = handlers.len(),
            "provider event"
        );
        for handler in handlers {
            handler(event.clone());
        }
        Ok(())
    }

    pub fn counters(&self) -> Result<ProviderCounters, PortError> {
        Ok(self.lock()?.counters)
    }

    pub fn handler_count(&self, kind: EventKind) -> Result<usize, PortError> {
        Ok(self.lock()?.handlers.get(&kind).map_or(0, BTreeMap::len))
    }

    /// Re-reads accounts and chain from the proxy and fires handlers for
    /// whatever changed since the last read. A no-op in the other modes.
    pub async fn sync_snapshot(&self) -> Result<(), PortError> {
        let ProviderMode::Proxy(proxy) = &self.mode else {
            return self.check_mode();
        };
        let accounts = parse_accounts(&proxy.rpc("eth_accounts", json!([])).await?)?;
        let chain_id = parse_quantity_u64(&proxy.rpc("eth_chainId", json!([])).await?)?;
        let (accounts_changed, chain_changed) = {
            let mut g = self.lock()?;
            let changed = (g.accounts != accounts, g.chain_id != chain_id);
            g.accounts = accounts.clone();
            g.chain_id = chain_id;
            changed
        };
        if accounts_changed {
            self.emit(ProviderEvent::AccountsChanged(accounts))?;
        }
        if chain_changed {
            self.emit(ProviderEvent::ChainChanged(chain_id))?;
        }
        Ok(())
    }

    pub fn debug_inject_accounts_changed(&self, accounts: Vec<Address>) -> Result<(), PortError> {
        self.lock()?.accounts = accounts.clone();
        self.emit(ProviderEvent::AccountsChanged(accounts))
    }

    pub fn debug_inject_chain_changed(&self, chain_id: ChainId) -> Result<(), PortError> {
        {
            let mut g = self.lock()?;
            g.chain_id = chain_id;
            g.known_chains.insert(chain_id);
        }
        self.emit(ProviderEvent::ChainChanged(chain_id))
    }

    pub fn debug_set_balance(&self, account: Address, balance: U256) -> Result<(), PortError> {
        self.lock()?.balances.insert(account, balance);
        Ok(())
    }

    pub fn debug_set_gas_estimate(&self, gas: u64) -> Result<(), PortError> {
        self.lock()?.gas_estimate = gas;
        Ok(())
    }

    /// Raw return data for calls whose calldata starts with `selector`.
    pub fn debug_set_call_response(&self, selector: [u8; 4], output: Bytes) -> Result<(), PortError> {
        self.lock()?.call_responses.insert(selector, output);
        Ok(())
    }

    pub fn debug_set_known_chains(&self, chains: &[ChainId]) -> Result<(), PortError> {
        self.lock()?.known_chains = chains.iter().copied().collect();
        Ok(())
    }

    pub fn debug_reject_accounts(&self, reject: bool) -> Result<(), PortError> {
        self.lock()?.faults.reject_accounts = reject;
        Ok(())
    }

    pub fn debug_reject_next_signature(&self) -> Result<(), PortError> {
        self.lock()?.faults.reject_next_signature = true;
        Ok(())
    }

    pub fn debug_fail_estimation(&self, fail: bool) -> Result<(), PortError> {
        self.lock()?.faults.fail_estimation = fail;
        Ok(())
    }

    pub fn debug_fail_balance(&self, fail: bool) -> Result<(), PortError> {
        self.lock()?.faults.fail_balance = fail;
        Ok(())
    }

    pub fn debug_reject_switch(&self, reject: bool) -> Result<(), PortError> {
        self.lock()?.faults.reject_switch = reject;
        Ok(())
    }

    pub fn debug_reject_registration(&self, reject: bool) -> Result<(), PortError> {
        self.lock()?.faults.reject_registration = reject;
        Ok(())
    }

    pub fn debug_revert_next(&self) -> Result<(), PortError> {
        self.lock()?.faults.revert_next = true;
        Ok(())
    }

    fn simulate_switch(&self, chain_id: ChainId) -> Result<(), PortError> {
        let changed = {
            let mut g = self.lock()?;
            g.counters.switch_calls += 1;
            if g.faults.reject_switch {
                return Err(PortError::rpc(USER_REJECTED_CODE, "user rejected network switch"));
            }
            if !g.known_chains.contains(&chain_id) {
                return Err(PortError::rpc(
                    UNKNOWN_CHAIN_CODE,
                    format!("unrecognized chain id {chain_id:#x}"),
                ));
            }
            let changed = g.chain_id != chain_id;
            g.chain_id = chain_id;
            changed
        };
        if changed {
            self.emit(ProviderEvent::ChainChanged(chain_id))?;
        }
        Ok(())
    }

    fn simulate_send(&self, request: &TxRequest) -> Result<B256, PortError> {
        let mut g = self.lock()?;
        g.counters.send_calls += 1;
        if std::mem::take(&mut g.faults.reject_next_signature) {
            return Err(PortError::rpc(USER_REJECTED_CODE, "user denied transaction signature"));
        }
        let from = request
            .from
            .ok_or_else(|| PortError::Validation("transaction without sender".to_owned()))?;
        let nonce = g.nonce;
        g.nonce += 1;
        let mut seed = serde_json::to_vec(&request.to_rpc_json())
            .map_err(|e| PortError::Validation(format!("tx payload serialization failed: {e}")))?;
        seed.extend_from_slice(&nonce.to_be_bytes());
        let tx_hash = keccak256(seed);

        let success = !std::mem::take(&mut g.faults.revert_next);
        if success {
            let balance = g.balances.entry(from).or_default();
            *balance = balance.saturating_sub(request.value);
            let credited = g.balances.entry(request.to).or_default();
            *credited = credited.saturating_add(request.value);
        }
        g.block_number += 1;
        let gas_used = request.gas.map(|limit| limit.min(g.gas_estimate));
        let block_number = g.block_number;
        g.receipts.insert(
            tx_hash,
            ReceiptStatus {
                tx_hash,
                success,
                gas_used,
                block_number: Some(block_number),
            },
        );
        Ok(tx_hash)
    }
}

impl ProxyRuntime {
    async fn rpc(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let awaits_user = PROMPT_METHODS.contains(&method);
        debug!(method, id, awaits_user, "eip1193 proxy request");
        let mut request = self.client.post(&self.base_url).json(&payload);
        if !awaits_user {
            request = request.timeout(self.request_timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy request failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy json decode failed: {e}")))?;
        if let Some(err) = body.get("error") {
            return match err.get("code").and_then(Value::as_i64) {
                Some(code) => Err(PortError::rpc(
                    code,
                    err.get("message")
                        .and_then(Value::as_str)
                        .unwrap_or_default(),
                )),
                None => Err(PortError::Transport(format!(
                    "eip1193 proxy returned error: {err}"
                ))),
            };
        }
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "eip1193 proxy status {status}: {body}"
            )));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport("eip1193 proxy missing result".to_owned()))
    }
}

#[async_trait]
impl ProviderPort for Eip1193Adapter {
    fn instance_id(&self) -> ProviderId {
        self.id
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, PortError> {
        match &self.mode {
            ProviderMode::Disabled(reason) => Err(PortError::Unavailable(reason.clone())),
            ProviderMode::Proxy(proxy) => {
                let accounts = parse_accounts(&proxy.rpc("eth_requestAccounts", json!([])).await?)?;
                let mut g = self.lock()?;
                g.counters.account_requests += 1;
                g.accounts = accounts.clone();
                Ok(accounts)
            }
            ProviderMode::Deterministic => {
                let mut g = self.lock()?;
                g.counters.account_requests += 1;
                if g.faults.reject_accounts {
                    return Err(PortError::rpc(USER_REJECTED_CODE, "user rejected the request"));
                }
                g.authorized = true;
                Ok(g.accounts.clone())
            }
        }
    }

    async fn current_accounts(&self) -> Result<Vec<Address>, PortError> {
        match &self.mode {
            ProviderMode::Disabled(reason) => Err(PortError::Unavailable(reason.clone())),
            ProviderMode::Proxy(proxy) => parse_accounts(&proxy.rpc("eth_accounts", json!([])).await?),
            ProviderMode::Deterministic => {
                let g = self.lock()?;
                Ok(if g.authorized {
                    g.accounts.clone()
                } else {
                    Vec::new()
                })
            }
        }
    }

    async fn chain_id(&self) -> Result<ChainId, PortError> {
        match &self.mode {
            ProviderMode::Disabled(reason) => Err(PortError::Unavailable(reason.clone())),
            ProviderMode::Proxy(proxy) => {
                let chain_id = parse_quantity_u64(&proxy.rpc("eth_chainId", json!([])).await?)?;
                self.lock()?.chain_id = chain_id;
                Ok(chain_id)
            }
            ProviderMode::Deterministic => Ok(self.lock()?.chain_id),
        }
    }

    async fn switch_network(&self, chain_id: ChainId) -> Result<(), PortError> {
        match &self.mode {
            ProviderMode::Disabled(reason) => Err(PortError::Unavailable(reason.clone())),
            ProviderMode::Proxy(proxy) => {
                self.lock()?.counters.switch_calls += 1;
                proxy
                    .rpc(
                        "wallet_switchEthereumChain",
                        json!([{ "chainId": format!("{chain_id:#x}") }]),
                    )
                    .await?;
                Ok(())
            }
            ProviderMode::Deterministic => self.simulate_switch(chain_id),
        }
    }

    async fn register_network(&self, spec: &NetworkSpec) -> Result<(), PortError> {
        match &self.mode {
            ProviderMode::Disabled(reason) => Err(PortError::Unavailable(reason.clone())),
            ProviderMode::Proxy(proxy) => {
                self.lock()?.counters.register_calls += 1;
                proxy
                    .rpc("wallet_addEthereumChain", json!([add_chain_params(spec)]))
                    .await?;
                Ok(())
            }
            ProviderMode::Deterministic => {
                let mut g = self.lock()?;
                g.counters.register_calls += 1;
                if g.faults.reject_registration {
                    return Err(PortError::rpc(
                        USER_REJECTED_CODE,
                        "user rejected network registration",
                    ));
                }
                g.known_chains.insert(spec.chain_id);
                Ok(())
            }
        }
    }

    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Result<HandlerId, PortError> {
        self.check_mode()?;
        let mut g = self.lock()?;
        g.counters.subscribe_calls += 1;
        g.next_handler += 1;
        let id = HandlerId(g.next_handler);
        g.handlers.entry(kind).or_default().insert(id, handler);
        Ok(id)
    }

    fn unsubscribe(&self, kind: EventKind, handler: HandlerId) -> Result<(), PortError> {
        self.check_mode()?;
        let mut g = self.lock()?;
        g.counters.unsubscribe_calls += 1;
        match g.handlers.get_mut(&kind).and_then(|m| m.remove(&handler)) {
            Some(_) => Ok(()),
            None => Err(PortError::NotFound(format!(
                "no {} handler {}",
                kind.rpc_name(),
                handler.0
            ))),
        }
    }

    async fn get_balance(&self, account: Address) -> Result<U256, PortError> {
        match &self.mode {
            ProviderMode::Disabled(reason) => Err(PortError::Unavailable(reason.clone())),
            ProviderMode::Proxy(proxy) => {
                self.lock()?.counters.balance_queries += 1;
                let result = proxy
                    .rpc("eth_getBalance", json!([account.to_string(), "latest"]))
                    .await?;
                parse_quantity_u256(&result)
            }
            ProviderMode::Deterministic => {
                let mut g = self.lock()?;
                g.counters.balance_queries += 1;
                if g.faults.fail_balance {
                    return Err(PortError::Transport("simulated balance query failure".to_owned()));
                }
                Ok(g.balances.get(&account).copied().unwrap_or_default())
            }
        }
    }

    async fn call(&self, request: &TxRequest) -> Result<Bytes, PortError> {
        match &self.mode {
            ProviderMode::Disabled(reason) => Err(PortError::Unavailable(reason.clone())),
            ProviderMode::Proxy(proxy) => {
                let result = proxy
                    .rpc("eth_call", json!([request.to_rpc_json(), "latest"]))
                    .await?;
                parse_bytes(&result)
            }
            ProviderMode::Deterministic => {
                let selector: [u8; 4] = request
                    .data
                    .get(..4)
                    .and_then(|s| s.try_into().ok())
                    .ok_or_else(|| PortError::Validation("calldata without selector".to_owned()))?;
                self.lock()?
                    .call_responses
                    .get(&selector)
                    .cloned()
                    .ok_or_else(|| PortError::rpc(-32000, "execution reverted"))
            }
        }
    }

    async fn estimate_gas(&self, request: &TxRequest) -> Result<u64, PortError> {
        match &self.mode {
            ProviderMode::Disabled(reason) => Err(PortError::Unavailable(reason.clone())),
            ProviderMode::Proxy(proxy) => {
                self.lock()?.counters.estimate_calls += 1;
                let result = proxy
                    .rpc("eth_estimateGas", json!([request.to_rpc_json()]))
                    .await?;
                parse_quantity_u64(&result)
            }
            ProviderMode::Deterministic => {
                let mut g = self.lock()?;
                g.counters.estimate_calls += 1;
                if g.faults.fail_estimation {
                    return Err(PortError::rpc(-32000, "execution reverted"));
                }
                Ok(g.gas_estimate)
            }
        }
    }

    async fn send_transaction(&self, request: &TxRequest) -> Result<B256, PortError> {
        match &self.mode {
            ProviderMode::Disabled(reason) => Err(PortError::Unavailable(reason.clone())),
            ProviderMode::Proxy(proxy) => {
                self.lock()?.counters.send_calls += 1;
                let result = proxy
                    .rpc("eth_sendTransaction", json!([request.to_rpc_json()]))
                    .await?;
                let hash = result.as_str().ok_or_else(|| {
                    PortError::Transport("eth_sendTransaction must return hash".to_owned())
                })?;
                hash.parse()
                    .map_err(|e| PortError::Validation(format!("invalid tx hash: {e}")))
            }
            ProviderMode::Deterministic => self.simulate_send(request),
        }
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<ReceiptStatus, PortError> {
        match &self.mode {
            ProviderMode::Disabled(reason) => Err(PortError::Unavailable(reason.clone())),
            ProviderMode::Proxy(proxy) => loop {
                let result = proxy
                    .rpc("eth_getTransactionReceipt", json!([tx_hash.to_string()]))
                    .await?;
                if !result.is_null() {
                    return parse_receipt(tx_hash, &result);
                }
                tokio::time::sleep(proxy.poll_interval).await;
            },
            ProviderMode::Deterministic => self
                .lock()?
                .receipts
                .get(&tx_hash)
                .cloned()
                .ok_or_else(|| PortError::NotFound(format!("unknown transaction {tx_hash}"))),
        }
    }
}

/// EIP-3085 `wallet_addEthereumChain` parameter object.
pub fn add_chain_params(spec: &NetworkSpec) -> Value {
    let mut params = json!({
        "chainId": format!("{:#x}", spec.chain_id),
        "chainName": spec.display_name,
        "nativeCurrency": {
            "name": spec.native_currency_name,
            "symbol": spec.native_currency_symbol,
            "decimals": spec.decimals,
        },
        "rpcUrls": spec.rpc_urls,
    });
    if let Some(explorer) = &spec.explorer_url {
        params["blockExplorerUrls"] = json!([explorer]);
    }
    params
}

fn parse_accounts(value: &Value) -> Result<Vec<Address>, PortError> {
    let arr = value
        .as_array()
        .ok_or_else(|| PortError::Transport("accounts: array expected".to_owned()))?;
    arr.iter()
        .map(|item| {
            let raw = item
                .as_str()
                .ok_or_else(|| PortError::Transport("accounts: string expected".to_owned()))?;
            raw.parse()
                .map_err(|e| PortError::Validation(format!("invalid account address: {e}")))
        })
        .collect()
}

fn parse_quantity_u64(value: &Value) -> Result<u64, PortError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let raw = value
        .as_str()
        .ok_or_else(|| PortError::Validation("quantity must be string or number".to_owned()))?;
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    }
    .map_err(|e| PortError::Validation(format!("invalid quantity '{raw}': {e}")))
}

fn parse_quantity_u256(value: &Value) -> Result<U256, PortError> {
    let raw = value
        .as_str()
        .ok_or_else(|| PortError::Validation("quantity must be a hex string".to_owned()))?;
    U256::from_str(raw).map_err(|e| PortError::Validation(format!("invalid quantity '{raw}': {e}")))
}

fn parse_bytes(value: &Value) -> Result<Bytes, PortError> {
    let raw = value
        .as_str()
        .ok_or_else(|| PortError::Validation("call result must be hex string".to_owned()))?;
    raw.parse()
        .map_err(|e| PortError::Validation(format!("invalid call result: {e}")))
}

fn parse_receipt(tx_hash: B256, value: &Value) -> Result<ReceiptStatus, PortError> {
    let status = value
        .get("status")
        .ok_or_else(|| PortError::Validation("receipt without status".to_owned()))
        .and_then(parse_quantity_u64)?;
    let optional = |key: &str| -> Result<Option<u64>, PortError> {
        value
            .get(key)
            .filter(|v| !v.is_null())
            .map(parse_quantity_u64)
            .transpose()
    };
    Ok(ReceiptStatus {
        tx_hash,
        success: status == 1,
        gas_used: optional("gasUsed")?,
        block_number: optional("blockNumber")?,
    })
}
