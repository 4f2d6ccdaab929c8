use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type ChainId = u64;

/// Identity of one provider instance, used to key event subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(pub u64);

/// Opaque token returned by a provider when a handler is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandlerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionStatus {
    /// Connected or reconnecting: the states where an account is held.
    pub fn is_connected_family(self) -> bool {
        matches!(self, ConnectionStatus::Connected | ConnectionStatus::Reconnecting)
    }
}

/// Read-only snapshot of the canonical connection state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub account: Option<Address>,
    pub chain_id: Option<ChainId>,
    /// Cached balance in the smallest unit of the active network.
    pub balance: U256,
    pub network_supported: bool,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected && self.account.is_some()
    }

    /// `0x1234...abcd`, or an empty string when no account is held.
    pub fn short_account(&self) -> String {
        match self.account {
            Some(account) => {
                let full = account.to_checksum(None);
                format!("{}...{}", &full[..6], &full[full.len() - 4..])
            }
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub chain_id: ChainId,
    pub display_name: String,
    pub native_currency_name: String,
    pub native_currency_symbol: String,
    pub decimals: u8,
    pub rpc_urls: Vec<String>,
    pub explorer_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    AccountsChanged,
    ChainChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::AccountsChanged, EventKind::ChainChanged];

    pub fn rpc_name(self) -> &'static str {
        match self {
            EventKind::AccountsChanged => "accountsChanged",
            EventKind::ChainChanged => "chainChanged",
        }
    }
}

/// Normalized provider notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(ChainId),
}

impl ProviderEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ProviderEvent::AccountsChanged(_) => EventKind::AccountsChanged,
            ProviderEvent::ChainChanged(_) => EventKind::ChainChanged,
        }
    }
}

/// A call or transaction request at the provider boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub chain_id: ChainId,
    pub from: Option<Address>,
    pub to: Address,
    pub data: alloy::primitives::Bytes,
    pub value: U256,
    pub gas: Option<u64>,
}

impl TxRequest {
    /// EIP-1193 transaction object (hex quantities).
    pub fn to_rpc_json(&self) -> Value {
        let mut obj = serde_json::json!({
            "to": self.to.to_string(),
            "data": alloy::hex::encode_prefixed(&self.data),
            "value": format!("{:#x}", self.value),
        });
        if let Some(from) = self.from {
            obj["from"] = Value::String(from.to_string());
        }
        if let Some(gas) = self.gas {
            obj["gas"] = Value::String(format!("{gas:#x}"));
        }
        obj
    }
}

/// What the provider reports once a broadcast transaction is included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptStatus {
    pub tx_hash: B256,
    pub success: bool,
    pub gas_used: Option<u64>,
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingTxStatus {
    Building,
    Estimating,
    AwaitingSignature,
    Submitted,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub method: String,
    pub args: Vec<Value>,
    pub value: U256,
    pub estimated_gas: Option<u64>,
    pub gas_limit: Option<u64>,
    pub status: PendingTxStatus,
}

/// A broadcast submission whose confirmation has not been observed yet.
///
/// Carries the chain and account captured when the submission started, so
/// settlement can detect that the live connection moved on in the meantime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub tx_hash: B256,
    pub chain_id: ChainId,
    pub from: Address,
    pub to: Address,
    pub transaction: PendingTransaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: B256,
    pub chain_id: ChainId,
    pub from: Address,
    pub to: Address,
    pub method: String,
    /// Value transferred, in the smallest unit.
    pub value: U256,
    pub gas_limit: u64,
    pub gas_used: Option<u64>,
    pub block_number: Option<u64>,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractStats {
    pub total_donations_count: U256,
    pub total_donations_amount: U256,
    pub total_allocated_amount: U256,
    pub total_withdrawn_amount: U256,
    pub contract_balance: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationRecord {
    pub id: U256,
    pub donor: Address,
    pub amount: U256,
    pub purpose: String,
    pub status: u8,
    pub timestamp: u64,
}
