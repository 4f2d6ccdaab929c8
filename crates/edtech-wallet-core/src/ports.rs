use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    ChainId, EventKind, HandlerId, NetworkSpec, ProviderEvent, ProviderId, ReceiptStatus,
    TxRequest,
};

/// EIP-1193 code for a request the user declined in the wallet.
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-3326 code for a switch to a chain the wallet does not know yet.
pub const UNKNOWN_CHAIN_CODE: i64 = 4902;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("provider rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("policy error: {0}")]
    Policy(String),
}

impl PortError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        PortError::Rpc {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            PortError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_user_rejected(&self) -> bool {
        self.code() == Some(USER_REJECTED_CODE)
    }

    pub fn is_unknown_chain(&self) -> bool {
        self.code() == Some(UNKNOWN_CHAIN_CODE)
    }
}

/// Callback a provider invokes for every notification of a subscribed kind.
pub type EventHandler = Arc<dyn Fn(ProviderEvent) + Send + Sync>;

/// The wallet provider boundary.
///
/// Every network round-trip is async; subscription bookkeeping is local to
/// the provider and therefore synchronous.
#[async_trait]
pub trait ProviderPort: Send + Sync {
    fn instance_id(&self) -> ProviderId;

    /// Prompts the user for account access.
    async fn request_accounts(&self) -> Result<Vec<Address>, PortError>;
    /// Accounts already authorized for this origin; never prompts.
    async fn current_accounts(&self) -> Result<Vec<Address>, PortError>;
    async fn chain_id(&self) -> Result<ChainId, PortError>;

    async fn switch_network(&self, chain_id: ChainId) -> Result<(), PortError>;
    async fn register_network(&self, spec: &NetworkSpec) -> Result<(), PortError>;

    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Result<HandlerId, PortError>;
    fn unsubscribe(&self, kind: EventKind, handler: HandlerId) -> Result<(), PortError>;

    async fn get_balance(&self, account: Address) -> Result<U256, PortError>;
    async fn call(&self, request: &TxRequest) -> Result<Bytes, PortError>;
    async fn estimate_gas(&self, request: &TxRequest) -> Result<u64, PortError>;
    /// Prompts for a signature and broadcasts; returns the transaction hash.
    async fn send_transaction(&self, request: &TxRequest) -> Result<B256, PortError>;
    /// Resolves once the transaction is included. No internal timeout.
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<ReceiptStatus, PortError>;
}
