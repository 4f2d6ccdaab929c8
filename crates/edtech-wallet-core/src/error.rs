use alloy::primitives::B256;
use thiserror::Error;

use crate::domain::{ChainId, ConnectionStatus, PendingTxStatus};
use crate::ports::PortError;
use crate::state_machine::{ConnectionAction, PendingTxAction};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("no wallet provider present: {0}")]
    NoProvider(String),
    #[error("user rejected the account request")]
    UserRejected,
    #[error("provider returned no accounts")]
    NoAccounts,
    #[error("provider error during connect: {0}")]
    Provider(PortError),
    #[error("connection manager stopped")]
    Stopped,
}

impl From<PortError> for ConnectError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Unavailable(reason) => ConnectError::NoProvider(reason),
            e if e.is_user_rejected() => ConnectError::UserRejected,
            e => ConnectError::Provider(e),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("network {0} is not supported")]
    Unsupported(ChainId),
    #[error("network switch rejected: {0}")]
    SwitchRejected(PortError),
    #[error("network registration failed: {0}")]
    RegistrationFailed(PortError),
    #[error("provider error: {0}")]
    Provider(PortError),
    #[error("connection manager stopped")]
    Stopped,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("cannot bind contract on unsupported chain {0}")]
    UnsupportedChain(ChainId),
    #[error("unknown contract method: {0}")]
    UnknownMethod(String),
    #[error("invalid interface descriptor: {0}")]
    InvalidDescriptor(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("contract handle is not bound to the live network")]
    NotBound,
    #[error("provider rejected call: {0}")]
    ProviderRejected(PortError),
    #[error("wallet is not connected")]
    NotConnected,
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("cannot decode call output: {0}")]
    Decode(String),
    #[error("connection manager stopped")]
    Stopped,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("gas estimation failed: {0}")]
    EstimationFailed(PortError),
    #[error("user rejected the transaction")]
    UserRejected,
    #[error("provider rejected transaction: {0}")]
    ProviderRejected(PortError),
    #[error("submission {tx_hash} on chain {submitted_chain} settled after switch to chain {live_chain:?}")]
    Stale {
        tx_hash: B256,
        submitted_chain: ChainId,
        live_chain: Option<ChainId>,
    },
    #[error("wallet is not connected")]
    NotConnected,
    #[error("contract handle is not bound to the live network")]
    NotBound,
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("transaction {0} reverted")]
    Reverted(B256),
    #[error("connection manager stopped")]
    Stopped,
}

impl From<AmountError> for SubmitError {
    fn from(err: AmountError) -> Self {
        SubmitError::InvalidAmount(err.to_string())
    }
}

impl From<CallError> for SubmitError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::NotBound => SubmitError::NotBound,
            CallError::ProviderRejected(e) => SubmitError::ProviderRejected(e),
            CallError::NotConnected => SubmitError::NotConnected,
            CallError::Network(e) => SubmitError::Network(e),
            CallError::Binding(e) => SubmitError::Binding(e),
            CallError::InvalidArguments(msg) | CallError::Decode(msg) => {
                SubmitError::InvalidArguments(msg)
            }
            CallError::Stopped => SubmitError::Stopped,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount must not be negative: {0}")]
    Negative(String),
    #[error("amount {amount} has more than {decimals} fractional digits")]
    TooPrecise { amount: String, decimals: u8 },
    #[error("invalid amount '{amount}': {reason}")]
    Invalid { amount: String, reason: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("illegal connection transition: {from:?} + {action:?}")]
    Connection {
        from: ConnectionStatus,
        action: ConnectionAction,
    },
    #[error("illegal pending transaction transition: {from:?} + {action:?}")]
    PendingTx {
        from: PendingTxStatus,
        action: PendingTxAction,
    },
}
