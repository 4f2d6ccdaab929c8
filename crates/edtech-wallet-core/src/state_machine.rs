use serde::{Deserialize, Serialize};

use crate::domain::{ConnectionStatus, PendingTxStatus};
use crate::error::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionAction {
    BeginConnect,
    ConnectSucceeded,
    ConnectFailed,
    ChainChanged,
    Rebound,
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition<S> {
    pub from: S,
    pub to: S,
    pub reason: &'static str,
}

pub fn connection_transition(
    from: ConnectionStatus,
    action: ConnectionAction,
) -> Result<(ConnectionStatus, StateTransition<ConnectionStatus>), TransitionError> {
    use ConnectionAction as A;
    use ConnectionStatus as S;

    let (to, reason) = match (from, action) {
        (S::Disconnected, A::BeginConnect) => (S::Connecting, "connect requested"),
        (S::Connecting, A::ConnectSucceeded) => (S::Connected, "account access granted"),
        (S::Connecting, A::ConnectFailed) => (S::Disconnected, "connect failed"),
        (S::Connected, A::ChainChanged) => (S::Reconnecting, "provider switched network"),
        (S::Reconnecting, A::Rebound) => (S::Connected, "network re-evaluated"),
        (_, A::Disconnect) => (S::Disconnected, "disconnected"),
        _ => return Err(TransitionError::Connection { from, action }),
    };
    Ok((
        to,
        StateTransition {
            from,
            to,
            reason,
        },
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingTxAction {
    Estimate,
    RequestSignature,
    Broadcast,
    Confirm,
    Fail,
}

/// Lifecycle of one in-flight call.
pub fn pending_tx_transition(
    from: PendingTxStatus,
    action: PendingTxAction,
) -> Result<(PendingTxStatus, StateTransition<PendingTxStatus>), TransitionError> {
    use PendingTxAction as A;
    use PendingTxStatus as S;

    let (to, reason) = match (from, action) {
        (S::Building, A::Estimate) => (S::Estimating, "estimating gas"),
        (S::Estimating, A::RequestSignature) => (S::AwaitingSignature, "awaiting wallet signature"),
        (S::AwaitingSignature, A::Broadcast) => (S::Submitted, "broadcast accepted"),
        (S::Submitted, A::Confirm) => (S::Confirmed, "receipt succeeded"),
        (S::Building | S::Estimating | S::AwaitingSignature | S::Submitted, A::Fail) => {
            (S::Failed, "failed")
        }
        _ => return Err(TransitionError::PendingTx { from, action }),
    };
    Ok((
        to,
        StateTransition {
            from,
            to,
            reason,
        },
    ))
}
