use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes, U256};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::binding::ContractHandle;
use crate::domain::{ChainId, PendingSubmission, PendingTransaction, PendingTxStatus, TxRequest};
use crate::error::{AmountError, CallError, SubmitError};
use crate::ports::ProviderPort;
use crate::state_machine::{pending_tx_transition, PendingTxAction};
use crate::units::to_smallest_unit;

const BPS_DENOMINATOR: u128 = 10_000;

/// Method label recorded for plain value transfers.
pub const TRANSFER_LABEL: &str = "transfer";

/// Safety margin applied to gas estimates, in basis points (`11_000` = 1.10x).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPolicy {
    pub multiplier_bps: u64,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            multiplier_bps: 11_000,
        }
    }
}

impl GasPolicy {
    /// Parses a decimal multiplier such as `"1.10"` exactly.
    pub fn parse(multiplier: &str) -> Result<Self, AmountError> {
        let bps = to_smallest_unit(multiplier, 4)?;
        let invalid = |reason: &str| AmountError::Invalid {
            amount: multiplier.to_owned(),
            reason: reason.to_owned(),
        };
        let bps = u64::try_from(bps).map_err(|_| invalid("multiplier too large"))?;
        if u128::from(bps) < BPS_DENOMINATOR {
            return Err(invalid("multiplier must be at least 1.0"));
        }
        Ok(Self {
            multiplier_bps: bps,
        })
    }

    /// `ceil(estimate * multiplier)`.
    pub fn apply(&self, estimate: u64) -> u64 {
        let scaled = u128::from(estimate) * u128::from(self.multiplier_bps);
        let limit = scaled.div_ceil(BPS_DENOMINATOR);
        u64::try_from(limit).unwrap_or(u64::MAX)
    }
}

/// Live session values a handle is checked against before every use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveBinding {
    pub chain_id: Option<ChainId>,
    pub generation: u64,
    pub account: Option<Address>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionSubmitter {
    pub gas: GasPolicy,
}

impl TransactionSubmitter {
    pub fn new(gas: GasPolicy) -> Self {
        Self { gas }
    }

    /// Read-only invocation: no estimation and no signature prompt.
    pub async fn call<P>(
        &self,
        provider: &P,
        handle: &ContractHandle,
        live: LiveBinding,
        method: &str,
        args: &[Value],
    ) -> Result<Vec<DynSolValue>, CallError>
    where
        P: ProviderPort + ?Sized,
    {
        handle.ensure_bound(live.chain_id, live.generation)?;
        let method = handle.method_handle(method)?;
        let request = TxRequest {
            chain_id: handle.bound_chain_id(),
            from: live.account,
            to: handle.address(),
            data: method.encode(args)?,
            value: U256::ZERO,
            gas: None,
        };
        let output = provider
            .call(&request)
            .await
            .map_err(CallError::ProviderRejected)?;
        debug!(method = method.name(), bytes = output.len(), "contract call returned");
        method.decode(&output)
    }

    /// Builds, estimates and broadcasts a state-mutating call.
    ///
    /// Returns as soon as the provider accepts the broadcast; the returned
    /// submission records the chain and account it was made with.
    pub async fn submit<P>(
        &self,
        provider: &P,
        handle: &ContractHandle,
        live: LiveBinding,
        method: &str,
        args: &[Value],
        value: U256,
    ) -> Result<PendingSubmission, SubmitError>
    where
        P: ProviderPort + ?Sized,
    {
        handle.ensure_bound(live.chain_id, live.generation)?;
        let from = live.account.ok_or(SubmitError::NotConnected)?;
        let method = handle.method_handle(method)?;
        if method.is_read_only() {
            return Err(SubmitError::InvalidArguments(format!(
                "{} is read-only; use call",
                method.name()
            )));
        }
        if !method.is_payable() && !value.is_zero() {
            return Err(SubmitError::InvalidAmount(format!(
                "{} is not payable but value {value} was attached",
                method.name()
            )));
        }

        let tx = PendingTransaction {
            method: method.name().to_owned(),
            args: args.to_vec(),
            value,
            estimated_gas: None,
            gas_limit: None,
            status: PendingTxStatus::Building,
        };
        let request = TxRequest {
            chain_id: handle.bound_chain_id(),
            from: Some(from),
            to: handle.address(),
            data: method.encode(args)?,
            value,
            gas: None,
        };
        self.broadcast(provider, tx, request).await
    }

    /// Sends native currency to `to` with empty calldata.
    pub async fn transfer<P>(
        &self,
        provider: &P,
        live: LiveBinding,
        to: Address,
        value: U256,
    ) -> Result<PendingSubmission, SubmitError>
    where
        P: ProviderPort + ?Sized,
    {
        let from = live.account.ok_or(SubmitError::NotConnected)?;
        let chain_id = live.chain_id.ok_or(SubmitError::NotConnected)?;
        if value.is_zero() {
            return Err(SubmitError::InvalidAmount(
                "transfer value must be greater than zero".to_owned(),
            ));
        }
        let tx = PendingTransaction {
            method: TRANSFER_LABEL.to_owned(),
            args: Vec::new(),
            value,
            estimated_gas: None,
            gas_limit: None,
            status: PendingTxStatus::Building,
        };
        let request = TxRequest {
            chain_id,
            from: Some(from),
            to,
            data: Bytes::new(),
            value,
            gas: None,
        };
        self.broadcast(provider, tx, request).await
    }

    async fn broadcast<P>(
        &self,
        provider: &P,
        mut tx: PendingTransaction,
        mut request: TxRequest,
    ) -> Result<PendingSubmission, SubmitError>
    where
        P: ProviderPort + ?Sized,
    {
        let from = request.from.ok_or(SubmitError::NotConnected)?;

        advance(&mut tx, PendingTxAction::Estimate);
        let estimate = match provider.estimate_gas(&request).await {
            Ok(estimate) => estimate,
            Err(e) => {
                advance(&mut tx, PendingTxAction::Fail);
                return Err(SubmitError::EstimationFailed(e));
            }
        };
        let gas_limit = self.gas.apply(estimate);
        tx.estimated_gas = Some(estimate);
        tx.gas_limit = Some(gas_limit);
        request.gas = Some(gas_limit);
        debug!(method = %tx.method, estimate, gas_limit, "gas estimated");

        advance(&mut tx, PendingTxAction::RequestSignature);
        let tx_hash = match provider.send_transaction(&request).await {
            Ok(hash) => hash,
            Err(e) => {
                advance(&mut tx, PendingTxAction::Fail);
                if e.is_user_rejected() {
                    info!(method = %tx.method, "user rejected transaction");
                    return Err(SubmitError::UserRejected);
                }
                return Err(SubmitError::ProviderRejected(e));
            }
        };
        advance(&mut tx, PendingTxAction::Broadcast);
        info!(method = %tx.method, %tx_hash, chain_id = request.chain_id, "transaction broadcast");

        Ok(PendingSubmission {
            tx_hash,
            chain_id: request.chain_id,
            from,
            to: request.to,
            transaction: tx,
        })
    }
}

pub(crate) fn advance(tx: &mut PendingTransaction, action: PendingTxAction) {
    match pending_tx_transition(tx.status, action) {
        Ok((to, transition)) => {
            debug!(
                method = %tx.method,
                from = ?transition.from,
                to = ?transition.to,
                reason = transition.reason,
                "pending transaction transition"
            );
            tx.status = to;
        }
        Err(e) => warn!(method = %tx.method, error = %e, "rejected pending transaction transition"),
    }
}
