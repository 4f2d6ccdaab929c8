//! The connection manager: a single cooperative actor that owns the
//! connection state.
//!
//! Caller requests and provider notifications travel through one channel
//! and are handled strictly one at a time, in arrival order. Waiting for a
//! transaction receipt is the only long operation that happens outside the
//! actor; its outcome is sent back in as a settlement message.

use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, U256};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::binding::{ContractBinding, ContractHandle};
use crate::domain::{
    ChainId, ConnectionState, ConnectionStatus, PendingSubmission, ProviderEvent, Receipt,
    ReceiptStatus,
};
use crate::error::{BindingError, CallError, ConnectError, NetworkError, SubmitError};
use crate::events::{EventBridge, SubscriptionSet};
use crate::network::NetworkPolicy;
use crate::ports::{EventHandler, PortError, ProviderPort};
use crate::state_machine::{connection_transition, ConnectionAction, PendingTxAction};
use crate::submitter::{advance, LiveBinding, TransactionSubmitter};

type Reply<T> = oneshot::Sender<T>;

enum Message {
    Connect(Reply<Result<ConnectionState, ConnectError>>),
    Restore(Reply<Result<ConnectionState, ConnectError>>),
    Disconnect(Reply<()>),
    State(Reply<ConnectionState>),
    ContractHandle(Reply<Result<ContractHandle, CallError>>),
    LastReceipt(Reply<Option<Receipt>>),
    SwitchNetwork {
        chain_id: ChainId,
        reply: Reply<Result<ConnectionState, NetworkError>>,
    },
    Call {
        handle: Option<ContractHandle>,
        method: String,
        args: Vec<Value>,
        reply: Reply<Result<Vec<DynSolValue>, CallError>>,
    },
    Submit {
        handle: Option<ContractHandle>,
        method: String,
        args: Vec<Value>,
        value: U256,
        reply: Reply<Result<PendingSubmission, SubmitError>>,
    },
    Transfer {
        to: Address,
        value: U256,
        reply: Reply<Result<PendingSubmission, SubmitError>>,
    },
    Settle {
        submission: PendingSubmission,
        outcome: Result<ReceiptStatus, PortError>,
        reply: Reply<Result<Receipt, SubmitError>>,
    },
    Notify(ProviderEvent),
}

/// Cloneable handle to the manager actor.
///
/// The actor stops once every handle is dropped; requests made after that
/// fail with a `Stopped` error.
pub struct ConnectionManager<P> {
    tx: mpsc::UnboundedSender<Message>,
    provider: Arc<P>,
    policy: Arc<NetworkPolicy>,
}

impl<P> Clone for ConnectionManager<P> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            provider: Arc::clone(&self.provider),
            policy: Arc::clone(&self.policy),
        }
    }
}

impl<P> ConnectionManager<P>
where
    P: ProviderPort + 'static,
{
    /// Starts the actor on the current tokio runtime.
    pub fn spawn(
        provider: P,
        policy: NetworkPolicy,
        binding: ContractBinding,
        submitter: TransactionSubmitter,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let provider = Arc::new(provider);
        let policy = Arc::new(policy);

        let weak = tx.downgrade();
        let forward: EventHandler = Arc::new(move |event: ProviderEvent| {
            if let Some(tx) = weak.upgrade() {
                let _ = tx.send(Message::Notify(event));
            }
        });

        let session = Session {
            provider: Arc::clone(&provider),
            policy: Arc::clone(&policy),
            binding,
            submitter,
            bridge: EventBridge::new(forward),
            subscriptions: SubscriptionSet::default(),
            state: ConnectionState::default(),
            contract: None,
            generation: 0,
            last_receipt: None,
        };
        tokio::spawn(session.run(rx));

        Self {
            tx,
            provider,
            policy,
        }
    }

    pub fn policy(&self) -> &NetworkPolicy {
        &self.policy
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Message) -> Option<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).ok()?;
        rx.await.ok()
    }

    pub async fn connect(&self) -> Result<ConnectionState, ConnectError> {
        self.request(Message::Connect)
            .await
            .unwrap_or(Err(ConnectError::Stopped))
    }

    /// Reconnects without prompting when the wallet already exposes an
    /// authorized account; otherwise stays disconnected.
    pub async fn restore(&self) -> Result<ConnectionState, ConnectError> {
        self.request(Message::Restore)
            .await
            .unwrap_or(Err(ConnectError::Stopped))
    }

    pub async fn disconnect(&self) {
        let _ = self.request(Message::Disconnect).await;
    }

    pub async fn current_state(&self) -> ConnectionState {
        self.request(Message::State).await.unwrap_or_default()
    }

    pub async fn switch_network(&self, chain_id: ChainId) -> Result<ConnectionState, NetworkError> {
        self.request(|reply| Message::SwitchNetwork { chain_id, reply })
            .await
            .unwrap_or(Err(NetworkError::Stopped))
    }

    /// The handle bound to the live chain, for callers that hold on to it.
    pub async fn contract_handle(&self) -> Result<ContractHandle, CallError> {
        self.request(Message::ContractHandle)
            .await
            .unwrap_or(Err(CallError::Stopped))
    }

    pub async fn last_receipt(&self) -> Option<Receipt> {
        self.request(Message::LastReceipt).await.flatten()
    }

    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Vec<DynSolValue>, CallError> {
        self.call_inner(None, method, args).await
    }

    pub async fn call_with(
        &self,
        handle: &ContractHandle,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<DynSolValue>, CallError> {
        self.call_inner(Some(handle.clone()), method, args).await
    }

    async fn call_inner(
        &self,
        handle: Option<ContractHandle>,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<DynSolValue>, CallError> {
        let method = method.to_owned();
        self.request(|reply| Message::Call {
            handle,
            method,
            args,
            reply,
        })
        .await
        .unwrap_or(Err(CallError::Stopped))
    }

    /// Broadcasts a state-mutating call and returns without waiting for
    /// confirmation. Pass the result to [`ConnectionManager::confirm`].
    pub async fn submit(
        &self,
        method: &str,
        args: Vec<Value>,
        value: U256,
    ) -> Result<PendingSubmission, SubmitError> {
        self.submit_inner(None, method, args, value).await
    }

    pub async fn submit_with(
        &self,
        handle: &ContractHandle,
        method: &str,
        args: Vec<Value>,
        value: U256,
    ) -> Result<PendingSubmission, SubmitError> {
        self.submit_inner(Some(handle.clone()), method, args, value)
            .await
    }

    async fn submit_inner(
        &self,
        handle: Option<ContractHandle>,
        method: &str,
        args: Vec<Value>,
        value: U256,
    ) -> Result<PendingSubmission, SubmitError> {
        let method = method.to_owned();
        self.request(|reply| Message::Submit {
            handle,
            method,
            args,
            value,
            reply,
        })
        .await
        .unwrap_or(Err(SubmitError::Stopped))
    }

    /// Sends native currency from the connected account to `to`.
    pub async fn transfer(&self, to: Address, value: U256) -> Result<PendingSubmission, SubmitError> {
        self.request(|reply| Message::Transfer { to, value, reply })
            .await
            .unwrap_or(Err(SubmitError::Stopped))
    }

    /// Waits for the receipt on the caller's task, then settles it against
    /// the live session. No timeout is applied; dropping the future
    /// abandons the wait but not the transaction.
    pub async fn confirm(&self, submission: PendingSubmission) -> Result<Receipt, SubmitError> {
        let outcome = self.provider.wait_for_receipt(submission.tx_hash).await;
        self.request(|reply| Message::Settle {
            submission,
            outcome,
            reply,
        })
        .await
        .unwrap_or(Err(SubmitError::Stopped))
    }

    pub async fn submit_and_confirm(
        &self,
        method: &str,
        args: Vec<Value>,
        value: U256,
    ) -> Result<Receipt, SubmitError> {
        let pending = self.submit(method, args, value).await?;
        self.confirm(pending).await
    }
}

struct Session<P> {
    provider: Arc<P>,
    policy: Arc<NetworkPolicy>,
    binding: ContractBinding,
    submitter: TransactionSubmitter,
    bridge: EventBridge,
    subscriptions: SubscriptionSet,
    state: ConnectionState,
    contract: Option<ContractHandle>,
    /// Bumped on every invalidation; handles from older generations are stale.
    generation: u64,
    last_receipt: Option<Receipt>,
}

impl<P> Session<P>
where
    P: ProviderPort + 'static,
{
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = rx.recv().await {
            self.handle(message).await;
        }
        self.bridge
            .unsubscribe(&*self.provider, &mut self.subscriptions);
        debug!("connection manager stopped");
    }

    async fn handle(&mut self, message: Message) {
        match message {
            Message::Connect(reply) => {
                let _ = reply.send(self.connect().await);
            }
            Message::Restore(reply) => {
                let _ = reply.send(self.restore().await);
            }
            Message::Disconnect(reply) => {
                self.disconnect();
                let _ = reply.send(());
            }
            Message::State(reply) => {
                let _ = reply.send(self.state.clone());
            }
            Message::ContractHandle(reply) => {
                let _ = reply.send(self.current_handle());
            }
            Message::LastReceipt(reply) => {
                let _ = reply.send(self.last_receipt.clone());
            }
            Message::SwitchNetwork { chain_id, reply } => {
                let _ = reply.send(self.switch_network(chain_id).await);
            }
            Message::Call {
                handle,
                method,
                args,
                reply,
            } => {
                let _ = reply.send(self.call(handle, &method, &args).await);
            }
            Message::Submit {
                handle,
                method,
                args,
                value,
                reply,
            } => {
                let _ = reply.send(self.submit(handle, &method, &args, value).await);
            }
            Message::Transfer { to, value, reply } => {
                let _ = reply.send(self.transfer(to, value).await);
            }
            Message::Settle {
                submission,
                outcome,
                reply,
            } => {
                let _ = reply.send(self.settle(submission, outcome).await);
            }
            Message::Notify(ProviderEvent::AccountsChanged(accounts)) => {
                self.on_accounts_changed(accounts).await;
            }
            Message::Notify(ProviderEvent::ChainChanged(chain_id)) => {
                self.on_chain_changed(chain_id).await;
            }
        }
    }

    fn transition(&mut self, action: ConnectionAction) {
        match connection_transition(self.state.status, action) {
            Ok((to, transition)) => {
                debug!(
                    from = ?transition.from,
                    to = ?transition.to,
                    reason = transition.reason,
                    "connection transition"
                );
                self.state.status = to;
            }
            Err(e) => warn!(error = %e, "rejected connection transition"),
        }
    }

    fn live(&self) -> LiveBinding {
        LiveBinding {
            chain_id: self.state.chain_id,
            generation: self.generation,
            account: self.state.account,
        }
    }

    async fn connect(&mut self) -> Result<ConnectionState, ConnectError> {
        if self.state.status.is_connected_family() {
            return Ok(self.state.clone());
        }
        self.transition(ConnectionAction::BeginConnect);
        match self.establish().await {
            Ok(()) => {
                self.transition(ConnectionAction::ConnectSucceeded);
                info!(
                    account = %self.state.short_account(),
                    chain_id = ?self.state.chain_id,
                    supported = self.state.network_supported,
                    "wallet connected"
                );
                Ok(self.state.clone())
            }
            Err(e) => {
                warn!(error = %e, "wallet connect failed");
                self.clear();
                self.transition(ConnectionAction::ConnectFailed);
                Err(e)
            }
        }
    }

    async fn establish(&mut self) -> Result<(), ConnectError> {
        let accounts = self.provider.request_accounts().await?;
        let account = accounts.first().copied().ok_or(ConnectError::NoAccounts)?;
        let chain_id = self.provider.chain_id().await?;
        self.state.account = Some(account);
        self.rebind(chain_id);
        self.subscriptions = self.bridge.subscribe(&*self.provider)?;
        self.refresh_balance().await;
        Ok(())
    }

    async fn restore(&mut self) -> Result<ConnectionState, ConnectError> {
        if self.state.status.is_connected_family() {
            return Ok(self.state.clone());
        }
        let accounts = self.provider.current_accounts().await?;
        if accounts.is_empty() {
            debug!("no authorized accounts to restore");
            return Ok(self.state.clone());
        }
        self.connect().await
    }

    /// Unsubscribes and clears all cached state. A no-op when already
    /// disconnected with nothing subscribed.
    fn disconnect(&mut self) {
        if self.state.status == ConnectionStatus::Disconnected && self.subscriptions.is_empty() {
            debug!("disconnect ignored: already disconnected");
            return;
        }
        self.clear();
        self.transition(ConnectionAction::Disconnect);
        info!("wallet disconnected");
    }

    fn clear(&mut self) {
        let removed = self
            .bridge
            .unsubscribe(&*self.provider, &mut self.subscriptions);
        if removed > 0 {
            debug!(removed, "event handlers removed");
        }
        self.generation += 1;
        self.contract = None;
        let status = self.state.status;
        self.state = ConnectionState {
            status,
            ..ConnectionState::default()
        };
    }

    /// Drops the current handle and binds a fresh one for `chain_id` when
    /// the chain is supported.
    fn rebind(&mut self, chain_id: ChainId) {
        self.generation += 1;
        self.contract = None;
        self.state.chain_id = Some(chain_id);
        self.state.network_supported = self.policy.is_supported(chain_id);
        if !self.state.network_supported {
            info!(chain_id, "connected to unsupported network");
            return;
        }
        match self.binding.bind(&self.policy, chain_id, self.generation) {
            Ok(handle) => self.contract = Some(handle),
            Err(e) => warn!(chain_id, error = %e, "contract not bound"),
        }
    }

    /// Best effort: a failed query keeps the previous cached value.
    async fn refresh_balance(&mut self) {
        let Some(account) = self.state.account else {
            return;
        };
        match self.provider.get_balance(account).await {
            Ok(balance) => {
                debug!(%account, %balance, "balance refreshed");
                self.state.balance = balance;
            }
            Err(e) => warn!(%account, error = %e, "balance refresh failed, keeping cached value"),
        }
    }

    async fn on_accounts_changed(&mut self, accounts: Vec<Address>) {
        if !self.state.status.is_connected_family() {
            debug!("accountsChanged ignored while disconnected");
            return;
        }
        let Some(account) = accounts.first().copied() else {
            info!("wallet reported no accounts");
            self.disconnect();
            return;
        };
        if self.state.account == Some(account) {
            return;
        }
        info!(%account, "active account changed");
        self.state.account = Some(account);
        self.refresh_balance().await;
    }

    async fn on_chain_changed(&mut self, chain_id: ChainId) {
        if !self.state.status.is_connected_family() {
            debug!(chain_id, "chainChanged ignored while disconnected");
            return;
        }
        if self.state.chain_id == Some(chain_id) {
            return;
        }
        info!(from = ?self.state.chain_id, to = chain_id, "network changed");
        self.transition(ConnectionAction::ChainChanged);
        self.rebind(chain_id);
        self.refresh_balance().await;
        self.transition(ConnectionAction::Rebound);
    }

    async fn switch_network(&mut self, target: ChainId) -> Result<ConnectionState, NetworkError> {
        let outcome = self.policy.switch_to(&*self.provider, target).await?;
        debug!(chain_id = target, ?outcome, "network switch completed");
        if !self.state.status.is_connected_family() {
            return Ok(self.state.clone());
        }
        let live = self
            .provider
            .chain_id()
            .await
            .map_err(NetworkError::Provider)?;
        if self.state.chain_id == Some(live) {
            // No chainChanged follows a same-chain switch.
            self.rebind(live);
            self.refresh_balance().await;
        } else {
            self.on_chain_changed(live).await;
        }
        Ok(self.state.clone())
    }

    fn current_handle(&self) -> Result<ContractHandle, CallError> {
        if !self.state.status.is_connected_family() {
            return Err(CallError::NotConnected);
        }
        let chain_id = self.state.chain_id.ok_or(CallError::NotConnected)?;
        if !self.state.network_supported {
            return Err(NetworkError::Unsupported(chain_id).into());
        }
        self.contract
            .clone()
            .ok_or_else(|| BindingError::UnsupportedChain(chain_id).into())
    }

    async fn call(
        &mut self,
        handle: Option<ContractHandle>,
        method: &str,
        args: &[Value],
    ) -> Result<Vec<DynSolValue>, CallError> {
        let handle = match handle {
            Some(handle) => handle,
            None => self.current_handle()?,
        };
        self.submitter
            .call(&*self.provider, &handle, self.live(), method, args)
            .await
    }

    async fn submit(
        &mut self,
        handle: Option<ContractHandle>,
        method: &str,
        args: &[Value],
        value: U256,
    ) -> Result<PendingSubmission, SubmitError> {
        if self.state.status != ConnectionStatus::Connected {
            return Err(SubmitError::NotConnected);
        }
        let handle = match handle {
            Some(handle) => handle,
            None => self.current_handle()?,
        };
        self.submitter
            .submit(&*self.provider, &handle, self.live(), method, args, value)
            .await
    }

    async fn transfer(&mut self, to: Address, value: U256) -> Result<PendingSubmission, SubmitError> {
        if self.state.status != ConnectionStatus::Connected {
            return Err(SubmitError::NotConnected);
        }
        let chain_id = self.state.chain_id.ok_or(SubmitError::NotConnected)?;
        if !self.state.network_supported {
            return Err(NetworkError::Unsupported(chain_id).into());
        }
        self.submitter
            .transfer(&*self.provider, self.live(), to, value)
            .await
    }

    async fn settle(
        &mut self,
        submission: PendingSubmission,
        outcome: Result<ReceiptStatus, PortError>,
    ) -> Result<Receipt, SubmitError> {
        let status = outcome.map_err(SubmitError::ProviderRejected)?;
        if self.state.chain_id != Some(submission.chain_id) {
            warn!(
                tx_hash = %submission.tx_hash,
                submitted_chain = submission.chain_id,
                live_chain = ?self.state.chain_id,
                "submission settled after network change; balance left untouched"
            );
            return Err(SubmitError::Stale {
                tx_hash: submission.tx_hash,
                submitted_chain: submission.chain_id,
                live_chain: self.state.chain_id,
            });
        }

        self.refresh_balance().await;

        let mut tx = submission.transaction;
        let action = if status.success {
            PendingTxAction::Confirm
        } else {
            PendingTxAction::Fail
        };
        advance(&mut tx, action);
        let receipt = Receipt {
            tx_hash: submission.tx_hash,
            chain_id: submission.chain_id,
            from: submission.from,
            to: submission.to,
            method: tx.method,
            value: tx.value,
            gas_limit: tx.gas_limit.unwrap_or_default(),
            gas_used: status.gas_used,
            block_number: status.block_number,
            success: status.success,
        };
        self.last_receipt = Some(receipt.clone());
        if !status.success {
            warn!(tx_hash = %receipt.tx_hash, method = %receipt.method, "transaction reverted");
            return Err(SubmitError::Reverted(receipt.tx_hash));
        }
        info!(
            tx_hash = %receipt.tx_hash,
            method = %receipt.method,
            block = ?receipt.block_number,
            "transaction confirmed"
        );
        Ok(receipt)
    }
}
