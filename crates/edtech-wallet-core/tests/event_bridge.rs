use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use edtech_wallet_core::domain::{HandlerId, ProviderId, ReceiptStatus, TxRequest};
use edtech_wallet_core::{
    ChainId, EventBridge, EventHandler, EventKind, NetworkSpec, PortError, ProviderEvent,
    ProviderPort,
};

/// Event-only provider; every network method is unimplemented.
#[derive(Default)]
struct EventOnlyProvider {
    id: u64,
    next_handler: AtomicU64,
    handlers: Mutex<HashMap<(EventKind, HandlerId), EventHandler>>,
    unsubscribes: AtomicU64,
    refuse: Option<EventKind>,
}

impl EventOnlyProvider {
    fn with_id(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    fn refusing(id: u64, kind: EventKind) -> Self {
        Self {
            id,
            refuse: Some(kind),
            ..Self::default()
        }
    }

    fn emit(&self, event: ProviderEvent) {
        let handlers: Vec<EventHandler> = self
            .handlers
            .lock()
            .expect("handlers lock")
            .iter()
            .filter(|((kind, _), _)| *kind == event.kind())
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(event.clone());
        }
    }

    fn handler_count(&self) -> usize {
        self.handlers.lock().expect("handlers lock").len()
    }
}

#[async_trait]
impl ProviderPort for EventOnlyProvider {
    fn instance_id(&self) -> ProviderId {
        ProviderId(self.id)
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, PortError> {
        Err(PortError::NotImplemented("request_accounts"))
    }

    async fn current_accounts(&self) -> Result<Vec<Address>, PortError> {
        Err(PortError::NotImplemented("current_accounts"))
    }

    async fn chain_id(&self) -> Result<ChainId, PortError> {
        Err(PortError::NotImplemented("chain_id"))
    }

    async fn switch_network(&self, _chain_id: ChainId) -> Result<(), PortError> {
        Err(PortError::NotImplemented("switch_network"))
    }

    async fn register_network(&self, _spec: &NetworkSpec) -> Result<(), PortError> {
        Err(PortError::NotImplemented("register_network"))
    }

    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> Result<HandlerId, PortError> {
        if self.refuse == Some(kind) {
            return Err(PortError::Transport(format!("{} refused", kind.rpc_name())));
        }
        let id = HandlerId(self.next_handler.fetch_add(1, Ordering::SeqCst));
        self.handlers
            .lock()
            .expect("handlers lock")
            .insert((kind, id), handler);
        Ok(id)
    }

    fn unsubscribe(&self, kind: EventKind, handler: HandlerId) -> Result<(), PortError> {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.handlers
            .lock()
            .expect("handlers lock")
            .remove(&(kind, handler))
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("handler {}", handler.0)))
    }

    async fn get_balance(&self, _account: Address) -> Result<U256, PortError> {
        Err(PortError::NotImplemented("get_balance"))
    }

    async fn call(&self, _request: &TxRequest) -> Result<Bytes, PortError> {
        Err(PortError::NotImplemented("call"))
    }

    async fn estimate_gas(&self, _request: &TxRequest) -> Result<u64, PortError> {
        Err(PortError::NotImplemented("estimate_gas"))
    }

    async fn send_transaction(&self, _request: &TxRequest) -> Result<B256, PortError> {
        Err(PortError::NotImplemented("send_transaction"))
    }

    async fn wait_for_receipt(&self, _tx_hash: B256) -> Result<ReceiptStatus, PortError> {
        Err(PortError::NotImplemented("wait_for_receipt"))
    }
}

fn recording_bridge() -> (EventBridge, Arc<Mutex<Vec<ProviderEvent>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let bridge = EventBridge::new(Arc::new(move |event| {
        sink.lock().expect("sink lock").push(event);
    }));
    (bridge, seen)
}

#[test]
fn forwards_each_event_exactly_once() {
    let provider = EventOnlyProvider::with_id(1);
    let (mut bridge, seen) = recording_bridge();
    let set = bridge.subscribe(&provider).expect("subscribe");
    assert_eq!(set.len(), 2);
    assert_eq!(provider.handler_count(), 2);

    provider.emit(ProviderEvent::ChainChanged(1337));
    provider.emit(ProviderEvent::AccountsChanged(Vec::new()));

    let seen = seen.lock().expect("sink lock");
    assert_eq!(
        *seen,
        vec![
            ProviderEvent::ChainChanged(1337),
            ProviderEvent::AccountsChanged(Vec::new()),
        ]
    );
}

#[test]
fn subscribe_is_idempotent_per_provider() {
    let provider = EventOnlyProvider::with_id(1);
    let (mut bridge, seen) = recording_bridge();
    let first = bridge.subscribe(&provider).expect("subscribe");
    let second = bridge.subscribe(&provider).expect("subscribe again");

    assert_eq!(first, second);
    assert_eq!(provider.handler_count(), 2);
    assert_eq!(bridge.live_count(), 2);

    provider.emit(ProviderEvent::ChainChanged(1));
    assert_eq!(seen.lock().expect("sink lock").len(), 1);
}

#[test]
fn unsubscribe_twice_removes_handlers_once() {
    let provider = EventOnlyProvider::with_id(1);
    let (mut bridge, seen) = recording_bridge();
    let mut set = bridge.subscribe(&provider).expect("subscribe");
    let mut copy = set.clone();

    assert_eq!(bridge.unsubscribe(&provider, &mut set), 2);
    assert!(set.is_empty());
    assert_eq!(bridge.unsubscribe(&provider, &mut copy), 0);
    assert_eq!(bridge.unsubscribe(&provider, &mut set), 0);
    assert_eq!(provider.unsubscribes.load(Ordering::SeqCst), 2);
    assert_eq!(provider.handler_count(), 0);
    assert_eq!(bridge.live_count(), 0);

    provider.emit(ProviderEvent::ChainChanged(1));
    assert!(seen.lock().expect("sink lock").is_empty());
}

#[test]
fn subscriptions_are_keyed_by_provider_instance() {
    let first = EventOnlyProvider::with_id(1);
    let second = EventOnlyProvider::with_id(2);
    let (mut bridge, _seen) = recording_bridge();

    let mut first_set = bridge.subscribe(&first).expect("subscribe first");
    bridge.subscribe(&second).expect("subscribe second");
    assert_eq!(bridge.live_count(), 4);

    assert_eq!(bridge.unsubscribe(&first, &mut first_set), 2);
    assert_eq!(first.handler_count(), 0);
    assert_eq!(second.handler_count(), 2);
}

#[test]
fn resubscribe_after_unsubscribe_installs_fresh_handlers() {
    let provider = EventOnlyProvider::with_id(7);
    let (mut bridge, seen) = recording_bridge();
    let mut set = bridge.subscribe(&provider).expect("subscribe");
    bridge.unsubscribe(&provider, &mut set);

    let fresh = bridge.subscribe(&provider).expect("subscribe again");
    assert_eq!(fresh.len(), 2);
    assert_eq!(provider.handler_count(), 2);

    provider.emit(ProviderEvent::AccountsChanged(Vec::new()));
    assert_eq!(seen.lock().expect("sink lock").len(), 1);
}

#[test]
fn failed_subscribe_removes_handlers_it_installed() {
    let provider = EventOnlyProvider::refusing(3, EventKind::ChainChanged);
    let (mut bridge, seen) = recording_bridge();

    let err = bridge.subscribe(&provider).expect_err("second kind refused");
    assert!(matches!(err, PortError::Transport(_)));
    assert_eq!(provider.handler_count(), 0);
    assert_eq!(provider.unsubscribes.load(Ordering::SeqCst), 1);
    assert_eq!(bridge.live_count(), 0);

    provider.emit(ProviderEvent::AccountsChanged(Vec::new()));
    provider.emit(ProviderEvent::ChainChanged(1));
    assert!(seen.lock().expect("sink lock").is_empty());
}

#[test]
fn failed_subscribe_keeps_handlers_from_earlier_calls() {
    let provider = EventOnlyProvider::with_id(4);
    let (mut bridge, _seen) = recording_bridge();
    bridge.subscribe(&provider).expect("subscribe");

    let other = EventOnlyProvider::refusing(5, EventKind::AccountsChanged);
    bridge.subscribe(&other).expect_err("first kind refused");
    assert_eq!(other.unsubscribes.load(Ordering::SeqCst), 0);
    assert_eq!(provider.handler_count(), 2);
    assert_eq!(bridge.live_count(), 2);
}
