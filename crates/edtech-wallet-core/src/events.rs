use std::collections::HashMap;

use tracing::{debug, warn};

use crate::domain::{EventKind, HandlerId, ProviderEvent, ProviderId};
use crate::ports::{EventHandler, PortError, ProviderPort};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub provider: ProviderId,
    pub kind: EventKind,
    pub handler: HandlerId,
}

/// Handles returned by [`EventBridge::subscribe`]; required to unsubscribe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.iter()
    }
}

/// Installs one handler per event kind on a provider and forwards the
/// normalized events to a single sink.
///
/// Live subscriptions are keyed by (provider instance, event kind), so a
/// second `subscribe` for the same provider installs nothing and a second
/// `unsubscribe` removes nothing.
pub struct EventBridge {
    forward: EventHandler,
    live: HashMap<(ProviderId, EventKind), Subscription>,
}

impl EventBridge {
    pub fn new(forward: EventHandler) -> Self {
        Self {
            forward,
            live: HashMap::new(),
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn subscribe<P>(&mut self, provider: &P) -> Result<SubscriptionSet, PortError>
    where
        P: ProviderPort + ?Sized,
    {
        let provider_id = provider.instance_id();
        let mut set = SubscriptionSet::default();
        let mut installed = SubscriptionSet::default();
        for kind in EventKind::ALL {
            if let Some(existing) = self.live.get(&(provider_id, kind)) {
                set.subscriptions.push(*existing);
                continue;
            }
            let forward = self.forward.clone();
            let handler: EventHandler = std::sync::Arc::new(move |event: ProviderEvent| {
                if event.kind() == kind {
                    forward(event);
                }
            });
            let handler = match provider.subscribe(kind, handler) {
                Ok(handler) => handler,
                Err(e) => {
                    // Handlers installed by this call must not outlive it.
                    let rolled_back = self.unsubscribe(provider, &mut installed);
                    warn!(
                        provider = provider_id.0,
                        event = kind.rpc_name(),
                        rolled_back,
                        error = %e,
                        "subscribe failed"
                    );
                    return Err(e);
                }
            };
            let subscription = Subscription {
                provider: provider_id,
                kind,
                handler,
            };
            debug!(provider = provider_id.0, event = kind.rpc_name(), "subscribed");
            self.live.insert((provider_id, kind), subscription);
            installed.subscriptions.push(subscription);
            set.subscriptions.push(subscription);
        }
        Ok(set)
    }

    /// Removes every handler in `set` that is still live and empties the
    /// set. Returns the number of handlers removed.
    pub fn unsubscribe<P>(&mut self, provider: &P, set: &mut SubscriptionSet) -> usize
    where
        P: ProviderPort + ?Sized,
    {
        let mut removed = 0;
        for subscription in set.subscriptions.drain(..) {
            let key = (subscription.provider, subscription.kind);
            if self.live.get(&key) != Some(&subscription) {
                continue;
            }
            self.live.remove(&key);
            match provider.unsubscribe(subscription.kind, subscription.handler) {
                Ok(()) => {
                    removed += 1;
                    debug!(
                        provider = subscription.provider.0,
                        event = subscription.kind.rpc_name(),
                        "unsubscribed"
                    );
                }
                Err(e) => warn!(
                    provider = subscription.provider.0,
                    event = subscription.kind.rpc_name(),
                    error = %e,
                    "provider refused unsubscribe"
                ),
            }
        }
        removed
    }
}
