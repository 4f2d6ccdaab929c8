use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::domain::{ChainId, NetworkSpec};
use crate::error::NetworkError;
use crate::ports::ProviderPort;

pub const SEPOLIA_CHAIN_ID: ChainId = 11_155_111;
pub const HARDHAT_CHAIN_ID: ChainId = 1_337;
pub const MAINNET_CHAIN_ID: ChainId = 1;

/// Decimals assumed for a chain missing from the registry.
pub const DEFAULT_DECIMALS: u8 = 18;

pub fn sepolia() -> NetworkSpec {
    NetworkSpec {
        chain_id: SEPOLIA_CHAIN_ID,
        display_name: "Sepolia Test Network".to_owned(),
        native_currency_name: "Sepolia ETH".to_owned(),
        native_currency_symbol: "SEP".to_owned(),
        decimals: 18,
        rpc_urls: vec!["https://rpc.sepolia.org".to_owned()],
        explorer_url: Some("https://sepolia.etherscan.io".to_owned()),
    }
}

pub fn hardhat_local() -> NetworkSpec {
    NetworkSpec {
        chain_id: HARDHAT_CHAIN_ID,
        display_name: "Hardhat Local".to_owned(),
        native_currency_name: "ETH".to_owned(),
        native_currency_symbol: "ETH".to_owned(),
        decimals: 18,
        rpc_urls: vec!["http://localhost:8545".to_owned()],
        explorer_url: None,
    }
}

/// How a successful switch was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    Switched,
    RegisteredAndSwitched,
}

/// Fixed network registry plus the deployment's allow-list.
#[derive(Debug, Clone)]
pub struct NetworkPolicy {
    registry: BTreeMap<ChainId, NetworkSpec>,
    allowed: BTreeSet<ChainId>,
    target: ChainId,
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self::new(
            vec![sepolia(), hardhat_local()],
            [SEPOLIA_CHAIN_ID, HARDHAT_CHAIN_ID],
            SEPOLIA_CHAIN_ID,
        )
    }
}

impl NetworkPolicy {
    /// Chains in `allowed` that are missing from `registry` are ignored:
    /// a network without metadata can never be registered with a wallet.
    pub fn new(
        registry: Vec<NetworkSpec>,
        allowed: impl IntoIterator<Item = ChainId>,
        target: ChainId,
    ) -> Self {
        let registry: BTreeMap<_, _> = registry.into_iter().map(|s| (s.chain_id, s)).collect();
        let allowed = allowed
            .into_iter()
            .filter(|id| registry.contains_key(id))
            .collect();
        Self {
            registry,
            allowed,
            target,
        }
    }

    pub fn is_supported(&self, chain_id: ChainId) -> bool {
        self.allowed.contains(&chain_id)
    }

    pub fn spec(&self, chain_id: ChainId) -> Option<&NetworkSpec> {
        self.registry.get(&chain_id)
    }

    pub fn target_chain(&self) -> ChainId {
        self.target
    }

    pub fn supported_chains(&self) -> impl Iterator<Item = ChainId> + '_ {
        self.allowed.iter().copied()
    }

    pub fn decimals_for(&self, chain_id: ChainId) -> u8 {
        self.spec(chain_id)
            .map(|s| s.decimals)
            .unwrap_or(DEFAULT_DECIMALS)
    }

    pub fn network_name(&self, chain_id: ChainId) -> String {
        match self.spec(chain_id) {
            Some(spec) => spec.display_name.clone(),
            None if chain_id == MAINNET_CHAIN_ID => "Ethereum Mainnet".to_owned(),
            None => format!("Network {chain_id}"),
        }
    }

    pub fn explorer_url(&self, chain_id: ChainId) -> Option<&str> {
        self.spec(chain_id).and_then(|s| s.explorer_url.as_deref())
    }

    /// Asks the provider to switch to `target`.
    ///
    /// A "chain unknown" answer triggers one registration of the matching
    /// spec followed by one more switch attempt. Nothing else is retried.
    pub async fn switch_to<P>(
        &self,
        provider: &P,
        target: ChainId,
    ) -> Result<SwitchOutcome, NetworkError>
    where
        P: ProviderPort + ?Sized,
    {
        if !self.is_supported(target) {
            return Err(NetworkError::Unsupported(target));
        }
        let spec = self
            .spec(target)
            .ok_or(NetworkError::Unsupported(target))?;

        match provider.switch_network(target).await {
            Ok(()) => {
                debug!(chain_id = target, "network switch accepted");
                Ok(SwitchOutcome::Switched)
            }
            Err(e) if e.is_unknown_chain() => {
                info!(chain_id = target, "wallet does not know network, registering");
                provider
                    .register_network(spec)
                    .await
                    .map_err(NetworkError::RegistrationFailed)?;
                provider.switch_network(target).await.map_err(|e| {
                    warn!(chain_id = target, error = %e, "switch failed after registration");
                    NetworkError::SwitchRejected(e)
                })?;
                Ok(SwitchOutcome::RegisteredAndSwitched)
            }
            Err(e) => Err(NetworkError::SwitchRejected(e)),
        }
    }
}
