use std::fmt::Display;
use std::str::FromStr;

use alloy::primitives::{Address, U256};
use tracing::warn;

use edtech_wallet_core::edtech::edtech_interface;
use edtech_wallet_core::network::{
    hardhat_local, sepolia, DEFAULT_DECIMALS, HARDHAT_CHAIN_ID, SEPOLIA_CHAIN_ID,
};
use edtech_wallet_core::units::to_smallest_unit;
use edtech_wallet_core::{
    AmountPolicy, BindingError, ChainId, ContractBinding, GasPolicy, NetworkPolicy,
};

/// First contract address of a fresh Hardhat node.
pub const DEFAULT_LOCAL_CONTRACT_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeProfile {
    #[default]
    Development,
    Production,
}

impl FromStr for RuntimeProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(RuntimeProfile::Development),
            "production" | "prod" => Ok(RuntimeProfile::Production),
            other => Err(format!("unknown runtime profile '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalletAdapterConfig {
    pub runtime_profile: RuntimeProfile,
    pub eip1193_proxy_url: Option<String>,
    /// Applies to proxy requests that do not wait on a wallet prompt.
    pub request_timeout_ms: u64,
    pub receipt_poll_interval_ms: u64,
    pub target_chain_id: ChainId,
    pub allowed_chain_ids: Vec<ChainId>,
    pub contract_address: Option<Address>,
    pub local_contract_address: Option<Address>,
    pub gas: GasPolicy,
    /// Smallest units.
    pub min_donation: U256,
}

impl Default for WalletAdapterConfig {
    fn default() -> Self {
        Self {
            runtime_profile: RuntimeProfile::Development,
            eip1193_proxy_url: None,
            request_timeout_ms: 15_000,
            receipt_poll_interval_ms: 1_000,
            target_chain_id: SEPOLIA_CHAIN_ID,
            allowed_chain_ids: vec![SEPOLIA_CHAIN_ID, HARDHAT_CHAIN_ID],
            contract_address: None,
            local_contract_address: DEFAULT_LOCAL_CONTRACT_ADDRESS.parse().ok(),
            gas: GasPolicy::default(),
            min_donation: AmountPolicy::default().min_donation,
        }
    }
}

impl WalletAdapterConfig {
    /// Defaults overridden by `EDTECH_*` environment variables. Invalid
    /// values are logged and ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(profile) = env_parsed("EDTECH_RUNTIME_PROFILE") {
            cfg.runtime_profile = profile;
        }
        cfg.eip1193_proxy_url = env_string("EDTECH_EIP1193_PROXY_URL");
        if let Some(ms) = env_parsed("EDTECH_REQUEST_TIMEOUT_MS") {
            cfg.request_timeout_ms = ms;
        }
        if let Some(ms) = env_parsed("EDTECH_RECEIPT_POLL_INTERVAL_MS") {
            cfg.receipt_poll_interval_ms = ms;
        }
        if let Some(chain_id) = env_parsed("EDTECH_TARGET_CHAIN_ID") {
            cfg.target_chain_id = chain_id;
        }
        if let Some(raw) = env_string("EDTECH_ALLOWED_CHAIN_IDS") {
            match parse_chain_list(&raw) {
                Ok(ids) => cfg.allowed_chain_ids = ids,
                Err(e) => warn!(key = "EDTECH_ALLOWED_CHAIN_IDS", error = %e, "ignoring invalid config value"),
            }
        }
        if let Some(address) = env_parsed("EDTECH_CONTRACT_ADDRESS") {
            cfg.contract_address = Some(address);
        }
        if let Some(address) = env_parsed("EDTECH_LOCAL_CONTRACT_ADDRESS") {
            cfg.local_contract_address = Some(address);
        }
        if let Some(raw) = env_string("EDTECH_GAS_MULTIPLIER") {
            match GasPolicy::parse(&raw) {
                Ok(gas) => cfg.gas = gas,
                Err(e) => warn!(key = "EDTECH_GAS_MULTIPLIER", error = %e, "ignoring invalid config value"),
            }
        }
        if let Some(raw) = env_string("EDTECH_MIN_DONATION") {
            match to_smallest_unit(&raw, DEFAULT_DECIMALS) {
                Ok(min) => cfg.min_donation = min,
                Err(e) => warn!(key = "EDTECH_MIN_DONATION", error = %e, "ignoring invalid config value"),
            }
        }
        cfg
    }

    /// Production refuses to fall back to the simulated wallet.
    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }

    pub fn network_policy(&self) -> NetworkPolicy {
        NetworkPolicy::new(
            vec![sepolia(), hardhat_local()],
            self.allowed_chain_ids.iter().copied(),
            self.target_chain_id,
        )
    }

    /// The built-in EdTech interface with every configured deployment.
    pub fn contract_binding(&self) -> Result<ContractBinding, BindingError> {
        let mut binding = ContractBinding::new(edtech_interface()?);
        if let Some(address) = self.contract_address {
            binding = binding.with_deployment(self.target_chain_id, address);
        }
        if let Some(address) = self.local_contract_address {
            binding = binding.with_deployment(HARDHAT_CHAIN_ID, address);
        }
        Ok(binding)
    }

    pub fn gas_policy(&self) -> GasPolicy {
        self.gas
    }

    pub fn amount_policy(&self) -> AmountPolicy {
        AmountPolicy {
            min_donation: self.min_donation,
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn env_parsed<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "ignoring invalid config value");
            None
        }
    }
}

pub fn parse_chain_list(raw: &str) -> Result<Vec<ChainId>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ChainId>()
                .map_err(|e| format!("invalid chain id '{s}': {e}"))
        })
        .collect()
}
