#![allow(dead_code)]

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{keccak256, Address, Bytes, U256};

use edtech_wallet_adapters::{Eip1193Adapter, WalletAdapterConfig};
use edtech_wallet_core::{ConnectionManager, TransactionSubmitter};

pub type TestManager = ConnectionManager<Eip1193Adapter>;

pub fn contract_address() -> Address {
    "0x000000000000000000000000000000000000ED7E"
        .parse()
        .expect("valid contract address")
}

pub fn account_b() -> Address {
    "0x2000000000000000000000000000000000000002"
        .parse()
        .expect("account b")
}

/// Development profile with a Sepolia deployment configured.
pub fn test_config() -> WalletAdapterConfig {
    WalletAdapterConfig {
        contract_address: Some(contract_address()),
        ..WalletAdapterConfig::default()
    }
}

/// Spawns a manager over a clone of `adapter`; the caller keeps the
/// original for fault injection and counter assertions.
pub fn spawn_manager(adapter: &Eip1193Adapter) -> TestManager {
    spawn_manager_with(adapter, &test_config())
}

pub fn spawn_manager_with(adapter: &Eip1193Adapter, config: &WalletAdapterConfig) -> TestManager {
    ConnectionManager::spawn(
        adapter.clone(),
        config.network_policy(),
        config.contract_binding().expect("contract binding"),
        TransactionSubmitter::new(config.gas_policy()),
    )
}

pub fn ether(whole: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(18u64))
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Return data for a function whose outputs are all `uint256`.
pub fn uint_output(values: &[U256]) -> Bytes {
    encode_output(values.iter().map(|v| DynSolValue::Uint(*v, 256)).collect())
}

pub fn encode_output(values: Vec<DynSolValue>) -> Bytes {
    Bytes::from(DynSolValue::Tuple(values).abi_encode_params())
}
