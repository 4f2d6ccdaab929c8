mod common;

use alloy::primitives::Address;

use edtech_wallet_adapters::config::{parse_chain_list, DEFAULT_LOCAL_CONTRACT_ADDRESS};
use edtech_wallet_adapters::{RuntimeProfile, WalletAdapterConfig};
use edtech_wallet_core::network::{HARDHAT_CHAIN_ID, MAINNET_CHAIN_ID, SEPOLIA_CHAIN_ID};
use edtech_wallet_core::GasPolicy;

use common::{contract_address, test_config};

#[test]
fn defaults_target_sepolia_with_local_fallback() {
    let config = WalletAdapterConfig::default();
    assert_eq!(config.runtime_profile, RuntimeProfile::Development);
    assert!(!config.strict_runtime_required());
    assert_eq!(config.target_chain_id, SEPOLIA_CHAIN_ID);
    assert_eq!(config.gas_policy(), GasPolicy::default());
    assert_eq!(config.amount_policy().min_donation, alloy::primitives::U256::from(1u64));

    let policy = config.network_policy();
    assert!(policy.is_supported(SEPOLIA_CHAIN_ID));
    assert!(policy.is_supported(HARDHAT_CHAIN_ID));
    assert!(!policy.is_supported(MAINNET_CHAIN_ID));
    assert_eq!(policy.network_name(MAINNET_CHAIN_ID), "Ethereum Mainnet");
    assert_eq!(
        policy.explorer_url(SEPOLIA_CHAIN_ID),
        Some("https://sepolia.etherscan.io")
    );

    let binding = config.contract_binding().expect("binding");
    assert_eq!(binding.address_for(SEPOLIA_CHAIN_ID), None);
    let local: Address = DEFAULT_LOCAL_CONTRACT_ADDRESS.parse().expect("local address");
    assert_eq!(binding.address_for(HARDHAT_CHAIN_ID), Some(local));
}

#[test]
fn configured_contract_binds_on_the_target_chain() {
    let binding = test_config().contract_binding().expect("binding");
    assert_eq!(binding.address_for(SEPOLIA_CHAIN_ID), Some(contract_address()));
    binding
        .interface()
        .function("purchaseCourse")
        .expect("purchaseCourse");
}

#[test]
fn allow_list_restricts_supported_networks() {
    let config = WalletAdapterConfig {
        allowed_chain_ids: vec![SEPOLIA_CHAIN_ID, 424_242],
        ..WalletAdapterConfig::default()
    };
    let policy = config.network_policy();
    assert!(policy.is_supported(SEPOLIA_CHAIN_ID));
    assert!(!policy.is_supported(HARDHAT_CHAIN_ID));
    // No registry metadata for 424242, so it can never be supported.
    assert!(!policy.is_supported(424_242));
}

#[test]
fn chain_lists_and_profiles_parse() {
    assert_eq!(
        parse_chain_list(" 11155111, 1337 ,").expect("list"),
        vec![SEPOLIA_CHAIN_ID, HARDHAT_CHAIN_ID]
    );
    assert!(parse_chain_list("11155111,sepolia").is_err());

    assert_eq!(
        "PROD".parse::<RuntimeProfile>().expect("profile"),
        RuntimeProfile::Production
    );
    assert_eq!(
        "development".parse::<RuntimeProfile>().expect("profile"),
        RuntimeProfile::Development
    );
    assert!("staging".parse::<RuntimeProfile>().is_err());
}
