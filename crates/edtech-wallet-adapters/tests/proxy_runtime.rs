mod common;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use alloy::primitives::{Bytes, B256, U256};
use serde_json::{json, Value};
use tiny_http::{Response, Server};

use edtech_wallet_adapters::{Eip1193Adapter, RuntimeProfile, WalletAdapterConfig};
use edtech_wallet_core::domain::TxRequest;
use edtech_wallet_core::network::{HARDHAT_CHAIN_ID, SEPOLIA_CHAIN_ID};
use edtech_wallet_core::{ConnectError, ConnectionStatus, PortError, ProviderPort};

use common::{contract_address, ether, spawn_manager_with, test_config};

const ACCOUNT: &str = "0x1000000000000000000000000000000000000001";
const TX_HASH: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

type RpcResult = Result<Value, (i64, String)>;
type RpcLog = Arc<Mutex<Vec<(String, Value)>>>;

/// Serves JSON-RPC on a loopback port until the process exits.
fn spawn_rpc_server<F>(handler: F) -> (String, RpcLog)
where
    F: Fn(&str, &Value) -> RpcResult + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("start server");
    let url = format!("http://{}", server.server_addr());
    let log: RpcLog = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&log);

    thread::spawn(move || {
        for mut req in server.incoming_requests() {
            let mut body = String::new();
            if req.as_reader().read_to_string(&mut body).is_err() {
                continue;
            }
            let payload: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let method = payload["method"].as_str().unwrap_or_default().to_owned();
            let params = payload["params"].clone();
            if let Ok(mut g) = seen.lock() {
                g.push((method.clone(), params.clone()));
            }
            let response = match handler(&method, &params) {
                Ok(result) => json!({"jsonrpc": "2.0", "id": payload["id"], "result": result}),
                Err((code, message)) => json!({
                    "jsonrpc": "2.0",
                    "id": payload["id"],
                    "error": {"code": code, "message": message},
                }),
            };
            let _ = req.respond(Response::from_string(response.to_string()));
        }
    });

    (url, log)
}

fn proxy_config(url: &str) -> WalletAdapterConfig {
    WalletAdapterConfig {
        eip1193_proxy_url: Some(url.to_owned()),
        request_timeout_ms: 2_000,
        receipt_poll_interval_ms: 10,
        ..test_config()
    }
}

fn methods(log: &RpcLog) -> Vec<String> {
    log.lock()
        .expect("log lock")
        .iter()
        .map(|(method, _)| method.clone())
        .collect()
}

fn params_of(log: &RpcLog, method: &str) -> Value {
    log.lock()
        .expect("log lock")
        .iter()
        .find(|(m, _)| m == method)
        .map(|(_, params)| params.clone())
        .unwrap_or(Value::Null)
}

fn parse_chain(params: &Value) -> Option<u64> {
    let raw = params[0]["chainId"].as_str()?;
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).ok()
}

#[tokio::test]
async fn proxy_forwards_requests_and_polls_for_receipts() {
    let polls = Arc::new(AtomicU64::new(0));
    let receipt_polls = Arc::clone(&polls);
    let (url, log) = spawn_rpc_server(move |method, _params| match method {
        "eth_requestAccounts" => Ok(json!([ACCOUNT])),
        "eth_chainId" => Ok(json!("0xaa36a7")),
        "eth_getBalance" => Ok(json!("0xde0b6b3a7640000")),
        "eth_estimateGas" => Ok(json!("0x5208")),
        "eth_call" => Ok(json!("0x2a")),
        "eth_sendTransaction" => Ok(json!(TX_HASH)),
        "eth_getTransactionReceipt" => {
            if receipt_polls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Value::Null)
            } else {
                Ok(json!({"status": "0x1", "gasUsed": "0x5208", "blockNumber": "0x10"}))
            }
        }
        _ => Err((-32601, "method not found".to_owned())),
    });
    let adapter = Eip1193Adapter::with_config(proxy_config(&url));
    assert_eq!(adapter.mode_name(), "proxy");

    let accounts = adapter.request_accounts().await.expect("accounts");
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].to_string(), ACCOUNT);
    assert_eq!(adapter.chain_id().await.expect("chain"), SEPOLIA_CHAIN_ID);
    assert_eq!(
        adapter.get_balance(accounts[0]).await.expect("balance"),
        ether(1)
    );

    let request = TxRequest {
        chain_id: SEPOLIA_CHAIN_ID,
        from: Some(accounts[0]),
        to: contract_address(),
        data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
        value: ether(1),
        gas: Some(23_100),
    };
    assert_eq!(adapter.estimate_gas(&request).await.expect("estimate"), 21_000);
    assert_eq!(
        adapter.call(&request).await.expect("call"),
        Bytes::from(vec![0x2a])
    );
    let tx_hash = adapter.send_transaction(&request).await.expect("send");
    assert_eq!(tx_hash, TX_HASH.parse::<B256>().expect("hash"));

    let sent = params_of(&log, "eth_sendTransaction");
    assert_eq!(sent[0]["gas"], "0x5a3c");
    assert_eq!(sent[0]["value"], "0xde0b6b3a7640000");
    assert_eq!(sent[0]["data"], "0xdeadbeef");

    let receipt = adapter.wait_for_receipt(tx_hash).await.expect("receipt");
    assert!(receipt.success);
    assert_eq!(receipt.gas_used, Some(21_000));
    assert_eq!(receipt.block_number, Some(16));
    assert_eq!(polls.load(Ordering::SeqCst), 2);

    let err = adapter
        .switch_network(HARDHAT_CHAIN_ID)
        .await
        .expect_err("unhandled method");
    assert_eq!(err.code(), Some(-32601));

    let counters = adapter.counters().expect("counters");
    assert_eq!(counters.account_requests, 1);
    assert_eq!(counters.balance_queries, 1);
    assert_eq!(counters.estimate_calls, 1);
    assert_eq!(counters.send_calls, 1);
}

#[tokio::test]
async fn manager_registers_unknown_chain_through_proxy() {
    let wallet = Arc::new(Mutex::new((
        SEPOLIA_CHAIN_ID,
        BTreeSet::from([SEPOLIA_CHAIN_ID]),
    )));
    let (url, log) = spawn_rpc_server(move |method, params| {
        let mut g = wallet.lock().map_err(|_| (-32603, "poisoned".to_owned()))?;
        match method {
            "eth_requestAccounts" | "eth_accounts" => Ok(json!([ACCOUNT])),
            "eth_chainId" => Ok(json!(format!("{:#x}", g.0))),
            "eth_getBalance" => Ok(json!("0x0")),
            "wallet_switchEthereumChain" => match parse_chain(params) {
                Some(chain_id) if g.1.contains(&chain_id) => {
                    g.0 = chain_id;
                    Ok(Value::Null)
                }
                _ => Err((4902, "Unrecognized chain ID".to_owned())),
            },
            "wallet_addEthereumChain" => {
                let chain_id = parse_chain(params).ok_or((-32602, "bad params".to_owned()))?;
                g.1.insert(chain_id);
                Ok(Value::Null)
            }
            _ => Err((-32601, "method not found".to_owned())),
        }
    });
    let config = proxy_config(&url);
    let adapter = Eip1193Adapter::with_config(config.clone());
    let manager = spawn_manager_with(&adapter, &config);

    let state = manager.connect().await.expect("connect");
    assert_eq!(state.chain_id, Some(SEPOLIA_CHAIN_ID));
    assert_eq!(state.balance, U256::ZERO);

    let state = manager
        .switch_network(HARDHAT_CHAIN_ID)
        .await
        .expect("switch to hardhat");
    assert_eq!(state.chain_id, Some(HARDHAT_CHAIN_ID));
    assert!(state.network_supported);

    let wallet_calls: Vec<String> = methods(&log)
        .into_iter()
        .filter(|m| m.starts_with("wallet_"))
        .collect();
    assert_eq!(
        wallet_calls,
        vec![
            "wallet_switchEthereumChain",
            "wallet_addEthereumChain",
            "wallet_switchEthereumChain",
        ]
    );
    let added = params_of(&log, "wallet_addEthereumChain");
    assert_eq!(added[0]["chainId"], "0x539");
    assert_eq!(added[0]["chainName"], "Hardhat Local");
    assert_eq!(added[0]["nativeCurrency"]["decimals"], 18);
    assert_eq!(added[0]["rpcUrls"][0], "http://localhost:8545");

    let counters = adapter.counters().expect("counters");
    assert_eq!(counters.switch_calls, 2);
    assert_eq!(counters.register_calls, 1);
}

#[tokio::test]
async fn proxy_snapshot_sync_drives_session_events() {
    let wallet = Arc::new(Mutex::new((vec![ACCOUNT.to_owned()], SEPOLIA_CHAIN_ID)));
    let served = Arc::clone(&wallet);
    let (url, _log) = spawn_rpc_server(move |method, _params| {
        let g = served.lock().map_err(|_| (-32603, "poisoned".to_owned()))?;
        match method {
            "eth_requestAccounts" | "eth_accounts" => Ok(json!(g.0)),
            "eth_chainId" => Ok(json!(format!("{:#x}", g.1))),
            "eth_getBalance" => Ok(json!("0x1")),
            _ => Err((-32601, "method not found".to_owned())),
        }
    });
    let config = proxy_config(&url);
    let adapter = Eip1193Adapter::with_config(config.clone());
    let manager = spawn_manager_with(&adapter, &config);
    manager.connect().await.expect("connect");

    wallet.lock().expect("wallet lock").1 = HARDHAT_CHAIN_ID;
    adapter.sync_snapshot().await.expect("sync chain");
    let state = manager.current_state().await;
    assert_eq!(state.chain_id, Some(HARDHAT_CHAIN_ID));
    assert_eq!(state.status, ConnectionStatus::Connected);

    wallet.lock().expect("wallet lock").0.clear();
    adapter.sync_snapshot().await.expect("sync accounts");
    let state = manager.current_state().await;
    assert_eq!(state.status, ConnectionStatus::Disconnected);
    assert_eq!(state.account, None);
}

#[tokio::test]
async fn proxy_user_rejection_maps_to_connect_error() {
    let (url, _log) = spawn_rpc_server(|method, _params| match method {
        "eth_requestAccounts" => Err((4001, "User rejected the request.".to_owned())),
        _ => Err((-32601, "method not found".to_owned())),
    });
    let config = proxy_config(&url);
    let adapter = Eip1193Adapter::with_config(config.clone());
    let manager = spawn_manager_with(&adapter, &config);

    let err = manager.connect().await.expect_err("rejected");
    assert_eq!(err, ConnectError::UserRejected);
    assert_eq!(
        manager.current_state().await.status,
        ConnectionStatus::Disconnected
    );
}

#[tokio::test]
async fn production_without_proxy_has_no_provider() {
    let config = WalletAdapterConfig {
        runtime_profile: RuntimeProfile::Production,
        ..test_config()
    };
    let adapter = Eip1193Adapter::with_config(config.clone());
    assert_eq!(adapter.mode_name(), "disabled");

    let err = adapter.chain_id().await.expect_err("disabled");
    assert!(matches!(err, PortError::Unavailable(_)));

    let manager = spawn_manager_with(&adapter, &config);
    match manager.connect().await {
        Err(ConnectError::NoProvider(reason)) => assert!(reason.contains("production")),
        other => panic!("unexpected connect result: {other:?}"),
    }
}

#[tokio::test]
async fn development_without_proxy_falls_back_to_simulated_wallet() {
    let adapter = Eip1193Adapter::with_config(test_config());
    assert_eq!(adapter.mode_name(), "deterministic");
    assert_eq!(
        adapter.chain_id().await.expect("chain"),
        SEPOLIA_CHAIN_ID
    );
}

#[tokio::test]
async fn wallet_prompts_outlast_the_request_timeout() {
    let (url, log) = spawn_rpc_server(|method, _params| match method {
        "eth_requestAccounts" | "eth_sendTransaction" => {
            thread::sleep(Duration::from_millis(600));
            if method == "eth_requestAccounts" {
                Ok(json!([ACCOUNT]))
            } else {
                Ok(json!(TX_HASH))
            }
        }
        "eth_chainId" => {
            thread::sleep(Duration::from_millis(600));
            Ok(json!("0xaa36a7"))
        }
        _ => Err((-32601, "method not found".to_owned())),
    });
    let adapter = Eip1193Adapter::with_config(WalletAdapterConfig {
        request_timeout_ms: 150,
        ..proxy_config(&url)
    });

    let accounts = adapter.request_accounts().await.expect("slow approval");
    assert_eq!(accounts[0].to_string(), ACCOUNT);

    let request = TxRequest {
        chain_id: SEPOLIA_CHAIN_ID,
        from: Some(accounts[0]),
        to: contract_address(),
        data: Bytes::new(),
        value: ether(1),
        gas: Some(23_100),
    };
    let tx_hash = adapter.send_transaction(&request).await.expect("slow signature");
    assert_eq!(tx_hash, TX_HASH.parse::<B256>().expect("hash"));

    let err = adapter.chain_id().await.expect_err("plain reads stay bounded");
    assert!(matches!(err, PortError::Transport(_)), "unexpected error: {err:?}");
    assert_eq!(
        methods(&log),
        vec!["eth_requestAccounts", "eth_sendTransaction", "eth_chainId"]
    );
}
