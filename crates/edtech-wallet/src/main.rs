//! edtech-wallet: command-line host for the EdTech donation wallet core.

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use eyre::{eyre, WrapErr};
use serde::Serialize;

use edtech_wallet_adapters::{Eip1193Adapter, WalletAdapterConfig};
use edtech_wallet_core::units::format_display;
use edtech_wallet_core::{
    ConnectionManager, ConnectionState, EdTechClient, TransactionSubmitter,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Connect a wallet and interact with the EdTech donation contract")]
struct Args {
    /// Switch to the configured target network first if the wallet is on an
    /// unsupported one.
    #[arg(long, global = true)]
    ensure_target: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and print the connection state.
    Status,
    /// Donate an amount of the active network's currency.
    Donate {
        /// Decimal amount, e.g. "0.05".
        #[arg(long)]
        amount: String,
        #[arg(long)]
        purpose: Option<String>,
    },
    /// Purchase a course at its on-chain price.
    Purchase {
        #[arg(long)]
        course_id: u64,
    },
    /// Print the course price.
    Price,
    /// Check whether the connected account purchased a course.
    Purchased {
        #[arg(long)]
        course_id: u64,
    },
    /// Print aggregate contract statistics.
    Stats,
    /// Print a single donation record.
    Donation {
        #[arg(long)]
        id: u64,
    },
    /// Send an amount of the active network's currency to an address.
    Transfer {
        #[arg(long)]
        to: Address,
        /// Decimal amount, e.g. "0.05".
        #[arg(long)]
        amount: String,
    },
    /// List the networks this wallet accepts.
    Networks,
    /// Ask the wallet to switch networks.
    Switch {
        #[arg(long)]
        chain_id: u64,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = WalletAdapterConfig::from_env();
    let adapter = Eip1193Adapter::with_config(config.clone());
    tracing::info!(mode = adapter.mode_name(), "Starting edtech-wallet");

    let manager = ConnectionManager::spawn(
        adapter,
        config.network_policy(),
        config
            .contract_binding()
            .wrap_err("loading contract interface")?,
        TransactionSubmitter::new(config.gas_policy()),
    );

    let state = manager.restore().await?;
    if !state.is_connected() {
        manager.connect().await.wrap_err("connecting wallet")?;
    }

    let client = EdTechClient::new(&manager, config.amount_policy());
    if args.ensure_target {
        client.ensure_target_network().await?;
    }

    match args.command {
        Command::Status => {
            let state = manager.current_state().await;
            print_status(&manager, &state).await?;
        }
        Command::Donate { amount, purpose } => {
            let receipt = client.donate(&amount, purpose.as_deref()).await?;
            print_json(&receipt)?;
        }
        Command::Purchase { course_id } => {
            let receipt = client.purchase_course(course_id).await?;
            print_json(&receipt)?;
        }
        Command::Price => println!("{}", client.course_price().await?),
        Command::Purchased { course_id } => println!("{}", client.has_purchased(course_id).await?),
        Command::Stats => print_json(&client.stats().await?)?,
        Command::Donation { id } => print_json(&client.donation(id).await?)?,
        Command::Transfer { to, amount } => {
            let receipt = client.send_payment(to, &amount).await?;
            print_json(&receipt)?;
        }
        Command::Networks => print_networks(&manager),
        Command::Switch { chain_id } => {
            let state = manager.switch_network(chain_id).await?;
            print_status(&manager, &state).await?;
        }
    }

    manager.disconnect().await;
    Ok(())
}

async fn print_status(
    manager: &ConnectionManager<Eip1193Adapter>,
    state: &ConnectionState,
) -> eyre::Result<()> {
    let policy = manager.policy();
    let chain_id = state
        .chain_id
        .ok_or_else(|| eyre!("wallet reported no chain"))?;
    let symbol = policy
        .spec(chain_id)
        .map(|s| s.native_currency_symbol.as_str())
        .unwrap_or("ETH");
    let balance = format_display(state.balance, policy.decimals_for(chain_id), 4)?;
    println!("account:  {}", state.short_account());
    println!("network:  {} ({chain_id})", policy.network_name(chain_id));
    println!("balance:  {balance} {symbol}");
    println!("supported: {}", state.network_supported);
    if let Some(explorer) = policy.explorer_url(chain_id) {
        println!("explorer: {explorer}");
    }
    if !state.network_supported {
        println!(
            "hint: switch to {} with --ensure-target",
            policy.network_name(policy.target_chain())
        );
    }
    if let Some(receipt) = manager.last_receipt().await {
        print_json(&receipt)?;
    }
    Ok(())
}

fn print_networks(manager: &ConnectionManager<Eip1193Adapter>) {
    let policy = manager.policy();
    for chain_id in policy.supported_chains() {
        let marker = if chain_id == policy.target_chain() {
            " (target)"
        } else {
            ""
        };
        println!("{chain_id}\t{}{marker}", policy.network_name(chain_id));
    }
}

fn print_json<T: Serialize>(value: &T) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
