//! ducat-cli — command-line wallet and node operator interface.
//!
//! Keeps the key file local: the node only ever sees addresses, signed
//! transactions, and control requests.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use ducat_core::utxo::Utxo;
use ducat_wallet::{build_transfer, load_key, save_key, WalletKey};

const DEFAULT_NODE: &str = "http://127.0.0.1:3001";

/// Ducat command-line wallet.
#[derive(Parser)]
#[command(name = "ducat-cli", version, about = "Ducat wallet and node CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wallet key management.
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
    /// Query a balance from a node.
    Balance(BalanceArgs),
    /// List spendable outputs for an address.
    Unspent(BalanceArgs),
    /// Send ducats to an address.
    Send(SendArgs),
    /// Control a node's miner.
    Mining(MiningArgs),
    /// List a node's registered peers.
    Peers(NodeArgs),
}

#[derive(Subcommand)]
enum WalletAction {
    /// Create a new encrypted key file.
    Create(WalletFileArgs),
    /// Print the address of an existing key file.
    Address(WalletFileArgs),
}

#[derive(Args)]
struct WalletFileArgs {
    /// Path to the key file (default: ~/.ducat/wallet.key).
    #[arg(short, long)]
    file: Option<PathBuf>,
}

#[derive(Args)]
struct NodeArgs {
    /// Node endpoint URL.
    #[arg(short, long, default_value = DEFAULT_NODE)]
    node: String,
}

#[derive(Args)]
struct BalanceArgs {
    /// Address to query. Defaults to the wallet file's address.
    #[arg(short, long)]
    address: Option<String>,

    /// Path to the key file (default: ~/.ducat/wallet.key).
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Node endpoint URL.
    #[arg(short, long, default_value = DEFAULT_NODE)]
    node: String,
}

#[derive(Args)]
struct SendArgs {
    /// Recipient address.
    #[arg(short, long)]
    to: String,

    /// Amount in ducats.
    #[arg(short, long)]
    amount: u64,

    /// Path to the key file (default: ~/.ducat/wallet.key).
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Node endpoint URL.
    #[arg(short, long, default_value = DEFAULT_NODE)]
    node: String,
}

#[derive(Args)]
struct MiningArgs {
    /// start, stop, or restart.
    action: String,

    /// Node endpoint URL.
    #[arg(short, long, default_value = DEFAULT_NODE)]
    node: String,
}

fn wallet_path(file: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = file {
        return Ok(path);
    }
    let home = dirs::home_dir().context("cannot determine home directory")?;
    Ok(home.join(".ducat").join("wallet.key"))
}

fn prompt_password(confirm: bool) -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    if confirm {
        let again = rpassword::prompt_password("Confirm password: ")?;
        if password != again {
            bail!("passwords do not match");
        }
    }
    Ok(password)
}

fn open_wallet(file: Option<PathBuf>) -> Result<WalletKey> {
    let path = wallet_path(file)?;
    let password = prompt_password(false)?;
    load_key(&path, password.as_bytes())
        .with_context(|| format!("failed to open wallet at {}", path.display()))
}

async fn fetch_unspent(node: &str, address: &str) -> Result<Vec<Utxo>> {
    let utxos = reqwest::get(format!("{node}/unspent/{address}"))
        .await
        .with_context(|| format!("cannot reach node {node}"))?
        .error_for_status()?
        .json()
        .await?;
    Ok(utxos)
}

async fn cmd_wallet_create(args: WalletFileArgs) -> Result<()> {
    let path = wallet_path(args.file)?;
    if path.exists() {
        bail!("refusing to overwrite existing key file {}", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let password = prompt_password(true)?;
    let key = WalletKey::generate();
    save_key(&path, &key, password.as_bytes())?;

    println!("created {}", path.display());
    println!("address: {}", key.address());
    Ok(())
}

async fn cmd_wallet_address(args: WalletFileArgs) -> Result<()> {
    let key = open_wallet(args.file)?;
    println!("{}", key.address());
    Ok(())
}

async fn cmd_balance(args: BalanceArgs) -> Result<()> {
    let address = match args.address {
        Some(address) => address,
        None => open_wallet(args.file)?.address(),
    };
    let reply: Value = reqwest::get(format!("{}/balance/{address}", args.node))
        .await
        .with_context(|| format!("cannot reach node {}", args.node))?
        .error_for_status()?
        .json()
        .await?;
    println!("{address}: {} ducats", reply["balance"]);
    Ok(())
}

async fn cmd_unspent(args: BalanceArgs) -> Result<()> {
    let address = match args.address {
        Some(address) => address,
        None => open_wallet(args.file)?.address(),
    };
    let utxos = fetch_unspent(&args.node, &address).await?;
    if utxos.is_empty() {
        println!("no spendable outputs");
        return Ok(());
    }
    for utxo in utxos {
        println!("{}:{}  {} ducats", utxo.tx_id, utxo.out_index, utxo.amount);
    }
    Ok(())
}

async fn cmd_send(args: SendArgs) -> Result<()> {
    let key = open_wallet(args.file)?;
    let spendable = fetch_unspent(&args.node, &key.address()).await?;
    let tx = build_transfer(&spendable, &key, &args.to, args.amount)?;

    let client = reqwest::Client::new();
    let reply: Value = client
        .post(format!("{}/transactions", args.node))
        .json(&tx)
        .send()
        .await
        .with_context(|| format!("cannot reach node {}", args.node))?
        .json()
        .await?;

    if reply["ok"].as_bool() == Some(true) {
        println!("submitted {}", reply["txId"].as_str().unwrap_or(&tx.id));
    } else {
        bail!("node rejected transaction: {}", reply["error"]);
    }
    Ok(())
}

async fn cmd_mining(args: MiningArgs) -> Result<()> {
    match args.action.as_str() {
        "start" | "stop" | "restart" => {}
        other => bail!("unknown mining action '{other}' (use start, stop, or restart)"),
    }
    let client = reqwest::Client::new();
    let reply: Value = client
        .post(format!("{}/mining/{}", args.node, args.action))
        .send()
        .await
        .with_context(|| format!("cannot reach node {}", args.node))?
        .error_for_status()?
        .json()
        .await?;
    println!("miner: {} -> {}", reply["old"], reply["new"]);
    Ok(())
}

async fn cmd_peers(args: NodeArgs) -> Result<()> {
    let reply: Value = reqwest::get(format!("{}/peers", args.node))
        .await
        .with_context(|| format!("cannot reach node {}", args.node))?
        .error_for_status()?
        .json()
        .await?;
    match reply["peers"].as_array() {
        Some(peers) if !peers.is_empty() => {
            for peer in peers {
                println!("{}", peer.as_str().unwrap_or_default());
            }
        }
        _ => println!("no peers registered"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Wallet { action } => match action {
            WalletAction::Create(args) => cmd_wallet_create(args).await,
            WalletAction::Address(args) => cmd_wallet_address(args).await,
        },
        Commands::Balance(args) => cmd_balance(args).await,
        Commands::Unspent(args) => cmd_unspent(args).await,
        Commands::Send(args) => cmd_send(args).await,
        Commands::Mining(args) => cmd_mining(args).await,
        Commands::Peers(args) => cmd_peers(args).await,
    }
}
