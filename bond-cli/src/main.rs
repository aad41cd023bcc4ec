use bond_core::{Block, BondError, ChainStore, Transaction, TxInput, TxOutput, UtxoSet};
use bond_network::{Chain, Node};
use bond_wallet::{address, Wallets};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "bond-cli", about = "A minimal proof-of-work UTXO node", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the genesis coinbase, create the chain, reindex the UTXO set.
    CreateBlockchain {
        #[arg(long)]
        address: String,
    },
    /// Generate a new keypair and address, appended to this node's wallet file.
    CreateWallet,
    /// Print the total unspent balance locked to an address.
    GetBalance {
        #[arg(long)]
        address: String,
    },
    /// List every address in this node's wallet file.
    ListAddresses,
    /// Print every block from the tip back to genesis.
    PrintChain,
    /// Rebuild the UTXO index from a full chain traversal.
    ReindexUtxo,
    /// Build and sign a transaction; mine it locally or gossip it.
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
        #[arg(long)]
        mine: bool,
    },
    /// Launch the gossip server, optionally as a miner.
    StartNode {
        #[arg(long)]
        miner: Option<String>,
    },
}

fn node_id() -> String {
    std::env::var("NODE_ID").unwrap_or_else(|_| "3000".to_string())
}

fn db_path() -> String {
    format!("data/node_{}/db", node_id())
}

fn wallet_path() -> PathBuf {
    PathBuf::from(format!("data/node_{}/wallet.json", node_id()))
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::CreateBlockchain { address } => create_blockchain(&address),
        Command::CreateWallet => create_wallet(),
        Command::GetBalance { address } => get_balance(&address),
        Command::ListAddresses => list_addresses(),
        Command::PrintChain => print_chain(),
        Command::ReindexUtxo => reindex_utxo(),
        Command::Send { from, to, amount, mine } => send(&from, &to, amount, mine).await,
        Command::StartNode { miner } => start_node(miner).await,
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Core(#[from] BondError),
    #[error(transparent)]
    Wallet(#[from] bond_wallet::WalletError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Usage(String),
}

fn create_blockchain(address: &str) -> Result<(), CliError> {
    let pub_key_hash = address::decode(address)?;
    let path = db_path();
    std::fs::create_dir_all(PathBuf::from(&path).parent().expect("db path has a parent"))?;
    let coinbase = Transaction::new_coinbase(pub_key_hash, Vec::new(), bond_core::SUBSIDY)?;
    let genesis = Block::genesis(coinbase, now())?;
    let store = ChainStore::create(&path, &genesis)?;
    let utxo = UtxoSet::open(&path)?;
    utxo.reindex(&store)?;
    info!(address, hash = %hex::encode(genesis.hash), "blockchain created");
    println!("genesis block: {}", hex::encode(genesis.hash));
    Ok(())
}

fn create_wallet() -> Result<(), CliError> {
    let path = wallet_path();
    std::fs::create_dir_all(path.parent().expect("wallet path has a parent"))?;
    let mut wallets = Wallets::load(&path)?;
    let addr = wallets.create_wallet()?;
    wallets.save(&path)?;
    println!("{addr}");
    Ok(())
}

fn get_balance(address: &str) -> Result<(), CliError> {
    let pub_key_hash = address::decode(address)?;
    let utxo = UtxoSet::open(&db_path())?;
    let balance = utxo.find_utxo(&pub_key_hash)?;
    println!("balance of {address}: {balance}");
    Ok(())
}

fn list_addresses() -> Result<(), CliError> {
    let wallets = Wallets::load(&wallet_path())?;
    for addr in wallets.addresses() {
        println!("{addr}");
    }
    Ok(())
}

fn print_chain() -> Result<(), CliError> {
    let store = ChainStore::open(&db_path())?;
    for block in store.iterator()? {
        let block = block?;
        println!(
            "height {} hash {} prev {} nonce {} txs {}",
            block.height,
            hex::encode(block.hash),
            hex::encode(&block.prev_block_hash),
            block.nonce,
            block.transactions.len(),
        );
    }
    Ok(())
}

fn reindex_utxo() -> Result<(), CliError> {
    let path = db_path();
    let store = ChainStore::open(&path)?;
    let utxo = UtxoSet::open(&path)?;
    utxo.reindex(&store)?;
    println!("reindexed, {} transactions with unspent outputs", utxo.count_transactions()?);
    Ok(())
}

/// A placeholder previous transaction carrying only the spent output, built
/// so `Transaction::sign`'s trimmed-copy construction can read the
/// `PubKeyHash` it needs without the UTXO index storing full transactions.
fn stub_prev_tx(vout: u32, pub_key_hash: [u8; 20]) -> Transaction {
    let mut outputs = vec![TxOutput::new(0, [0u8; 20]); vout as usize + 1];
    outputs[vout as usize] = TxOutput::new(0, pub_key_hash);
    Transaction { id: [0u8; 32], inputs: Vec::new(), outputs }
}

async fn send(from: &str, to: &str, amount: u64, mine: bool) -> Result<(), CliError> {
    let from_hash = address::decode(from)?;
    let to_hash = address::decode(to)?;
    let path = db_path();
    let store = ChainStore::open(&path)?;
    let utxo = UtxoSet::open(&path)?;

    let wallets = Wallets::load(&wallet_path())?;
    let wallet = wallets.get(from)?;

    let (accumulated, selected) = utxo.find_spendable_outputs(&from_hash, amount)?;
    if accumulated < amount {
        return Err(CliError::Usage(format!(
            "insufficient funds: have {accumulated}, need {amount}"
        )));
    }

    let mut inputs = Vec::new();
    let mut prev_txs = HashMap::new();
    let mut keys = HashMap::new();
    for (txid, vouts) in &selected {
        for &vout in vouts {
            inputs.push(TxInput {
                prev_tx_id: txid.to_vec(),
                vout,
                signature: Vec::new(),
                pub_key: Vec::new(),
            });
            prev_txs.insert(*txid, stub_prev_tx(vout, from_hash));
            keys.insert(*txid, wallet.keypair.clone());
        }
    }

    let mut outputs = vec![TxOutput::new(amount, to_hash)];
    if accumulated > amount {
        outputs.push(TxOutput::new(accumulated - amount, from_hash));
    }

    let mut tx = Transaction::new(inputs, outputs)?;
    tx.sign(&keys, &prev_txs)?;

    if mine {
        let block = bond_core::mine_block(vec![tx], &store, &utxo, from_hash, now())?;
        utxo.update(&block)?;
        println!("mined block {}", hex::encode(block.hash));
    } else {
        println!("broadcasting transaction {}", hex::encode(tx.id));
        let node = Node::new(
            format!("localhost:{}", node_id()),
            path.clone(),
            Some(Chain { store, utxo }),
            None,
        );
        let seed = bond_network::SEED_FULL_NODES[0];
        bond_network::peer::send_tx(&node, seed, &tx).await;
    }
    Ok(())
}

async fn start_node(miner: Option<String>) -> Result<(), CliError> {
    let path = db_path();
    let address = format!("localhost:{}", node_id());

    let chain = match ChainStore::open(&path) {
        Ok(store) => {
            let utxo = UtxoSet::open(&path)?;
            Some(Chain { store, utxo })
        }
        Err(_) => None,
    };

    let mining_pub_key_hash = miner.map(|a| address::decode(&a)).transpose()?;
    if mining_pub_key_hash.is_some() {
        info!(address, "starting as miner");
    } else {
        info!(address, "starting as full node");
    }

    let node = Arc::new(Node::new(address, path, chain, mining_pub_key_hash));
    bond_network::server::start(node).await?;
    Ok(())
}
