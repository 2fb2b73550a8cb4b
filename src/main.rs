use std::io;

use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, B256};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use ethman::json;
use ethman::provider::BlockSelector;
use ethman::{Ethman, EthmanOptions};

#[derive(Debug, Parser)]
#[command(
    name = "ethman",
    version,
    about = "Ethman: network selection, transaction lookups, and balances for Ethereum nodes"
)]
struct Cli {
    /// Ecosystem part of the selection
    #[arg(short, long, global = true, env = "ETHMAN_ECOSYSTEM", default_value = "ethereum")]
    ecosystem: String,

    /// Network part of the selection (e.g. mainnet, sepolia, local)
    #[arg(short, long, global = true, env = "ETHMAN_NETWORK")]
    network: Option<String>,

    /// Provider part of the selection (URL, IPC path, node name, or config entry)
    #[arg(short, long, global = true, env = "ETHMAN_PROVIDER")]
    provider: Option<String>,

    /// Verbose logging on stderr
    #[arg(short, long, global = true)]
    debug: bool,

    /// JSON output (the default)
    #[arg(short, long, global = true, conflicts_with = "raw")]
    json: bool,

    /// Plain value output instead of JSON
    #[arg(short, long, global = true)]
    raw: bool,

    /// One-line JSON
    #[arg(short, long, global = true)]
    compact: bool,

    /// Render hex byte fields as text
    #[arg(short = 'H', long, global = true)]
    humanize: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Look up a transaction by hash
    Txn(TxnArgs),
    /// Look up an account balance
    Balance(BalanceArgs),
    /// Raw client passthroughs
    Eth {
        #[command(subcommand)]
        command: EthCommand,
    },
}

#[derive(Debug, Args)]
struct TxnArgs {
    /// Transaction hash
    hash: String,

    /// Print the explorer URL for the transaction
    #[arg(long)]
    url: bool,

    /// Print only the decoded event logs
    #[arg(long, conflicts_with = "url")]
    logs: bool,
}

#[derive(Debug, Args)]
struct BalanceArgs {
    /// Account address
    account: String,

    /// Print only the balance in wei
    #[arg(long, conflicts_with_all = ["gwei", "ether"])]
    wei: bool,

    /// Print only the balance in gwei
    #[arg(long, conflicts_with = "ether")]
    gwei: bool,

    /// Print only the balance in ether
    #[arg(long)]
    ether: bool,
}

#[derive(Debug, Subcommand)]
enum EthCommand {
    /// Current block number
    BlockNumber,
    /// Block by number, tag, or hash
    Block {
        /// Block number (decimal or hex), tag (latest, …), or 32-byte hash
        id: String,
    },
}

/// How printed values are shaped; shared by every subcommand.
struct Output {
    raw: bool,
    compact: bool,
    humanize: bool,
}

impl Output {
    fn emit(&self, value: &serde_json::Value) {
        let value = if self.humanize {
            json::humanize(value)
        } else {
            value.clone()
        };
        if self.raw {
            match &value {
                serde_json::Value::String(text) => println!("{text}"),
                other => println!("{}", json::render(other, false)),
            }
        } else {
            println!("{}", json::render(&value, !self.compact));
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    if let Err(err) = run(cli).await {
        eprintln!("Failed: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let default_directive = if debug { "ethman=debug" } else { "ethman=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("ETHMAN_LOG_LEVEL")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let output = Output {
        raw: cli.raw && !cli.json,
        compact: cli.compact,
        humanize: cli.humanize,
    };

    let mut options = EthmanOptions::new().ecosystem(cli.ecosystem);
    if let Some(network) = cli.network {
        options = options.network(network);
    }
    if let Some(provider) = cli.provider {
        options = options.provider(provider);
    }
    let mut man = Ethman::new(options)?;
    man.connect().await.context("connecting to the selected provider")?;

    match cli.command {
        Command::Txn(args) => txn(&man, args, &output).await,
        Command::Balance(args) => balance(&man, args, &output).await,
        Command::Eth { command } => eth(&man, command, &output).await,
    }
}

async fn txn(man: &Ethman, args: TxnArgs, output: &Output) -> Result<()> {
    let hash: B256 = args.hash.trim().parse().context("invalid transaction hash")?;

    if args.url {
        let url = man.explorer_tx_url(hash)?;
        output.emit(&serde_json::Value::String(url));
        return Ok(());
    }

    let receipt = man
        .transaction_receipt(hash)
        .await?
        .with_context(|| format!("transaction {hash} not found"))?;
    let decoded_logs: Vec<serde_json::Value> = man
        .decode_receipt(&receipt)
        .iter()
        .map(|log| log.to_json())
        .collect();

    if args.logs {
        output.emit(&serde_json::Value::Array(decoded_logs));
        return Ok(());
    }

    let transaction = man.get_transaction(hash).await?;
    let summary = serde_json::json!({
        "txn_hash": hash.to_string(),
        "block_number": receipt.block_number,
        "gas_used": receipt.gas_used,
        "gas_limit": transaction.get("gas").cloned().unwrap_or(serde_json::Value::Null),
        "gas_price": receipt.effective_gas_price.to_string(),
        "status": receipt.inner.status(),
        "logs": decoded_logs,
        "transaction": transaction,
    });
    output.emit(&summary);
    Ok(())
}

async fn balance(man: &Ethman, args: BalanceArgs, output: &Output) -> Result<()> {
    let address: Address = args.account.trim().parse().context("invalid account address")?;
    let wei = man.balance(address).await?;
    let gwei = format_units(wei, "gwei").context("formatting gwei")?;
    let ether = format_units(wei, "ether").context("formatting ether")?;

    let value = if args.wei {
        serde_json::Value::String(wei.to_string())
    } else if args.gwei {
        serde_json::Value::String(gwei)
    } else if args.ether {
        serde_json::Value::String(ether)
    } else {
        let mut units = serde_json::Map::new();
        units.insert("wei".into(), wei.to_string().into());
        units.insert("gwei".into(), gwei.into());
        units.insert("ether".into(), ether.into());
        let mut object = serde_json::Map::new();
        object.insert(address.to_checksum(None), units.into());
        serde_json::Value::Object(object)
    };
    output.emit(&value);
    Ok(())
}

async fn eth(man: &Ethman, command: EthCommand, output: &Output) -> Result<()> {
    match command {
        EthCommand::BlockNumber => {
            let number = man.block_number().await?;
            output.emit(&serde_json::json!(number));
        }
        EthCommand::Block { id } => {
            let selector: BlockSelector = id.parse()?;
            let block = man.get_block(&selector).await?;
            output.emit(&block);
        }
    }
    Ok(())
}
