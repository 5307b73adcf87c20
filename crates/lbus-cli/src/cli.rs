use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "lbus",
    about = "Ledger bus: sign transactions and talk to a ledger over pub/sub",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Client configuration (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Raise log verbosity (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a new identity
    Keygen,
    /// Validate and normalize an address
    Address(AddressArgs),
    /// Build and sign a transaction offline
    Sign(SignArgs),
    /// Verify a signed transaction
    Verify(VerifyArgs),
    /// Run a client against an in-process development ledger
    Demo(DemoArgs),
}

#[derive(Args)]
pub struct AddressArgs {
    pub address: String,
}

#[derive(Args)]
pub struct SignArgs {
    /// Private key, hex (32-byte seed or 64-byte keypair)
    #[arg(long)]
    pub key: String,
    /// Recipient contract address
    #[arg(long)]
    pub to: String,
    #[arg(long)]
    pub method: String,
    /// Transaction data as a JSON object
    #[arg(long, default_value = "{}")]
    pub data: String,
    #[arg(long)]
    pub nonce: u64,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Signed transaction JSON, or `-` to read stdin
    pub transaction: String,
}

#[derive(Args)]
pub struct DemoArgs {
    /// Number of transactions to send
    #[arg(short = 'n', long, default_value = "3")]
    pub count: u32,
}
