use std::io::Read;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use lbus_client::{ClientConfig, LedgerClient, ListFilter};
use lbus_crypto::Identity;
use lbus_devnet::DevLedger;
use lbus_transport::{InMemoryBroker, PubSubTransport};
use lbus_tx::{sign_with_private_key, SignedTransaction, TransactionBuilder};
use lbus_types::{Address, Payload};
use serde_json::{json, Value};

use crate::cli::*;

/// Counter contract the demo writes to.
const DEMO_CONTRACT: [u8; 32] = [0x11; 32];

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    match cli.command {
        Command::Keygen => cmd_keygen(cli.format),
        Command::Address(args) => cmd_address(args, cli.format),
        Command::Sign(args) => cmd_sign(args, &config, cli.format),
        Command::Verify(args) => cmd_verify(args, cli.format),
        Command::Demo(args) => cmd_demo(args, config, cli.format).await,
    }
}

fn cmd_keygen(format: OutputFormat) -> anyhow::Result<()> {
    let identity = Identity::generate();
    match format {
        OutputFormat::Json => print_json(&json!({
            "address": identity.address(),
            "private_key": identity.private_key_hex(),
        })),
        OutputFormat::Text => {
            println!("{} {}", "address:".bold(), identity.address());
            println!("{} {}", "private key:".bold(), identity.private_key_hex().yellow());
            println!("Keep the private key secret.");
            Ok(())
        }
    }
}

fn cmd_address(args: AddressArgs, format: OutputFormat) -> anyhow::Result<()> {
    let address = Address::parse(&args.address).context("invalid address")?;
    match format {
        OutputFormat::Json => print_json(&json!({ "address": address, "valid": true })),
        OutputFormat::Text => {
            println!("{} {}", "✓".green().bold(), address);
            Ok(())
        }
    }
}

fn cmd_sign(args: SignArgs, config: &ClientConfig, format: OutputFormat) -> anyhow::Result<()> {
    let signed = build_signed(&args, config.tx_version)?;
    let hash = signed.hash()?;
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&signed)?),
        OutputFormat::Text => {
            println!("{} signed nonce {} ({})", "✓".green().bold(), signed.transaction().nonce(), hash.short_hex().cyan());
            println!("{}", serde_json::to_string_pretty(&signed)?);
            Ok(())
        }
    }
}

pub(crate) fn build_signed(args: &SignArgs, version: u32) -> anyhow::Result<SignedTransaction> {
    let data = parse_data(&args.data)?;
    let to = Address::parse(&args.to).context("invalid recipient")?;
    let identity = Identity::from_private_key_hex(&args.key).context("invalid private key")?;
    let tx = TransactionBuilder::new(identity.address().clone(), to, args.method.as_str())
        .data(data)
        .nonce(args.nonce)
        .version(version)
        .build()?;
    Ok(sign_with_private_key(&args.key, tx)?)
}

pub(crate) fn parse_data(raw: &str) -> anyhow::Result<Payload> {
    match serde_json::from_str::<Value>(raw).context("data is not valid JSON")? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => bail!("data must be a JSON object, got {other}"),
    }
}

fn cmd_verify(args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let raw = if args.transaction == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        args.transaction
    };
    let signed: SignedTransaction = serde_json::from_str(&raw).context("not a signed transaction")?;
    let outcome = signed.verify();
    let hash = signed.hash()?;
    match format {
        OutputFormat::Json => print_json(&json!({
            "valid": outcome.is_ok(),
            "tx_hash": hash,
            "error": outcome.as_ref().err().map(ToString::to_string),
        }))?,
        OutputFormat::Text => match &outcome {
            Ok(()) => println!("{} signature valid ({})", "✓".green().bold(), hash),
            Err(e) => println!("{} {}", "✗".red().bold(), e),
        },
    }
    outcome.map_err(Into::into)
}

async fn cmd_demo(args: DemoArgs, config: ClientConfig, format: OutputFormat) -> anyhow::Result<()> {
    let broker = InMemoryBroker::start();
    let transport: Arc<dyn PubSubTransport> = Arc::new(broker.clone());
    let devnet = DevLedger::spawn(Arc::clone(&transport), config.subjects()?).await?;
    let client = LedgerClient::new(transport, config)?;

    let alice = Arc::new(Identity::generate());
    let session = client.session(alice.clone());
    let counter = Address::from_bytes(DEMO_CONTRACT);

    for i in 1..=args.count {
        let mut data = Payload::new();
        data.insert("value".into(), json!(i));
        let output = session.sign_and_send(counter.as_str(), "INCREMENT", data).await?;
        if format == OutputFormat::Text {
            println!("{} INCREMENT {} -> {} state(s)", "✓".green(), i, output.states.len());
        }
    }

    let nonce = session.nonce().await?;
    let state = client.get_state(counter.as_str(), "GET", Payload::new()).await?;
    let blocks = client.get_blocks(&ListFilter::default()).await?;
    let logs = client.get_logs(&ListFilter::for_contract(counter.clone())).await?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "account": alice.address(),
            "nonce": nonce,
            "states": state.states,
            "blocks": blocks,
            "logs": logs,
        }))?,
        OutputFormat::Text => {
            println!("account {}", alice.address().short_id().cyan());
            println!("  nonce:  {}", nonce.to_string().bold());
            println!("  states: {}", state.states.len());
            println!("  blocks: {}", blocks.len());
            println!("  logs:   {}", logs.len());
        }
    }

    devnet.stop().await?;
    broker.shutdown();
    Ok(())
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_args(key: &str, data: &str) -> SignArgs {
        SignArgs {
            key: key.into(),
            to: "ab".repeat(32),
            method: "ADD_X".into(),
            data: data.into(),
            nonce: 4,
        }
    }

    #[test]
    fn parse_data_requires_object() {
        assert_eq!(parse_data(r#"{"a":"b"}"#).unwrap()["a"], json!("b"));
        assert!(parse_data("[1,2]").is_err());
        assert!(parse_data("not json").is_err());
    }

    #[test]
    fn offline_signing_verifies() {
        let identity = Identity::generate();
        let signed = build_signed(&sign_args(&identity.private_key_hex(), r#"{"a":"b"}"#), 1).unwrap();
        assert!(signed.verify().is_ok());
        assert_eq!(signed.transaction().nonce(), 4);
        assert_eq!(signed.public_key(), identity.address());
    }

    #[test]
    fn offline_signing_rejects_bad_key() {
        assert!(build_signed(&sign_args("zz", "{}"), 1).is_err());
    }

    #[tokio::test]
    async fn demo_completes_against_in_process_ledger() {
        let config = ClientConfig::default().with_call_timeout(std::time::Duration::from_secs(2));
        cmd_demo(DemoArgs { count: 2 }, config, OutputFormat::Json).await.unwrap();
    }
}
