use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use iden_core::claims::ClaimAuthorizeKSignSecp256k1;
use iden_core::{calculate_genesis, init_logging, Claim, IdenConfig};
use iden_crypto::SECP256K1_PUBLIC_KEY_SIZE;
use iden_merkletree::Entry;
use std::path::{Path, PathBuf};

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "iden")]
#[command(version = BUILD_VERSION)]
#[command(about = "Identity claims, genesis identifiers and credential tooling")]
#[command(propagate_version = true)]
struct Cli {
    #[arg(short, long, global = true, value_name = "FILE", env = "IDEN_CONFIG", help = "Path to config file")]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text", help = "Output format")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Derive the genesis identifier of an operational key")]
    Genesis {
        #[arg(long, value_name = "HEX", help = "Compressed secp256k1 public key")]
        key: String,
    },

    #[command(about = "Decode a hex-encoded claim entry")]
    DecodeClaim {
        #[arg(value_name = "HEX")]
        entry: String,
    },

    #[command(about = "Write the default configuration")]
    ConfigInit {
        #[arg(long, value_name = "FILE")]
        path: Option<PathBuf>,
        #[arg(short, long, help = "Overwrite an existing file")]
        force: bool,
    },
}

fn parse_public_key(s: &str) -> Result<[u8; SECP256K1_PUBLIC_KEY_SIZE]> {
    let bytes = hex::decode(s.trim_start_matches("0x")).context("public key is not hex")?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow!("public key must be {} bytes, got {}", SECP256K1_PUBLIC_KEY_SIZE, b.len()))
}

fn genesis(config: &IdenConfig, key: &str, format: OutputFormat) -> Result<()> {
    let kop: Claim = ClaimAuthorizeKSignSecp256k1::new(parse_public_key(key)?)?.into();
    let genesis = calculate_genesis(&kop, &[], config.trees.claims_levels)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&genesis)?),
        OutputFormat::Text => {
            println!("id:               {}", genesis.id);
            println!("state:            {}", genesis.iden_state);
            println!("claims root:      {}", genesis.roots.claims_root);
            println!("revocations root: {}", genesis.roots.revocations_root);
            println!("roots root:       {}", genesis.roots.roots_root);
        }
    }
    Ok(())
}

fn decode_claim(entry: &str, format: OutputFormat) -> Result<()> {
    let entry = Entry::from_hex(entry)?;
    let claim = Claim::from_entry(&entry)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&claim)?),
        OutputFormat::Text => {
            let metadata = claim.metadata();
            println!("type:       {}", claim.claim_type());
            println!("subject:    {:?}", metadata.subject());
            println!("updatable:  {}", metadata.header().updatable);
            println!("version:    {}", metadata.version);
            println!("rev nonce:  {}", metadata.rev_nonce);
            match metadata.expiration {
                Some(ts) => println!("expiration: {}", ts),
                None => println!("expiration: never"),
            }
            println!("h_index:    {}", entry.h_index()?);
            println!("h_value:    {}", entry.h_value()?);
        }
    }
    Ok(())
}

fn config_init(path: PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!("{} already exists, use --force to overwrite", path.display()));
    }
    IdenConfig::default().save(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn load_config(path: &Path) -> Result<IdenConfig> {
    let config = IdenConfig::load(path)?;
    init_logging(&config.logging)?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(IdenConfig::default_path);

    match cli.command {
        Commands::ConfigInit { path, force } => config_init(path.unwrap_or(config_path), force),
        Commands::Genesis { key } => genesis(&load_config(&config_path)?, &key, cli.format),
        Commands::DecodeClaim { entry } => {
            load_config(&config_path)?;
            decode_claim(&entry, cli.format)
        }
    }
}
