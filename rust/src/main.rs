//! Operator CLI. Commands are small and auditable so operators can see
//! exactly how secrets are handled; no command ever prints a stored secret
//! except `decrypt`, which exists for recovering a single value by hand.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sealed_config::config::{load_config, RuntimeConfig};
use sealed_config::crypto::cipher::{decrypt_string, encrypt_string, BlockAlgorithm};
use sealed_config::crypto::integrity::HashAlgorithm;
use sealed_config::value::PasswordValue;
use sealed_config::{LoadPolicy, SecurityKey, StoredConfiguration};
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sealed-config")]
#[command(version, about = "Encrypt, inspect and re-key secret settings in configuration documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a new random base64 key
    GenerateKey,
    /// Encrypt a value under the configured key
    Encrypt {
        /// Runtime config naming the key source
        #[arg(long, env = "SEALED_CONFIG")]
        config: PathBuf,
        /// Block algorithm label
        #[arg(long, default_value = "CONFIG")]
        algorithm: String,
        plaintext: String,
    },
    /// Decrypt a single value under the configured key
    Decrypt {
        #[arg(long, env = "SEALED_CONFIG")]
        config: PathBuf,
        #[arg(long, default_value = "CONFIG")]
        algorithm: String,
        ciphertext: String,
    },
    /// Print the value hash of a password
    Hash {
        #[arg(long, default_value = "SHA512")]
        algorithm: String,
        value: String,
    },
    /// List the settings of a document with hashes and redacted values
    Inspect {
        #[arg(long, env = "SEALED_CONFIG")]
        config: PathBuf,
        /// Keep going past settings that cannot be decrypted
        #[arg(long)]
        skip_invalid: bool,
        #[arg(long, default_value = "en")]
        locale: String,
        document: PathBuf,
    },
    /// Re-encrypt every secret of a document under another key
    Rekey {
        /// Runtime config whose key opens the input document
        #[arg(long)]
        from: PathBuf,
        /// Runtime config whose key seals the output document
        #[arg(long)]
        to: PathBuf,
        input: PathBuf,
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::GenerateKey => {
            println!("{}", SecurityKey::generate().encode_base64());
        }
        Command::Encrypt {
            config,
            algorithm,
            plaintext,
        } => {
            let runtime = load_config(&config)?;
            let algorithm: BlockAlgorithm = algorithm.parse()?;
            println!("{}", encrypt_string(&plaintext, &runtime.key_source, algorithm)?);
        }
        Command::Decrypt {
            config,
            algorithm,
            ciphertext,
        } => {
            let runtime = load_config(&config)?;
            let algorithm: BlockAlgorithm = algorithm.parse()?;
            println!("{}", decrypt_string(&ciphertext, &runtime.key_source, algorithm)?);
        }
        Command::Hash { algorithm, value } => {
            let algorithm: HashAlgorithm = algorithm.parse()?;
            let value = PasswordValue::from_plaintext(&value)?;
            println!("{}", value.value_hash_with(algorithm));
        }
        Command::Inspect {
            config,
            skip_invalid,
            locale,
            document,
        } => {
            let runtime = load_config(&config)?;
            let policy = if skip_invalid {
                LoadPolicy::SkipInvalid
            } else {
                LoadPolicy::Strict
            };
            let loaded = load_document(&document, &runtime, policy)?;
            let algorithm = runtime.checksum_algorithm;

            let settings: Vec<_> = loaded
                .configuration
                .settings()
                .map(|(setting, value)| {
                    json!({
                        "key": setting.key(),
                        "syntax": setting.syntax().as_str(),
                        "syntaxVersion": value.syntax_version(),
                        "valueHash": value.value_hash_with(algorithm),
                        "value": value.to_debug_json(&locale),
                        "validation": value.validate(setting),
                    })
                })
                .collect();
            let skipped: Vec<String> = loaded.skipped.iter().map(|e| e.to_string()).collect();
            let printable = json!({
                "checksumAlgorithm": algorithm.as_str(),
                "documentHash": loaded.configuration.value_hash(algorithm),
                "settings": settings,
                "skipped": skipped,
            });
            println!("{}", serde_json::to_string_pretty(&printable)?);
        }
        Command::Rekey {
            from,
            to,
            input,
            output,
        } => {
            let source = load_config(&from)?;
            let destination = load_config(&to)?;
            let loaded = load_document(&input, &source, LoadPolicy::Strict)?;
            let xml = loaded.configuration.to_xml(&destination.key_source)?;
            fs::write(&output, xml)?;
            info!(
                settings = loaded.configuration.len(),
                output = %output.display(),
                "re-encrypted configuration document"
            );
        }
    }
    Ok(())
}

fn load_document(
    path: &Path,
    runtime: &RuntimeConfig,
    policy: LoadPolicy,
) -> Result<sealed_config::store::LoadOutcome, Box<dyn std::error::Error>> {
    let xml = fs::read_to_string(path)?;
    Ok(StoredConfiguration::from_xml(&xml, &runtime.key_source, policy)?)
}
