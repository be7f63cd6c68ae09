//! Chat Envelope CLI - seal and open chat messages from the terminal
//!
//! Envelopes produced here are interchangeable with the ones the chat client
//! stores: base64 of nonce, salt, and AES-256-GCM ciphertext.
//!
//! The shared secret comes from `--secret`, the `CHAT_ENVELOPE_SECRET`
//! environment variable, or an interactive prompt, in that order.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use envelope_core::{CodecConfig, CryptoService, OsBackend, SharedSecret};

/// Chat Envelope - authenticated encryption for chat messages
#[derive(Parser, Debug)]
#[command(name = "chat-envelope")]
#[command(version)]
#[command(about = "Encrypt and decrypt chat message envelopes with a shared secret")]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Shared conversation secret
    #[arg(long, global = true, env = "CHAT_ENVELOPE_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encrypt a message and print its envelope
    Encrypt {
        /// Plaintext message
        message: String,
    },
    /// Decrypt an envelope and print the message
    Decrypt {
        /// Envelope text
        envelope: String,
    },
    /// Round-trip a sample message and print diagnostics as JSON
    SelfTest {
        /// Sample text (defaults to the configured sample)
        #[arg(long)]
        sample: Option<String>,
    },
    /// Generate a new random conversation secret
    Keygen,
}

fn read_secret(arg: Option<String>) -> Result<SharedSecret, Box<dyn std::error::Error>> {
    let secret = match arg {
        Some(secret) => secret,
        None => rpassword::prompt_password("Conversation secret: ")?,
    };
    if secret.is_empty() {
        return Err("Conversation secret must not be empty".into());
    }
    Ok(SharedSecret::new(secret))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only envelopes and plaintext
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = match args.config {
        Some(path) => path,
        None => CodecConfig::default_path()?,
    };
    let config = CodecConfig::load(&config_path)?;
    info!("Using config from {:?}", config_path);

    let service = CryptoService::new(Arc::new(OsBackend), config)
        .map_err(|e| format!("Failed to initialize crypto service: {}", e))?;

    match args.command {
        Command::Keygen => {
            let secret = service.generate_shared_secret()?;
            println!("{}", secret.expose());
        }
        Command::SelfTest { sample } => {
            let secret = read_secret(args.secret)?;
            let sample = sample.unwrap_or_else(|| service.config().self_test_sample.clone());
            let report = service.run_diagnostics(&sample, secret.expose()).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.passed {
                return Err("Crypto self-test failed".into());
            }
        }
        Command::Encrypt { message } => {
            let secret = read_secret(args.secret)?;
            if !service.run_startup_test(secret.expose()).await {
                return Err("Crypto self-test failed - refusing to encrypt".into());
            }

            let result = service.encrypt(&message, secret.expose()).await;
            if !result.success {
                return Err(format!(
                    "Encryption failed: {}",
                    result.error_detail.unwrap_or_default()
                )
                .into());
            }
            info!("Encrypted in {:.2}ms", result.elapsed_time_ms);
            println!("{}", result.data);
        }
        Command::Decrypt { envelope } => {
            let secret = read_secret(args.secret)?;
            if !service.run_startup_test(secret.expose()).await {
                return Err("Crypto self-test failed - refusing to decrypt".into());
            }

            let result = service.decrypt(&envelope, secret.expose()).await;
            if !result.success {
                let kind = result
                    .error
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                return Err(format!(
                    "Could not verify or decrypt message ({}): {}",
                    kind,
                    result.error_detail.unwrap_or_default()
                )
                .into());
            }
            info!("Decrypted in {:.2}ms", result.elapsed_time_ms);
            println!("{}", result.data);
        }
    }

    Ok(())
}
