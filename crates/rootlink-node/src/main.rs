// ============================================
// File: crates/rootlink-node/src/main.rs
// ============================================
//! # Rootlink Node Entry Point
//!
//! ## Creation Reason
//! Main entry point for the `rootlink` binary.
//! Handles CLI parsing, logging setup, and running a node in either role.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Hierarchy and end-point issuing
//! - Host (echo server) and guest (one message) roles
//!
//! ## Usage
//! ```bash
//! # Mint a hierarchy and two end-points
//! rootlink issue --out ./pki --endpoint alpha --endpoint beta
//!
//! # Run a host and talk to it
//! rootlink host --config host.toml
//! rootlink guest --config guest.toml --text "hello"
//!
//! # Other commands
//! rootlink validate --config host.toml
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Authority private keys are never written; re-run `issue` to mint a
//!   new hierarchy
//! - `RUST_LOG` overrides the configured log level
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rootlink_core::trust::{
    CadastreStore, Certificate, IssuedIdentity, JsonFileStore, MemoryStore, Rooter, TrustEngine,
};
use rootlink_node::services::Message;
use rootlink_node::{HandshakeContext, NodeConfig, NodeError, Session};
use rootlink_transport::{TcpServer, Throttle, Throttled};

// ============================================
// CLI Definition
// ============================================

/// Rootlink secure point-to-point transport node
#[derive(Parser, Debug)]
#[command(name = "rootlink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mint a rooter hierarchy and end-point identities
    Issue {
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Hierarchy name used in certificate subjects
        #[arg(long, default_value = "rootlink")]
        name: String,

        /// RSA modulus size
        #[arg(long, default_value_t = 2048)]
        bits: usize,

        /// End-point to issue (repeatable)
        #[arg(short, long = "endpoint", required = true)]
        endpoints: Vec<String>,
    },

    /// Accept guests and echo their messages
    Host {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/rootlink/node.toml")]
        config: PathBuf,
    },

    /// Connect to a host, send one message and print the echo
    Guest {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/rootlink/node.toml")]
        config: PathBuf,

        /// Message text
        #[arg(short, long)]
        text: String,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/rootlink/node.toml")]
        config: PathBuf,
    },
}

// ============================================
// Main
// ============================================

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Execute command
    let result = match cli.command {
        Commands::Issue {
            out,
            name,
            bits,
            endpoints,
        } => {
            init_logging("info");
            cmd_issue(&out, &name, bits, &endpoints)
        }
        Commands::Host { config } => load_config(&config).and_then(|c| cmd_host(&c)),
        Commands::Guest { config, text } => {
            load_config(&config).and_then(|c| cmd_guest(&c, &text))
        }
        Commands::Validate { config } => {
            init_logging("info");
            cmd_validate(&config)
        }
    };

    // Handle errors
    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Mints a hierarchy and end-point identities into `out`.
fn cmd_issue(out: &Path, name: &str, bits: usize, endpoints: &[String]) -> anyhow::Result<()> {
    let rooter = Rooter::generate(name, bits).context("generating hierarchy")?;
    rooter.save_authorities(out)?;
    println!("Hierarchy '{}' written to {}", rooter.name(), out.display());
    println!("   Anchor alias: {}", rooter.anchor().alias());

    for endpoint in endpoints {
        let identity = rooter
            .issue_endpoint(endpoint)
            .with_context(|| format!("issuing end-point '{endpoint}'"))?;
        let (cert, key) = identity.save(out, endpoint)?;
        println!();
        println!("End-point '{endpoint}':");
        println!("   Certificate: {}", cert.display());
        println!("   Private key: {}", key.display());
        println!("   Alias:       {}", identity.certificate.alias());
    }
    Ok(())
}

/// Accepts guests forever, one thread per session.
fn cmd_host(config: &NodeConfig) -> anyhow::Result<()> {
    let ctx = build_context(config)?;
    let server = TcpServer::bind(config.network.listen_addr)?;
    info!(addr = %server.local_addr(), "Host ready");

    loop {
        let connection = match server.accept() {
            Ok(connection) => connection,
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "Accept failed, continuing");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let ctx = Arc::clone(&ctx);
        let throttle = throttle(config)?;
        thread::spawn(move || {
            let peer = connection.peer_addr();
            let session = match Session::accept(&ctx, Throttled::new(connection, throttle)) {
                Ok(session) => session,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "Handshake refused");
                    return;
                }
            };
            if let Err(e) = echo(&session) {
                warn!(peer = %peer, error = %e, "Session ended with error");
            }
            if let Err(e) = session.close() {
                warn!(peer = %peer, error = %e, "Close failed");
            }
        });
    }
}

/// Echoes messages until the guest goes away.
fn echo<C: rootlink_transport::Connection>(session: &Session<C>) -> rootlink_node::Result<()> {
    loop {
        let message = match session.read::<Message>() {
            Ok(message) => message,
            Err(NodeError::PeerClosed) => return Ok(()),
            Err(e) => return Err(e),
        };
        info!(peer = %session.peer().certificate.subject(), text = %message.text, "Message received");
        session.write(&[message])?;
        session.flush()?;
    }
}

/// Sends one message and prints the echo.
fn cmd_guest(config: &NodeConfig, text: &str) -> anyhow::Result<()> {
    let ctx = build_context(config)?;
    let session = Session::connect(
        &ctx,
        &config.network.connect_addr,
        config.protocol.charset,
        throttle(config)?,
    )
    .with_context(|| format!("connecting to {}", config.network.connect_addr))?;

    session.write(&[Message::new(text)])?;
    session.flush()?;
    let reply = session.read::<Message>()?;
    println!("{}", reply.text);
    session.close()?;
    Ok(())
}

/// Validates configuration file.
fn cmd_validate(config_path: &Path) -> anyhow::Result<()> {
    let config = NodeConfig::load(config_path)?;

    println!("✅ Configuration is valid");
    println!();
    println!("Network:");
    println!("   Listen:     {}", config.network.listen_addr);
    println!("   Connect:    {}", config.network.connect_addr);
    println!();
    println!("Protocol:");
    println!("   Version:          {}", config.protocol.version);
    println!("   Path Length:      {}", config.protocol.path_length);
    println!("   Step Length:      {}", config.protocol.step_length);
    println!("   Max Step Length:  {}", config.protocol.max_step_length);
    println!("   Charset:          {}", config.protocol.charset.name());
    println!();
    println!("Trust:");
    println!("   Anchor:     {}", config.trust.anchor.display());
    match &config.trust.store {
        Some(store) => println!("   Store:      {}", store.display()),
        None => println!("   Store:      (memory)"),
    }
    println!();

    Ok(())
}

// ============================================
// Helpers
// ============================================

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}

/// Loads the configuration and starts logging at its level.
fn load_config(path: &Path) -> anyhow::Result<NodeConfig> {
    let config = NodeConfig::load(path).inspect_err(|_| init_logging("info"))?;
    init_logging(&config.logging.level);
    Ok(config)
}

fn throttle(config: &NodeConfig) -> anyhow::Result<Throttle> {
    Ok(Throttle::new(
        config.limits.bytes_per_sec,
        config.limits.burst_bytes,
    )?)
}

/// Loads identity and trust files into a shared handshake context.
fn build_context(config: &NodeConfig) -> anyhow::Result<Arc<HandshakeContext>> {
    let identity = IssuedIdentity::load(
        &config.identity.certificate,
        &config.identity.private_key,
        &config.identity.chain,
    )
    .context("loading end-point identity")?;
    let anchor = Certificate::load(&config.trust.anchor).context("loading trust anchor")?;
    let store: Arc<dyn CadastreStore> = match &config.trust.store {
        Some(path) => Arc::new(JsonFileStore::open(path.clone())?),
        None => Arc::new(MemoryStore::new()),
    };
    let trust = Arc::new(TrustEngine::new(anchor, store, config.protocol.path_length)?);
    let ctx = HandshakeContext::new(identity, trust, config.protocol_settings())?;
    info!(
        identity = %ctx.certificate().subject(),
        alias = %ctx.certificate().alias().short(),
        "Node identity loaded"
    );
    Ok(Arc::new(ctx))
}
