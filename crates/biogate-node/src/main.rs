//! BIOGATE node
//!
//! Command-line access to the integrity subsystem: key generation, proof
//! generation and verification, anomaly analysis and commitments, plus a
//! daemon mode that runs the integrity service's housekeeping loop.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

use biogate_anomaly::{analyze_readings, AnomalyConfig};
use biogate_core::{IntegrityConfig, IntegrityService, StaticDirectory};
use biogate_crypto::{PublicKey, SigningKeyPair};
use biogate_proof::{commit, AggregateProof, Commitment, CommitmentKind, ProofEngine};
use biogate_protocol::{now_ms, Reading};
use biogate_reputation::{
    ExclusionReason, PartitionAlert, PeerId, ReputationEvent, TransportCommands,
};

/// BIOGATE integrity node
#[derive(Parser, Debug)]
#[command(name = "biogate-node")]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, env = "BIOGATE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "BIOGATE_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Log format (plain, json)
    #[arg(long, env = "BIOGATE_LOG_FORMAT", default_value = "plain", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a signing key
    Keygen {
        /// Write the secret key here as hex
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Generate a proof from a JSON array of readings
    Prove {
        /// Secret key file
        #[arg(short, long, env = "BIOGATE_KEY_FILE")]
        key: PathBuf,
        /// Readings file
        #[arg(short, long)]
        readings: PathBuf,
    },
    /// Verify a proof file
    Verify {
        /// Proof file
        #[arg(short, long)]
        proof: PathBuf,
        /// Signer public key as hex
        #[arg(long)]
        public_key: String,
        /// Verification time, defaults to now
        #[arg(long)]
        now_ms: Option<u64>,
    },
    /// Score a reading history for anomalies
    Analyze {
        /// Readings file
        #[arg(short, long)]
        readings: PathBuf,
        /// Validator the readings belong to
        #[arg(long, default_value = "local")]
        validator: String,
    },
    /// Commit to a value
    Commit {
        /// What the value is
        #[arg(long, value_enum)]
        kind: KindArg,
        /// The value
        #[arg(long)]
        value: f64,
        /// Who it belongs to
        #[arg(long)]
        subject: String,
    },
    /// Check a value against a commitment file
    Open {
        /// Commitment file
        #[arg(long)]
        commitment: PathBuf,
        /// Claimed value
        #[arg(long)]
        value: f64,
    },
    /// Run the integrity service until interrupted
    Serve {
        /// Housekeeping interval in milliseconds
        #[arg(long, env = "BIOGATE_TICK_MS", default_value = "1000")]
        tick_ms: u64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Emotional,
    Authenticity,
    Eligibility,
}

impl From<KindArg> for CommitmentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Emotional => CommitmentKind::Emotional,
            KindArg::Authenticity => CommitmentKind::Authenticity,
            KindArg::Eligibility => CommitmentKind::ConsensusEligibility,
        }
    }
}

fn setup_logging(log_level: &str, log_format: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    match log_format.to_lowercase().as_str() {
        "json" => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
        _ => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<IntegrityConfig> {
    let config = match path {
        Some(path) => IntegrityConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => IntegrityConfig::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_key(path: &Path) -> Result<SigningKeyPair> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read key file {}", path.display()))?;
    let bytes = hex::decode(text.trim()).context("Key file is not hex")?;
    SigningKeyPair::from_secret_bytes(&bytes).context("Invalid secret key")
}

fn load_readings(path: &Path) -> Result<Vec<Reading>> {
    let readings: Vec<Reading> = read_json(path)?;
    for (i, reading) in readings.iter().enumerate() {
        reading
            .validate()
            .with_context(|| format!("Reading {i} is invalid"))?;
    }
    Ok(readings)
}

#[derive(Serialize)]
struct KeyInfo {
    public_key: String,
    address: String,
}

#[derive(Serialize)]
struct VerifyOutcome {
    valid: bool,
    reason: Option<&'static str>,
}

fn keygen(out: &Path) -> Result<()> {
    if out.exists() {
        bail!("Refusing to overwrite {}", out.display());
    }
    let key = SigningKeyPair::generate();
    std::fs::write(out, hex::encode(&key.secret_bytes()[..]))
        .with_context(|| format!("Failed to write {}", out.display()))?;
    info!(path = %out.display(), "Secret key written");
    print_json(&KeyInfo {
        public_key: key.public_key().to_hex(),
        address: key.address().to_string(),
    })
}

fn prove(config: &IntegrityConfig, key: &Path, readings: &Path) -> Result<()> {
    let key = load_key(key)?;
    let readings = load_readings(readings)?;
    let engine = ProofEngine::new(config.proof.clone());
    let proof = engine
        .generate_proof(&readings, &key)
        .context("Proof generation failed")?;
    info!(
        readings = readings.len(),
        emotional_score = proof.emotional_score,
        authenticity = proof.authenticity,
        "Proof generated"
    );
    print_json(&proof)
}

fn verify(config: &IntegrityConfig, proof: &Path, public_key: &str, now: Option<u64>) -> Result<bool> {
    let proof: AggregateProof = read_json(proof)?;
    let public_key = PublicKey::from_hex(public_key).context("Invalid public key")?;
    let engine = ProofEngine::new(config.proof.clone());
    let outcome = match engine.check(&proof, &public_key, now.unwrap_or_else(now_ms)) {
        Ok(()) => VerifyOutcome {
            valid: true,
            reason: None,
        },
        Err(rejection) => {
            warn!(rejection = ?rejection, "Proof rejected");
            VerifyOutcome {
                valid: false,
                reason: Some(rejection.reason().code()),
            }
        }
    };
    print_json(&outcome)?;
    Ok(outcome.valid)
}

fn analyze(config: &AnomalyConfig, readings: &Path, validator: &str) -> Result<()> {
    let readings = load_readings(readings)?;
    let verdict = analyze_readings(validator, &readings, config);
    info!(
        validator,
        severity = ?verdict.severity,
        action = %verdict.action,
        "Analysis complete"
    );
    print_json(&verdict)
}

fn open(commitment: &Path, value: f64) -> Result<bool> {
    let commitment: Commitment = read_json(commitment)?;
    let matches = commitment.verify(value, &commitment.subject_id, commitment.timestamp_ms);
    print_json(&serde_json::json!({ "valid": matches }))?;
    Ok(matches)
}

/// Transport stand-in for daemon mode: logs what a transport would do.
struct LoggingTransport;

impl TransportCommands for LoggingTransport {
    fn disconnect(&self, peer: &PeerId, reason: ExclusionReason) {
        warn!(peer = %peer, reason = %reason, "Disconnect requested");
    }

    fn broadcast_partition_alert(&self, alert: &PartitionAlert) {
        warn!(
            affected = alert.affected,
            total = alert.total,
            "Partition alert broadcast requested"
        );
    }
}

async fn serve(config: IntegrityConfig, tick_ms: u64) -> Result<()> {
    if tick_ms == 0 {
        bail!("tick_ms must be greater than zero");
    }
    let service = Arc::new(
        IntegrityService::new(
            config,
            Arc::new(StaticDirectory::new()),
            Arc::new(LoggingTransport),
        )
        .context("Failed to start integrity service")?,
    );

    let mut events = service
        .reputation()
        .subscribe()
        .context("Event receiver already taken")?;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ReputationEvent::PartitionAlert(alert) => {
                    warn!(fraction = alert.fraction(), "Partition suspected");
                }
                other => info!(event = ?other, "Reputation event"),
            }
        }
    });

    let ticker = Arc::clone(&service);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
        loop {
            interval.tick().await;
            ticker.tick(now_ms());
        }
    });

    info!(tick_ms, "Integrity service running, press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!(
        peers = service.reputation().peer_count(),
        tracked_nonces = service.replay_guard().len(),
        "Shutting down"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    setup_logging(&args.log_level, &args.log_format)?;
    let config = load_config(args.config.as_deref())?;

    let ok = match args.command {
        Command::Keygen { out } => keygen(&out).map(|()| true)?,
        Command::Prove { key, readings } => prove(&config, &key, &readings).map(|()| true)?,
        Command::Verify {
            proof,
            public_key,
            now_ms,
        } => verify(&config, &proof, &public_key, now_ms)?,
        Command::Analyze {
            readings,
            validator,
        } => analyze(&config.anomaly, &readings, &validator).map(|()| true)?,
        Command::Commit {
            kind,
            value,
            subject,
        } => {
            let commitment = commit(kind.into(), value, &subject, now_ms(), None)
                .context("Commitment failed")?;
            print_json(&commitment)?;
            true
        }
        Command::Open { commitment, value } => open(&commitment, value)?,
        Command::Serve { tick_ms } => serve(config, tick_ms).await.map(|()| true)?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
