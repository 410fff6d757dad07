//! custos — audit integrity and analysis CLI
//!
//! Surfaces every ledger and review operation to the hosting application's
//! tooling: sign an event, verify integrity, run the tamper scan, rotate
//! the signing key, archive old logs, and produce compliance reports.
//!
//! Usage:
//!   custos --log-file audit/audit.log record --session sess-1 --tokens 120 --cost 0.02
//!   custos verify
//!   custos tamper --json
//!   custos rotate --resign
//!   custos review --hours 24 --format json --output reports/review.json

use std::path::PathBuf;
use std::process;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use custos_contracts::{CustosResult, Event, EventKind};
use custos_keys::KeyConfig;
use custos_ledger::{Protector, ProtectorOptions};
use custos_review::{
    export_report, generate_json_report, generate_report, ReportFormat, ReviewConfig, Reviewer,
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// custos — tamper-evident audit trail and log review.
#[derive(Parser)]
#[command(
    name = "custos",
    about = "Tamper-evident audit integrity and analysis engine",
    long_about = "Maintains a hash-chained, signed ledger over an append-only audit log,\n\
                  cross-anchored in an independent witness file, and reviews the log\n\
                  for anomalous activity."
)]
struct Cli {
    /// Audit log file; the chain, witness, and key files live next to it.
    #[arg(long, global = true, default_value = "audit/audit.log")]
    log_file: PathBuf,

    /// Keep operating when audit persistence fails instead of halting.
    #[arg(long, global = true)]
    non_strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign one event into the ledger.
    Record {
        /// Event tag, e.g. QUERY, AUTH, CONFIG_CHANGE.
        #[arg(long, default_value = "QUERY")]
        kind: String,
        #[arg(long)]
        session: String,
        #[arg(long)]
        tier: Option<String>,
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = 0)]
        tokens: u64,
        #[arg(long, default_value_t = 0.0)]
        cost: f64,
        /// Marks the event failed with this message.
        #[arg(long)]
        error: Option<String>,
    },
    /// Verify hash-chain integrity.
    Verify,
    /// Full tamper scan: chain, permissions, timestamps, witness.
    Tamper {
        #[arg(long)]
        json: bool,
    },
    /// Cross-check the witness trail against the chain.
    Witness,
    /// Print the current chain head fingerprint.
    Hash,
    /// Rotate the signing key.
    Rotate {
        /// Re-sign the existing chain under the new key.
        #[arg(long)]
        resign: bool,
    },
    /// Restrict permissions on the log, chain, and witness files.
    Protect,
    /// Archive rotated logs older than the retention window.
    Archive {
        /// Days to retain; 0 selects the default retention.
        #[arg(long, default_value_t = 0)]
        retention_days: u32,
    },
    /// Review the audit log for anomalies and produce a report.
    Review {
        /// Window in hours counted back from now (ignored with --start).
        #[arg(long, default_value_t = 24)]
        hours: u32,
        /// Window start as RFC3339.
        #[arg(long)]
        start: Option<String>,
        /// Window end as RFC3339 (defaults to now).
        #[arg(long)]
        end: Option<String>,
        /// Report format: text or json.
        #[arg(long, default_value = "text")]
        format: String,
        /// Write the report to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
        /// TOML file overriding review thresholds.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Structured logging. Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(clean) => {
            if !clean {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("custos error: {}", e);
            process::exit(1);
        }
    }
}

/// Dispatch one subcommand. Returns `Ok(false)` when the command ran but
/// surfaced findings the caller should treat as a failure (e.g. a broken
/// chain).
fn run(cli: Cli) -> CustosResult<bool> {
    let key_config = KeyConfig::from_env();
    let options = ProtectorOptions {
        strict: !cli.non_strict,
        ..ProtectorOptions::strict()
    };

    match cli.command {
        Command::Record {
            kind,
            session,
            tier,
            query,
            tokens,
            cost,
            error,
        } => {
            let protector = Protector::new(&cli.log_file, &key_config, options)?;

            let mut event = Event::new(EventKind::from(kind.as_str()), session);
            event.tier = tier;
            event.query = query;
            event.tokens = tokens;
            event.cost = cost;
            if let Some(message) = error {
                event = event.with_error(message);
            }

            protector.sign_log_entry(&event)?;
            println!(
                "signed entry {} ({})",
                protector.chain_length() - 1,
                protector.chain_head().unwrap_or_default()
            );
            Ok(true)
        }

        Command::Verify => {
            let protector = Protector::new(&cli.log_file, &key_config, options)?;
            let check = protector.verify_log_integrity();
            if check.valid {
                println!("chain valid: {} entries", protector.chain_length());
            } else {
                println!("chain INVALID:");
                for issue in &check.issues {
                    println!("  - {}", issue);
                }
            }
            Ok(check.valid)
        }

        Command::Tamper { json } => {
            let protector = Protector::new(&cli.log_file, &key_config, options)?;
            let report = protector.detect_tampering();
            if json {
                println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
            } else {
                println!("verified:     {}", report.verified);
                println!("chain length: {}", report.chain_length);
                for issue in &report.issues {
                    println!("issue:        {}", issue);
                }
                for issue in &report.permission_issues {
                    println!("permissions:  {}", issue);
                }
                for issue in &report.timestamp_anomalies {
                    println!("timestamps:   {}", issue);
                }
            }
            Ok(report.verified)
        }

        Command::Witness => {
            let protector = Protector::new(&cli.log_file, &key_config, options)?;
            let check = protector.verify_witness();
            if check.valid {
                println!("witness consistent with chain");
            } else {
                println!("witness INCONSISTENT:");
                for issue in &check.issues {
                    println!("  - {}", issue);
                }
            }
            Ok(check.valid)
        }

        Command::Hash => {
            let protector = Protector::new(&cli.log_file, &key_config, options)?;
            match protector.chain_head() {
                Some(hash) => println!("{}", hash),
                None => println!("(empty chain)"),
            }
            Ok(true)
        }

        Command::Rotate { resign } => {
            let protector = Protector::new(&cli.log_file, &key_config, options)?;
            let result = protector.rotate_key(resign)?;
            println!(
                "key rotated: {} -> {} ({} entries re-signed)",
                result.old_fingerprint, result.new_fingerprint, result.entries_resigned
            );
            Ok(true)
        }

        Command::Protect => {
            let protector = Protector::new(&cli.log_file, &key_config, options)?;
            protector.protect_files()?;
            println!("audit file permissions restricted");
            Ok(true)
        }

        Command::Archive { retention_days } => {
            let protector = Protector::new(&cli.log_file, &key_config, options)?;
            let archived = protector.archive_logs(retention_days)?;
            println!("archived {} rotated log file(s)", archived);
            Ok(true)
        }

        Command::Review {
            hours,
            start,
            end,
            format,
            output,
            config,
        } => {
            let review_config = match config {
                Some(path) => ReviewConfig::from_file(&path)?,
                None => ReviewConfig::default(),
            };
            let reviewer = Reviewer::new(&cli.log_file, review_config);

            let window_end = match end {
                Some(raw) => parse_rfc3339(&raw)?,
                None => Utc::now(),
            };
            let result = match start {
                Some(raw) => reviewer.review_range(parse_rfc3339(&raw)?, window_end)?,
                None => reviewer
                    .review_range(window_end - chrono::Duration::hours(i64::from(hours)), window_end)?,
            };

            let format: ReportFormat = format
                .parse()
                .map_err(|reason| custos_contracts::CustosError::Config { reason })?;

            match output {
                Some(path) => {
                    export_report(&result, &path, format)?;
                    println!("report written to {}", path.display());
                }
                None => match format {
                    ReportFormat::Text => print!("{}", generate_report(&result)),
                    ReportFormat::Json => println!("{}", generate_json_report(&result)?),
                },
            }
            Ok(true)
        }
    }
}

fn parse_rfc3339(raw: &str) -> CustosResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| custos_contracts::CustosError::Config {
            reason: format!("invalid RFC3339 timestamp '{}': {}", raw, e),
        })
}
