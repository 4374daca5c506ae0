//! Skillgate CLI
//!
//! Prints one status string on the first line of stdout, `key: value`
//! details after it, and exits with the status's code. Logs go to stderr.

use clap::{Parser, Subcommand};
use skillgate::outcome::format_duration;
use skillgate::{
    ResolveOptions, ResolvedKey, SignatureVerdict, SkillgateConfig, SkillgateError,
    ValidationOutcome, ValidationReport, Validator,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "skillgate", version)]
#[command(about = "Validate signed skill licenses")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a license artifact's signature and expiry
    Validate {
        /// Path to the license artifact (JSON with a `token` field)
        artifact: PathBuf,
    },

    /// Verify a token's signature only
    VerifySignature {
        /// Compact signed token
        token: String,
    },

    /// Verify and evaluate expiry using cached keys only
    CheckExpiry {
        /// Path to the license artifact
        artifact: PathBuf,
    },

    /// Resolve and print a public key
    GetPublicKey {
        /// Key identifier
        key_id: String,

        /// Fetch from the registry even if the cached key is fresh
        #[arg(long, conflicts_with = "offline")]
        refresh: bool,

        /// Never contact the registry
        #[arg(long)]
        offline: bool,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env("SKILLGATE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let validator = match SkillgateConfig::from_env().and_then(Validator::new) {
        Ok(v) => v,
        Err(e) => {
            let outcome = ValidationOutcome::TransientError;
            println!("{}", outcome.status());
            println!("error: {}", e);
            return exit(outcome.exit_code());
        }
    };

    let code = match cli.command {
        Command::Validate { artifact } => print_report(&validator.validate(&artifact)),
        Command::CheckExpiry { artifact } => print_report(&validator.check_expiry(&artifact)),
        Command::VerifySignature { token } => print_signature(validator.check_signature(&token)),
        Command::GetPublicKey {
            key_id,
            refresh,
            offline,
        } => {
            let options = ResolveOptions {
                force_refresh: refresh,
                offline_only: offline,
            };
            print_key(validator.get_public_key(&key_id, options))
        }
    };

    exit(code)
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(5))
}

fn print_report(report: &ValidationReport) -> i32 {
    println!("{}", report.outcome.status());

    match report.outcome {
        ValidationOutcome::Valid { remaining } | ValidationOutcome::Grace { remaining } => {
            println!("remaining: {}", format_duration(remaining));
        }
        ValidationOutcome::Expired { since } => {
            println!("expired_for: {}", format_duration(since));
        }
        _ => {}
    }

    if let Some(claims) = &report.claims {
        if let Some(skill) = &claims.skill {
            println!("skill: {}", skill);
        }
        println!("tier: {}", claims.tier);
        println!("expires_at: {}", claims.exp.to_rfc3339());
    }
    if let Some(origin) = report.key_origin {
        println!("key_origin: {}", origin);
    }
    if let Some(detail) = &report.detail {
        println!("detail: {}", detail);
    }

    report.exit_code()
}

fn print_signature(result: Result<ResolvedKey, SkillgateError>) -> i32 {
    match result {
        Ok(resolved) => {
            let verdict = SignatureVerdict::Verified;
            println!("{}", verdict.status());
            println!("key_id: {}", resolved.record.key_id);
            println!("key_origin: {}", resolved.origin);
            verdict.exit_code()
        }
        Err(e) => {
            let verdict = SignatureVerdict::from_error(&e);
            println!("{}", verdict.status());
            println!("detail: {}", e);
            verdict.exit_code()
        }
    }
}

fn print_key(result: Result<ResolvedKey, SkillgateError>) -> i32 {
    match result {
        Ok(resolved) => {
            let record = &resolved.record;
            println!("KEY_AVAILABLE");
            println!("key_id: {}", record.key_id);
            println!("algorithm: {}", record.algorithm);
            println!("fingerprint: {}", record.fingerprint);
            println!("fetched_at: {}", record.fetched_at.to_rfc3339());
            if let Some(expires_at) = record.expires_at {
                println!("expires_at: {}", expires_at.to_rfc3339());
            }
            println!("key_origin: {}", resolved.origin);
            print!("{}", record.pem_material);
            if !record.pem_material.ends_with('\n') {
                println!();
            }
            0
        }
        Err(e) => {
            println!("KEY_UNAVAILABLE");
            println!("detail: {}", e);
            5
        }
    }
}
