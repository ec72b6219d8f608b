use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use shieldpost_core::{
    Balance, Contact, CoreError, DispatchSummary, ReconcileOutcome, ReconciliationResult,
    RevocationSummary,
};
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;
use crate::config::ProfileConfig;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Follow-up hint for a failed command. Input and configuration mistakes
/// explain themselves; failures talking to a service point at the debug log.
pub fn error_hint(err: &anyhow::Error, verbose: bool) -> Option<&'static str> {
    let core = err.downcast_ref::<CoreError>()?;
    if core.is_client_error() || verbose {
        return None;
    }
    Some("Re-run with --verbose (or RUST_LOG=debug) for the full log")
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_table(builder: Builder) {
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}

pub fn print_reconciliation(result: &ReconciliationResult, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(result);
    }

    let message = match result.outcome {
        ReconcileOutcome::AlreadySubscribed => "Already subscribed",
        ReconcileOutcome::GrantedToExisting => "Granted access to existing protected data",
        ReconcileOutcome::CreatedAndGranted => "Protected new data and granted access",
    };
    print_success(message);
    println!("{}: {}", "Protected data".cyan(), result.dataset);
    if let Some(grant) = &result.grant {
        println!("{}: {}", "Grant".cyan(), grant.id);
        println!("{}: {}", "App".cyan(), grant.authorized_app);
        println!("{}: {}", "User".cyan(), grant.authorized_user);
        println!(
            "{}: {}",
            "Price per access".cyan(),
            grant.price_per_access.to_token_string()
        );
        println!("{}: {}", "Accesses".cyan(), grant.remaining_access);
    }
    Ok(())
}

pub fn print_revocation(summary: &RevocationSummary, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(summary);
    }

    let mut builder = Builder::default();
    builder.push_record(["Scanned", "Found", "Revoked", "Failed", "Lookups failed"]);
    builder.push_record([
        summary.resources_scanned.to_string(),
        summary.grants_found.to_string(),
        summary.grants_revoked.to_string(),
        summary.grants_failed.to_string(),
        summary.lookups_failed.to_string(),
    ]);
    print_table(builder);

    if summary.grants_found == 0 {
        println!("No grants to revoke.");
    } else if summary.grants_failed == 0 && summary.lookups_failed == 0 {
        print_success(&format!("Revoked {} grant(s)", summary.grants_revoked));
    } else {
        print_warning(&format!(
            "Revoked {} of {} grant(s); see log for failures",
            summary.grants_revoked, summary.grants_found
        ));
    }
    Ok(())
}

pub fn print_dispatch_summary(summary: &DispatchSummary, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(summary);
    }

    let mut builder = Builder::default();
    builder.push_record(["Contact", "Status", "Task / Reason", "Elapsed"]);
    for result in &summary.results {
        let (status, detail) = match result.outcome.task_id() {
            Some(task) => ("sent".green().to_string(), task.to_string()),
            None => (
                "failed".red().to_string(),
                result.outcome.failure_reason().unwrap_or("-").to_string(),
            ),
        };
        builder.push_record([
            result.target.clone(),
            status,
            detail,
            format!("{} ms", result.elapsed.as_millis()),
        ]);
    }
    print_table(builder);

    println!(
        "Total: {}  Succeeded: {}  Failed: {} ({} timed out)",
        summary.total,
        summary.succeeded,
        summary.failed,
        summary.timed_out()
    );
    println!(
        "Elapsed min/avg/max: {}/{}/{} ms  Wall: {} ms",
        summary.min_elapsed.as_millis(),
        summary.avg_elapsed.as_millis(),
        summary.max_elapsed.as_millis(),
        summary.total_elapsed.as_millis()
    );
    Ok(())
}

pub fn print_contacts(contacts: &[Contact], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(contacts);
    }
    if contacts.is_empty() {
        println!("No contacts found.");
        return Ok(());
    }

    let mut builder = Builder::default();
    builder.push_record(["Protected data", "Owner", "Accessible since"]);
    for contact in contacts {
        builder.push_record([
            contact.address.clone(),
            contact.owner.clone().unwrap_or_else(|| "-".to_string()),
            contact
                .accessible_since
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    print_table(builder);
    println!("Total: {}", contacts.len());
    Ok(())
}

pub fn print_balance(address: &str, balance: &Balance, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "address": address,
            "stake": balance.stake,
            "locked": balance.locked,
        }));
    }

    println!("{}: {}", "Wallet".cyan(), address);
    println!("{}: {}", "Stake".cyan(), balance.stake.to_token_string());
    println!("{}: {}", "Locked".cyan(), balance.locked.to_token_string());
    Ok(())
}

pub fn print_config(profile: &str, config: &ProfileConfig) {
    println!("{}: {}", "Profile".cyan(), profile);
    for (key, value) in config.entries() {
        println!(
            "{}: {}",
            key.cyan(),
            value.as_deref().unwrap_or("(not set)")
        );
    }
}
