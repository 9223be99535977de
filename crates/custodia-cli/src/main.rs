//! Custodia CLI - scripted walkthroughs of the escrow lifecycle
//!
//! Runs the engine against an in-memory ledger and prints every
//! transition, so the state machine can be inspected without writing a
//! host.
//!
//! ```bash
//! custodia happy-path --amount 1000
//! custodia dispute
//! custodia errors
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

use custodia_engine::EscrowEngine;
use custodia_ledger::{EntryReason, InMemoryLedger, LedgerGateway};
use custodia_types::{AgreementId, Amount, PartyId};

/// Custodia - two-party escrow agreements with a neutral arbiter
#[derive(Parser)]
#[command(name = "custodia")]
#[command(version)]
#[command(about = "Walk the escrow agreement lifecycle", long_about = None)]
struct Cli {
    /// Amount the buyer escrows
    #[arg(long, global = true, default_value_t = 1000)]
    amount: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, fund, accept, complete: funds end up with the vendor
    HappyPath,
    /// Create, fund, accept, dispute, refund: funds return to the buyer
    Dispute,
    /// Show the rejection paths: unknown ID, wrong status, wrong caller
    Errors,
}

struct Cast {
    vendor: PartyId,
    buyer: PartyId,
    arbiter: PartyId,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let amount = Amount::new(cli.amount);

    match cli.command {
        Commands::HappyPath => happy_path(amount),
        Commands::Dispute => dispute(amount),
        Commands::Errors => errors(amount),
    }
}

fn stage(amount: Amount) -> Result<(EscrowEngine<InMemoryLedger>, Cast)> {
    let cast = Cast {
        vendor: PartyId::new(),
        buyer: PartyId::new(),
        arbiter: PartyId::new(),
    };

    let mut ledger = InMemoryLedger::new();
    ledger.credit(&cast.buyer, amount, EntryReason::Deposit)?;

    println!("{}", "== cast ==".bold());
    println!("  vendor  {}", cast.vendor.to_string().cyan());
    println!("  buyer   {}  (seeded with {})", cast.buyer.to_string().cyan(), amount);
    println!("  arbiter {}", cast.arbiter.to_string().cyan());

    Ok((EscrowEngine::new(ledger, cast.arbiter.clone()), cast))
}

fn step(engine: &EscrowEngine<InMemoryLedger>, id: AgreementId, label: &str, cast: &Cast) {
    let status = engine
        .get_agreement(id)
        .map(|a| a.status.to_string())
        .unwrap_or_else(|| "?".to_string());
    let held = engine
        .get_escrow_balance(id)
        .map(|b| b.balance.to_string())
        .unwrap_or_else(|| "-".to_string());

    println!(
        "{} {} -> status {}, custody {}, buyer {}, vendor {}",
        "ok".green().bold(),
        label,
        status.yellow(),
        held,
        engine.ledger().balance(&cast.buyer),
        engine.ledger().balance(&cast.vendor),
    );
}

fn happy_path(amount: Amount) -> Result<()> {
    let (mut engine, cast) = stage(amount)?;

    let id = engine.create_agreement(
        &cast.vendor,
        cast.buyer.clone(),
        amount,
        "Logo design".to_string(),
    )?;
    step(&engine, id, "create ", &cast);

    engine.fund_agreement(&cast.buyer, id)?;
    step(&engine, id, "fund   ", &cast);

    engine.accept_agreement(&cast.buyer, id)?;
    step(&engine, id, "accept ", &cast);

    engine.complete_agreement(&cast.buyer, id)?;
    step(&engine, id, "complete", &cast);

    println!("{}", "vendor paid, agreement is a permanent terminal record".bold());
    Ok(())
}

fn dispute(amount: Amount) -> Result<()> {
    let (mut engine, cast) = stage(amount)?;

    let id = engine.create_agreement(
        &cast.vendor,
        cast.buyer.clone(),
        amount,
        "Undelivered order".to_string(),
    )?;
    step(&engine, id, "create ", &cast);

    engine.fund_agreement(&cast.buyer, id)?;
    step(&engine, id, "fund   ", &cast);

    engine.accept_agreement(&cast.buyer, id)?;
    step(&engine, id, "accept ", &cast);

    engine.dispute_agreement(&cast.buyer, id)?;
    step(&engine, id, "dispute", &cast);

    engine.refund_agreement(&cast.arbiter, id)?;
    step(&engine, id, "refund ", &cast);

    println!("{}", "buyer made whole, agreement is a permanent terminal record".bold());
    Ok(())
}

fn errors(amount: Amount) -> Result<()> {
    let (mut engine, cast) = stage(amount)?;
    let outsider = PartyId::new();

    let show = |label: &str, result: custodia_types::Result<bool>| {
        match result {
            Ok(_) => println!("{} {}", "ok".green().bold(), label),
            Err(e) => println!(
                "{} {} -> {} ({})",
                "err".red().bold(),
                label,
                e,
                e.error_code()
            ),
        }
    };

    show(
        "fund before create",
        engine.fund_agreement(&cast.buyer, AgreementId::new(1)),
    );

    let id = engine.create_agreement(
        &cast.vendor,
        cast.buyer.clone(),
        amount,
        "Rejection tour".to_string(),
    )?;

    show("accept before fund", engine.accept_agreement(&cast.buyer, id));
    show("outsider funds", engine.fund_agreement(&outsider, id));
    show("buyer funds", engine.fund_agreement(&cast.buyer, id));
    show("vendor completes", engine.complete_agreement(&cast.vendor, id));
    show("buyer accepts", engine.accept_agreement(&cast.buyer, id));
    show("buyer refunds", engine.refund_agreement(&cast.buyer, id));
    show("buyer disputes", engine.dispute_agreement(&cast.buyer, id));
    show("arbiter refunds", engine.refund_agreement(&cast.arbiter, id));

    Ok(())
}
