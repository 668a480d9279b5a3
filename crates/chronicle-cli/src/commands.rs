use anyhow::Context;
use colored::Colorize;

use chronicle_ledger::Ledger;
use chronicle_query::{render, LedgerStats};
use chronicle_types::{Actor, AnchorId, ContextId, CorrectionType};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut ledger = Ledger::open(&cli.dir)
        .with_context(|| format!("opening ledger at {}", cli.dir))?;

    match cli.command {
        Command::Verify(_) => cmd_verify(&ledger),
        Command::Log(args) => cmd_log(&ledger, args),
        Command::Stats(_) => cmd_stats(&ledger),
        Command::Anchor(args) => cmd_anchor(&mut ledger, args),
        Command::Correct(args) => cmd_correct(&mut ledger, args),
        Command::Confirm(args) => cmd_confirm(&mut ledger, args),
        Command::Audit(_) => cmd_audit(&ledger),
        Command::Warnings(_) => cmd_warnings(&ledger),
    }
}

fn cmd_verify(ledger: &Ledger) -> anyhow::Result<()> {
    let report = ledger.verify_chain();
    if report.is_valid() {
        println!(
            "{} chain valid ({} entries)",
            "✓".green().bold(),
            report.checked
        );
        Ok(())
    } else {
        print!("{}", render::render_chain_report(&report).red());
        anyhow::bail!(
            "chain verification failed at entry {}",
            report.first_violation().unwrap_or(0)
        );
    }
}

fn cmd_log(ledger: &Ledger, args: LogArgs) -> anyhow::Result<()> {
    let entries = ledger.entries();
    let start = entries.len().saturating_sub(args.limit);
    for entry in &entries[start..] {
        if args.full {
            print!("{}", render::render_entry(entry));
        } else {
            println!("{}", render::entry_line(entry));
        }
    }
    if entries.is_empty() {
        println!("(empty ledger)");
    }
    Ok(())
}

fn cmd_stats(ledger: &Ledger) -> anyhow::Result<()> {
    let stats = LedgerStats::compute(ledger.entries());
    println!("{} entries", stats.total_entries.to_string().bold());
    for (event_type, count) in &stats.entries_by_type {
        println!("  {event_type}: {count}");
    }
    if let Some(avg) = stats.average_confidence {
        println!("average confidence: {}", format!("{avg:.2}").cyan());
        println!("confidence histogram: {:?}", stats.confidence_histogram);
    }
    if !stats.uncertainty_flags.is_empty() {
        println!("uncertainty flags:");
        for (flag, count) in &stats.uncertainty_flags {
            println!("  {flag}: {count}");
        }
    }
    println!(
        "correction rate: {}",
        format!("{:.3}", stats.correction_rate).yellow()
    );
    for (kind, count) in &stats.corrections_by_type {
        println!("  {kind}: {count}");
    }
    if !stats.most_active_contexts.is_empty() {
        println!("most active contexts:");
        for (context, count) in stats.most_active_contexts.iter().take(5) {
            println!("  {context}: {count}");
        }
    }
    Ok(())
}

fn cmd_anchor(ledger: &mut Ledger, args: AnchorArgs) -> anyhow::Result<()> {
    match args.action {
        AnchorAction::Create { reason } => {
            let anchor = ledger.create_anchor(&reason)?;
            println!(
                "{} anchor {} over {}",
                "✓".green().bold(),
                anchor.anchor_id.to_string().yellow(),
                anchor.sequence_range
            );
            Ok(())
        }
        AnchorAction::List => {
            if ledger.anchors().is_empty() {
                println!("No anchors.");
            }
            for anchor in ledger.anchors() {
                print!("{}", render::render_anchor(anchor));
            }
            Ok(())
        }
        AnchorAction::Export { id } => {
            let id = parse_anchor_id(&id)?;
            println!("{}", ledger.export_anchor(&id)?);
            Ok(())
        }
        AnchorAction::Check { id } => {
            let id = parse_anchor_id(&id)?;
            let anchor = ledger
                .anchor_by_id(&id)
                .with_context(|| format!("unknown anchor {id}"))?
                .clone();
            let check = ledger.verify_against_anchor(&anchor)?;
            if check.matches {
                print!("{}", render::render_anchor_check(&check).green());
                Ok(())
            } else {
                print!("{}", render::render_anchor_check(&check).red());
                anyhow::bail!("anchor check failed");
            }
        }
    }
}

fn cmd_correct(ledger: &mut Ledger, args: CorrectArgs) -> anyhow::Result<()> {
    let kind: CorrectionType = args
        .kind
        .parse()
        .with_context(|| format!("unrecognized correction type {}", args.kind))?;
    let context = ContextId::new(args.context);

    let entry = if args.force {
        ledger.log_correction_forced(context, Actor::Human, args.target, kind, &args.notes)?
    } else {
        ledger.log_correction(context, Actor::Human, args.target, kind, &args.notes)?
    };
    println!(
        "{} correction #{} against #{} ({})",
        "✓".green().bold(),
        entry.sequence,
        args.target,
        kind.to_string().cyan()
    );
    Ok(())
}

fn cmd_confirm(ledger: &mut Ledger, args: ConfirmArgs) -> anyhow::Result<()> {
    let entry = ledger.confirm_correction(args.sequence, &args.by)?;
    println!(
        "{} correction #{} confirmed by {} (entry #{})",
        "✓".green().bold(),
        args.sequence,
        args.by.bold(),
        entry.sequence
    );
    Ok(())
}

fn cmd_audit(ledger: &Ledger) -> anyhow::Result<()> {
    let findings = ledger.audit_corrections();
    if findings.is_empty() {
        println!("{} no correction findings", "✓".green().bold());
        return Ok(());
    }
    for finding in &findings {
        println!(
            "{} correction #{} → #{}: {:?} — {}",
            "!".yellow().bold(),
            finding.sequence,
            finding.target_sequence,
            finding.kind,
            finding.detail
        );
    }
    Ok(())
}

fn cmd_warnings(ledger: &Ledger) -> anyhow::Result<()> {
    if ledger.load_warnings().is_empty() {
        println!("{} clean reload, no warnings", "✓".green().bold());
        return Ok(());
    }
    for warning in ledger.load_warnings() {
        println!("{} {}", "!".yellow().bold(), warning);
    }
    Ok(())
}

fn parse_anchor_id(s: &str) -> anyhow::Result<AnchorId> {
    AnchorId::parse(s).with_context(|| format!("invalid anchor id {s}"))
}
