use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chronicle",
    about = "Chronicle — append-only, cryptographically verifiable event ledger",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Ledger directory.
    #[arg(short, long, global = true, default_value = ".chronicle")]
    pub dir: String,
}

#[derive(Subcommand)]
pub enum Command {
    /// Walk the hash chain and recheck every entry
    Verify(VerifyArgs),
    /// Show recent entries
    Log(LogArgs),
    /// Show ledger statistics
    Stats(StatsArgs),
    /// Create, list, export, or check anchors
    Anchor(AnchorArgs),
    /// Log a validated correction against an earlier entry
    Correct(CorrectArgs),
    /// Record human sign-off on a correction
    Confirm(ConfirmArgs),
    /// Audit corrections for pending, orphaned, or unrelated findings
    Audit(AuditArgs),
    /// Show warnings recorded during the last reload
    Warnings(WarningsArgs),
}

#[derive(Args)]
pub struct VerifyArgs {}

#[derive(Args)]
pub struct LogArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub full: bool,
}

#[derive(Args)]
pub struct StatsArgs {}

#[derive(Args)]
pub struct AnchorArgs {
    #[command(subcommand)]
    pub action: AnchorAction,
}

#[derive(Subcommand)]
pub enum AnchorAction {
    /// Create a checkpoint over everything appended so far
    Create {
        #[arg(long)]
        reason: String,
    },
    /// List known anchors
    List,
    /// Export an anchor for custody outside the system
    Export { id: String },
    /// Check current ledger content against an anchor
    Check { id: String },
}

#[derive(Args)]
pub struct CorrectArgs {
    /// Sequence of the entry being corrected.
    #[arg(long)]
    pub target: u64,
    /// Correction type: factual, outdated, misattribution, incomplete,
    /// or clarification.
    #[arg(long)]
    pub kind: String,
    #[arg(long)]
    pub notes: String,
    #[arg(long, default_value = "operator")]
    pub context: String,
    /// Append even if relatedness warnings remain.
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ConfirmArgs {
    /// Sequence of the correction entry.
    pub sequence: u64,
    #[arg(long)]
    pub by: String,
}

#[derive(Args)]
pub struct AuditArgs {}

#[derive(Args)]
pub struct WarningsArgs {}
