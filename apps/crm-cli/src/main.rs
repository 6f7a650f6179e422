//! # crm-cli
//!
//! Command-line interface for the training sales pipeline.
//!
//! - `crm board` - kanban view, one section per status
//! - `crm move <id> <status>` - drag a card to another column
//! - `crm status <id> <status>` - list-view stage change, asks first
//! - `crm new` / `crm show <id>` - create and inspect opportunities
//! - `crm task add/cycle/list` - follow-up tasks on an opportunity
//! - `crm handoff` - won deals ready for operations
//! - `crm requests` - customers waiting for a training date
//! - `crm mine --owner <id>` - one sales owner's deals and active count
//!
//! Moving a multi-topic opportunity to `won` asks which topics were sold;
//! answer with `--won 0,2`, `--cancel`, or interactively.

mod commands;
mod config;
mod snapshot;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use crm_pipeline::{Currency, OpportunityStatus, PriceUnit, TrainingDetail};
use tracing_subscriber::EnvFilter;

use commands::opportunity::{
    parse_amount, parse_currency, parse_price_unit, parse_topic, NewArgs,
};
use commands::stage::{parse_status, SplitChoice};
use config::CrmConfig;

/// Training sales pipeline: board, moves, win splits and tasks.
#[derive(Parser)]
#[command(name = "crm", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the pipeline board.
    Board,
    /// Move an opportunity to another column.
    Move {
        /// Opportunity ID.
        id: String,
        /// Target status (e.g., "proposal_discussed", "won").
        #[arg(value_parser = parse_status)]
        status: OpportunityStatus,
        /// Topic numbers that were won when winning a bundle (e.g., "0,2").
        #[arg(long, value_delimiter = ',')]
        won: Option<Vec<usize>>,
        /// Dismiss the win confirmation instead of answering it.
        #[arg(long, conflicts_with = "won")]
        cancel: bool,
    },
    /// Change an opportunity's status after a confirmation prompt.
    Status {
        /// Opportunity ID.
        id: String,
        /// Target status.
        #[arg(value_parser = parse_status)]
        status: OpportunityStatus,
        /// Skip the confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Create a new opportunity in "proposal sent".
    New {
        /// Customer ID.
        #[arg(long)]
        customer_id: String,
        /// Customer display name.
        #[arg(long)]
        customer: String,
        /// Training topic with price, repeatable (e.g., "Leadership=1500").
        #[arg(long = "topic", value_parser = parse_topic, required = true)]
        topics: Vec<TrainingDetail>,
        /// Sales owner ID.
        #[arg(long)]
        owner: Option<String>,
        /// Currency: TL, USD or EUR.
        #[arg(long, value_parser = parse_currency, default_value = "TL")]
        currency: Currency,
        /// Price unit: total, daily or hourly.
        #[arg(long, value_parser = parse_price_unit, default_value = "daily")]
        unit: PriceUnit,
        /// Quoted amount (defaults to the sum of topic prices).
        #[arg(long, value_parser = parse_amount)]
        amount: Option<f64>,
        /// Free-form description.
        #[arg(long, default_value = "")]
        description: String,
        /// Requested training date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Estimated close date (YYYY-MM-DD).
        #[arg(long)]
        close_date: Option<NaiveDate>,
    },
    /// Show details for an opportunity.
    Show {
        /// Opportunity ID.
        id: String,
    },
    /// Manage follow-up tasks.
    Task {
        #[command(subcommand)]
        command: commands::task::TaskCommands,
    },
    /// List won opportunities for the operations team.
    Handoff {
        /// Match customer name or topic (case-insensitive).
        #[arg(long, default_value = "")]
        search: String,
    },
    /// List opportunities with requested training dates.
    Requests,
    /// List the opportunities owned by one sales owner.
    Mine {
        /// Sales owner ID.
        #[arg(long)]
        owner: String,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they don't mix with command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("crm_pipeline=info".parse()?)
                .add_directive("crm=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config = CrmConfig::load(&project_root)?;

    match cli.command {
        Commands::Board => commands::board::execute(&config),
        Commands::Move {
            id,
            status,
            won,
            cancel,
        } => commands::stage::execute_move(
            &config,
            &id,
            status,
            SplitChoice::from_flags(won.as_deref(), cancel),
        ),
        Commands::Status { id, status, yes } => {
            commands::stage::execute_status(&config, &id, status, yes)
        }
        Commands::New {
            customer_id,
            customer,
            topics,
            owner,
            currency,
            unit,
            amount,
            description,
            date,
            close_date,
        } => commands::opportunity::execute_new(
            &config,
            NewArgs {
                customer_id,
                customer_name: customer,
                owner_id: owner,
                topics,
                currency,
                price_unit: unit,
                amount,
                description,
                requested_date: date,
                close_date,
            },
        ),
        Commands::Show { id } => commands::opportunity::execute_show(&config, &id),
        Commands::Task { command } => commands::task::execute(&command, &config),
        Commands::Handoff { search } => commands::opportunity::execute_handoff(&config, &search),
        Commands::Requests => commands::opportunity::execute_requests(&config),
        Commands::Mine { owner } => commands::opportunity::execute_mine(&config, &owner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn move_with_won_list() {
        let cli = Cli::try_parse_from(["crm", "move", "FRS-1", "won", "--won", "0,2"]).unwrap();
        let Commands::Move {
            status, won, cancel, ..
        } = cli.command
        else {
            panic!("expected move");
        };
        assert_eq!(status, OpportunityStatus::Won);
        assert_eq!(won, Some(vec![0, 2]));
        assert!(!cancel);
    }

    #[test]
    fn won_and_cancel_conflict() {
        let parsed = Cli::try_parse_from(["crm", "move", "FRS-1", "won", "--won", "0", "--cancel"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn unknown_status_rejected() {
        assert!(Cli::try_parse_from(["crm", "move", "FRS-1", "archived"]).is_err());
    }

    #[test]
    fn new_requires_a_topic() {
        assert!(
            Cli::try_parse_from(["crm", "new", "--customer-id", "C1", "--customer", "Acme"]).is_err()
        );
        let cli = Cli::try_parse_from([
            "crm",
            "new",
            "--customer-id",
            "C1",
            "--customer",
            "Acme",
            "--topic",
            "Leadership=1500",
            "--topic",
            "Coaching=800",
            "--currency",
            "usd",
        ])
        .unwrap();
        let Commands::New {
            topics, currency, unit, ..
        } = cli.command
        else {
            panic!("expected new");
        };
        assert_eq!(topics.len(), 2);
        assert_eq!(currency, Currency::Usd);
        assert_eq!(unit, PriceUnit::Daily);
    }

    #[test]
    fn amount_must_be_non_negative_and_finite() {
        let base = ["crm", "new", "--customer-id", "C1", "--customer", "Acme", "--topic", "Excel"];
        for bad in ["--amount=-5", "--amount=NaN", "--amount=inf"] {
            let args = base.iter().copied().chain([bad]);
            assert!(Cli::try_parse_from(args).is_err(), "{bad} should be rejected");
        }
        let args = base.iter().copied().chain(["--amount", "1200"]);
        let Commands::New { amount, .. } = Cli::try_parse_from(args).unwrap().command else {
            panic!("expected new");
        };
        assert_eq!(amount, Some(1200.0));
    }

    #[test]
    fn new_accepts_close_date() {
        let cli = Cli::try_parse_from([
            "crm",
            "new",
            "--customer-id",
            "C1",
            "--customer",
            "Acme",
            "--topic",
            "Excel",
            "--close-date",
            "2026-12-15",
        ])
        .unwrap();
        let Commands::New { close_date, .. } = cli.command else {
            panic!("expected new");
        };
        assert_eq!(close_date, NaiveDate::from_ymd_opt(2026, 12, 15));
    }

    #[test]
    fn list_views_parse() {
        let cli = Cli::try_parse_from(["crm", "mine", "--owner", "USR-12"]).unwrap();
        assert!(matches!(cli.command, Commands::Mine { owner } if owner == "USR-12"));
        assert!(Cli::try_parse_from(["crm", "mine"]).is_err());
        assert!(matches!(
            Cli::try_parse_from(["crm", "requests"]).unwrap().command,
            Commands::Requests
        ));
    }
}
