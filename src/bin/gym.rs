//! Command-line front end for the gym membership directory.
//!
//! ```bash
//! # One-time setup, remembered between runs
//! gym config set-endpoint https://script.google.com/macros/s/<deployment>/exec
//!
//! # Anyone can check a membership
//! gym lookup gym001
//!
//! # Admin commands verify the shared password first
//! GYM_ADMIN_PASSWORD=... gym admin list --filter expired
//! gym admin --password ... renew GYM001 --plan "6 Months"
//! ```

use std::{path::PathBuf, process::ExitCode};

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use libgym::{
    lifecycle, ConfigStore, DirectoryClient, DirectoryConfig, Member, MemberId, MemberSnapshot,
    MemberUpdate, MembershipType, NewMember, Roster, RosterFilter,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gym", about = "Gym membership lookup and administration")]
struct Cli {
    /// Config file holding the directory endpoint [default: $GYM_CONFIG, else
    /// ~/.config/gym/directory.json]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use this endpoint instead of the saved one
    #[arg(long, env = "GYM_ENDPOINT", global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage the saved directory endpoint
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show a member's status
    Lookup { id: MemberId },

    /// Administrator commands
    Admin {
        #[arg(long, env = "GYM_ADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    SetEndpoint { url: String },
    Show,
    Clear,
}

#[derive(Debug, Subcommand)]
enum AdminAction {
    /// Check the admin password
    Verify,

    /// List members with totals
    List {
        #[arg(long, default_value = "all")]
        filter: RosterFilter,
    },

    /// Enroll a new member
    Add {
        /// Defaults to the next free GYMnnn id
        #[arg(long)]
        id: Option<MemberId>,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value_t = 0)]
        age: u32,
        #[arg(long, default_value_t = 0)]
        weight: u32,
        #[arg(long, default_value = "3 Months")]
        plan: MembershipType,
        /// YYYY-MM-DD, defaults to today
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,
    },

    /// Change details of an existing member
    Edit {
        id: MemberId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        age: Option<u32>,
        #[arg(long)]
        weight: Option<u32>,
        #[arg(long)]
        plan: Option<MembershipType>,
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,
    },

    /// Start a new plan cycle
    Renew {
        id: MemberId,
        #[arg(long)]
        plan: MembershipType,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        start: Option<String>,
    },

    /// Permanently remove a member
    Delete { id: MemberId },
}

fn parse_date(raw: &str) -> Result<NaiveDate, lifecycle::ValidationError> {
    lifecycle::parse_date(raw)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "libgym=info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = cli.config.clone().map(ConfigStore::new).unwrap_or_default();

    match cli.command {
        Command::Config { action } => configure(&store, action),
        Command::Lookup { id } => {
            let client = connect(&store, cli.endpoint.as_deref())?;
            let snapshot = client.lookup(&id).await?;
            print_member(&snapshot);
            Ok(())
        }
        Command::Admin { password, action } => {
            let mut client = connect(&store, cli.endpoint.as_deref())?;
            let Some(password) = password else {
                bail!("admin password required (--password or GYM_ADMIN_PASSWORD)");
            };
            if !client.verify_credential(&password).await? {
                bail!("Invalid password");
            }

            let result = administer(&client, action).await;
            client.logout();
            result
        }
    }
}

fn configure(store: &ConfigStore, action: ConfigAction) -> anyhow::Result<()> {
    let mut config = store.load()?;

    match action {
        ConfigAction::SetEndpoint { url } => {
            config.set_endpoint(&url)?;
            store.save(&config)?;
            println!("Endpoint saved to {}", store.path().display());
        }
        ConfigAction::Show => match config.endpoint() {
            Some(url) => println!("{url}"),
            None => println!("(not configured)"),
        },
        ConfigAction::Clear => {
            config.clear_endpoint();
            store.save(&config)?;
            println!("Endpoint cleared");
        }
    }

    Ok(())
}

fn connect(store: &ConfigStore, endpoint: Option<&str>) -> anyhow::Result<DirectoryClient> {
    let mut config: DirectoryConfig = store
        .load()
        .with_context(|| format!("loading {}", store.path().display()))?;

    if let Some(endpoint) = endpoint {
        config.set_endpoint(endpoint)?;
    }

    Ok(DirectoryClient::new(config)?)
}

async fn administer(client: &DirectoryClient, action: AdminAction) -> anyhow::Result<()> {
    match action {
        AdminAction::Verify => println!("Password accepted"),
        AdminAction::List { filter } => {
            let roster = Roster::new(client.list_all().await?);
            for snapshot in roster.filtered(filter) {
                print_row(snapshot);
            }
            let stats = roster.stats();
            println!("{} members: {} active, {} expired", stats.total, stats.active, stats.expired);
        }
        AdminAction::Add {
            id,
            name,
            phone,
            age,
            weight,
            plan,
            start,
        } => {
            let id = match id {
                Some(id) => id,
                None => Roster::new(client.list_all().await?).suggest_next_id(),
            };
            let new_member = NewMember {
                id,
                name,
                phone,
                age,
                weight,
                membership_type: plan,
                start_date: start.unwrap_or_else(|| client.today()),
            };

            let member = client.create(new_member).await?;
            println!("Member added successfully!");
            print_member(&member.snapshot(client.today()));
        }
        AdminAction::Edit {
            id,
            name,
            phone,
            age,
            weight,
            plan,
            start,
        } => {
            let changes = MemberUpdate {
                name,
                phone,
                age,
                weight,
                membership_type: plan,
                start_date: start,
            };
            if changes.is_empty() {
                bail!("nothing to change");
            }

            let member: Member = client.update(&id, &changes).await?;
            println!("Member updated successfully!");
            print_member(&member.snapshot(client.today()));
        }
        AdminAction::Renew { id, plan, start } => {
            let start = start
                .unwrap_or_else(|| client.today().format(lifecycle::DATE_FORMAT).to_string());
            let renewal = client.renew(&id, plan, start).await?;
            println!("Membership renewed! New end date: {}", renewal.end_date);
        }
        AdminAction::Delete { id } => {
            client.delete(&id).await?;
            println!("Member {id} deleted");
        }
    }

    Ok(())
}

fn print_member(snapshot: &MemberSnapshot) {
    let member = &snapshot.member;

    println!("{} ({})", member.name(), member.id());
    println!("  Status:     {}", snapshot.status);
    if let Some(days) = snapshot.days_remaining {
        println!("  Remaining:  {days} days");
    }
    println!("  Plan:       {}", member.membership_type());
    println!("  Valid:      {} to {}", member.start_date(), member.end_date());
    if !member.phone().is_empty() {
        println!("  Phone:      {}", member.phone());
    }
    println!("  Age/Weight: {} / {} kg", member.age(), member.weight());
}

fn print_row(snapshot: &MemberSnapshot) {
    let member = &snapshot.member;
    let remaining = snapshot.days_remaining.map(|d| format!("{d}d left")).unwrap_or_default();

    println!(
        "{:<8} {:<24} {:<9} {:<8} ends {} {}",
        member.id(),
        member.name(),
        member.membership_type(),
        snapshot.status,
        member.end_date(),
        remaining
    );
}
