mod config;
mod error;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use clap::{Parser, Subcommand};
use engine::{Core, CreateDelegation, SqliteCore};
use engine::Directory as _;
use policy::{Capability, Identity, Role};
use store::{CaseRecord, Delegation, DelegationId};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "caseflow.toml";

#[derive(Parser)]
#[command(name = "caseflow")]
#[command(about = "Debt-case delegation and effective-access resolution", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background expiry sweeper
    Serve {
        /// Seconds between sweeps (overrides the config file)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Delegate a set of cases to another employee
    Delegate {
        /// Acting employee code (the delegator)
        #[arg(long)]
        actor: String,
        /// Receiving employee code
        #[arg(long)]
        to: String,
        /// Case id; repeat for a batch (all-or-nothing)
        #[arg(long = "case", required = true)]
        cases: Vec<String>,
        /// Expiry instant, RFC 3339 (e.g. 2026-09-01T17:00:00Z)
        #[arg(long)]
        expires: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List delegations visible to the acting employee
    Delegations {
        #[arg(long)]
        actor: String,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "50")]
        limit: u32,
    },
    /// Revoke a delegation (idempotent)
    Revoke {
        delegation_id: DelegationId,
        #[arg(long)]
        actor: String,
    },
    /// Expire overdue delegations now
    Sweep,
    /// Resolve the acting employee's authority over one case
    Resolve {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        case: String,
    },
    /// Inspect or edit permission grants
    Permissions {
        #[command(subcommand)]
        command: PermissionCommands,
    },
    /// Maintain the bundled case book and employee directory
    Directory {
        #[command(subcommand)]
        command: DirectoryCommands,
    },
}

#[derive(Subcommand)]
enum PermissionCommands {
    /// Show an employee's effective set and explicit grants
    Show {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        employee: String,
    },
    /// Replace an employee's explicit grants
    Set {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        employee: String,
        /// Capability names (e.g. view_cases export_reports)
        capabilities: Vec<String>,
    },
    /// Add to or remove from the export-allow list
    ExportList {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        employee: String,
        #[arg(long)]
        remove: bool,
    },
}

#[derive(Subcommand)]
enum DirectoryCommands {
    /// Register or update a case
    AddCase {
        case_id: String,
        #[arg(long)]
        owner: String,
        #[arg(long, default_value = "open")]
        state: String,
    },
    /// Register or update an employee
    AddEmployee {
        employee_code: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        department: String,
        #[arg(long)]
        branch: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error [{}]: {e}", e.code());
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config()?;
    let core = Core::open(&config.store.path, config.rules())?;

    match cli.command {
        Commands::Serve { interval } => {
            let secs = interval.unwrap_or(config.sweep.interval_secs);
            cmd_serve(core, Duration::from_secs(secs)).await
        }
        Commands::Delegate {
            actor,
            to,
            cases,
            expires,
            notes,
        } => cmd_delegate(&core, &actor, &to, cases, &expires, notes),
        Commands::Delegations { actor, page, limit } => {
            cmd_delegations(&core, &actor, page, limit)
        }
        Commands::Revoke {
            delegation_id,
            actor,
        } => cmd_revoke(&core, delegation_id, &actor),
        Commands::Sweep => cmd_sweep(&core),
        Commands::Resolve { actor, case } => cmd_resolve(&core, &actor, &case),
        Commands::Permissions { command } => cmd_permissions(&core, command),
        Commands::Directory { command } => cmd_directory(&core, command),
    }
}

fn load_config() -> Result<Config> {
    if Path::new(CONFIG_FILE).exists() {
        Config::load(CONFIG_FILE)
    } else {
        Config::parse("")
    }
}

fn actor_identity(core: &SqliteCore, code: &str) -> Result<Identity> {
    core.directory
        .identity(code)?
        .ok_or_else(|| Error::UnknownActor(code.to_string()))
}

fn parse_expiry(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| Error::InvalidTimestamp {
            value: raw.to_string(),
            source,
        })
}

async fn cmd_serve(core: SqliteCore, interval: Duration) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(interval_secs = interval.as_secs(), "caseflow sweeper running");
    tokio::select! {
        _ = core.sweeper.run(interval) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("shutting down");
        }
    }
    Ok(())
}

fn cmd_delegate(
    core: &SqliteCore,
    actor: &str,
    to: &str,
    cases: Vec<String>,
    expires: &str,
    notes: Option<String>,
) -> Result<()> {
    let actor = actor_identity(core, actor)?;
    let effective = core.permissions.effective_for(&actor)?;
    let created = core.manager.create(
        &actor,
        &effective,
        CreateDelegation {
            case_ids: cases,
            delegatee: to.to_string(),
            expiry_at: parse_expiry(expires)?,
            notes,
        },
    )?;

    println!("Delegated {} case(s) to {to}:", created.len());
    for delegation in created {
        println!("  {}  {}", delegation.id, delegation.case_id);
    }
    Ok(())
}

fn cmd_delegations(core: &SqliteCore, actor: &str, page: u32, limit: u32) -> Result<()> {
    let actor = actor_identity(core, actor)?;

    // Bound staleness before rendering a delegation-sensitive view.
    core.sweeper.sweep_once(Utc::now())?;

    let delegations = core.manager.list(&actor, page, limit)?;
    if delegations.is_empty() {
        println!("No delegations found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<10}  {:<8}  {:<8}  {:<8}  EXPIRES",
        "DELEGATION ID", "CASE", "FROM", "TO", "STATUS"
    );
    println!("{}", "-".repeat(96));
    for delegation in delegations {
        print_delegation(&delegation);
    }
    Ok(())
}

fn print_delegation(delegation: &Delegation) {
    let expires = Local
        .from_utc_datetime(&delegation.expiry_at.naive_utc())
        .format("%Y-%m-%d %H:%M");
    println!(
        "{:<36}  {:<10}  {:<8}  {:<8}  {:<8}  {expires}",
        delegation.id,
        delegation.case_id,
        delegation.delegator,
        delegation.delegatee,
        delegation.status,
    );
}

fn cmd_revoke(core: &SqliteCore, id: DelegationId, actor: &str) -> Result<()> {
    let actor = actor_identity(core, actor)?;
    let delegation = core.manager.revoke(&actor, id)?;
    println!(
        "Delegation {} is {} (case {}, delegatee {}).",
        delegation.id, delegation.status, delegation.case_id, delegation.delegatee
    );
    Ok(())
}

fn cmd_sweep(core: &SqliteCore) -> Result<()> {
    let report = core.sweeper.sweep_once(Utc::now())?;
    println!("Expired {} delegation(s).", report.affected_count());
    for (delegatee, case_count) in &report.by_delegatee {
        println!("  {delegatee}: {case_count} case(s)");
    }
    Ok(())
}

fn cmd_resolve(core: &SqliteCore, actor: &str, case: &str) -> Result<()> {
    let actor = actor_identity(core, actor)?;
    let effective = core.permissions.effective_for(&actor)?;
    let access = core.resolver.resolve(&actor, &effective, case, Utc::now())?;

    println!("Access for {} on case {case}:", actor.employee_code);
    println!("  view:     {}", yes_no(access.can_view));
    println!("  edit:     {}", yes_no(access.can_edit));
    println!("  delegate: {}", yes_no(access.can_delegate));
    println!("  attributed owner: {}", access.attributed_owner);
    Ok(())
}

fn cmd_permissions(core: &SqliteCore, command: PermissionCommands) -> Result<()> {
    match command {
        PermissionCommands::Show { actor, employee } => {
            let actor = actor_identity(core, &actor)?;
            let subject = actor_identity(core, &employee)?;
            let effective = core.permissions.effective_for(&subject)?;
            let grants = core.permissions.grants_for(&actor, &employee)?;

            println!("Effective permissions for {employee} ({}):", subject.role);
            for (capability, allowed) in effective.entries() {
                println!("  {capability:<20} {}", yes_no(allowed));
            }
            if grants.is_empty() {
                println!("No explicit grants.");
            } else {
                println!("Explicit grants:");
                for grant in grants {
                    println!("  {:<20} {}", grant.capability, yes_no(grant.allowed));
                }
            }
            Ok(())
        }
        PermissionCommands::Set {
            actor,
            employee,
            capabilities,
        } => {
            let actor = actor_identity(core, &actor)?;
            let capabilities = capabilities
                .iter()
                .map(|raw| raw.parse::<Capability>())
                .collect::<policy::Result<Vec<_>>>()?;
            core.permissions
                .replace_grants(&actor, &employee, &capabilities)?;
            println!("Replaced grants for {employee} ({} capabilities).", capabilities.len());
            Ok(())
        }
        PermissionCommands::ExportList {
            actor,
            employee,
            remove,
        } => {
            let actor = actor_identity(core, &actor)?;
            core.permissions
                .set_export_listed(&actor, &employee, !remove)?;
            println!(
                "{employee} {} the export-allow list.",
                if remove { "removed from" } else { "added to" }
            );
            Ok(())
        }
    }
}

fn cmd_directory(core: &SqliteCore, command: DirectoryCommands) -> Result<()> {
    match command {
        DirectoryCommands::AddCase {
            case_id,
            owner,
            state,
        } => {
            core.directory.lock().upsert_case(&CaseRecord {
                case_id: case_id.clone(),
                assigned_employee_code: owner,
                state,
            })?;
            println!("Case {case_id} registered.");
            Ok(())
        }
        DirectoryCommands::AddEmployee {
            employee_code,
            role,
            department,
            branch,
        } => {
            let role: Role = role.parse()?;
            core.directory.lock().upsert_employee(&Identity {
                employee_code: employee_code.clone(),
                role,
                department,
                branch,
            })?;
            println!("Employee {employee_code} registered as {role}.");
            Ok(())
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
