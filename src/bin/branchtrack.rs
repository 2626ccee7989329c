//! branchtrack CLI: create assignments, record progress, watch the dashboard.

use std::sync::Arc;

use anyhow::Context as _;
use branchtrack::config::Config;
use branchtrack::db::Db;
use branchtrack::directory::BranchDirectory;
use branchtrack::engine::{Dashboard, Tracker};
use branchtrack::model::{
    AssignmentId, BranchSelector, NewAssignment, OverallStatus, Priority, ProgressId,
};
use branchtrack::notify::LogNotifier;
use branchtrack::store::Snapshot;
use branchtrack::telemetry::{TelemetryConfig, TelemetryGuard, init_telemetry};
use branchtrack::view::{SortKey, ViewState};
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;

#[derive(Parser)]
#[command(name = "branchtrack", about = "Assignment fan-out and branch progress tracking")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow the change stream and log dashboard statistics
    Serve,
    /// List the branch directory
    Branches,
    /// Assignment operations
    Assignment {
        #[command(subcommand)]
        action: AssignmentAction,
    },
    /// Progress record operations
    Progress {
        #[command(subcommand)]
        action: ProgressAction,
    },
    /// Print dashboard statistics once
    Stats,
}

#[derive(Subcommand)]
enum AssignmentAction {
    /// Create an assignment and fan it out
    Create {
        #[arg(long)]
        title: String,
        /// "ALL" or comma-separated branch codes
        #[arg(long)]
        branches: BranchSelector,
        /// RFC 3339 instant, or YYYY-MM-DD (end of that local day)
        #[arg(long)]
        deadline: Option<String>,
        #[arg(long, default_value_t = Priority::Normal)]
        priority: Priority,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        created_by: Option<String>,
    },
    /// List assignments
    List {
        /// pending | in_progress | completed
        #[arg(long)]
        status: Option<OverallStatus>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        category: Option<String>,
        /// deadline | priority | created
        #[arg(long, default_value = "created")]
        sort: SortKey,
    },
    /// Show an assignment with its per-branch progress
    Show {
        /// Assignment ID (full UUID or prefix)
        id: String,
    },
}

#[derive(Subcommand)]
enum ProgressAction {
    /// Mark a record completed
    Complete {
        /// Progress record ID (full UUID or prefix)
        id: String,
        #[arg(long)]
        remarks: Option<String>,
    },
    /// Set a completed record back to pending
    Reopen { id: String },
    /// Flip a record between pending and completed
    Toggle { id: String },
    /// Count a reminder sent to a branch that has not completed
    FollowUp { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = telemetry(&config, matches!(cli.command, Command::Serve))?;
    let directory = BranchDirectory::load(&config.branches_file)
        .with_context(|| format!("loading {}", config.branches_file.display()))?;

    if let Command::Branches = cli.command {
        return cmd_branches(&directory);
    }

    let db = Db::connect(config.database_url.expose_secret()).await?;
    db.migrate().await?;
    let tracker = Tracker::new(Arc::new(db), Arc::new(directory), Arc::new(LogNotifier));

    match cli.command {
        Command::Serve => cmd_serve(&tracker).await,
        Command::Branches => Ok(()),
        Command::Stats => cmd_stats(&tracker).await,
        Command::Assignment { action } => match action {
            AssignmentAction::Create {
                title,
                branches,
                deadline,
                priority,
                category,
                description,
                project,
                created_by,
            } => {
                let mut new = NewAssignment::new(title, branches).priority(priority);
                if let Some(deadline) = deadline {
                    new = new.deadline(parse_deadline(&deadline)?);
                }
                if let Some(category) = category {
                    new = new.category(category);
                }
                if let Some(description) = description {
                    new = new.description(description);
                }
                if let Some(project) = project {
                    new = new.project(project);
                }
                if let Some(who) = created_by {
                    new = new.created_by(who);
                }
                cmd_assignment_create(&tracker, new).await
            }
            AssignmentAction::List {
                status,
                priority,
                category,
                sort,
            } => {
                let view = ViewState {
                    status,
                    priority,
                    category,
                    sort,
                };
                cmd_assignment_list(&tracker, &view).await
            }
            AssignmentAction::Show { id } => cmd_assignment_show(&tracker, &id).await,
        },
        Command::Progress { action } => {
            let record = match action {
                ProgressAction::Complete { id, remarks } => {
                    let id = find_progress(&tracker, &id).await?;
                    tracker.complete(id, remarks).await?
                }
                ProgressAction::Reopen { id } => {
                    let id = find_progress(&tracker, &id).await?;
                    tracker.reopen(id).await?
                }
                ProgressAction::Toggle { id } => {
                    let id = find_progress(&tracker, &id).await?;
                    tracker.toggle(id).await?
                }
                ProgressAction::FollowUp { id } => {
                    let id = find_progress(&tracker, &id).await?;
                    tracker.follow_up(id).await?
                }
            };
            println!(
                "{}  {}  {}  follow-ups: {}",
                record.id.short(),
                tracker.directory().display_label(&record.branch_code),
                record.status(),
                record.follow_ups()
            );
            Ok(())
        }
    }
}

/// Only `serve` exports telemetry; one-shot commands log locally.
fn telemetry(config: &Config, serving: bool) -> anyhow::Result<TelemetryGuard> {
    Ok(init_telemetry(TelemetryConfig {
        endpoint: if serving {
            config.otel_endpoint.clone()
        } else {
            None
        },
        service_name: "branchtrack".to_string(),
        log_level: config.log_level.clone(),
    })?)
}

async fn cmd_serve(tracker: &Tracker) -> anyhow::Result<()> {
    let mut dashboard = Dashboard::from_subscription(tracker.subscribe().await?);
    log_stats(&dashboard);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                return Ok(());
            }
            more = dashboard.next() => {
                if !more {
                    tracing::warn!("change stream closed");
                    return Ok(());
                }
                log_stats(&dashboard);
            }
        }
    }
}

fn log_stats(dashboard: &Dashboard) {
    let stats = dashboard.stats(Utc::now());
    tracing::info!(
        seq = dashboard.last_seq(),
        today_completed = stats.today_completed,
        total_pending = stats.total_pending,
        overdue = stats.overdue_assignments,
        due_this_week = stats.due_this_week,
        completed = stats.completed_assignments,
        total = stats.total_assignments,
        "dashboard"
    );
}

fn cmd_branches(directory: &BranchDirectory) -> anyhow::Result<()> {
    println!("{:<10}  {:<30}  {:<12}  EMAILS", "CODE", "NAME", "REGION");
    println!("{}", "-".repeat(80));
    for branch in directory.branches() {
        println!(
            "{:<10}  {:<30}  {:<12}  {}",
            branch.code.to_string(),
            branch.name,
            branch.region.as_deref().unwrap_or("-"),
            branch.emails.join(", ")
        );
    }
    println!("\n{} branch(es)", directory.len());
    Ok(())
}

async fn cmd_stats(tracker: &Tracker) -> anyhow::Result<()> {
    let stats = tracker.stats(Utc::now()).await?;
    println!("Completed today:   {}", stats.today_completed);
    println!("Pending records:   {}", stats.total_pending);
    println!("Overdue:           {}", stats.overdue_assignments);
    println!("Due this week:     {}", stats.due_this_week);
    println!(
        "Assignments:       {} ({} completed)",
        stats.total_assignments, stats.completed_assignments
    );
    Ok(())
}

async fn cmd_assignment_create(tracker: &Tracker, new: NewAssignment) -> anyhow::Result<()> {
    let created = tracker.create_assignment(new).await?;
    println!(
        "Created: {} ({} branch(es))",
        created.assignment.id,
        created.records.len()
    );
    if !created.discarded.is_empty() {
        let codes: Vec<String> = created.discarded.iter().map(ToString::to_string).collect();
        println!("Skipped unknown branches: {}", codes.join(", "));
    }
    println!(
        "Notified {} recipient(s){}",
        created.dispatch.count(),
        if created.notified { "" } else { " (notifier failed)" }
    );
    Ok(())
}

async fn cmd_assignment_list(tracker: &Tracker, view: &ViewState) -> anyhow::Result<()> {
    let snapshot = tracker.snapshot().await?;
    let rows = view.apply(&snapshot, Utc::now());
    if rows.is_empty() {
        println!("No assignments found.");
        return Ok(());
    }

    println!(
        "{:<8}  {:<30}  {:<8}  {:<11}  {:<9}  DEADLINE",
        "ID", "TITLE", "PRI", "STATUS", "PROGRESS"
    );
    println!("{}", "-".repeat(100));
    for row in &rows {
        let a = &row.assignment;
        let title: String = a.title.chars().take(30).collect();
        let deadline = a
            .deadline
            .map(|d| d.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8}  {:<30}  {:<8}  {:<11}  {:<9}  {}{}",
            a.id.short(),
            title,
            a.priority.to_string(),
            row.status().to_string(),
            format!("{}/{}", row.summary.completed, row.summary.total),
            deadline,
            if row.overdue { "  OVERDUE" } else { "" }
        );
    }
    println!("\n{} assignment(s)", rows.len());
    Ok(())
}

async fn cmd_assignment_show(tracker: &Tracker, id: &str) -> anyhow::Result<()> {
    let snapshot = tracker.snapshot().await?;
    let id = find_assignment(&snapshot, id)?;
    let detail = tracker.assignment(id).await?;
    let a = &detail.assignment;

    println!("ID:          {}", a.id);
    println!("Title:       {}", a.title);
    println!("Priority:    {}", a.priority);
    println!("Category:    {}", a.category.as_deref().unwrap_or("-"));
    println!("Branches:    {}", if a.branch_selector.is_all() { "ALL" } else { "selected" });
    if let Some(deadline) = a.deadline {
        println!("Deadline:    {}", deadline.with_timezone(&Local));
    }
    if let Some(ref description) = a.description {
        println!("Description: {description}");
    }
    println!("Created:     {}", a.created_at.with_timezone(&Local));
    println!("Emails sent: {}", if a.emails_sent { "yes" } else { "no" });
    println!(
        "Status:      {} ({:.0}%)",
        detail.overall_status(),
        detail.summary.ratio() * 100.0
    );
    println!("---");
    for record in &detail.records {
        let done = record
            .completion_date()
            .map(|d| d.with_timezone(&Local).format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        let chased = record
            .last_follow_up()
            .map(|d| format!("{} ({})", record.follow_ups(), d.with_timezone(&Local).format("%Y-%m-%d")))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8}  {:<30}  {:<9}  {:<10}  {:<16}  {}",
            record.id.short(),
            tracker.directory().display_label(&record.branch_code),
            record.status().to_string(),
            done,
            chased,
            record.remarks.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

/// Resolve a full UUID or unique prefix against the current assignments.
fn find_assignment(snapshot: &Snapshot, id: &str) -> anyhow::Result<AssignmentId> {
    let matches: Vec<AssignmentId> = snapshot
        .assignments
        .iter()
        .map(|a| a.id)
        .filter(|a| a.to_string().starts_with(id))
        .collect();
    match matches.as_slice() {
        [only] => Ok(*only),
        [] => anyhow::bail!("no assignment matching '{id}'"),
        _ => anyhow::bail!("{} assignments match prefix '{id}', be more specific", matches.len()),
    }
}

async fn find_progress(tracker: &Tracker, id: &str) -> anyhow::Result<ProgressId> {
    if let Ok(uuid) = uuid::Uuid::parse_str(id) {
        return Ok(ProgressId(uuid));
    }
    let snapshot = tracker.snapshot().await?;
    let matches: Vec<ProgressId> = snapshot
        .progress
        .iter()
        .map(|r| r.id)
        .filter(|r| r.to_string().starts_with(id))
        .collect();
    match matches.as_slice() {
        [only] => Ok(*only),
        [] => anyhow::bail!("no progress record matching '{id}'"),
        _ => anyhow::bail!("{} records match prefix '{id}', be more specific", matches.len()),
    }
}

fn parse_deadline(s: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
        return Ok(instant.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid deadline '{s}'"))?;
    day.and_hms_opt(23, 59, 59)
        .and_then(|t| t.and_local_timezone(Local).latest())
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| anyhow::anyhow!("deadline '{s}' does not exist in the local timezone"))
}
