// CreatorFlow - content production tracker
// Command-line entry point

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use creatorflow::app::{self, AppState};
use creatorflow::commands::{self, ActionOutcome, IdeaChanges};
use creatorflow::config;
use creatorflow::database::{Idea, Priority};
use creatorflow::error::AppError;
use creatorflow::router::ConfirmationDialog;
use creatorflow::services::{Metric, Timeframe, TrendQuery};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "creatorflow", version, about = "Track video ideas from first thought to upload")]
struct Cli {
    /// Where settings, data, and backups live
    #[arg(long, global = true, env = config::DATA_DIR_ENV, default_value = config::DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Answer yes to confirmation prompts
    #[arg(long, short, global = true)]
    yes: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Accounts and sessions
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Pipeline overview and recent activity
    Home,
    /// Capture and manage ideas
    #[command(subcommand)]
    Idea(IdeaCommand),
    /// Recycle bin
    #[command(subcommand)]
    Bin(BinCommand),
    /// Channels
    #[command(subcommand)]
    Channel(ChannelCommand),
    /// Pipeline statuses
    #[command(subcommand)]
    Status(StatusCommand),
    /// Scheduled ideas
    Calendar {
        /// Show ideas scheduled on this day (YYYY-MM-DD)
        #[arg(long, conflicts_with = "month")]
        date: Option<NaiveDate>,
        /// Show scheduled days of this month (YYYY-MM); defaults to this month
        #[arg(long)]
        month: Option<String>,
    },
    /// Created/completed counts over time
    Trend {
        #[arg(long, default_value = "created")]
        metric: Metric,
        /// 1W, 1M, or 1Y; defaults to the configured timeframe
        #[arg(long)]
        timeframe: Option<Timeframe>,
        #[arg(long)]
        channel: Option<String>,
    },
    /// Display name and avatar
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Backup and restore
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Application settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand)]
enum AuthCommand {
    SignUp {
        email: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        password: Option<String>,
    },
    SignIn {
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    Password {
        #[arg(long)]
        old: Option<String>,
        #[arg(long)]
        new: Option<String>,
    },
    SignOut,
    Whoami,
}

#[derive(Args)]
struct IdeaFields {
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    /// Channel id or name
    #[arg(long)]
    channel: Option<String>,
    /// Status id or name
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    priority: Option<Priority>,
    /// Repeat for several tags
    #[arg(long = "tag")]
    tags: Vec<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl IdeaFields {
    fn into_changes(self, title: Option<String>, clear_date: bool) -> IdeaChanges {
        IdeaChanges {
            title,
            description: self.description,
            notes: self.notes,
            channel: self.channel,
            status: self.status,
            priority: self.priority,
            tags: (!self.tags.is_empty()).then_some(self.tags),
            scheduled_date: if clear_date { Some(None) } else { self.date.map(Some) },
        }
    }
}

#[derive(Subcommand)]
enum IdeaCommand {
    Add {
        title: String,
        #[command(flatten)]
        fields: IdeaFields,
    },
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "date")]
        clear_date: bool,
        #[command(flatten)]
        fields: IdeaFields,
    },
    Show {
        id: String,
    },
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        channel: Option<String>,
    },
    Search {
        query: String,
    },
    /// Move an idea to the bin
    Bin {
        id: String,
    },
}

#[derive(Subcommand)]
enum BinCommand {
    List,
    Restore { id: String },
    /// Delete one binned idea permanently
    Delete { id: String },
    /// Delete every binned idea permanently
    Empty,
}

#[derive(Subcommand)]
enum ChannelCommand {
    List,
    Add {
        name: String,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    Edit {
        channel: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    Delete {
        channel: String,
    },
}

#[derive(Subcommand)]
enum StatusCommand {
    List,
    Add {
        name: String,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        order: Option<i64>,
    },
    Edit {
        status: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// List every status in the new order
    Reorder {
        #[arg(required = true)]
        statuses: Vec<String>,
    },
    Delete {
        status: String,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    Show,
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },
}

#[derive(Subcommand)]
enum BackupCommand {
    Create,
    List,
    Restore { path: String },
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show,
    /// Keys: backend, channel-deletion, status-deletion, sync-timeout,
    /// backup-retention, default-timeframe
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "creatorflow=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let out = Output { json: cli.json };

    tracing::debug!("Data directory: {:?}", cli.data_dir);

    match cli.command {
        Command::Auth(cmd) => run_auth(cmd, &cli.data_dir, cli.yes, &out).await,
        Command::Settings(cmd) => run_settings(cmd, &cli.data_dir, &out).await,
        command => {
            let state = open_state(&cli.data_dir).await?;
            run(command, &state, cli.yes, &out).await
        }
    }
}

async fn open_state(data_dir: &Path) -> Result<AppState> {
    match app::setup(data_dir.to_path_buf()).await {
        Err(AppError::NotSignedIn) => {
            bail!("Not signed in. Run `creatorflow auth sign-in <email>` or switch to the local backend with `creatorflow settings set backend local`.")
        }
        other => other.context("Failed to open CreatorFlow data"),
    }
}

async fn run(command: Command, state: &AppState, yes: bool, out: &Output) -> Result<()> {
    match command {
        Command::Home => {
            let (folders, recent) = commands::get_home(state).await?;
            out.emit(&(&folders, &recent), || {
                for folder in &folders {
                    println!("{:<16} {}", folder.status.name, folder.count);
                }
                println!("\nRecent activity");
                for idea in &recent {
                    println!("  {}", idea_line(idea));
                }
            });
        }
        Command::Idea(cmd) => run_idea(cmd, state, yes, out).await?,
        Command::Bin(cmd) => run_bin(cmd, state, yes, out).await?,
        Command::Channel(cmd) => run_channel(cmd, state, yes, out).await?,
        Command::Status(cmd) => run_status(cmd, state, yes, out).await?,
        Command::Calendar { date, month } => {
            if let Some(date) = date {
                let ideas = commands::get_scheduled_on(state, date).await?;
                out.ideas(&ideas);
            } else {
                let (year, month) = match month {
                    Some(m) => parse_month(&m)?,
                    None => {
                        let today = Utc::now().date_naive();
                        (today.year(), today.month())
                    }
                };
                let days = commands::get_scheduled_days(state, year, month).await?;
                out.emit(&days, || {
                    let list: Vec<String> = days.iter().map(u32::to_string).collect();
                    println!("{}-{:02}: {}", year, month, list.join(", "));
                });
            }
        }
        Command::Trend {
            metric,
            timeframe,
            channel,
        } => {
            let query = TrendQuery {
                metric,
                timeframe: timeframe.unwrap_or(state.settings.default_timeframe),
                channel,
            };
            let report = commands::get_trend(state, query).await?;
            out.emit(&report, || {
                for bucket in &report.buckets {
                    let bar = "#".repeat(bucket.count * 20 / report.scale);
                    println!("{:<7} {:>3} {}", bucket.label, bucket.count, bar);
                }
                println!("Total: {}", report.total);
            });
        }
        Command::Profile(ProfileCommand::Show) => {
            let profile = commands::get_profile(state).await?;
            out.emit(&profile, || match &profile {
                Some(p) => println!("{}", p.display_name),
                None => println!("No profile yet"),
            });
        }
        Command::Profile(ProfileCommand::Set { name, avatar }) => {
            let profile = commands::update_profile(state, name, avatar).await?;
            out.emit(&profile, || println!("Profile updated: {}", profile.display_name));
        }
        Command::Backup(BackupCommand::Create) => {
            let path = commands::create_backup(state).await?;
            out.emit(&path, || println!("Backup created: {}", path));
        }
        Command::Backup(BackupCommand::List) => {
            let backups = commands::list_backups(state).await?;
            out.emit(&backups, || {
                for b in &backups {
                    println!("{}  {:>8} bytes  {}", b.created_at.format("%Y-%m-%d %H:%M:%S"), b.size, b.path.display());
                }
            });
        }
        Command::Backup(BackupCommand::Restore { path }) => {
            let summary = commands::restore_backup(state, &path).await?;
            out.emit(&summary, || {
                println!(
                    "Restored {} ideas, {} channels, {} statuses",
                    summary.ideas, summary.channels, summary.statuses
                )
            });
        }
        Command::Auth(_) | Command::Settings(_) => unreachable!("handled before the store opens"),
    }
    Ok(())
}

async fn run_idea(cmd: IdeaCommand, state: &AppState, yes: bool, out: &Output) -> Result<()> {
    match cmd {
        IdeaCommand::Add { title, fields } => {
            let idea = commands::create_idea(state, fields.into_changes(Some(title), false)).await?;
            out.idea(&idea);
        }
        IdeaCommand::Edit {
            id,
            title,
            clear_date,
            fields,
        } => {
            let idea = commands::update_idea(state, &id, fields.into_changes(title, clear_date)).await?;
            out.idea(&idea);
        }
        IdeaCommand::Show { id } => {
            let detail = commands::get_idea_detail(state, &id).await?;
            out.emit(&detail, || {
                let idea = &detail.idea;
                println!("{}", idea.title);
                println!("  id:        {}", idea.id);
                println!("  channel:   {}", detail.channel.name);
                println!(
                    "  status:    {}",
                    detail.status.as_ref().map_or("?", |s| s.name.as_str())
                );
                println!("  priority:  {}", idea.priority);
                if !idea.tags.is_empty() {
                    println!("  tags:      {}", idea.tags.join(", "));
                }
                if let Some(date) = idea.scheduled_date {
                    println!("  scheduled: {}", date);
                }
                if let Some(done) = idea.completed_at {
                    println!("  completed: {}", done.format("%Y-%m-%d %H:%M"));
                }
                if idea.is_deleted {
                    println!("  (in bin)");
                }
                if !idea.description.is_empty() {
                    println!("\n{}", idea.description);
                }
                if let Some(notes) = &idea.notes {
                    println!("\n{}", notes);
                }
            });
        }
        IdeaCommand::List { status, channel } => {
            let ideas = commands::list_ideas(state, status.as_deref(), channel.as_deref()).await?;
            out.ideas(&ideas);
        }
        IdeaCommand::Search { query } => {
            let ideas = commands::search_ideas(state, &query).await?;
            out.ideas(&ideas);
        }
        IdeaCommand::Bin { id } => {
            let dialog = commands::request_move_to_bin(state, &id).await?;
            resolve(state, &dialog, yes, out).await?;
        }
    }
    Ok(())
}

async fn run_bin(cmd: BinCommand, state: &AppState, yes: bool, out: &Output) -> Result<()> {
    match cmd {
        BinCommand::List => out.ideas(&commands::list_bin(state).await?),
        BinCommand::Restore { id } => {
            commands::restore_idea(state, &id).await?;
            out.emit(&id, || println!("Restored {}", id));
        }
        BinCommand::Delete { id } => {
            let dialog = commands::request_delete_forever(state, &id).await?;
            resolve(state, &dialog, yes, out).await?;
        }
        BinCommand::Empty => {
            let dialog = commands::request_empty_bin(state).await?;
            resolve(state, &dialog, yes, out).await?;
        }
    }
    Ok(())
}

async fn run_channel(cmd: ChannelCommand, state: &AppState, yes: bool, out: &Output) -> Result<()> {
    match cmd {
        ChannelCommand::List => {
            let folders = commands::get_channel_folders(state).await?;
            out.emit(&folders, || {
                for f in &folders {
                    println!("{:<20} {:<8} {}", f.channel.name, f.channel.color, f.count);
                }
            });
        }
        ChannelCommand::Add { name, color, icon } => {
            let channel = commands::create_channel(state, name, color, icon).await?;
            out.emit(&channel, || println!("Created channel {} ({})", channel.name, channel.id));
        }
        ChannelCommand::Edit {
            channel,
            name,
            color,
            icon,
        } => {
            let channel = commands::update_channel(state, &channel, name, color, icon).await?;
            out.emit(&channel, || println!("Updated channel {}", channel.name));
        }
        ChannelCommand::Delete { channel } => {
            let dialog = commands::request_delete_channel(state, &channel).await?;
            resolve(state, &dialog, yes, out).await?;
        }
    }
    Ok(())
}

async fn run_status(cmd: StatusCommand, state: &AppState, yes: bool, out: &Output) -> Result<()> {
    match cmd {
        StatusCommand::List => {
            let statuses = commands::list_statuses(state).await?;
            out.emit(&statuses, || {
                for s in &statuses {
                    println!("{:>2}  {:<16} {}", s.order, s.name, s.color);
                }
            });
        }
        StatusCommand::Add { name, color, order } => {
            let status = commands::create_status(state, name, color, order).await?;
            out.emit(&status, || println!("Created status {} ({})", status.name, status.id));
        }
        StatusCommand::Edit { status, name, color } => {
            let status = commands::update_status(state, &status, name, color).await?;
            out.emit(&status, || println!("Updated status {}", status.name));
        }
        StatusCommand::Reorder { statuses } => {
            let ordered = commands::reorder_statuses(state, &statuses).await?;
            out.emit(&ordered, || {
                let names: Vec<&str> = ordered.iter().map(|s| s.name.as_str()).collect();
                println!("{}", names.join(" -> "));
            });
        }
        StatusCommand::Delete { status } => {
            let dialog = commands::request_delete_status(state, &status).await?;
            resolve(state, &dialog, yes, out).await?;
        }
    }
    Ok(())
}

async fn run_auth(cmd: AuthCommand, data_dir: &Path, yes: bool, out: &Output) -> Result<()> {
    match cmd {
        AuthCommand::SignUp {
            email,
            name,
            password,
        } => {
            let password = password_or_prompt(password, "Password: ")?;
            let session = commands::sign_up(data_dir, &email, &password, &name).await?;
            out.emit(&session, || println!("Signed up as {}", session.email));
        }
        AuthCommand::SignIn { email, password } => {
            let password = password_or_prompt(password, "Password: ")?;
            let session = commands::sign_in(data_dir, &email, &password).await?;
            out.emit(&session, || println!("Signed in as {}", session.email));
        }
        AuthCommand::Password { old, new } => {
            let state = open_state(data_dir).await?;
            let old = password_or_prompt(old, "Current password: ")?;
            let new = password_or_prompt(new, "New password: ")?;
            commands::update_password(&state, &old, &new).await?;
            out.emit(&"ok", || println!("Password updated"));
        }
        AuthCommand::SignOut => {
            let state = open_state(data_dir).await?;
            let dialog = commands::request_sign_out(&state).await?;
            resolve(&state, &dialog, yes, out).await?;
        }
        AuthCommand::Whoami => {
            let state = open_state(data_dir).await?;
            let session = commands::current_session(&state).await?;
            out.emit(&session, || match &session {
                Some(s) => println!("{} ({})", s.email, s.user_id),
                None => println!("Local backend, no account"),
            });
        }
    }
    Ok(())
}

async fn run_settings(cmd: SettingsCommand, data_dir: &Path, out: &Output) -> Result<()> {
    let settings = match cmd {
        SettingsCommand::Show => commands::get_settings(data_dir).await?,
        SettingsCommand::Set { key, value } => commands::update_setting(data_dir, &key, &value).await?,
    };
    out.emit(&settings, || match serde_json::to_string_pretty(&settings) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("{}", e),
    });
    Ok(())
}

/// Show a confirmation dialog, then confirm or cancel it
async fn resolve(state: &AppState, dialog: &ConfirmationDialog, yes: bool, out: &Output) -> Result<()> {
    let accepted = yes || {
        eprintln!("{}", dialog.title);
        eprintln!("{}", dialog.message);
        prompt_yes_no(&format!("{} / {} [y/N] ", dialog.confirm_label, dialog.cancel_label))?
    };

    if !accepted {
        commands::cancel_pending(state).await?;
        out.emit(&"cancelled", || println!("Cancelled"));
        return Ok(());
    }

    let outcome = commands::confirm_pending(state).await?;
    out.emit(&outcome, || match &outcome {
        ActionOutcome::MovedToBin { idea_id } => println!("Moved {} to the bin", idea_id),
        ActionOutcome::DeletedForever { idea_id } => println!("Deleted {}", idea_id),
        ActionOutcome::BinEmptied { removed } => println!("Emptied bin ({} removed)", removed),
        ActionOutcome::ChannelDeleted { channel_id } => println!("Deleted channel {}", channel_id),
        ActionOutcome::StatusDeleted { status_id } => println!("Deleted status {}", status_id),
        ActionOutcome::SignedOut => println!("Signed out"),
    });
    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

fn prompt_yes_no(prompt: &str) -> Result<bool> {
    let answer = prompt_line(prompt)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn password_or_prompt(password: Option<String>, prompt: &str) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => prompt_line(prompt),
    }
}

fn parse_month(value: &str) -> Result<(i32, u32)> {
    let date = NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d")
        .with_context(|| format!("Expected YYYY-MM, got {}", value))?;
    Ok((date.year(), date.month()))
}

fn idea_line(idea: &Idea) -> String {
    let short_id: String = idea.id.chars().take(8).collect();
    format!("{}  [{}] {}", short_id, idea.priority, idea.title)
}

struct Output {
    json: bool,
}

impl Output {
    /// Print `value` as JSON, or run `text` for the human-readable form
    fn emit<T: Serialize + ?Sized>(&self, value: &T, text: impl FnOnce()) {
        if self.json {
            match serde_json::to_string_pretty(value) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to encode output: {}", e),
            }
        } else {
            text();
        }
    }

    fn idea(&self, idea: &Idea) {
        self.emit(idea, || println!("{}", idea_line(idea)));
    }

    fn ideas(&self, ideas: &[Idea]) {
        self.emit(ideas, || {
            if ideas.is_empty() {
                println!("No ideas");
            }
            for idea in ideas {
                println!("{}", idea_line(idea));
            }
        });
    }
}
