mod api;
mod auth;
mod config;
mod controller;
mod dashboard;
mod error;
mod form;
mod logging;
mod models;
mod notify;
mod render;
mod resource;
mod session;
mod store;
mod tui;

use anyhow::{Context, Result, anyhow, bail};
use api::{ApiClient, HttpResource, ResourceApi};
use auth::{LoginForm, ProfileEditor, RegisterForm};
use clap::{Parser, Subcommand};
use config::Config;
use controller::ListController;
use error::ApiError;
use form::SubmitOutcome;
use models::{Company, JobApplication, JobListing, Reminder, Session};
use notify::{BannerKind, Notifications};
use render::{Lookups, Tabular};
use resource::{Draft, Resource};
use session::{FileSessionStore, SessionGuard};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "jobtrack")]
#[command(about = "Track job applications, companies, listings and reminders")]
struct Cli {
    /// API base URL (overrides the config file and JOBTRACK_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        email: String,

        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account
    Register {
        name: String,

        email: String,

        /// Password (prompted twice when omitted)
        #[arg(short, long)]
        password: Option<String>,

        /// Agree to the Terms & Conditions
        #[arg(long)]
        agree_terms: bool,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// View or update your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Manage companies
    Companies {
        #[command(subcommand)]
        command: RecordCommands,
    },

    /// Manage job applications
    Applications {
        #[command(subcommand)]
        command: RecordCommands,
    },

    /// Manage job listings
    Listings {
        #[command(subcommand)]
        command: RecordCommands,
    },

    /// Manage reminders
    Reminders {
        #[command(subcommand)]
        command: RecordCommands,
    },

    /// Application statistics and recent activity
    Dashboard,

    /// Interactive terminal browser
    Browse,
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show your profile
    Show,

    /// Update name and/or career goals
    Update {
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        goals: Option<String>,
    },
}

#[derive(Subcommand)]
enum RecordCommands {
    /// List records
    List {
        /// Case-insensitive text search
        #[arg(short = 'q', long)]
        search: Option<String>,

        /// Only records with this status
        #[arg(short, long)]
        status: Option<String>,

        /// Print an HTML table instead of text
        #[arg(long)]
        html: bool,

        /// Maximum column width
        #[arg(short, long, default_value = "40")]
        width: usize,
    },

    /// Show one record
    Show {
        id: i64,
    },

    /// Create a record from NAME=VALUE fields
    Add {
        #[arg(short = 'f', long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
    },

    /// Change fields of an existing record
    Edit {
        id: i64,

        #[arg(short = 'f', long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
    },

    /// Delete a record
    Delete {
        id: i64,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

impl RecordCommands {
    /// Only the table resolves foreign keys, so only `list` needs the
    /// companion collection.
    fn needs_lookups(&self) -> bool {
        matches!(self, RecordCommands::List { .. })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&logging::default_log_path())?;
    let config = Config::load(cli.config.as_deref(), cli.api_url.as_deref())?;
    let guard = SessionGuard::new(Box::new(FileSessionStore::open()?), config.expiry_delay);

    if let Commands::Browse = cli.command {
        return tui::run_browse(config, guard);
    }

    let mut notes = Notifications::new(config.banner_ttl);
    let result = run(cli.command, &config, &guard, &mut notes);
    if let Err(err) = &result {
        if matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)) {
            // the terminal stays put, so the login delay does not apply here
            guard.expire(&mut notes);
        }
    }
    print_banners(&mut notes);
    result
}

fn run(command: Commands, config: &Config, guard: &SessionGuard, notes: &mut Notifications) -> Result<()> {
    let client = ApiClient::new(&config.api_url)?;

    match command {
        Commands::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt("Password")?,
            };
            let form = LoginForm { email, password };
            if auth::login(&client, guard, &form, Duration::ZERO, notes).is_none() {
                bail!("Login failed");
            }
        }

        Commands::Register {
            name,
            email,
            password,
            agree_terms,
        } => {
            let (password, confirm_password) = match password {
                Some(p) => (p.clone(), p),
                None => (prompt("Password")?, prompt("Confirm password")?),
            };
            let form = RegisterForm {
                name,
                email,
                password,
                confirm_password,
                agree_terms,
            };
            match auth::register(&client, &form, Duration::ZERO, notes) {
                Some(registered) => println!("Sign in with: jobtrack login {}", registered.email),
                None => bail!("Registration failed"),
            }
        }

        Commands::Logout => {
            guard.logout()?;
            println!("Logged out.");
        }

        Commands::Whoami => {
            let session = signed_in(guard)?;
            println!("{} <{}>", session.user.name, session.user.email);
        }

        Commands::Profile { command } => {
            let api = authorized(&client, &signed_in(guard)?);
            let mut editor = ProfileEditor::new();
            editor.load(&api, notes)?;
            match command {
                ProfileCommands::Show => {
                    let profile = editor.profile().ok_or_else(|| anyhow!("Profile not loaded"))?;
                    println!("Name: {}", profile.name);
                    println!("Email: {}", profile.email);
                    if let Some(created) = &profile.created_at {
                        println!("Member since: {}", render::format_date(created));
                    }
                    let goals = profile.career_goals.as_deref().unwrap_or("").trim();
                    if !goals.is_empty() {
                        println!("\n--- Career Goals ---\n{}", textwrap::fill(goals, 80));
                    }
                }
                ProfileCommands::Update { name, goals } => {
                    if name.is_none() && goals.is_none() {
                        bail!("Nothing to update. Use --name and/or --goals");
                    }
                    editor.enter_edit();
                    if let Some(name) = name {
                        editor.name = name;
                    }
                    if let Some(goals) = goals {
                        editor.career_goals = goals;
                    }
                    if !editor.save(&api, notes)? {
                        bail!("{}", editor.error().unwrap_or("Profile not saved"));
                    }
                }
            }
        }

        Commands::Companies { command } => {
            let api = authorized(&client, &signed_in(guard)?);
            run_records::<Company>(command, &api, &Lookups::default(), notes)?;
        }

        Commands::Applications { command } => {
            let api = authorized(&client, &signed_in(guard)?);
            run_records::<JobApplication>(command, &api, &Lookups::default(), notes)?;
        }

        Commands::Listings { command } => {
            let api = authorized(&client, &signed_in(guard)?);
            let companies = if command.needs_lookups() {
                api.resource::<Company>().list()?
            } else {
                Vec::new()
            };
            run_records::<JobListing>(command, &api, &Lookups::new(&companies, &[]), notes)?;
        }

        Commands::Reminders { command } => {
            let api = authorized(&client, &signed_in(guard)?);
            let applications = if command.needs_lookups() {
                api.resource::<JobApplication>().list()?
            } else {
                Vec::new()
            };
            run_records::<Reminder>(command, &api, &Lookups::new(&[], &applications), notes)?;
        }

        Commands::Dashboard => {
            let api = authorized(&client, &signed_in(guard)?);
            let applications = api.resource::<JobApplication>().list()?;
            let stats = dashboard::calculate_stats(&applications);
            println!("Total applications: {}", stats.total);
            match stats.chart() {
                Some(bars) => {
                    let widest = bars.iter().map(|(_, n)| *n).max().unwrap_or(0).max(1);
                    for (label, count) in bars {
                        let bar = "#".repeat((count * 40 / widest) as usize);
                        println!("  {:<12} {:>4} {}", label, count, bar);
                    }
                }
                None => println!("No Data Available"),
            }

            println!("\nRecent Applications:");
            let recent = dashboard::recent_applications(&applications, dashboard::RECENT_LIMIT);
            if recent.is_empty() {
                println!("  No Applications Yet. Start by adding your first job application!");
            }
            for app in recent {
                println!(
                    "  #{:<5} {:<28} {:<20} {:<12} {}",
                    app.id,
                    render::truncate(&render::sanitize_terminal(&app.job_title), 26),
                    render::truncate(&render::sanitize_terminal(&app.company_name), 18),
                    render::format_date(&app.application_date),
                    render::sanitize_terminal(&app.status)
                );
            }
        }

        Commands::Browse => bail!("The browser needs the terminal; run it on its own"),
    }

    Ok(())
}

fn run_records<R: Tabular>(
    command: RecordCommands,
    api: &ApiClient,
    lookups: &Lookups,
    notes: &mut Notifications,
) -> Result<()> {
    let mut records: ListController<R, HttpResource<R>> = ListController::new(api.resource());

    match command {
        RecordCommands::List {
            search,
            status,
            html,
            width,
        } => {
            records.load(notes)?;
            if let Some(term) = search {
                records.set_search(&term);
            }
            if let Some(status) = status {
                records.set_status(&status);
            }
            let table = records.table(lookups);
            if html {
                println!("{}", render::to_html(&table));
            } else {
                for line in render::to_text(&table, width) {
                    println!("{}", line);
                }
            }
        }

        RecordCommands::Show { id } => {
            let record = records.api().get(id)?;
            let draft = record.to_draft();
            println!("{} #{}", R::TITLE, record.id());
            for spec in R::Draft::fields() {
                let value = draft.get(spec.name);
                if !value.trim().is_empty() {
                    println!("{}: {}", spec.label, render::sanitize_terminal(&value));
                }
            }
        }

        RecordCommands::Add { fields } => {
            let fields = parse_fields::<R>(&fields)?;
            records.open_create();
            save(&mut records, fields, notes)?;
        }

        RecordCommands::Edit { id, fields } => {
            let fields = parse_fields::<R>(&fields)?;
            records.open_edit(id, notes)?;
            save(&mut records, fields, notes)?;
        }

        RecordCommands::Delete { id, yes } => {
            let question = format!("Are you sure you want to delete this {}?", R::SINGULAR);
            if !records.delete(id, || yes || confirm(&question), notes)? {
                println!("Cancelled.");
            }
        }
    }

    Ok(())
}

fn save<R: Tabular>(
    records: &mut ListController<R, HttpResource<R>>,
    fields: Vec<(&'static str, String)>,
    notes: &mut Notifications,
) -> Result<()> {
    for (name, value) in fields {
        records.set_field(name, value);
    }
    match records.submit(notes)? {
        SubmitOutcome::Blocked | SubmitOutcome::Ignored => {
            bail!("{}", records.form().error().unwrap_or("Record not saved"))
        }
        SubmitOutcome::Created | SubmitOutcome::Updated => Ok(()),
    }
}

/// Resolves `NAME=VALUE` arguments against the form fields of `R`.
fn parse_fields<R: Resource>(pairs: &[String]) -> Result<Vec<(&'static str, String)>> {
    let known = R::Draft::fields();
    pairs
        .iter()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("Expected NAME=VALUE, got '{}'", pair))?;
            let spec = known
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| {
                    let names: Vec<&str> = known.iter().map(|f| f.name).collect();
                    anyhow!(
                        "Unknown {} field '{}'. Expected one of: {}",
                        R::SINGULAR,
                        name.trim(),
                        names.join(", ")
                    )
                })?;
            Ok((spec.name, value.to_string()))
        })
        .collect()
}

fn signed_in(guard: &SessionGuard) -> Result<Session> {
    guard
        .require()
        .map_err(|_| anyhow!("Not logged in. Run 'jobtrack login' first."))
}

fn authorized(client: &ApiClient, session: &Session) -> ApiClient {
    client.clone().with_token(&session.token)
}

fn print_banners(notes: &mut Notifications) {
    for banner in notes.drain() {
        match banner.kind {
            BannerKind::Success => println!("{}", banner.message),
            BannerKind::Error => eprintln!("{}", banner.message),
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{}: ", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn confirm(question: &str) -> bool {
    match prompt(&format!("{} [y/N]", question)) {
        Ok(answer) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}
