use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use freelify_jobs::api::admin::{AdminStats, CategoryDraft, UserAccount};
use freelify_jobs::api::job::{
    JobDraft, JobRecord, JobService, SortOrder, UserStats, WorkLocation,
};
use freelify_jobs::api::{AdminService, ApiClient, AuthService, Identity, Role, Session};
use freelify_jobs::config::Config;
use freelify_jobs::listing::{
    Fetch, FetchMode, FetchOutcome, Filter, ListingController, ListingState, QueryState,
    ScrollFeed,
};
use freelify_jobs::shutdown::ShutdownCoordinator;

#[derive(Parser)]
#[command(name = "freelify", version, about = "Browse and manage Freelify marketplace jobs")]
struct Cli {
    /// Marketplace API base URL (overrides API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token for authenticated endpoints (overrides API_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scroll through all jobs interactively
    Browse {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// remote, on-site or hybrid
        #[arg(long)]
        location: Option<WorkLocation>,
        /// asc (oldest first) or desc (newest first)
        #[arg(long, default_value = "desc")]
        sort: SortOrder,
    },
    /// Show one job in full
    Show { id: String },
    /// Most recent postings
    Latest,
    /// Available job categories
    Categories,
    /// Jobs posted by a user
    Mine {
        #[arg(long)]
        email: String,
    },
    /// Jobs a user has accepted
    Accepted {
        #[arg(long)]
        email: String,
    },
    /// Accept someone else's job
    Accept {
        id: String,
        #[arg(long)]
        email: String,
    },
    /// Remove an accepted job (done or cancelled)
    Done { id: String },
    /// Post a job described by a JSON file
    Post {
        #[arg(long)]
        file: PathBuf,
    },
    /// Replace a job with the contents of a JSON file
    Update {
        id: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete a job
    Delete { id: String },
    /// Exchange an identity for a backend JWT
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Dashboard counters for the signed-in user
    Stats,
    /// Administration (the account given with --as must be an admin)
    Admin {
        /// Email of the acting admin account
        #[arg(long = "as", value_name = "EMAIL")]
        acting: String,
        #[command(subcommand)]
        command: AdminCommand,
    },
}

#[derive(Subcommand)]
enum AdminCommand {
    /// List accounts, optionally filtered by name or email
    Users {
        #[arg(long)]
        search: Option<String>,
    },
    /// Change an account's role
    SetRole {
        email: String,
        /// user or admin
        role: Role,
    },
    /// Delete an account
    DeleteUser { email: String },
    /// Add a job category
    AddCategory {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        icon: String,
    },
    /// Marketplace-wide counters
    Stats,
}

fn init_tracing(log_dir: &str) -> std::io::Result<()> {
    // Create logs directory if it doesn't exist
    std::fs::create_dir_all(log_dir)?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    // Daily rotating files: logs/info.log.2026-10-16, logs/error.log.2026-10-16, ...
    let info_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::daily(log_dir, "info.log"))
        .with_ansi(false)
        .with_filter(LevelFilter::INFO);

    let warn_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::daily(log_dir, "warn.log"))
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(tracing_appender::rolling::daily(log_dir, "error.log"))
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    // stdout belongs to the listing, so console logs go to stderr
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_filter(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(api_url) = cli.api_url.clone() {
        config.api_url = api_url;
    }
    if let Some(token) = cli.token.clone() {
        config.api_token = Some(token);
    }

    if let Err(e) = init_tracing(&config.log_dir) {
        eprintln!("Failed to set up logging in {}: {}", config.log_dir, e);
        return ExitCode::FAILURE;
    }

    info!("Starting freelify against {}", config.api_url);
    info!("  - Page size: {}", config.page_size);
    info!("  - Request timeout: {:?}", config.request_timeout);

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: Config) -> Result<(), Box<dyn Error>> {
    let session = match &config.api_token {
        Some(token) => Session::with_token(token.clone()),
        None => Session::new(),
    };
    let client = ApiClient::authenticated(&config.api_url, config.request_timeout, session.clone())?;
    let jobs = JobService::new(client.clone());

    match command {
        Command::Browse {
            search,
            category,
            location,
            sort,
        } => {
            let mut query = QueryState::new(config.page_size)
                .with_filter(Filter::Location(location))
                .with_sort(sort);
            if let Some(term) = search {
                query = query.with_filter(Filter::Search(term));
            }
            if let Some(category) = category {
                query = query.with_filter(Filter::category(&category));
            }
            browse(jobs, query).await;
        }
        Command::Show { id } => {
            let job = jobs.job_details(&id).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Command::Latest => print_cards(&jobs.latest_jobs().await?),
        Command::Categories => {
            for category in jobs.categories().await? {
                println!("{}", category.name);
            }
        }
        Command::Mine { email } => print_cards(&jobs.my_added_jobs(&email).await?),
        Command::Accepted { email } => {
            for job in jobs.my_accepted_jobs(&email).await? {
                println!(
                    "{}  {}  [{}]  accepted {}",
                    job.id.as_deref().unwrap_or("-"),
                    job.title,
                    job.category.as_deref().unwrap_or("Uncategorized"),
                    job.accepted_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::Accept { id, email } => {
            let job = jobs.job_details(&id).await?;
            jobs.accept_job(&job, &email).await?;
            println!("Job accepted successfully!");
        }
        Command::Done { id } => {
            if jobs.remove_accepted(&id).await? {
                println!("Task removed");
            } else {
                println!("Nothing to remove for {}", id);
            }
        }
        Command::Post { file } => {
            let draft = read_draft(&file)?;
            let id = jobs.add_job(draft).await?;
            println!("Job posted with id {}", id);
        }
        Command::Update { id, file } => {
            let draft = read_draft(&file)?;
            if jobs.update_job(&id, draft).await? {
                println!("Job updated successfully!");
            } else {
                println!("No changes detected.");
            }
        }
        Command::Delete { id } => {
            if jobs.delete_job(&id).await? {
                println!("Job deleted successfully!");
            } else {
                println!("Job {} was not deleted", id);
            }
        }
        Command::Login {
            email,
            name,
            password,
        } => {
            let auth = AuthService::new(client, session.clone());
            let identity = Identity {
                email,
                display_name: name,
                photo_url: None,
            };
            let role = auth.sync_user(&identity, password.as_deref()).await?;
            println!("Signed in as {:?}", role);
            if let Some(token) = session.token() {
                println!("export API_TOKEN={}", token);
            }
        }
        Command::Stats => print_user_stats(&jobs.user_stats().await?),
        Command::Admin { acting, command } => {
            let role = AuthService::new(client.clone(), session).fetch_role(&acting).await?;
            let admin = AdminService::new(client, role)?;
            run_admin(&admin, command).await?;
        }
    }
    Ok(())
}

async fn run_admin(admin: &AdminService, command: AdminCommand) -> Result<(), Box<dyn Error>> {
    match command {
        AdminCommand::Users { search } => {
            let users = admin.users().await?;
            let term = search.unwrap_or_default();
            let shown: Vec<&UserAccount> = users.iter().filter(|user| user.matches(&term)).collect();
            if shown.is_empty() {
                println!("No users found.");
            }
            for user in shown {
                println!("{}", user_line(user));
            }
        }
        AdminCommand::SetRole { email, role } => {
            admin.set_role(&email, role).await?;
            println!("User role updated successfully!");
        }
        AdminCommand::DeleteUser { email } => {
            admin.delete_user(&email).await?;
            println!("User deleted successfully!");
        }
        AdminCommand::AddCategory {
            name,
            description,
            icon,
        } => {
            admin
                .add_category(CategoryDraft {
                    name,
                    description,
                    icon,
                })
                .await?;
            println!("Category added successfully!");
        }
        AdminCommand::Stats => print_admin_stats(&admin.stats().await?),
    }
    Ok(())
}

fn user_line(user: &UserAccount) -> String {
    let joined = user
        .created_at
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}  <{}>  {}  joined {}",
        user.name,
        user.email,
        user.role.normalized(),
        joined
    )
}

fn print_user_stats(stats: &UserStats) {
    println!("Jobs posted:      {}", stats.total_jobs_posted);
    println!("Jobs accepted:    {}", stats.total_jobs_accepted);
    println!("Completed:        {}", stats.completed_jobs);
    println!("In progress:      {}", stats.in_progress_jobs);
    println!("Total earnings:   {:.2}", stats.total_earnings);
}

fn print_admin_stats(stats: &AdminStats) {
    println!("Users:            {}", stats.total_users);
    println!("Jobs:             {}", stats.total_jobs);
    println!("Accepted jobs:    {}", stats.total_accepted_jobs);
    println!("Categories:       {}", stats.total_categories);
    if !stats.recent_jobs.is_empty() {
        println!("\nRecent jobs:");
        print_cards(&stats.recent_jobs);
    }
}

fn read_draft(path: &Path) -> Result<JobDraft, Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn card_line(index: usize, job: &JobRecord) -> String {
    format!(
        "{:>3}. {}  [{}]  by {}  ({})",
        index,
        job.title,
        job.category.as_deref().unwrap_or("Uncategorized"),
        job.posted_by.as_deref().unwrap_or("unknown"),
        job.id
    )
}

fn print_cards(jobs: &[JobRecord]) {
    if jobs.is_empty() {
        println!("No jobs found.");
    }
    for (i, job) in jobs.iter().enumerate() {
        println!("{}", card_line(i + 1, job));
    }
}

/// A line typed at the browse prompt
#[derive(Debug, PartialEq)]
enum BrowseCommand {
    More,
    Search(String),
    Category(String),
    Location(Option<WorkLocation>),
    Sort(SortOrder),
    Clear,
    Retry,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<BrowseCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "" | "more" | "m" => Ok(BrowseCommand::More),
        "search" | "s" => Ok(BrowseCommand::Search(rest.to_string())),
        "category" | "c" => Ok(BrowseCommand::Category(rest.to_string())),
        "location" | "l" => match rest.to_ascii_lowercase().as_str() {
            "" | "any" | "all" => Ok(BrowseCommand::Location(None)),
            other => other.parse().map(|l| BrowseCommand::Location(Some(l))),
        },
        "sort" => rest.parse().map(BrowseCommand::Sort),
        "clear" => Ok(BrowseCommand::Clear),
        "retry" | "r" => Ok(BrowseCommand::Retry),
        "help" | "h" | "?" => Ok(BrowseCommand::Help),
        "quit" | "q" | "exit" => Ok(BrowseCommand::Quit),
        other => Err(format!("Unknown command '{}', type `help`", other)),
    }
}

const BROWSE_HELP: &str = "\
Commands:
  <Enter> | more            load the next page
  search <text>             filter by text (empty clears)
  category <name|all>       filter by category
  location <remote|on-site|hybrid|any>
  sort <asc|desc>           oldest or newest first
  clear                     drop search, category and location
  retry                     retry the last failed load
  quit";

/// Interactive infinite-scroll session over the listing controller
async fn browse(jobs: JobService, query: QueryState) {
    let controller = ListingController::with_query(Arc::new(jobs), query);
    let (mut coordinator, shutdown_rx) = ShutdownCoordinator::new();
    let (sentinel_tx, sentinel_rx) = mpsc::channel(8);

    let (fetch_tx, fetch_rx) = mpsc::channel(8);

    let feed = ScrollFeed::new(controller.clone());
    let feed_shutdown = shutdown_rx.clone();
    coordinator.track(
        "Scroll feed",
        tokio::spawn(async move { feed.run(sentinel_rx, feed_shutdown).await }),
    );
    coordinator.track(
        "Fetch runner",
        tokio::spawn(run_fetches(fetch_rx, shutdown_rx.clone())),
    );
    coordinator.track(
        "Renderer",
        tokio::spawn(render(controller.subscribe(), shutdown_rx)),
    );

    println!("{}", BROWSE_HELP);
    let prompt = Prompt {
        controller: controller.clone(),
        sentinel: sentinel_tx,
        fetches: fetch_tx,
    };
    prompt.submit(controller.refresh()).await;

    coordinator.wait_for_shutdown(command_loop(prompt)).await;
}

/// Runs fetches started from the prompt until shutdown, then waits for the
/// ones still in flight
///
/// Fetches still queued when shutdown arrives are dropped, which releases
/// their loading flags.
async fn run_fetches(mut fetches: mpsc::Receiver<Fetch>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut pending: Vec<JoinHandle<()>> = Vec::new();

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            fetch = fetches.recv() => match fetch {
                Some(fetch) => pending.push(tokio::spawn(async move {
                    if let FetchOutcome::Failed { error, .. } = fetch.await {
                        error!("Listing fetch failed: {}", error);
                    }
                })),
                None => break,
            },
        }
        pending.retain(|handle| !handle.is_finished());
    }

    for handle in pending {
        if let Err(e) = handle.await {
            error!("Listing fetch task failed: {:?}", e);
        }
    }
}

/// Where the browse prompt sends its work
struct Prompt {
    controller: ListingController,
    sentinel: mpsc::Sender<()>,
    fetches: mpsc::Sender<Fetch>,
}

impl Prompt {
    async fn submit(&self, fetch: Fetch) {
        if fetch.is_skipped() {
            return;
        }
        if self.fetches.send(fetch).await.is_err() {
            error!("Fetch runner stopped, dropping fetch");
        }
    }
}

async fn command_loop(prompt: Prompt) {
    let controller = &prompt.controller;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read from stdin: {}", e);
                break;
            }
        };

        match parse_command(&line) {
            Ok(BrowseCommand::More) => {
                if prompt.sentinel.send(()).await.is_err() {
                    break;
                }
            }
            Ok(BrowseCommand::Search(term)) => {
                prompt.submit(controller.set_filter(Filter::Search(term))).await
            }
            Ok(BrowseCommand::Category(name)) => {
                prompt.submit(controller.set_filter(Filter::category(&name))).await
            }
            Ok(BrowseCommand::Location(location)) => {
                prompt.submit(controller.set_filter(Filter::Location(location))).await
            }
            Ok(BrowseCommand::Sort(order)) => prompt.submit(controller.set_sort_order(order)).await,
            Ok(BrowseCommand::Clear) => prompt.submit(controller.clear_filters()).await,
            Ok(BrowseCommand::Retry) => {
                let failed_append = controller
                    .snapshot()
                    .last_failure()
                    .is_some_and(|failure| failure.mode == FetchMode::Append);
                if failed_append {
                    prompt.submit(controller.load_next_page()).await;
                } else {
                    prompt.submit(controller.refresh()).await;
                }
            }
            Ok(BrowseCommand::Help) => println!("{}", BROWSE_HELP),
            Ok(BrowseCommand::Quit) => break,
            Err(message) => println!("{}", message),
        }
    }
}

/// What the terminal has already printed for the current listing
#[derive(Default)]
struct View {
    generation: u64,
    shown: usize,
    was_busy: bool,
    failure_reported: bool,
}

impl View {
    fn update(&mut self, state: &ListingState) {
        if state.generation() != self.generation {
            self.generation = state.generation();
            self.shown = 0;
            self.failure_reported = false;
            println!("\n{}", describe_query(state.query()));
        }

        if state.is_loading() && !self.was_busy {
            println!("Loading jobs...");
        } else if state.is_loading_more() && !self.was_busy {
            println!("Loading more...");
        }

        for (i, job) in state.items().iter().enumerate().skip(self.shown) {
            println!("{}", card_line(i + 1, job));
        }
        self.shown = state.items().len();

        match state.last_failure() {
            Some(failure) if !self.failure_reported => {
                println!("{} ({}). Type `retry` or `clear`.", failure.message(), failure.detail);
                self.failure_reported = true;
            }
            Some(_) => {}
            None => {
                self.failure_reported = false;
                if self.was_busy && !state.is_busy() {
                    if state.items().is_empty() {
                        println!("No jobs match these filters. Type `clear` to reset them.");
                    } else if state.has_more() {
                        println!(
                            "Showing {} of {} jobs. Press Enter for more.",
                            state.items().len(),
                            state.total_count()
                        );
                    } else {
                        println!("All {} jobs shown.", state.items().len());
                    }
                }
            }
        }
        self.was_busy = state.is_busy();
    }
}

fn describe_query(query: &QueryState) -> String {
    let mut parts = vec![format!("sort: {}", query.sort())];
    if !query.search().trim().is_empty() {
        parts.push(format!("search: \"{}\"", query.search().trim()));
    }
    if let Some(category) = query.category() {
        parts.push(format!("category: {}", category));
    }
    if let Some(location) = query.location() {
        parts.push(format!("location: {}", location));
    }
    format!("== All jobs ({}) ==", parts.join(", "))
}

async fn render(mut state_rx: watch::Receiver<ListingState>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut view = View::default();
    loop {
        // printing can block, so don't hold the watch lock while doing it
        let state = state_rx.borrow_and_update().clone();
        view.update(&state);
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = shutdown_rx.changed() => break,
        }
    }
}
