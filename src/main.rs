//! orgllm entrypoint: CLI flags, the organization setup wizard, and signal
//! wiring. The first SIGINT schedules a graceful shutdown task; a second one
//! exits the process immediately. Exit code 0 on clean shutdown, non-zero on
//! startup failure (missing API key, unreadable snapshot).

use clap::Parser;
use orgllm::orgllm::clients::openai::OpenAIClient;
use orgllm::orgllm::organization::Organization;
use orgllm::{ClientWrapper, OrgConfig};
use serde::Deserialize;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "orgllm",
    version,
    about = "Run a self-organizing hierarchy of LLM agents"
)]
struct Cli {
    /// Run agent loops without a step-limit prompt.
    #[arg(long)]
    continuous: bool,

    /// Stop each agent after N loop iterations (0 = unlimited).
    #[arg(long, value_name = "N", default_value_t = 0)]
    continuous_limit: u64,

    /// Settings file describing the organization to create (skips the wizard).
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Speak assistant output aloud.
    #[arg(long)]
    speak: bool,

    /// Verbose diagnostics.
    #[arg(long)]
    debug: bool,

    /// Force the small/fast model for every call.
    #[arg(long)]
    force_small_model: bool,

    /// Force the large model for every call.
    #[arg(long)]
    force_large_model: bool,

    /// Memory backend name.
    #[arg(long, value_name = "NAME", default_value = "json_file")]
    memory_backend: String,

    /// Browser the web tools should impersonate.
    #[arg(long, value_name = "NAME", default_value = "chrome")]
    browser: String,

    /// Allow tools to download files.
    #[arg(long)]
    allow_downloads: bool,

    /// Skip the news banner.
    #[arg(long)]
    skip_news: bool,

    /// Skip re-prompting when resuming an organization.
    #[arg(long)]
    skip_reprompt: bool,

    /// Workspace root holding all organizations.
    #[arg(long, value_name = "DIR", default_value = "organizations")]
    workspace: PathBuf,

    /// Install plugin dependencies at startup.
    #[arg(long)]
    install_plugin_deps: bool,

    /// Disable organization mode.
    #[arg(long)]
    no_org_mode: bool,
}

/// Shape of the optional `--settings` file.
#[derive(Debug, Deserialize)]
struct OrgSettings {
    org_name: String,
    org_goal: String,
    founder_name: String,
    founder_role: String,
    #[serde(default)]
    founder_goals: Vec<String>,
    #[serde(default)]
    initial_budget: Option<i64>,
}

const DEFAULT_ORG_NAME: &str = "ClosedAI";
const DEFAULT_ORG_GOAL: &str = "To create a general AI that can solve any problem.";
const DEFAULT_FOUNDER_NAME: &str = "Elon Musk";
const DEFAULT_FOUNDER_ROLE: &str =
    "an AI designed to autonomously develop and run businesses with the sole goal of increasing your net worth.";
const DEFAULT_INITIAL_BUDGET: i64 = 500_000;

fn config_from_cli(cli: &Cli) -> OrgConfig {
    OrgConfig {
        workspace_root: cli.workspace.clone(),
        continuous_mode: cli.continuous,
        continuous_limit: cli.continuous_limit,
        debug_mode: cli.debug,
        speak_mode: cli.speak,
        force_small_model: cli.force_small_model,
        force_large_model: cli.force_large_model,
        memory_backend: cli.memory_backend.clone(),
        browser_name: cli.browser.clone(),
        allow_downloads: cli.allow_downloads,
        skip_news: cli.skip_news,
        skip_reprompt: cli.skip_reprompt,
        install_plugin_deps: cli.install_plugin_deps,
        org_mode: !cli.no_org_mode,
        ..OrgConfig::default()
    }
}

fn prompt_line(prompt: &str, default: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return default.to_string();
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

/// List organization directories already present in the workspace.
fn existing_organizations(config: &OrgConfig) -> Vec<String> {
    let mut names = Vec::new();
    if let Ok(entries) = fs::read_dir(&config.workspace_root) {
        for entry in entries.filter_map(|e| e.ok()) {
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
    }
    names.sort();
    names
}

/// Interactive wizard: resume an existing organization or create a new one.
async fn get_organization(
    cli: &Cli,
    config: OrgConfig,
    client: Arc<dyn ClientWrapper>,
) -> io::Result<Arc<Organization>> {
    let existing = existing_organizations(&config);
    if !existing.is_empty() && cli.settings.is_none() {
        println!("Welcome back! These are the existing organizations: {:?}", existing);
        let answer = prompt_line("Do you want to continue running any of the existing ones? (y/n): ", "n");
        if answer.eq_ignore_ascii_case("y") {
            let name = prompt_line("Please specify the name of the existing organization: ", "");
            if existing.contains(&name) {
                return Organization::load(&name, config, client).await;
            }
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Organization with name: {} doesn't exist", name),
            ));
        }
    }

    let settings = match &cli.settings {
        Some(path) => {
            let raw = fs::read_to_string(path)?;
            let parsed: OrgSettings = serde_json::from_str(&raw)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            parsed
        }
        None => {
            println!("Welcome to orgllm. Let's start the creation of a new organization.");
            let org_name = prompt_line(
                &format!("Organization name (default '{}'): ", DEFAULT_ORG_NAME),
                DEFAULT_ORG_NAME,
            );
            let org_goal = prompt_line("Organization goal: ", DEFAULT_ORG_GOAL);
            let founder_name = prompt_line(
                &format!("Founder name (default '{}'): ", DEFAULT_FOUNDER_NAME),
                DEFAULT_FOUNDER_NAME,
            );
            let founder_role = prompt_line(
                &format!("{} is: ", founder_name),
                DEFAULT_FOUNDER_ROLE,
            );
            println!("Enter up to 5 goals for {} (empty line to finish):", founder_name);
            let mut founder_goals = Vec::new();
            for i in 0..5 {
                let goal = prompt_line(&format!("Goal {}: ", i + 1), "");
                if goal.is_empty() {
                    break;
                }
                founder_goals.push(goal);
            }
            let budget_raw = prompt_line(
                &format!("Initial budget (default {}): ", DEFAULT_INITIAL_BUDGET),
                &DEFAULT_INITIAL_BUDGET.to_string(),
            );
            let initial_budget = budget_raw.parse::<i64>().ok();
            OrgSettings {
                org_name,
                org_goal,
                founder_name,
                founder_role,
                founder_goals,
                initial_budget,
            }
        }
    };

    let mut founder_goals = settings.founder_goals;
    if founder_goals.is_empty() {
        founder_goals = vec![
            "Increase net worth".to_string(),
            "Grow Twitter Account".to_string(),
            "Develop and manage multiple businesses autonomously".to_string(),
        ];
    }
    let initial_budget = settings.initial_budget.unwrap_or(DEFAULT_INITIAL_BUDGET);

    let org = Organization::create(
        &settings.org_name,
        &settings.org_goal,
        initial_budget,
        config,
        client,
    )
    .await?;
    org.found(&settings.founder_name, &settings.founder_role, founder_goals)
        .await?;
    Ok(org)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if cli.debug {
        builder.filter_level(log::LevelFilter::Debug);
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.init();

    let config = config_from_cli(&cli);
    if !config.org_mode {
        log::error!("organization mode is disabled; nothing to run");
        process::exit(1);
    }

    let api_key = match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => {
            log::error!("OPENAI_API_KEY is not set; cannot start");
            process::exit(1);
        }
    };
    let client: Arc<dyn ClientWrapper> = Arc::new(
        OpenAIClient::new_with_model_string(&api_key, config.loop_model())
            .with_max_tokens(config.max_response_tokens),
    );

    if !config.skip_news {
        println!("orgllm {} — organization runtime", env!("CARGO_PKG_VERSION"));
    }

    let org = match get_organization(&cli, config, client).await {
        Ok(org) => org,
        Err(e) => {
            log::error!("failed to start organization: {}", e);
            process::exit(1);
        }
    };

    // SIGINT wiring: the listener only schedules the shutdown task; a second
    // interrupt exits immediately.
    let signal_org = Arc::clone(&org);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        log::info!("termination signal received, initiating shutdown");
        let shutdown_org = Arc::clone(&signal_org);
        tokio::spawn(async move { shutdown_org.shutdown().await });
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("second interrupt received, exiting immediately");
            process::exit(130);
        }
    });

    org.start().await;
    log::info!("clean shutdown complete");
}
