//! Graphbridge CLI
//!
//! Command-line interface for running declarative Microsoft Graph tools.
//!
//! # Usage
//!
//! ```bash
//! # Sign in with the device code flow
//! graphbridge login
//!
//! # Find tools
//! graphbridge tools list --category mail
//!
//! # Run a tool
//! graphbridge run list-mail-messages --param top=5
//! ```

use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use graphbridge_cli::app::{self, App};
use graphbridge_cli::config::{CliConfig, load_config};
use graphbridge_cli::output::{self, OutputFormat};
use graphbridge_core::registry::DEFAULT_SEARCH_LIMIT;
use graphbridge_core::{CATEGORIES, DeviceCodeInfo};
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "graphbridge")]
#[command(about = "Run Microsoft Graph API operations from a declarative catalog")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only expose read operations
    #[arg(long, global = true)]
    read_only: bool,

    /// Expose organization-only tools and request their scopes
    #[arg(long, alias = "work-mode", global = true)]
    org_mode: bool,

    /// Regex allow-list over tool names
    #[arg(long, global = true)]
    enabled_tools: Option<String>,

    /// Tool category presets (comma-separated)
    #[arg(long, value_delimiter = ',', global = true)]
    preset: Vec<String>,

    /// Microsoft cloud (global, china)
    #[arg(long, global = true)]
    cloud: Option<String>,

    /// Endpoint catalog file
    #[arg(long, global = true)]
    catalog: Option<std::path::PathBuf>,

    /// Print single-line JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with the device code flow
    Login,

    /// Forget all accounts and cached tokens
    Logout,

    /// Show authentication status
    Status,

    /// Manage signed-in accounts
    #[command(subcommand)]
    Accounts(AccountCommands),

    /// Inspect available tools
    #[command(subcommand)]
    Tools(ToolCommands),

    /// Execute a tool
    Run(RunArgs),

    /// List tool category presets
    Presets,
}

#[derive(Subcommand)]
enum AccountCommands {
    /// List cached accounts
    List,

    /// Make an account the active one
    Select {
        /// Home account id
        account_id: String,
    },

    /// Remove an account from the cache
    Remove {
        /// Home account id
        account_id: String,
    },
}

#[derive(Subcommand)]
enum ToolCommands {
    /// List or search tools
    List {
        /// Free-text filter over name, path and description
        #[arg(short, long)]
        filter: Option<String>,

        /// Restrict to a category
        #[arg(short, long)]
        category: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },

    /// Show a tool's parameters and scopes
    Describe {
        /// Tool name
        name: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Tool name
    tool: String,

    /// Request body as JSON, or @path to read it from a file
    #[arg(long)]
    body: Option<String>,

    /// Tool parameter as key=value (repeatable)
    #[arg(short, long = "param")]
    params: Vec<String>,

    /// Follow continuation links and merge all pages
    #[arg(long)]
    fetch_all_pages: bool,

    /// Include the response ETag
    #[arg(long)]
    include_headers: bool,

    /// Return only success or failure
    #[arg(long)]
    exclude_response: bool,

    /// Time zone for calendar results
    #[arg(long)]
    timezone: Option<String>,

    /// Expand single-value extended properties
    #[arg(long)]
    expand_extended_properties: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config()?;
    apply_flags(&mut config, &cli);
    let format = config.output_format;

    run_command(config, cli.command, format).await
}

/// Command-line flags win over file and environment settings.
fn apply_flags(config: &mut CliConfig, cli: &Cli) {
    if cli.read_only {
        config.read_only = true;
    }
    if cli.org_mode {
        config.org_mode = true;
    }
    if let Some(pattern) = &cli.enabled_tools {
        config.enabled_tools = Some(pattern.clone());
    }
    if !cli.preset.is_empty() {
        config.presets = cli.preset.clone();
    }
    if let Some(cloud) = &cli.cloud {
        config.cloud = Some(cloud.clone());
    }
    if let Some(catalog) = &cli.catalog {
        config.catalog_path = Some(catalog.clone());
    }
    if cli.compact {
        config.output_format = OutputFormat::Compact;
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Dispatch `command`. Only commands that touch the engine build it, so
/// `presets` works even with an unusable configuration.
async fn run_command(config: CliConfig, command: Commands, format: OutputFormat) -> Result<ExitCode> {
    match command {
        Commands::Presets => presets(format),
        Commands::Login => login(&App::build(config).await?, format).await,
        Commands::Logout => {
            App::build(config).await?.auth.logout().await?;
            output::print(&json!({ "message": "Logged out successfully" }), format)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => {
            let app = App::build(config).await?;
            output::print(&app.auth.status().await, format)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Accounts(command) => accounts(&App::build(config).await?, command, format).await,
        Commands::Tools(command) => tools(&App::build(config).await?, command, format),
        Commands::Run(args) => run_tool(&App::build(config).await?, args, format).await,
    }
}

fn presets(format: OutputFormat) -> Result<ExitCode> {
    let presets: Vec<_> = CATEGORIES
        .iter()
        .map(|c| {
            json!({
                "name": c.name,
                "description": c.description,
                "requiresOrgMode": c.requires_org_mode,
            })
        })
        .collect();
    output::print(&presets, format)?;
    Ok(ExitCode::SUCCESS)
}

async fn login(app: &App, format: OutputFormat) -> Result<ExitCode> {
    let identity = app
        .auth
        .acquire_by_device_code(&|info: &DeviceCodeInfo| eprintln!("{}", info.message))
        .await?;
    eprintln!("Signed in as {}. Testing connection with Graph API...", identity.username);

    let check = app.auth.verify_login(&app.client).await;
    output::print(&check, format)?;
    Ok(if check.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn accounts(app: &App, command: AccountCommands, format: OutputFormat) -> Result<ExitCode> {
    match command {
        AccountCommands::List => {
            output::print(&json!({ "accounts": app.auth.list_accounts().await }), format)?;
        }
        AccountCommands::Select { account_id } => {
            if !app.auth.select_account(&account_id).await? {
                bail!("Account not found: {}", account_id);
            }
            output::print(&json!({ "message": format!("Selected account {}", account_id) }), format)?;
        }
        AccountCommands::Remove { account_id } => {
            if !app.auth.remove_account(&account_id).await? {
                bail!("Account not found: {}", account_id);
            }
            output::print(&json!({ "message": format!("Removed account {}", account_id) }), format)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn tools(app: &App, command: ToolCommands, format: OutputFormat) -> Result<ExitCode> {
    match command {
        ToolCommands::List {
            filter,
            category,
            limit,
        } => {
            let found = app.registry.search(filter.as_deref(), category.as_deref(), limit);
            let tools: Vec<_> = found.into_iter().map(app::tool_summary).collect();
            output::print(
                &json!({ "total": app.registry.len(), "found": tools.len(), "tools": tools }),
                format,
            )?;
        }
        ToolCommands::Describe { name } => {
            let Some(entry) = app.registry.get(&name) else {
                bail!("Tool not found: {}", name);
            };
            output::print(&app::tool_details(entry), format)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_tool(app: &App, args: RunArgs, format: OutputFormat) -> Result<ExitCode> {
    let mut params = app::build_params(
        &args.params,
        args.body.as_deref(),
        &[
            ("fetchAllPages", args.fetch_all_pages),
            ("includeHeaders", args.include_headers),
            ("excludeResponse", args.exclude_response),
            ("expandExtendedProperties", args.expand_extended_properties),
        ],
    )?;
    if let Some(tz) = args.timezone {
        params.insert("timezone".to_string(), tz.into());
    }

    let result = app.executor().execute_endpoint_call(&args.tool, &params).await;
    if result.is_error {
        output::eprint(&result, format)?;
        return Ok(ExitCode::FAILURE);
    }
    output::print(&result, format)?;
    Ok(ExitCode::SUCCESS)
}
