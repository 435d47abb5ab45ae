use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use ckan_explorer::config::Config;
use ckan_explorer::query::MATCH_ALL;
use ckan_explorer::CatalogClient;

mod commands;

#[derive(Parser)]
#[command(name = "ckan")]
#[command(version)]
#[command(about = "Explore a CKAN open-data portal", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Portal base URL (overrides config file and CKAN_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show portal statistics
    Stats,

    /// Search for datasets
    #[command(visible_alias = "s")]
    Search {
        /// Search query
        #[arg(default_value = MATCH_ALL)]
        query: String,

        /// Number of results
        #[arg(short = 'n', long, default_value_t = 10)]
        rows: i64,

        /// Offset into the result list
        #[arg(long, default_value_t = 0)]
        start: i64,

        /// Only datasets of these organizations
        #[arg(short, long, value_delimiter = ',')]
        org: Vec<String>,

        /// Only datasets carrying any of these tags
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Sort order, e.g. "metadata_modified desc"
        #[arg(long)]
        sort: Option<String>,

        /// Count values of these fields
        #[arg(long, value_delimiter = ',')]
        facets: Vec<String>,

        /// Only datasets created at or after this time (ISO-8601)
        #[arg(long)]
        since: Option<String>,

        /// Only datasets created at or before this time (ISO-8601)
        #[arg(long)]
        until: Option<String>,
    },

    /// Show dataset information
    #[command(visible_alias = "info")]
    Show {
        /// Dataset ID or name
        package_id: String,

        /// Include custom fields
        #[arg(short, long)]
        detailed: bool,
    },

    /// List datasets, organizations, groups or tags
    #[command(visible_alias = "ls")]
    List {
        /// What to list
        #[arg(value_enum, default_value_t = Entity::Packages)]
        entity: Entity,

        /// Maximum number of entries
        #[arg(short = 'n', long, default_value_t = 20)]
        number: i64,
    },

    /// Show an organization and its datasets
    Org {
        /// Organization ID or name
        org_id: String,
    },

    /// Show your default organization's datasets
    My {
        /// Organization (defaults to `default_org` from the config file)
        org: Option<String>,
    },

    /// Show a resource, optionally downloading it
    Resource {
        /// Resource ID
        resource_id: String,

        /// Download the file to this path
        #[arg(short, long)]
        download: Option<PathBuf>,
    },

    /// Print the tool descriptions as JSON
    Tools,

    /// Run as an MCP server on stdin/stdout
    Serve,

    /// Run a single tool call and print the JSON response
    Tool {
        /// Tool name, e.g. package_search
        name: String,

        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Entity {
    Packages,
    Orgs,
    Groups,
    Tags,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries tool responses, so logs stay on stderr and quiet by default
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let mut config = Config::load()?;
    if let Some(url) = cli.url {
        config.catalog.url = url;
    }
    let client = CatalogClient::new(config.client_config())
        .with_context(|| format!("Invalid portal URL: {}", config.catalog.url))?;

    if cli.verbose {
        eprintln!(
            "{} Using portal {}",
            "::".bright_blue(),
            config.catalog.url.bright_white()
        );
    }

    match cli.command {
        Commands::Stats => commands::stats::run(&client).await,
        Commands::Search {
            query,
            rows,
            start,
            org,
            tags,
            sort,
            facets,
            since,
            until,
        } => {
            let options = commands::search::SearchOptions {
                rows,
                start,
                organizations: org,
                tags,
                sort,
                facets,
                since,
                until,
            };
            commands::search::run(&client, &query, options).await
        }
        Commands::Show {
            package_id,
            detailed,
        } => commands::show::run(&client, &package_id, detailed).await,
        Commands::List { entity, number } => commands::list::run(&client, entity, number).await,
        Commands::Org { org_id } => commands::org::run(&client, &org_id).await,
        Commands::My { org } => {
            let org = org.or(config.catalog.default_org.clone()).context(
                "No organization given and no default_org set in the config file",
            )?;
            commands::org::datasets(&client, &org).await
        }
        Commands::Resource {
            resource_id,
            download,
        } => commands::resource::run(&client, &resource_id, download.as_deref()).await,
        Commands::Tools => commands::tool::list(),
        Commands::Serve => commands::tool::serve(client, config.client_config()).await,
        Commands::Tool { name, arguments } => {
            commands::tool::invoke(client, &name, &arguments).await
        }
    }
}
