//! CLI for the vector database workflow

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vdb_workflow::{server, LocalService, RunReport, Workflow, WorkflowConfig};

#[derive(Parser)]
#[command(name = "vdb-workflow")]
#[command(about = "Create, fill, index, search and drop vector collections", long_about = None)]
struct Cli {
    /// JSON file with workflow settings
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    user: Option<String>,

    #[arg(long)]
    password: Option<String>,

    /// Database selected when connecting
    #[arg(long)]
    db_name: Option<String>,

    /// Seed for the generated data
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demonstration sequence (default)
    Run {
        /// Use an in-process database instead of connecting to a server
        #[arg(long)]
        local: bool,
    },
    /// Start the reference HTTP server
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1:19530")]
        addr: String,
    },
}

impl Cli {
    fn workflow_config(&self) -> Result<WorkflowConfig> {
        let mut config = match &self.config {
            Some(path) => WorkflowConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => WorkflowConfig::default(),
        };
        let conn = &mut config.connection;
        if let Some(host) = &self.host {
            conn.host = host.clone();
        }
        if let Some(port) = self.port {
            conn.port = port;
        }
        if let Some(user) = &self.user {
            conn.user = user.clone();
        }
        if let Some(password) = &self.password {
            conn.password = password.clone();
        }
        if let Some(db_name) = &self.db_name {
            conn.db_name = db_name.clone();
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        Ok(config)
    }
}

fn print_report(report: &RunReport) {
    let rw = &report.read_write;
    println!("\nThe number of entity: {}", rw.num_entities);
    println!("\nCreated index:\n{}", rw.index);

    for (i, hits) in rw.results.iter().enumerate() {
        println!("\nSearch result for {}th vector: ", i);
        for (j, hit) in hits.iter().enumerate() {
            println!("Top {}: {}", j, hit);
        }
    }
    println!("\nDrop index successfully");

    println!("\nlist collections of database:");
    println!("{:?}", report.collections);
    println!("\nlist databases:");
    println!("{:?}", report.databases);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("vdb_workflow=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.workflow_config()?;

    match cli.command.unwrap_or(Commands::Run { local: false }) {
        Commands::Serve { addr } => {
            let service = LocalService::with_credentials(config.connection.credentials());
            server::serve(&addr, service).await?;
        }
        Commands::Run { local } => {
            if local {
                println!("connect to in-process vector database\n");
            } else {
                println!("connect to vector database at {}\n", config.connection.base_url());
            }
            let report = tokio::task::spawn_blocking(move || {
                let credentials = config.connection.credentials();
                let mut workflow = Workflow::new(config);
                if local {
                    workflow.connect_with(Arc::new(LocalService::with_credentials(credentials)))?;
                }
                workflow.run()
            })
            .await??;
            print_report(&report);
        }
    }
    Ok(())
}
