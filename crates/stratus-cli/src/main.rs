use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "stratus",
    about = "Stratus — Kubernetes cluster lifecycle and agent pool scaling",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to stratus.toml (default: ./stratus.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a stratus.toml with every default spelled out
    Init {
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },
    /// Start managing an existing cluster from its apimodel.json
    Import {
        /// Deployment resource id of the cluster
        #[arg(long)]
        id: String,
        #[arg(long)]
        apimodel: PathBuf,
        /// Directory that receives apimodel.json on every change.
        /// Defaults to `{deployment.directory}/{dnsPrefix}`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// List managed clusters
    List,
    /// Show the stored state of a cluster
    Show {
        #[arg(long)]
        id: String,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Print the admin kubeconfig of a cluster
    Kubeconfig {
        #[arg(long)]
        id: String,
    },
    /// Compute a scale plan from an inventory snapshot.
    ///
    /// The snapshot is a JSON document with `virtual_machines` and
    /// `scale_sets` arrays as listed by the compute API. Nothing is
    /// changed in the cloud or in the state store.
    Plan {
        #[arg(long)]
        id: String,
        /// Agent pool index in the api model
        #[arg(long)]
        pool: usize,
        /// Desired instance count
        #[arg(long)]
        count: u32,
        #[arg(long)]
        inventory: PathBuf,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stratus=info".parse()?)
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Import { id, apimodel, dir } => {
            commands::cluster::import(&config, &id, &apimodel, dir)
        }
        Commands::List => commands::cluster::list(&config),
        Commands::Show { id, format } => commands::cluster::show(&config, &id, &format),
        Commands::Kubeconfig { id } => commands::cluster::kubeconfig(&config, &id),
        Commands::Plan {
            id,
            pool,
            count,
            inventory,
            format,
        } => commands::plan::plan(&config, &id, pool, count, &inventory, &format).await,
    }
}
