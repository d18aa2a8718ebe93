/// migpool - MIG node pools for GKE
///
/// Clones the GPU node pools of a GKE cluster into MIG-partitioned node pools,
/// then optionally installs a device-sharing driver and MIG resource classes.
mod config;
mod confirm;
mod driver;
mod gke;
mod k8s;
mod mig;
mod migrate;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::MigConfig;
use crate::confirm::{Confirm, TerminalPrompt};
use crate::driver::DriverManager;
use crate::gke::{ClusterRef, GkeClient};
use crate::k8s::resource_classes::write_resource_classes;
use crate::k8s::{KubernetesClient, ResourceManager};
use crate::mig::{PartitionSize, Variant};
use crate::migrate::{survey, Migrator, Plan};

#[derive(Parser)]
#[command(name = "migpool")]
#[command(about = "Clone GKE GPU node pools into MIG-partitioned node pools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "migpool.yaml")]
    config: PathBuf,

    /// Output directory for kubeconfig, plans and manifests
    #[arg(short, long, default_value = "./output")]
    output: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Answer yes to every confirmation
    #[arg(short, long)]
    yes: bool,

    /// Show what would be created without changing the cluster
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate example configuration file
    Init,

    /// List node pools with their GPU and MIG status
    List,

    /// Clone each GPU pool into a single <name>-mig-enabled pool
    Migrate,

    /// Clone each GPU pool into one autoscaled pool per partition size
    Partition {
        /// Partition sizes (defaults to the configured ones)
        #[arg(long, value_delimiter = ',')]
        sizes: Vec<PartitionSize>,
    },

    /// Install the device-sharing driver
    InstallDriver,

    /// Render the MIG resource classes
    ResourceClasses {
        /// Apply the rendered classes to the cluster
        #[arg(long)]
        apply: bool,
    },

    /// Migrate pools, then offer driver install and resource classes
    Run {
        /// Use the single-pool legacy migration instead of partitions
        #[arg(long)]
        legacy: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("migpool={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match cli.command {
        Commands::Init => init_config(&cli).await,
        Commands::List => list_pools(&cli).await,
        Commands::Migrate => migrate_command(&cli, None).await,
        Commands::Partition { ref sizes } => migrate_command(&cli, Some(sizes.clone())).await,
        Commands::InstallDriver => install_driver_command(&cli).await,
        Commands::ResourceClasses { apply } => resource_classes_command(&cli, apply).await,
        Commands::Run { legacy } => run_all(&cli, legacy).await,
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<MigConfig> {
    MigConfig::from_file(&cli.config).context("Failed to load configuration")
}

fn gke_client(config: &MigConfig) -> Result<GkeClient> {
    Ok(GkeClient::new(ClusterRef {
        project: config.get_project()?,
        cluster: config.cluster.clone(),
        location: config.location.clone(),
    }))
}

fn kubeconfig_path(cli: &Cli) -> PathBuf {
    cli.output.join("kubeconfig")
}

/// Initialize example configuration file
async fn init_config(cli: &Cli) -> Result<()> {
    if cli.config.exists() {
        anyhow::bail!(
            "Configuration file already exists: {}",
            cli.config.display()
        );
    }

    let yaml = serde_yaml::to_string(&MigConfig::example())?;
    tokio::fs::write(&cli.config, yaml)
        .await
        .context("Failed to write configuration file")?;

    info!("Example configuration created: {}", cli.config.display());
    info!("");
    info!("Next steps:");
    info!("  1. Set project, cluster and location in the configuration file");
    info!("  2. Authenticate gcloud: gcloud auth login");
    info!("  3. Preview the new node pools:");
    info!("     migpool --dry-run partition");

    Ok(())
}

/// Show every node pool with its accelerator and MIG status
async fn list_pools(cli: &Cli) -> Result<()> {
    GkeClient::check_gcloud_installed()
        .await
        .context("gcloud is required")?;

    let config = load_config(cli)?;
    let client = gke_client(&config)?;

    let variant = Variant::partitioned(config.partition_sizes.iter().copied());
    let rows = survey(&client, &variant).await?;
    if rows.is_empty() {
        info!("No node pools found in cluster: {}", config.cluster);
        return Ok(());
    }

    info!("Cluster: {} ({})", config.cluster, config.location);
    info!("");
    info!("Node pools:");

    for row in rows {
        let Some(pool) = row.pool else {
            info!("  - {} (unavailable)", row.name);
            continue;
        };
        let machine = pool.machine_type.as_deref().unwrap_or("N/A");
        let gpu = match &pool.accelerator_type {
            Some(kind) if pool.accelerator_count > 0 => format!("{} x{}", kind, pool.accelerator_count),
            _ => "none".to_string(),
        };
        let partition = pool.partition_size.as_deref().unwrap_or("-");
        info!(
            "  - {} (Machine: {}, GPU: {}, Partition: {}, Nodes: {}, Migration: {})",
            pool.name,
            machine,
            gpu,
            partition,
            pool.node_count,
            if row.pending { "pending" } else { "n/a" }
        );
    }

    Ok(())
}

/// Legacy (`sizes == None`) or partitioned migration
async fn migrate_command(cli: &Cli, sizes: Option<Vec<PartitionSize>>) -> Result<()> {
    let config = load_config(cli)?;
    let variant = match sizes {
        None => Variant::Legacy,
        Some(sizes) if sizes.is_empty() => Variant::partitioned(config.partition_sizes.iter().copied()),
        Some(sizes) => Variant::partitioned(sizes),
    };
    migrate_pools(cli, &config, &variant).await
}

async fn migrate_pools(cli: &Cli, config: &MigConfig, variant: &Variant) -> Result<()> {
    GkeClient::check_gcloud_installed()
        .await
        .context("gcloud is required")?;

    let client = gke_client(config)?;
    let prompt = TerminalPrompt::new(cli.yes);
    info!("Cluster: {} ({})", config.cluster, config.location);

    let report = Migrator::new(&client, &prompt, cli.dry_run)
        .run(variant)
        .await?;

    if cli.dry_run {
        let plan = Plan::from_report(&client, variant, &report);
        for pool in &plan.pools {
            info!("  {}", pool.command);
        }
        let path = plan.write(&cli.output).await?;
        info!("Dry-run plan written to {}", path.display());
        return Ok(());
    }

    if !report.created.is_empty() {
        info!("✓ Created node pools:");
        for name in &report.created {
            info!("  - {}", name);
        }
    }

    if report.has_failures() {
        anyhow::bail!("{} node pool(s) failed", report.failed.len());
    }

    Ok(())
}

/// Install the device-sharing driver
async fn install_driver_command(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    install_driver(cli, &config).await
}

async fn install_driver(cli: &Cli, config: &MigConfig) -> Result<()> {
    if cli.dry_run {
        info!(
            "Dry run: would install {}/{} as {} in namespace {}",
            config.driver.repo_name, config.driver.chart, config.driver.release, config.driver.namespace
        );
        return Ok(());
    }

    KubernetesClient::check_kubectl_installed()
        .await
        .context("kubectl is required")?;
    KubernetesClient::check_helm_installed()
        .await
        .context("helm is required")?;

    let kubeconfig = kubeconfig_path(cli);
    gke_client(config)?.get_credentials(&kubeconfig).await?;

    let manager = DriverManager::new(config.driver.clone(), kubeconfig);
    manager.install().await?;
    manager.wait_for_ready().await?;

    info!("✓ Device-sharing driver is ready");
    Ok(())
}

/// Render and optionally apply the MIG resource classes
async fn resource_classes_command(cli: &Cli, apply: bool) -> Result<()> {
    let config = load_config(cli)?;
    let path = write_resource_classes(&config.resource_classes.driver, &cli.output).await?;
    if apply {
        apply_resource_classes(cli, &config, &path).await?;
    }
    Ok(())
}

async fn apply_resource_classes(cli: &Cli, config: &MigConfig, manifest: &Path) -> Result<()> {
    if cli.dry_run {
        info!("Dry run: would apply {}", manifest.display());
        return Ok(());
    }

    KubernetesClient::check_kubectl_installed()
        .await
        .context("kubectl is required")?;

    let kubeconfig = kubeconfig_path(cli);
    gke_client(config)?.get_credentials(&kubeconfig).await?;

    ResourceManager::new(kubeconfig)
        .apply_manifest(manifest)
        .await
        .context("Failed to apply resource classes")?;

    info!("✓ MIG resource classes applied");
    Ok(())
}

/// Full workflow: pools, then driver, then resource classes
async fn run_all(cli: &Cli, legacy: bool) -> Result<()> {
    let config = load_config(cli)?;
    let prompt = TerminalPrompt::new(cli.yes);

    let variant = if legacy {
        Variant::Legacy
    } else {
        Variant::partitioned(config.partition_sizes.iter().copied())
    };
    migrate_pools(cli, &config, &variant).await?;

    if config.driver.enabled {
        if cli.dry_run || prompt.confirm("Install the device-sharing driver?") {
            install_driver(cli, &config).await?;
        } else {
            info!("Skipping driver installation");
        }
    }

    if config.resource_classes.enabled {
        let path = write_resource_classes(&config.resource_classes.driver, &cli.output).await?;
        if cli.dry_run || prompt.confirm("Apply the MIG resource classes?") {
            apply_resource_classes(cli, &config, &path).await?;
        } else {
            warn!(
                "Resource classes not applied; apply later with: kubectl apply -f {}",
                path.display()
            );
        }
    }

    info!("✓ MIG migration completed");
    Ok(())
}
