/// Version injected at compile time via TDMESH_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("TDMESH_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tdmesh::config::Config;
use tdmesh::gcp::auth::GcpCredentials;
use tdmesh::gcp::client::GcpClient;
use tdmesh::gcp::compute::ComputeV1;
use tdmesh::gcp::network_security::NetworkSecurityV1Alpha1;
use tdmesh::gcp::network_services::NetworkServicesV1Alpha1;
use tdmesh::traffic_director::manager::{DEFAULT_PORT_ATTEMPTS, DEFAULT_PORT_HI, DEFAULT_PORT_LO};
use tdmesh::{
    BackendRole, BackendServiceProtocol, ManagerOptions, TrafficDirector, TrafficDirectorManager,
};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Traffic Director mesh resources for xDS test scenarios
#[derive(Parser, Debug)]
#[command(name = "tdmesh", version = VERSION, about, long_about = None)]
struct Args {
    /// GCP project to use
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// VPC network
    #[arg(long, global = true)]
    network: Option<String>,

    /// Prefix of every resource name
    #[arg(long, global = true)]
    resource_prefix: Option<String>,

    /// Suffix of every resource name; generated when omitted
    #[arg(long, global = true)]
    resource_suffix: Option<String>,

    /// Config file (defaults to <config dir>/tdmesh/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// OAuth access token to use instead of Application Default Credentials
    #[arg(long, global = true)]
    access_token: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the data path for a gRPC service
    Setup(SetupArgs),
    /// Create server and/or client security policies
    Security(SecurityArgs),
    /// Delete managed resources in reverse creation order
    Cleanup(CleanupArgs),
    /// Print a port no forwarding rule listens on
    FindPort(FindPortArgs),
}

#[derive(ClapArgs, Debug)]
struct SetupArgs {
    /// Hostname clients dial
    #[arg(long)]
    host: String,

    /// Forwarding rule port; a free one is picked when omitted
    #[arg(long)]
    port: Option<u16>,

    /// Backend service protocol
    #[arg(long, default_value = "GRPC")]
    protocol: BackendServiceProtocol,

    /// Fixed health check port instead of the serving port
    #[arg(long)]
    health_check_port: Option<u16>,

    /// Use a gRPC route and router instead of URL map, proxy and forwarding rule
    #[arg(long)]
    route: bool,

    /// Network endpoint group to attach as backends
    #[arg(long, requires = "zones")]
    neg_name: Option<String>,

    /// Zones of the network endpoint group
    #[arg(long, value_delimiter = ',')]
    zones: Vec<String>,

    /// Wait for attached backends to report healthy
    #[arg(long, requires = "neg_name")]
    wait_healthy: bool,

    /// Also create the health-check firewall rule for these ports
    #[arg(long, value_delimiter = ',')]
    firewall_ports: Vec<String>,
}

#[derive(ClapArgs, Debug)]
struct SecurityArgs {
    /// Kubernetes namespace of the server
    #[arg(long)]
    namespace: String,

    /// Server deployment and service account name
    #[arg(long)]
    server_name: String,

    /// Server port; enables server-side security
    #[arg(long)]
    server_port: Option<u16>,

    /// Attach a client TLS policy to the existing backend service
    #[arg(long)]
    client: bool,

    /// Skip TLS certificates
    #[arg(long)]
    no_tls: bool,

    /// Skip mutual TLS
    #[arg(long)]
    no_mtls: bool,
}

#[derive(ClapArgs, Debug)]
struct CleanupArgs {
    /// Delete by derived name even when not created by this process
    #[arg(long)]
    force: bool,

    /// Include gRPC route and router
    #[arg(long)]
    route: bool,

    /// Include TLS policies and endpoint config selector
    #[arg(long)]
    security: bool,

    /// Also delete the shared health-check firewall rule
    #[arg(long)]
    firewall: bool,
}

#[derive(ClapArgs, Debug)]
struct FindPortArgs {
    #[arg(long, default_value_t = DEFAULT_PORT_LO)]
    lo: u16,

    #[arg(long, default_value_t = DEFAULT_PORT_HI)]
    hi: u16,

    #[arg(long, default_value_t = DEFAULT_PORT_ATTEMPTS)]
    attempts: u32,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let (non_blocking, guard) = match log_file {
        Some(log_path) => {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
                .with_context(|| format!("Failed to open log file {:?}", log_path))?;
            tracing_appender::non_blocking(file)
        },
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(log_file.is_none())
        .with_target(true)
        .with_thread_ids(false)
        .with_file(log_file.is_some())
        .with_line_number(log_file.is_some())
        .init();

    tracing::debug!("tdmesh {} started with log level: {:?}", VERSION, level);
    if let Some(log_path) = log_file {
        tracing::debug!("Log file: {:?}", log_path);
    }

    Ok(Some(guard))
}

/// Shared API clients for one project
struct Apis {
    compute: Arc<ComputeV1>,
    netsec: Arc<NetworkSecurityV1Alpha1>,
    netsvc: Arc<NetworkServicesV1Alpha1>,
}

impl Apis {
    fn new(client: GcpClient) -> Self {
        Self {
            compute: Arc::new(ComputeV1::new(client.clone())),
            netsec: Arc::new(NetworkSecurityV1Alpha1::new(client.clone())),
            netsvc: Arc::new(NetworkServicesV1Alpha1::new(client)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_ref())?;

    // CLI > config > defaults
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    let project = config
        .effective_project(args.project.as_deref())
        .context("No GCP project configured. Set GOOGLE_CLOUD_PROJECT or use --project flag")?;
    let network = args.network.clone().unwrap_or_else(|| config.network.clone());
    let prefix = args
        .resource_prefix
        .clone()
        .unwrap_or_else(|| config.resource_prefix.clone());
    // Only setup may name a new run; the others act on an existing one
    let suffix = match &args.command {
        Command::Setup(_) | Command::FindPort(_) => {
            config.effective_resource_suffix(args.resource_suffix.as_deref())
        },
        Command::Security(_) | Command::Cleanup(_) => {
            config.required_resource_suffix(args.resource_suffix.as_deref())?
        },
    };

    tracing::info!(
        "Using project: {}, network: {}, resources: {}-*-{}",
        project,
        network,
        prefix,
        suffix
    );

    let credentials = match &args.access_token {
        Some(token) => GcpCredentials::from_static_token(token),
        None => GcpCredentials::new().await?,
    };
    let client = GcpClient::with_credentials(credentials, &project, config.endpoints.clone())?
        .with_polling(config.polling.clone())?;
    let apis = Apis::new(client);

    let options = ManagerOptions {
        project,
        network,
        resource_prefix: prefix,
        resource_suffix: suffix.clone(),
        firewall_source_ranges: config.firewall_source_ranges.clone(),
    };
    let base = TrafficDirectorManager::new(apis.compute.clone(), options);

    match args.command {
        Command::Setup(setup) => run_setup(base, &apis, setup).await?,
        Command::Security(security) => run_security(base, &apis, security).await?,
        Command::Cleanup(cleanup) => run_cleanup(base, &apis, cleanup).await?,
        Command::FindPort(find) => {
            let port = base
                .find_unused_forwarding_rule_port(find.lo, find.hi, find.attempts)
                .await?;
            println!("{}", port);
        },
    }

    if args.resource_suffix.is_none() && config.resource_suffix.is_none() {
        tracing::info!("Resource suffix for this run: {}", suffix);
    }

    Ok(())
}

async fn run_setup(base: TrafficDirectorManager, apis: &Apis, args: SetupArgs) -> Result<()> {
    let mut td = TrafficDirector::new(base);
    if args.route {
        td = td.with_route(apis.netsvc.clone());
    }

    if !args.firewall_ports.is_empty() {
        td.base.create_firewall_rule(&args.firewall_ports).await?;
    }

    let port = match args.port {
        Some(port) => port,
        None => {
            td.base
                .find_unused_forwarding_rule_port(
                    DEFAULT_PORT_LO,
                    DEFAULT_PORT_HI,
                    DEFAULT_PORT_ATTEMPTS,
                )
                .await?
        },
    };

    if args.route {
        td.setup_for_grpc_route(&args.host, port, args.protocol, args.health_check_port)
            .await?;
    } else {
        td.setup_for_grpc(&args.host, port, args.protocol, args.health_check_port)
            .await?;
    }

    if let Some(neg_name) = &args.neg_name {
        td.base
            .backend_service_add_neg_backends(BackendRole::Primary, neg_name, &args.zones)
            .await?;
        if args.wait_healthy {
            td.base
                .wait_for_backends_healthy_status(BackendRole::Primary)
                .await?;
        }
    }

    println!("{}:{}", args.host, port);
    Ok(())
}

async fn run_security(base: TrafficDirectorManager, apis: &Apis, args: SecurityArgs) -> Result<()> {
    let mut td = TrafficDirector::new(base).with_security(apis.netsec.clone(), apis.netsvc.clone());
    let tls = !args.no_tls;
    let mtls = !args.no_mtls;

    if let Some(server_port) = args.server_port {
        td.setup_server_security(&args.namespace, &args.server_name, server_port, tls, mtls)
            .await?;
    }

    if args.client {
        td.base.load_backend_service(BackendRole::Primary).await?;
        td.setup_client_security(&args.namespace, &args.server_name, tls, mtls)
            .await?;
    }

    if args.server_port.is_none() && !args.client {
        tracing::warn!("Nothing to do: pass --server-port and/or --client");
    }
    Ok(())
}

async fn run_cleanup(base: TrafficDirectorManager, apis: &Apis, args: CleanupArgs) -> Result<()> {
    if !args.force {
        tracing::warn!("Nothing is tracked by a fresh process; pass --force to delete by name");
    }

    let mut td = TrafficDirector::new(base);
    if args.route {
        td = td.with_route(apis.netsvc.clone());
    }
    if args.security {
        td = td.with_security(apis.netsec.clone(), apis.netsvc.clone());
    }

    if args.firewall {
        td.cleanup_with_firewall(args.force).await?;
    } else {
        td.cleanup(args.force).await?;
    }
    Ok(())
}
