use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rollcall_store::Layout;

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new identity in the roster
    Register {
        /// Enrollment id (primary key, e.g. "E1040")
        enrollment: String,
        /// Display name
        name: String,
    },
    /// List registered identities
    List,
    /// Remove an identity from the roster
    Remove {
        /// Enrollment id to remove
        enrollment: String,
    },
    /// Run a capture session for a subject
    Session {
        /// Subject the session belongs to (e.g. "physics")
        subject: String,
        /// Window length in seconds (0 uses the daemon default)
        #[arg(short, long, default_value_t = 0)]
        duration: u64,
    },
    /// Cancel the in-flight capture session
    Cancel,
    /// Rebuild the consolidated attendance table for a subject
    Aggregate {
        /// Subject to aggregate
        subject: String,
    },
    /// Ask the daemon to (re)load recognition resources
    Reload {
        /// Restart the load even if one is in flight or already complete
        #[arg(short, long)]
        force: bool,
    },
    /// Show daemon status
    Status,
    /// Probe daemon health
    Health {
        /// Also push a synthetic frame through the loaded backend
        #[arg(long)]
        heavy: bool,
    },
}

#[zbus::proxy(
    interface = "org.rollcall.Attendance1",
    default_service = "org.rollcall.Attendance1",
    default_path = "/org/rollcall/Attendance1"
)]
trait Attendance {
    async fn status(&self) -> zbus::Result<String>;
    async fn is_ready(&self) -> zbus::Result<bool>;
    async fn health_check(&self, light: bool) -> zbus::Result<bool>;
    async fn reload_models(&self, force_restart: bool) -> zbus::Result<()>;
    async fn start_session(&self, subject: &str, duration_secs: u64) -> zbus::Result<String>;
    async fn cancel_session(&self) -> zbus::Result<()>;
    async fn aggregate(&self, subject: &str) -> zbus::Result<String>;
}

async fn daemon() -> Result<AttendanceProxy<'static>> {
    let conn = zbus::Connection::session()
        .await
        .context("connecting to session bus")?;
    AttendanceProxy::new(&conn)
        .await
        .context("connecting to rollcalld (is it running?)")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Register { enrollment, name } => {
            let layout = Layout::from_env();
            let identity = rollcall_store::register(&layout.roster_path(), &enrollment, &name)?;
            println!(
                "Registered {} ({}) on {}",
                identity.enrollment, identity.name, identity.registered_on
            );
        }
        Commands::List => {
            let layout = Layout::from_env();
            let identities = rollcall_store::load_identities(&layout.roster_path())?;
            if identities.is_empty() {
                println!("No identities registered");
            }
            for identity in identities {
                println!(
                    "{}\t{}\t{}",
                    identity.enrollment, identity.name, identity.registered_on
                );
            }
        }
        Commands::Remove { enrollment } => {
            let layout = Layout::from_env();
            let removed = rollcall_store::remove(&layout.roster_path(), &enrollment)?;
            println!("Removed {} ({})", removed.enrollment, removed.name);
        }
        Commands::Session { subject, duration } => {
            let outcome = daemon().await?.start_session(&subject, duration).await?;
            println!("{outcome}");
        }
        Commands::Cancel => {
            daemon().await?.cancel_session().await?;
            println!("Cancellation requested");
        }
        Commands::Aggregate { subject } => {
            let path = daemon().await?.aggregate(&subject).await?;
            println!("Wrote {path}");
        }
        Commands::Reload { force } => {
            daemon().await?.reload_models(force).await?;
            println!("Reload started");
        }
        Commands::Status => {
            println!("{}", daemon().await?.status().await?);
        }
        Commands::Health { heavy } => {
            let healthy = daemon().await?.health_check(!heavy).await?;
            println!("{}", if healthy { "healthy" } else { "unhealthy" });
            if !healthy {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
