use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use rollcall_capture::{FrameSource, SyntheticSource};
use rollcall_core::{RecognitionBackend, ResourceLoader, SyntheticBackend};
use rollcall_store::Layout;

mod config;
mod dbus_interface;
mod recorder;

use config::Config;
use dbus_interface::AttendanceService;
use recorder::{spawn_recorder, RecorderConfig, SourceFactory};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    let layout = Layout::from_env();
    tracing::info!(
        backend = %config.backend,
        data_dir = %layout.root().display(),
        "rollcalld starting"
    );

    let loader = Arc::new(build_loader(&config)?);
    loader.initialize(false);

    let source_factory = build_source_factory(&config)?;
    let recorder = spawn_recorder(
        Arc::clone(&loader),
        layout.clone(),
        source_factory,
        RecorderConfig {
            confidence_threshold: config.confidence_threshold,
            warmup_frames: config.warmup_frames,
        },
    );

    let service = AttendanceService {
        loader,
        recorder,
        layout,
        default_session: Duration::from_secs(config.session_secs),
    };

    let _conn = zbus::connection::Builder::session()?
        .name("org.rollcall.Attendance1")?
        .serve_at("/org/rollcall/Attendance1", service)?
        .build()
        .await?;

    tracing::info!("rollcalld ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");

    Ok(())
}

fn build_loader(config: &Config) -> Result<ResourceLoader> {
    match config.backend.as_str() {
        "synthetic" => Ok(ResourceLoader::new(|| {
            Ok(Arc::new(SyntheticBackend) as Arc<dyn RecognitionBackend>)
        })),
        other => anyhow::bail!("unknown backend {other:?} (expected \"synthetic\")"),
    }
}

fn build_source_factory(config: &Config) -> Result<Arc<SourceFactory>> {
    match config.backend.as_str() {
        "synthetic" => {
            let (width, height) = (config.frame_width, config.frame_height);
            Ok(Arc::new(move || {
                Ok(Box::new(SyntheticSource::new(width, height, 128)) as Box<dyn FrameSource>)
            }))
        }
        other => anyhow::bail!("unknown backend {other:?} (expected \"synthetic\")"),
    }
}
