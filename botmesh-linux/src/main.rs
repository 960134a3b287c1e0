// BotMesh Linux: one radio node on a simulated UDP multicast medium.

mod config;
mod node;
mod transport;

use anyhow::Context;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    for arg in std::env::args().skip(1) {
        if arg == "--version" || arg == "-V" {
            println!("botmesh-linux {}", VERSION);
            return Ok(());
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = config::load();
    cfg.radio.validate().context("invalid [radio] config")?;
    let serial = cfg.serial.unwrap_or_else(rand::random);

    let rt = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    rt.block_on(node::run_node(cfg, serial, async {
        if let Err(e) = shutdown_signal().await {
            log::error!("signal handler: {}", e);
        }
    }))
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    log::info!("shutting down");
    Ok(())
}
