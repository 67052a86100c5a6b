use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tiltpad::config::Config;
use tiltpad::controller::ControllerHandle;
use tiltpad::transport::{ChannelSink, CommandSink, UdpTransport};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Default)]
struct Args {
    dry_run: bool,
    gamepad: bool,
    config_path: Option<PathBuf>,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut args = Args::default();
        for arg in std::env::args().skip(1) {
            match arg.as_str() {
                "--dry-run" => args.dry_run = true,
                "--gamepad" => args.gamepad = true,
                flag if flag.starts_with("--") => return Err(eyre!("Unknown flag: {}", flag)),
                path => args.config_path = Some(PathBuf::from(path)),
            }
        }
        Ok(args)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;
    let args = Args::parse()?;

    let config_path = args.config_path.clone().unwrap_or_else(Config::default_path);
    Config::ensure_default(&config_path).await?;
    let mut config = Config::load(&config_path).await?;
    if args.gamepad {
        config.gamepad.enabled = true;
    }
    if !config.gamepad.enabled {
        warn!("Gamepad input disabled, pass --gamepad or set [gamepad] enabled = true");
    }

    let sink: Box<dyn CommandSink> = if args.dry_run {
        info!("Dry run, commands are logged instead of sent");
        let (sink, mut wire) = ChannelSink::new();
        tokio::spawn(async move {
            while let Some(payload) = wire.recv().await {
                info!("-> {}", payload);
            }
        });
        Box::new(sink)
    } else {
        Box::new(UdpTransport::bind().await?)
    };

    let controller = ControllerHandle::spawn(&config, sink)
        .map_err(|e| eyre!("Failed to spawn controller: {}", e))?;
    info!("Sending to {}, press Ctrl+C to stop", controller.destination());

    tokio::signal::ctrl_c().await?;
    controller.shutdown().await?;
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let level = log_level(std::env::var("RUST_LOG").ok().as_deref());
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

// RUST_LOG takes a single level (error, warn, info, debug, trace).
fn log_level(value: Option<&str>) -> Level {
    value
        .and_then(|value| value.trim().parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_selects_level() {
        assert_eq!(log_level(Some("debug")), Level::DEBUG);
        assert_eq!(log_level(Some(" WARN ")), Level::WARN);
        assert_eq!(log_level(Some("tiltpad=trace")), Level::INFO);
        assert_eq!(log_level(None), Level::INFO);
    }
}
