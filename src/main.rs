//! canprintf CLI entry point
//!
//! Listens on a CAN interface and prints the debug text an embedded target
//! sends on the printf identifier:
//! ```bash
//! canprintf listen --interface vcan0
//! canprintf listen --config canprintf.toml --can-id 0x581
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use canprintf::config::{parse_can_id, PrintfConfig, EXAMPLE_CONFIG};
use canprintf::PrintfError;

/// CAN printf viewer - reassembles debug output sent over CAN
#[derive(Parser, Debug)]
#[command(name = "canprintf", version, about, long_about = None)]
struct Cli {
    /// Minimum log level (error, warn, info, debug, trace)
    #[arg(long = "log-level", global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture printf frames until Ctrl-C
    Listen(ListenArgs),

    /// Print an example configuration file
    ExampleConfig,
}

#[derive(clap::Args, Debug)]
struct ListenArgs {
    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SocketCAN interface, overrides the configuration file
    #[arg(short, long)]
    interface: Option<String>,

    /// Printf CAN identifier, decimal or 0x-prefixed hex
    #[arg(long, value_parser = parse_id_arg)]
    can_id: Option<u32>,

    /// Idle flush timeout in milliseconds
    #[arg(long)]
    flush_timeout_ms: Option<u64>,
}

fn parse_id_arg(s: &str) -> std::result::Result<u32, String> {
    parse_can_id(s).map_err(|e| e.to_string())
}

impl ListenArgs {
    fn resolve(&self) -> canprintf::Result<PrintfConfig> {
        let mut config = match &self.config {
            Some(path) => PrintfConfig::from_file(path)?,
            None => PrintfConfig::default(),
        };
        if let Some(interface) = &self.interface {
            config.interface = interface.clone();
        }
        if let Some(can_id) = self.can_id {
            config.can_id = can_id;
        }
        if let Some(timeout) = self.flush_timeout_ms {
            config.flush_timeout_ms = timeout;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(level: &str) {
    #[cfg(feature = "tracing-support")]
    {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    #[cfg(not(feature = "tracing-support"))]
    let _ = level;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let result = match cli.command {
        Commands::Listen(args) => match args.resolve() {
            Ok(config) => listen(config).await,
            Err(e) => Err(e),
        },
        Commands::ExampleConfig => {
            println!("{}", EXAMPLE_CONFIG);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(target_os = "linux")]
async fn listen(config: PrintfConfig) -> canprintf::Result<()> {
    use std::sync::Arc;

    use canprintf::driver::Driver;
    use canprintf::protocols::can::SocketCanSource;
    use canprintf::sink::StdoutSink;
    use canprintf::timer::TokioTimer;

    let mut driver = Driver::new(&config, Arc::new(TokioTimer::new()), Arc::new(StdoutSink));
    driver.start(Box::new(SocketCanSource::new(
        config.interface.clone(),
        config.rx_poll_interval_ms,
    )))?;

    #[cfg(feature = "tracing-support")]
    tracing::info!("Capture running on {}, press Ctrl-C to stop", config.interface);

    let signal = tokio::signal::ctrl_c().await;
    driver.stop();

    #[cfg(feature = "tracing-support")]
    {
        let stats = driver.stats();
        tracing::info!(
            "Capture stopped: {} frames, {} lines ({} idle flushes), {} dropped, {} timer failures",
            stats.frames_received,
            stats.lines_emitted,
            stats.idle_flushes,
            stats.frames_dropped,
            stats.timer_failures
        );
    }

    signal.map_err(PrintfError::from)
}

#[cfg(not(target_os = "linux"))]
async fn listen(_config: PrintfConfig) -> canprintf::Result<()> {
    Err(PrintfError::Connection(
        "SocketCAN is only available on Linux".to_string(),
    ))
}
