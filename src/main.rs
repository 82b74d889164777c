use anyhow::{Context, Result};
use clap::Parser;
use reelcam::{ReelcamConfig, ReelcamOrchestrator, RunMode};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "reelcam")]
#[command(about = "Short-video feed playback and live camera detection overlay")]
#[command(version)]
#[command(long_about = "Drives a vertical short-video feed where exactly one item plays at a time, \
or a live camera view with an object-detection overlay, alerting and screenshots. \
Runs in the terminal with keyboard input and scripted media for development and demos.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "reelcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Surface to drive
    #[arg(short, long, value_enum, default_value_t = RunMode::Feed)]
    mode: RunMode,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - initialize but don't start components
    #[arg(long, help = "Perform dry run - initialize components but don't start them")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let log_guard = init_logging(&args)?;

    info!("Starting reelcam v{} in {:?} mode", env!("CARGO_PKG_VERSION"), args.mode);
    info!("Configuration file: {}", args.config);

    let config = match ReelcamConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        if args.validate_config {
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
        return Err(e.into());
    }
    if args.validate_config {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let mut orchestrator = ReelcamOrchestrator::new(config, args.mode)
        .await
        .context("Failed to create orchestrator")?;

    orchestrator
        .initialize()
        .await
        .context("Failed to initialize components")?;

    if args.dry_run {
        info!("Dry run mode - components initialized but not started");
        println!("✓ Dry run completed successfully - all components initialized");
        return Ok(());
    }

    if let Err(e) = orchestrator.start().await {
        error!("Failed to start: {}", e);
        // Release whatever did start before reporting the failure
        let _ = orchestrator.shutdown().await;
        return Err(e.into());
    }

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("Reelcam exited with code: {}", exit_code);
    drop(log_guard);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("reelcam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        None => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "reelcam.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    let rendered = toml::to_string_pretty(&ReelcamConfig::default())
        .context("Failed to render default configuration")?;

    println!("# Reelcam configuration file");
    println!("# Every option with its default value; environment overrides use");
    println!("# REELCAM_<SECTION>__<KEY>, e.g. REELCAM_FEED__VIEWPORT_HEIGHT=600");
    println!();
    println!("{}", rendered);
    Ok(())
}
