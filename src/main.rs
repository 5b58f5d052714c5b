use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use trinity_oracle::cache::SystemClock;
use trinity_oracle::config::{self, Config};
use trinity_oracle::engine::{validation::DATE_FORMAT, InvalidInputError, LuckInput, ScoreEngine};
use trinity_oracle::hourly::hourly_report;
use trinity_oracle::marketplace::{
    forward_events, run_supervised, ChannelSource, Delivery, JobOutcome, JobRegistry, LocalJob,
    MarketplaceCredentials, Seller,
};
use trinity_oracle::output;
use trinity_oracle::sales::{load_sales_log, SalesLedger};
use trinity_oracle::service::DailyLuckService;

const EXIT_SUCCESS: i32 = 0;
const EXIT_INVALID_INPUT: i32 = 2;
const EXIT_IO: i32 = 3;
const EXIT_CONFIG: i32 = 4;

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score a birth chart for a target date
    Luck {
        /// Birth date (YYYY-MM-DD)
        birth_date: String,
        /// Birth time (HH:MM)
        #[arg(short, long, default_value = "12:00")]
        time: String,
        /// Target date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        target: Option<String>,
        /// M or F
        #[arg(short, long, default_value = "M")]
        gender: String,
        /// Also print the pillars and cycles behind the score
        #[arg(long)]
        explain: bool,
    },
    /// 24-hour forecast with the best trading window
    Hourly {
        /// Birth date (YYYY-MM-DD)
        birth_date: String,
        /// Target date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        target: Option<String>,
        /// M or F
        #[arg(short, long, default_value = "M")]
        gender: String,
    },
    /// Market-wide daily reading, optionally personalised
    Daily {
        /// Target date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        target: Option<String>,
        /// Birth data as "YYYY-MM-DD[ HH:MM]"
        #[arg(long)]
        birth: Option<String>,
    },
    /// Run a marketplace job through the seller flow locally
    Handle {
        /// Job name, e.g. dailyLuck, deepLuck or agentMatch
        name: String,
        /// Requirement payload (JSON object)
        #[arg(short, long, default_value = "{}")]
        requirement: String,
        /// Buyer wallet address
        #[arg(long, default_value = "")]
        buyer: String,
        /// Record the sale in the sales log
        #[arg(long)]
        record: bool,
    },
    /// Serve job events read as JSON lines from stdin, printing each delivery
    Serve,
    /// Show the sales log summary
    Sales,
    /// Show configuration and marketplace status
    Status,
}

#[derive(Parser, Debug)]
#[command(name = "trinity-oracle")]
#[command(about = "Four Pillars trading luck oracle", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/trinity-oracle/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Print machine-readable JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("trinity_oracle={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn today() -> String {
    Local::now().date_naive().format(DATE_FORMAT).to_string()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn exit_code_for(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<InvalidInputError>().is_some() {
        EXIT_INVALID_INPUT
    } else {
        EXIT_IO
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.map(PathBuf::from);
    let config = match config::load_config(config_path.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    // Validate config at startup
    if let Err(errors) = config::validate_config(&config) {
        eprintln!("Config errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(EXIT_CONFIG);
    }

    let use_colors = output::should_use_colors() && !cli.json;
    let result = match cli.command {
        Commands::Luck {
            birth_date,
            time,
            target,
            gender,
            explain,
        } => run_luck(
            &birth_date,
            &time,
            &target.unwrap_or_else(today),
            &gender,
            explain,
            cli.json,
            use_colors,
        ),
        Commands::Hourly {
            birth_date,
            target,
            gender,
        } => run_hourly(
            &birth_date,
            &target.unwrap_or_else(today),
            &gender,
            cli.json,
            use_colors,
        ),
        Commands::Daily { target, birth } => run_daily(
            &config,
            &target.unwrap_or_else(today),
            birth.as_deref(),
            cli.json,
            use_colors,
        ),
        Commands::Handle {
            name,
            requirement,
            buyer,
            record,
        } => run_handle(&config, &name, &requirement, &buyer, record, cli.json).await,
        Commands::Serve => run_serve(&config).await,
        Commands::Sales => run_sales(&config, cli.json, use_colors),
        Commands::Status => run_status(&config, config_path, cli.json),
    };

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(exit_code_for(&e));
        }
    }
}

fn run_luck(
    birth_date: &str,
    time: &str,
    target: &str,
    gender: &str,
    explain: bool,
    json: bool,
    use_colors: bool,
) -> Result<()> {
    let engine = ScoreEngine::new();
    let input = LuckInput::parse(birth_date, time, target, gender)?;
    let reading = engine.read(&input);

    if json {
        return print_json(&reading.report);
    }
    if explain {
        println!("{}", output::format_reading_detail(&reading, use_colors));
    }
    println!("{}", output::format_report(&reading.report, use_colors));
    Ok(())
}

fn run_hourly(
    birth_date: &str,
    target: &str,
    gender: &str,
    json: bool,
    use_colors: bool,
) -> Result<()> {
    let report = hourly_report(&ScoreEngine::new(), birth_date, target, gender)?;
    if json {
        return print_json(&report);
    }
    println!("{}", output::format_hourly_table(&report, use_colors));
    Ok(())
}

fn run_daily(
    config: &Config,
    target: &str,
    birth: Option<&str>,
    json: bool,
    use_colors: bool,
) -> Result<()> {
    let service = DailyLuckService::new(
        ScoreEngine::new(),
        config.reference_birth.clone(),
        config.cache_ttl()?,
        Arc::new(SystemClock),
    );
    let summary = service.daily_luck(target, birth)?;
    if json {
        return print_json(&summary);
    }

    println!(
        "{}",
        output::format_daily_summary(target, &summary, use_colors)
    );
    Ok(())
}

fn configured_seller(config: &Config) -> Seller {
    let seller = Seller::new(ScoreEngine::new())
        .with_prices(config.prices)
        .with_reference(config.reference_birth.clone())
        .with_retry(config.retry_policy());
    match MarketplaceCredentials::from_env() {
        Some(credentials) => seller.with_wallet(credentials.agent_wallet),
        None => seller,
    }
}

async fn run_serve(config: &Config) -> Result<()> {
    let interval = config.poll_interval()?;
    let pending_ttl = config.pending_ttl()?;
    let seller = configured_seller(config)
        .with_pending_ttl(pending_ttl)
        .with_ledger(SalesLedger::open(config.sales_log_path())?);

    let (delivery_sender, mut deliveries) = tokio::sync::mpsc::unbounded_channel::<Delivery>();
    let writer = tokio::spawn(async move {
        while let Some(delivery) = deliveries.recv().await {
            let payload = serde_json::from_str(&delivery.payload)
                .unwrap_or(serde_json::Value::String(delivery.payload));
            println!(
                "{}",
                serde_json::json!({ "job_id": delivery.job_id, "delivery": payload })
            );
        }
    });

    let (sender, mut source) = ChannelSource::channel();
    let reader = tokio::spawn(async move {
        let mut registry = JobRegistry::new(pending_ttl).with_delivery_sink(delivery_sender);
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        forward_events(stdin, &mut registry, &sender).await
    });

    tracing::info!(?interval, ?pending_ttl, "Serving job events from stdin");
    let stats = run_supervised(&mut source, &seller, interval).await;
    let forwarded = reader.await.context("Job event reader stopped unexpectedly")??;
    writer
        .await
        .context("Delivery writer stopped unexpectedly")?;

    eprintln!(
        "Served {} events: {} delivered, {} failed, {} expired unpaid",
        forwarded, stats.delivered, stats.job_errors, stats.expired
    );
    Ok(())
}

async fn run_handle(
    config: &Config,
    name: &str,
    requirement: &str,
    buyer: &str,
    record: bool,
    json: bool,
) -> Result<()> {
    let mut seller = configured_seller(config);
    if record {
        seller = seller.with_ledger(SalesLedger::open(config.sales_log_path())?);
    }

    let job_id = format!("local-{}", chrono::Utc::now().timestamp_millis());
    let job = LocalJob::new(job_id.clone(), name, requirement).with_client(buyer);

    let accepted = seller.on_new_task(&job).await?;
    tracing::debug!(?accepted, "New task handled");
    if let JobOutcome::Accepted { .. } = accepted {
        seller.on_evaluate(&job).await?;
    }

    let payload = job.delivered();
    if json {
        match payload {
            Some(payload) => println!("{}", payload),
            None => print_json(&serde_json::json!({ "job_id": job_id, "outcome": format!("{:?}", accepted) }))?,
        }
        return Ok(());
    }

    println!("Job {}: {:?}", job_id, accepted);
    if let Some(payload) = payload {
        let value: serde_json::Value =
            serde_json::from_str(&payload).context("Delivered payload is not JSON")?;
        print_json(&value)?;
    }
    Ok(())
}

fn run_sales(config: &Config, json: bool, use_colors: bool) -> Result<()> {
    let log = load_sales_log(&config.sales_log_path())?;
    if json {
        return print_json(&log);
    }
    println!(
        "{}",
        output::format_sales_summary(&log, &config.prices, use_colors)
    );
    Ok(())
}

fn run_status(config: &Config, config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let path = config_path.unwrap_or_else(config::get_config_path);
    let credentials = MarketplaceCredentials::from_env();
    let sales_path = config.sales_log_path();
    let total_sales = load_sales_log(&sales_path)?.total_sales;

    if json {
        return print_json(&serde_json::json!({
            "config_path": path,
            "config_found": path.exists(),
            "cache_ttl": config.cache.ttl,
            "poll_interval": config.marketplace.poll_interval,
            "pending_ttl": config.marketplace.pending_ttl,
            "prices": config.prices,
            "sales_log": sales_path,
            "total_sales": total_sales,
            "marketplace_enabled": credentials.is_some(),
            "agent_wallet": credentials.as_ref().map(|c| c.agent_wallet.clone()),
            "entity_id": credentials.as_ref().map(|c| c.entity_id),
        }));
    }

    let found = if path.exists() { "" } else { " (not found, using defaults)" };
    println!("Config: {}{}", path.display(), found);
    println!(
        "Reference birth: {} {} {}",
        config.reference_birth.birth_date,
        config.reference_birth.birth_time,
        config.reference_birth.gender
    );
    println!("Cache TTL: {}", config.cache.ttl);
    println!(
        "Prices: dailyLuck {:.2} USDC, deepLuck {:.2} USDC, agentMatch {:.2} USDC (+{:.2} per extra agent)",
        config.prices.daily_luck,
        config.prices.deep_luck,
        config.prices.agent_match,
        config.prices.agent_match_extra
    );
    println!("Sales log: {} ({} sales)", sales_path.display(), total_sales);
    match credentials {
        Some(c) => println!(
            "Marketplace: enabled (wallet {}, entity {}, poll every {})",
            c.agent_wallet, c.entity_id, config.marketplace.poll_interval
        ),
        None => println!("Marketplace: disabled (wallet credentials not set)"),
    }
    Ok(())
}
