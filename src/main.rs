use clap::Parser;
use edc_switch::application::orchestrator::Orchestrator;
use edc_switch::config::{
    DEFAULT_SUCCESS_PROBABILITY, DEFAULT_TERMINAL_PORT, GatewayConfig, GatewayCredential,
    LocalEmulationConfig, TerminalConfig,
};
use edc_switch::domain::ports::RandomSource;
use edc_switch::domain::transaction::Transaction;
use edc_switch::infrastructure::gateway::GatewayProcessor;
use edc_switch::infrastructure::in_memory::InMemoryRegistry;
use edc_switch::infrastructure::local::LocalEmulationProcessor;
use edc_switch::infrastructure::random::{SeededRandom, ThreadRandom};
use edc_switch::infrastructure::terminal::TerminalProcessor;
use edc_switch::interfaces::csv::request_reader::RequestReader;
use miette::{IntoDiagnostic, Result, miette};
use rust_decimal::Decimal;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info_span;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// CSV file of transaction requests
    input: PathBuf,

    /// Backend to route every transaction to (local, gateway or terminal)
    #[arg(long, default_value = "local")]
    platform: String,

    /// Multiplier applied to the authorized amount when re-authorizing
    #[arg(long, default_value = "1.1")]
    reauthorize_factor: Decimal,

    /// Approval probability of the local emulator
    #[arg(long, env = "EDC_SUCCESS_PROBABILITY", default_value_t = DEFAULT_SUCCESS_PROBABILITY)]
    success_probability: f64,

    /// Seed for the local emulator, for reproducible runs
    #[arg(long, env = "EDC_SEED")]
    seed: Option<u64>,

    /// Gateway endpoint; enables the `gateway` platform
    #[arg(long, env = "EDC_GATEWAY_URL")]
    gateway_url: Option<String>,

    /// Bearer key sent to the gateway
    #[arg(long, env = "EDC_GATEWAY_KEY", hide_env_values = true)]
    gateway_key: Option<String>,

    /// Terminal host; enables the `terminal` platform
    #[arg(long, env = "EDC_TERMINAL_HOST")]
    terminal_host: Option<String>,

    #[arg(long, env = "EDC_TERMINAL_PORT", default_value_t = DEFAULT_TERMINAL_PORT)]
    terminal_port: u16,

    /// Maximum wait for the terminal's response, in milliseconds
    #[arg(long, default_value_t = 2000)]
    terminal_timeout_ms: u64,
}

fn build_orchestrator(cli: &Cli) -> Result<Orchestrator> {
    let random: Arc<dyn RandomSource> = match cli.seed {
        Some(seed) => Arc::new(SeededRandom::new(seed)),
        None => Arc::new(ThreadRandom),
    };
    let local_config = LocalEmulationConfig::new(cli.success_probability).into_diagnostic()?;
    let local = LocalEmulationProcessor::new(local_config, random)
        .with_span(info_span!("processor", platform = "local"));
    let mut orchestrator = Orchestrator::new(Box::new(InMemoryRegistry::new()))
        .with_span(info_span!("batch", input = %cli.input.display()))
        .with_processor("local", local);

    if let Some(url) = &cli.gateway_url {
        let key = cli
            .gateway_key
            .clone()
            .ok_or_else(|| miette!("--gateway-key is required when --gateway-url is set"))?;
        let config = GatewayConfig::new(url.clone(), GatewayCredential::Bearer(key));
        let gateway = GatewayProcessor::new(config)
            .into_diagnostic()?
            .with_span(info_span!("processor", platform = "gateway", endpoint = %url));
        orchestrator = orchestrator.with_processor("gateway", gateway);
    }

    if let Some(host) = &cli.terminal_host {
        let config = TerminalConfig::new(host.clone())
            .with_port(cli.terminal_port)
            .with_read_timeout(Duration::from_millis(cli.terminal_timeout_ms));
        let span = info_span!("processor", platform = "terminal", address = %config.address());
        let terminal = TerminalProcessor::new(config).with_span(span);
        orchestrator = orchestrator.with_processor("terminal", terminal);
    }

    Ok(orchestrator)
}

fn print_stage(title: &str, tx: &Transaction) -> Result<()> {
    println!("\n{title}:");
    println!("{}", serde_json::to_string_pretty(tx).into_diagnostic()?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.reauthorize_factor < Decimal::ZERO {
        return Err(miette!("--reauthorize-factor must not be negative"));
    }
    let orchestrator = build_orchestrator(&cli)?;

    let file = File::open(&cli.input).into_diagnostic()?;
    for request in RequestReader::new(file).requests() {
        let tx = match request.and_then(Transaction::new) {
            Ok(tx) => tx,
            Err(e) => {
                eprintln!("Error reading transaction: {}", e);
                continue;
            }
        };

        let authorized = orchestrator.authorize(tx.duplicate(), &cli.platform).await;
        print_stage("Processing Result", &authorized)?;
        if authorized.status().is_failure() {
            continue;
        }

        let new_amount = match authorized.amount().scaled(cli.reauthorize_factor) {
            Ok(amount) => amount,
            Err(e) => {
                eprintln!("Error re-authorizing transaction {}: {}", authorized.id(), e);
                continue;
            }
        };
        let reauthorized = orchestrator
            .reauthorize(authorized.duplicate(), new_amount, &cli.platform)
            .await;
        print_stage("Re-authorization Result", &reauthorized)?;

        // A failed re-authorization leaves the original hold in place.
        let hold = if reauthorized.status().is_failure() {
            authorized
        } else {
            reauthorized
        };
        let captured = orchestrator.capture(hold.duplicate(), &cli.platform).await;
        print_stage("Capture Result", &captured)?;
    }

    let history = orchestrator.into_history().await;
    println!("\nAll Transactions:");
    println!("{}", serde_json::to_string_pretty(&history).into_diagnostic()?);

    Ok(())
}
