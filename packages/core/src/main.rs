use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use tokio::sync::RwLock;

use peershare::bandwidth::RandomSampler;
use peershare::cli::{Cli, Command};
use peershare::config::Config;
use peershare::error::AppError;
use peershare::ledger::AccrualLedger;
use peershare::logging::init_logging;
use peershare::metrics::AppMetrics;
use peershare::nodes::NodeDirectory;
use peershare::pricing::{DemandLevel, PricingConfig, PricingEngine};
use peershare::scheduler::run_accrual_loop;
use peershare::services::advice;
use peershare::services::{
    validate_card_details, Assistant, GeminiClient, HttpPaymentProcessor, PaymentProcessor,
    SimulatedProcessor, TextCompletion,
};
use peershare::session::SessionStore;
use peershare::settings::ShareSettings;

#[tokio::main]
async fn main() {
    dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::from_env()
        .and_then(|mut config| {
            cli.apply(&mut config)?;
            config.validate().map(|_| config)
        })
        .map_err(AppError::Config)
        .unwrap_or_else(|err| {
            tracing::error!("{}", err);
            process::exit(1);
        });

    tracing::debug!("Starting with config: {:?}", config);

    if let Err(err) = run(cli.command, &config).await {
        tracing::error!("{}", err);
        process::exit(1);
    }
}

async fn run(command: Command, config: &Config) -> Result<(), AppError> {
    match command {
        Command::Quote {
            distance,
            demand,
            explain,
        } => quote(config, distance, &demand, explain).await,
        Command::Nodes { all } => list_nodes(config, all),
        Command::Simulate {
            node,
            demand,
            seconds,
        } => simulate(config, node.as_deref(), &demand, seconds).await,
        Command::Card {
            number,
            expiry,
            cvv,
        } => check_card(&number, &expiry, &cvv),
        Command::Methods { customer } => list_payment_methods(config, &customer).await,
        Command::Ask { prompt } => ask(config, &prompt.join(" ")).await,
    }
}

fn build_engine(config: &Config) -> Result<PricingEngine, AppError> {
    Ok(PricingEngine::new(
        PricingConfig::default().with_base_rate(config.base_rate),
    )?)
}

fn load_nodes(config: &Config) -> Result<NodeDirectory, AppError> {
    let nodes = match &config.nodes_file {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|err| AppError::Config(format!("cannot read {}: {}", path, err)))?;
            let nodes = NodeDirectory::from_json(&json)?;
            tracing::info!("Loaded {} node(s) from {}", nodes.len(), path);
            nodes
        }
        None => NodeDirectory::demo(),
    };

    Ok(match &config.origin {
        Some(origin) => nodes.with_distances_from(origin),
        None => nodes,
    })
}

fn completion_backend(config: &Config) -> Arc<dyn TextCompletion> {
    Arc::new(GeminiClient::new(
        config.gemini_base_url.clone(),
        config.gemini_model.clone(),
        config.gemini_api_key.clone().unwrap_or_default(),
    ))
}

fn payment_processor(config: &Config) -> Box<dyn PaymentProcessor + Send + Sync> {
    match &config.payments_base_url {
        Some(url) => Box::new(HttpPaymentProcessor::new(
            url.clone(),
            config.payments_api_key.clone(),
        )),
        None => {
            tracing::info!("PAYMENTS_BASE_URL not set; using the simulated processor");
            Box::new(SimulatedProcessor::default())
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value).map_err(|err| AppError::Parse(err.to_string()))
}

async fn quote(config: &Config, distance: f64, demand: &str, explain: bool) -> Result<(), AppError> {
    let engine = build_engine(config)?;
    let demand: DemandLevel = demand.parse()?;
    let quote = engine.quote(distance, demand)?;

    println!("{}", to_json(&quote)?);

    if explain {
        let backend = completion_backend(config);
        let text = advice::explain_or_fallback(backend.as_ref(), &quote, demand, distance).await;
        println!("\n{}", text);
    }
    Ok(())
}

fn list_nodes(config: &Config, all: bool) -> Result<(), AppError> {
    let nodes = load_nodes(config)?;
    let settings = ShareSettings::default();

    let listed: Vec<_> = if all {
        nodes.all().iter().collect()
    } else {
        nodes.discover(&settings)
    };

    if listed.is_empty() {
        tracing::warn!("No nodes match the current share settings");
    }
    for node in listed {
        let distance = node
            .distance_km
            .map(|km| format!("{:.1} km", km))
            .unwrap_or_else(|| "? km".to_string());
        println!(
            "{:<10} {:<24} {:>8}  {:.3}/GB  {:.1}*{}",
            node.id,
            node.name,
            distance,
            node.price,
            node.rating,
            if node.available { "" } else { "  (unavailable)" },
        );
    }
    Ok(())
}

async fn simulate(config: &Config, node_id: Option<&str>, demand: &str, seconds: u64) -> Result<(), AppError> {
    let demand: DemandLevel = demand.parse()?;
    let settings = ShareSettings {
        auto_connect: node_id.is_none(),
        ..ShareSettings::default()
    };
    let store = SessionStore::new(build_engine(config)?, load_nodes(config)?, settings)
        .with_accrual(AccrualLedger::new(config.gb_per_hour))
        .with_currency(config.currency.clone());
    let store = Arc::new(RwLock::new(store));
    let metrics = Arc::new(AppMetrics::new()?);
    let processor = payment_processor(config);

    let connection_id = {
        let mut session = store.write().await;
        let id = match node_id {
            Some(node_id) => session.connect_to_node(node_id, demand)?,
            None => session
                .auto_connect(demand)?
                .ok_or_else(|| AppError::Config("no node matches the share settings".into()))?,
        };
        session.mark_connected(&id)?;
        id
    };

    let tick_interval = Duration::from_secs(config.tick_seconds);
    let duration = Duration::from_secs(seconds);
    run_accrual_loop(
        store.clone(),
        metrics.clone(),
        Box::new(RandomSampler::default()),
        tick_interval,
        async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, ending the session early");
                }
            }
        },
    )
    .await;

    let mut session = store.write().await;
    if let Some(tx_id) = session.disconnect(&connection_id)? {
        match session.settle(&tx_id, processor.as_ref()).await {
            Ok(tx) => tracing::info!(
                "Settled {} for {:.4} {} ({})",
                tx.id,
                tx.amount,
                tx.currency,
                tx.processor_reference.as_deref().unwrap_or("-"),
            ),
            Err(err) => tracing::warn!("Transaction {} left pending: {}", tx_id, err),
        }
    }

    metrics.observe(&session);
    tracing::debug!("Metrics:\n{}", metrics.render()?);

    if let Some(connection) = session.connection(&connection_id) {
        println!("{}", to_json(connection)?);
    }
    let totals = session.ledger().totals();
    println!(
        "total spent: {:.4} {}  total earned: {:.4} {}",
        totals.total_spent, config.currency, totals.total_earnings, config.currency
    );
    Ok(())
}

fn check_card(number: &str, expiry: &str, cvv: &str) -> Result<(), AppError> {
    match validate_card_details(number, expiry, cvv) {
        Ok(()) => {
            println!("Card details look valid");
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                println!("- {}", error);
            }
            Err(AppError::Parse(format!("{} problem(s) with the card details", errors.len())))
        }
    }
}

async fn list_payment_methods(config: &Config, customer: &str) -> Result<(), AppError> {
    let methods = payment_processor(config).payment_methods(customer).await?;
    println!("{}", to_json(&methods)?);
    Ok(())
}

async fn ask(config: &Config, prompt: &str) -> Result<(), AppError> {
    if prompt.trim().is_empty() {
        return Err(AppError::Config("ask needs a prompt".into()));
    }
    let mut assistant = Assistant::new(completion_backend(config));
    let reply = assistant.send_message(prompt).await;
    println!("{}", reply.content);
    Ok(())
}
