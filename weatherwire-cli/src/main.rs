// Weatherwire CLI - Kafka producer, consumer dashboard and topic admin
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Weatherwire
//!
//! Simulated weather sensor over Kafka.
//!
//! ## Usage
//!
//! ```bash
//! # Create the topic
//! weatherwire create_topic --topic weather --partitions 3
//!
//! # Publish compact frames every 15-30 seconds
//! weatherwire producer --topic weather --mode compact
//!
//! # Watch the live dashboard and record readings to CSV
//! weatherwire consumer --topic weather --mode compact --output readings.csv
//! ```

mod kafka;
mod tui;

use clap::{Args, Parser, Subcommand, ValueEnum};
use kafka::{KafkaAdmin, KafkaPublisher, KafkaSubscriber};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;
use weatherwire::config::{DEFAULT_BROKERS, DEFAULT_GROUP_ID};
use weatherwire::store::DEFAULT_STORE_PATH;
use weatherwire::{
    admin, ConsumerConfig, ConsumerPipeline, CsvStore, PersistencePolicy, Producer,
    ProducerConfig, ReadingGenerator, TopicSpec, TracingSink, WeatherError, WireMode,
};

/// Weatherwire sensor simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log destination while the dashboard is on screen
    #[arg(long, default_value = "weatherwire.log", global = true)]
    log_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the sensor producer
    #[command(name = "producer")]
    Producer(ProducerArgs),
    /// Start the consumer dashboard
    #[command(name = "consumer")]
    Consumer(ConsumerArgs),
    /// Create a topic
    #[command(name = "create_topic")]
    CreateTopic(CreateTopicArgs),
    /// Delete a topic
    #[command(name = "delete_topic")]
    DeleteTopic(DeleteTopicArgs),
}

#[derive(Args, Debug)]
struct ProducerArgs {
    /// Kafka broker address(es), comma separated
    #[arg(long, default_value = DEFAULT_BROKERS)]
    broker: String,

    /// Kafka topic name
    #[arg(long, value_parser = clap::builder::NonEmptyStringValueParser::new())]
    topic: String,

    /// Wire mode: text (alias json) or compact
    #[arg(long, default_value = "text", value_parser = parse_mode)]
    mode: WireMode,

    /// Minimum interval between messages (seconds)
    #[arg(long, default_value = "15")]
    min_interval: u64,

    /// Maximum interval between messages (seconds)
    #[arg(long, default_value = "30")]
    max_interval: u64,

    /// Seed for the reading generator
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct ConsumerArgs {
    /// Kafka broker address(es), comma separated
    #[arg(long, default_value = DEFAULT_BROKERS)]
    broker: String,

    /// Kafka topic name
    #[arg(long, value_parser = clap::builder::NonEmptyStringValueParser::new())]
    topic: String,

    /// Kafka consumer group ID
    #[arg(long, default_value = DEFAULT_GROUP_ID)]
    group: String,

    /// Wire mode: text (alias json) or compact
    #[arg(long, default_value = "text", value_parser = parse_mode)]
    mode: WireMode,

    /// CSV file readings are appended to
    #[arg(long, default_value = DEFAULT_STORE_PATH)]
    output: PathBuf,

    /// What to do when a reading cannot be written
    #[arg(long, value_enum, default_value_t = StoreErrorPolicy::Continue)]
    on_store_error: StoreErrorPolicy,

    /// Log window updates instead of drawing the dashboard
    #[arg(long)]
    headless: bool,
}

#[derive(Args, Debug)]
struct CreateTopicArgs {
    /// Kafka broker address
    #[arg(long, default_value = DEFAULT_BROKERS)]
    broker: String,

    /// Kafka topic name
    #[arg(long, value_parser = clap::builder::NonEmptyStringValueParser::new())]
    topic: String,

    /// Number of partitions
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(i32).range(1..))]
    partitions: i32,

    /// Replication factor
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(i32).range(1..))]
    replicas: i32,
}

#[derive(Args, Debug)]
struct DeleteTopicArgs {
    /// Kafka broker address
    #[arg(long, default_value = DEFAULT_BROKERS)]
    broker: String,

    /// Kafka topic name
    #[arg(long, value_parser = clap::builder::NonEmptyStringValueParser::new())]
    topic: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum StoreErrorPolicy {
    /// Report the failure and keep consuming
    Continue,
    /// Stop the consumer
    Halt,
}

impl From<StoreErrorPolicy> for PersistencePolicy {
    fn from(policy: StoreErrorPolicy) -> Self {
        match policy {
            StoreErrorPolicy::Continue => PersistencePolicy::Continue,
            StoreErrorPolicy::Halt => PersistencePolicy::Halt,
        }
    }
}

fn parse_mode(s: &str) -> Result<WireMode, String> {
    s.parse()
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Weather(#[from] WeatherError),

    #[error("Terminal error: {0}")]
    Terminal(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let dashboard = matches!(&cli.command, Command::Consumer(args) if !args.headless);
    let log_file = dashboard.then_some(cli.log_file.as_path());
    if let Err(e) = init_tracing(&cli.log_level, log_file) {
        eprintln!("Failed to open log file {}: {}", cli.log_file.display(), e);
        std::process::exit(1);
    }

    info!("Weatherwire v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Command::Producer(args) => run_producer(args).await.map_err(CliError::from),
        Command::Consumer(args) => run_consumer(args).await,
        Command::CreateTopic(args) => run_create_topic(args).await.map_err(CliError::from),
        Command::DeleteTopic(args) => run_delete_topic(args).await.map_err(CliError::from),
    };

    if let Err(e) = result {
        error!("{}", e);
        if dashboard {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over `--log-level`. With a log file, output goes there
/// instead of stderr.
fn init_tracing(log_level: &str, log_file: Option<&Path>) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}

/// Seeded when `--seed` is given, from OS entropy otherwise
fn reading_generator(seed: Option<u64>) -> ReadingGenerator {
    match seed {
        Some(seed) => ReadingGenerator::seeded(seed),
        None => ReadingGenerator::from_entropy(),
    }
}

async fn run_producer(args: ProducerArgs) -> weatherwire::Result<()> {
    let config = ProducerConfig::new(args.topic)
        .with_mode(args.mode)
        .with_intervals(args.min_interval, args.max_interval);

    let publisher =
        KafkaPublisher::connect(&args.broker, &config.topic, &config.message_key).await?;
    info!(broker = %args.broker, topic = %config.topic, "Connected to broker");

    Producer::new(&config, publisher, reading_generator(args.seed))
        .run()
        .await;
    Ok(())
}

async fn run_consumer(args: ConsumerArgs) -> Result<(), CliError> {
    let config = ConsumerConfig::new(args.topic)
        .with_group_id(args.group)
        .with_mode(args.mode)
        .with_persistence_policy(args.on_store_error.into());

    let store = CsvStore::open(&args.output).map_err(WeatherError::from)?;
    let subscriber = KafkaSubscriber::connect(&args.broker, &config.group_id, &config.topic)
        .await
        .map_err(WeatherError::from)?;
    info!(
        broker = %args.broker,
        topic = %config.topic,
        "Writing readings to {}",
        args.output.display()
    );

    let cancel = CancellationToken::new();
    let result = if args.headless {
        let listener = tokio::spawn(interrupt_listener(cancel.clone()));
        let result = ConsumerPipeline::new(&config, subscriber, store, TracingSink)
            .run(&cancel)
            .await;
        cancel.cancel();
        let _ = listener.await;
        result
    } else {
        let sink = tui::TerminalSink::enter()?;
        let listener = tokio::spawn(tui::quit_listener(cancel.clone()));
        let result = ConsumerPipeline::new(&config, subscriber, store, sink)
            .run(&cancel)
            .await;
        cancel.cancel();
        let _ = listener.await;
        result
    };

    let stats = result.map_err(WeatherError::from)?;
    info!(
        received = stats.received,
        processed = stats.processed,
        skipped = stats.skipped,
        persistence_failures = stats.persistence_failures,
        commits = stats.commits,
        renders = stats.renders,
        "Consumer finished"
    );
    Ok(())
}

/// Cancel on the first interrupt signal.
async fn interrupt_listener(cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Interrupt handler failed");
            }
            info!("Interrupt received");
            cancel.cancel();
        }
    }
}

async fn run_create_topic(args: CreateTopicArgs) -> weatherwire::Result<()> {
    let client = KafkaAdmin::connect(&args.broker).await?;
    let spec = TopicSpec::new(args.topic)
        .with_partitions(args.partitions)
        .with_replication_factor(args.replicas);
    admin::create_topic(&client, &spec).await?;
    Ok(())
}

async fn run_delete_topic(args: DeleteTopicArgs) -> weatherwire::Result<()> {
    let client = KafkaAdmin::connect(&args.broker).await?;
    admin::delete_topic(&client, &args.topic).await?;
    Ok(())
}
