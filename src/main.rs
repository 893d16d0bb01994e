//! Pub/Sub console - command line front end
//!
//! A thin presentation layer over the messaging client. Every command prints
//! its result as JSON on stdout; logs and errors go to stderr.

use clap::{Args, Parser, Subcommand};
use pubsub_console::observability::init_default_logging;
use pubsub_console::{
    AckMode, AckToken, ConsoleConfig, KeyValueStore, MessagingClient, PullOptions, SessionState,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, error, info};

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Manage topics and subscriptions on a Pub/Sub-compatible broker
#[derive(Parser)]
#[command(name = "pubsub-console")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Broker endpoint, overriding the configuration file
    #[arg(long, env = "PUBSUB_EMULATOR_HOST", value_name = "HOST:PORT")]
    endpoint: Option<String>,

    /// Project to act on; also persisted as the active project
    #[arg(short, long, value_name = "ID")]
    project: Option<String>,

    /// State file, overriding the configuration file
    #[arg(long, value_name = "FILE")]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or change the active project
    Project {
        #[command(subcommand)]
        action: ProjectCommand,
    },
    #[command(flatten)]
    Broker(BrokerCommand),
}

// Commands that need a broker connection
#[derive(Subcommand)]
enum BrokerCommand {
    /// Manage topics
    Topic {
        #[command(subcommand)]
        action: TopicCommand,
    },
    /// Manage subscriptions
    Subscription {
        #[command(subcommand)]
        action: SubscriptionCommand,
    },
    /// Publish one text message
    Publish {
        /// Topic id
        #[arg(long)]
        topic: String,
        #[arg(long)]
        message: String,
        /// Message attribute as KEY=VALUE; may be repeated
        #[arg(long = "attr", value_name = "KEY=VALUE", value_parser = parse_attribute)]
        attributes: Vec<(String, String)>,
    },
    /// Drain every available message from a subscription
    Pull {
        /// Subscription id
        #[arg(long)]
        subscription: String,
        #[command(flatten)]
        mode: AckModeArgs,
        /// Maximum messages per pull request
        #[arg(long)]
        batch_size: Option<u32>,
    },
    /// Acknowledge one message pulled with --explicit-ack
    Ack {
        /// Subscription id
        #[arg(long)]
        subscription: String,
        token: String,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    Show,
    Set { id: String },
}

#[derive(Subcommand)]
enum TopicCommand {
    Create { id: String },
    List,
    Delete { id: String },
}

#[derive(Subcommand)]
enum SubscriptionCommand {
    Create {
        id: String,
        /// Topic id the subscription is bound to
        #[arg(long)]
        topic: String,
    },
    List {
        /// Only subscriptions bound to this topic id
        #[arg(long)]
        topic: Option<String>,
    },
    Delete { id: String },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct AckModeArgs {
    /// Acknowledge every message as it is pulled
    #[arg(long)]
    auto_ack: bool,
    /// Return ack tokens for separate `ack` calls
    #[arg(long)]
    explicit_ack: bool,
}

impl AckModeArgs {
    fn ack_mode(&self) -> AckMode {
        if self.auto_ack {
            AckMode::Auto
        } else {
            AckMode::Explicit
        }
    }
}

fn parse_attribute(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    if let Err(e) = run(cli).await {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let mut config = load_configuration(cli.config.as_deref())?;
    if let Some(endpoint) = cli.endpoint {
        config = config.with_endpoint(endpoint)?;
    }
    let storage_path = cli.storage.unwrap_or_else(|| config.storage.path.clone());

    let mut store = KeyValueStore::open(&storage_path);
    let mut session = SessionState::restore(&store);
    if let Some(project) = cli.project.as_deref() {
        session.select_project(&mut store, project)?;
    }

    match cli.command {
        Commands::Project { action } => run_project(action, &mut session, &mut store),
        Commands::Broker(command) => {
            let client = MessagingClient::connect(&config)?;
            info!(endpoint = %config.broker.endpoint, "Connected to broker");
            run_broker_command(command, &client, &mut session, &config).await
        }
    }
}

fn load_configuration(config_path: Option<&Path>) -> CliResult<ConsoleConfig> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(ConsoleConfig::load_from_file(path)?)
        }
        None => {
            let default_path = Path::new("pubsub-console.toml");
            if default_path.exists() {
                info!("Loading configuration from: {}", default_path.display());
                return Ok(ConsoleConfig::load_from_file(default_path)?);
            }
            debug!("No configuration file, using defaults");
            Ok(ConsoleConfig::default())
        }
    }
}

fn run_project(
    action: ProjectCommand,
    session: &mut SessionState,
    store: &mut KeyValueStore,
) -> CliResult<()> {
    match action {
        ProjectCommand::Show => print_json(&json!({ "project_id": session.project_id() })),
        ProjectCommand::Set { id } => {
            session.select_project(store, &id)?;
            print_json(&json!({ "project_id": id }))
        }
    }
}

async fn run_broker_command(
    command: BrokerCommand,
    client: &MessagingClient,
    session: &mut SessionState,
    config: &ConsoleConfig,
) -> CliResult<()> {
    let project = session
        .project_id()
        .map(str::to_string)
        .ok_or("No active project; pass --project or run `project set <id>`")?;

    match command {
        BrokerCommand::Topic { action } => match action {
            TopicCommand::Create { id } => print_json(&client.create_topic(&project, &id).await?),
            TopicCommand::List => print_json(&client.list_topics(&project).await?),
            TopicCommand::Delete { id } => {
                session.select_topic(&id)?;
                let path = selected_topic(session)?;
                client.delete_topic(&path).await?;
                print_json(&json!({ "deleted": path }))
            }
        },
        BrokerCommand::Subscription { action } => match action {
            SubscriptionCommand::Create { id, topic } => {
                print_json(&client.create_subscription(&project, &id, &topic).await?)
            }
            SubscriptionCommand::List { topic } => {
                print_json(&client.list_subscriptions(&project, topic.as_deref()).await?)
            }
            SubscriptionCommand::Delete { id } => {
                session.select_subscription(&id)?;
                let path = selected_subscription(session)?;
                client.delete_subscription(&path).await?;
                print_json(&json!({ "deleted": path }))
            }
        },
        BrokerCommand::Publish {
            topic,
            message,
            attributes,
        } => {
            session.select_topic(&topic)?;
            let path = selected_topic(session)?;
            let attributes: HashMap<String, String> = attributes.into_iter().collect();
            let attributes = (!attributes.is_empty()).then_some(attributes);
            let message_id = client.publish(&path, &message, attributes).await?;
            print_json(&json!({ "message_id": message_id }))
        }
        BrokerCommand::Pull {
            subscription,
            mode,
            batch_size,
        } => {
            session.select_subscription(&subscription)?;
            let path = selected_subscription(session)?;
            let options = PullOptions::new(mode.ack_mode())
                .with_batch_size(batch_size.unwrap_or(config.pull.batch_size));
            print_json(&client.pull_all(&path, options).await?)
        }
        BrokerCommand::Ack {
            subscription,
            token,
        } => {
            session.select_subscription(&subscription)?;
            let path = selected_subscription(session)?;
            client.ack(&path, &AckToken::new(token)).await?;
            print_json(&json!({ "acknowledged": 1 }))
        }
    }
}

fn selected_topic(session: &SessionState) -> CliResult<String> {
    session
        .topic_path()
        .map(|path| path.to_string())
        .ok_or_else(|| "No topic selected".into())
}

fn selected_subscription(session: &SessionState) -> CliResult<String> {
    session
        .subscription_path()
        .map(|path| path.to_string())
        .ok_or_else(|| "No subscription selected".into())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
