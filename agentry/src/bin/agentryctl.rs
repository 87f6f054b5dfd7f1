//! `agentryctl`: a thin HTTP client over the gateway's own admin CRUD
//! surface (spec §6 `/v1/admin/*`), authenticated with the same
//! `X-Admin-Key` header the gateway itself enforces.

use std::collections::HashMap;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use agentry_control::dto::{RegisterAgentRequest, RegisterSchemaRequest, UpdateSchemaRequest, ValidatePayloadRequest};
use agentry_registry::DeliveryMode;

#[derive(Debug, Parser)]
#[command(name = "agentryctl", about = "Admin CLI for the agentry AMTP gateway")]
struct Cli {
    /// Base URL of the gateway's admin surface, e.g. `https://localhost:8443`.
    #[arg(long, env = "AGENTRYCTL_GATEWAY_URL", default_value = "http://localhost:8443")]
    gateway_url: String,

    /// Base URL of the gateway's health listener, e.g. `http://localhost:9000`.
    #[arg(long, env = "AGENTRYCTL_HEALTH_URL", default_value = "http://localhost:9000")]
    health_url: String,

    /// Admin key, also readable from `AGENTRYCTL_ADMIN_KEY` to avoid leaving
    /// it in shell history. Required for `agent`/`schema` subcommands, unused
    /// by `status`/`health`.
    #[arg(long, env = "AGENTRYCTL_ADMIN_KEY")]
    admin_key: Option<String>,

    /// Header name the gateway expects the admin key under.
    #[arg(long, default_value = "X-Admin-Key")]
    header_name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Agent registration and lookup.
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },
    /// Schema registration, lookup, and validation.
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },
    /// Fetch a message's aggregate and per-recipient delivery status.
    Status { message_id: String },
    /// Check the gateway's liveness and readiness.
    Health,
}

#[derive(Debug, Subcommand)]
enum AgentCommand {
    /// Register a local agent.
    Register {
        /// Bare name or `name@local-domain`.
        address: String,
        #[arg(long, value_enum)]
        mode: CliDeliveryMode,
        /// Required when `--mode push`.
        #[arg(long)]
        push_target: Option<String>,
        /// Repeatable `key=value` custom push headers.
        #[arg(long = "header", value_parser = parse_key_val)]
        headers: Vec<(String, String)>,
        /// Repeatable schema identifiers or `agntcy:<domain>.*` wildcards
        /// this agent accepts.
        #[arg(long = "schema")]
        supported_schemas: Vec<String>,
        #[arg(long)]
        requires_schema: bool,
    },
    /// List every registered local agent.
    List,
    /// Fetch one agent by address.
    Get { address: String },
    /// Remove a local agent.
    Unregister { address: String },
}

#[derive(Debug, Subcommand)]
enum SchemaCommand {
    /// Register a JSON-Schema definition, reading the document from a file.
    Register {
        id: String,
        /// Path to a JSON file containing the schema document.
        definition_file: String,
        #[arg(long)]
        force: bool,
    },
    /// Replace an already-registered schema's definition in place.
    Update {
        id: String,
        definition_file: String,
    },
    /// List schemas, optionally filtered by an `agntcy:<domain>.*` pattern.
    List { pattern: Option<String> },
    /// Fetch one schema by identifier.
    Get { id: String },
    /// Delete a schema.
    Delete { id: String },
    /// Validate a JSON payload (read from a file) against a registered schema.
    Validate {
        id: String,
        payload_file: String,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliDeliveryMode {
    Push,
    Pull,
}

impl From<CliDeliveryMode> for DeliveryMode {
    fn from(value: CliDeliveryMode) -> Self {
        match value {
            CliDeliveryMode::Push => Self::Push,
            CliDeliveryMode::Pull => Self::Pull,
        }
    }
}

fn parse_key_val(raw: &str) -> anyhow::Result<(String, String)> {
    let (k, v) = raw.split_once('=').context("expected key=value")?;
    Ok((k.to_string(), v.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Command::Agent { command } => {
            let admin_key = cli.admin_key.context("--admin-key is required for agent commands")?;
            run_agent_command(&client, &cli.gateway_url, &cli.header_name, &admin_key, command).await
        }
        Command::Schema { command } => {
            let admin_key = cli.admin_key.context("--admin-key is required for schema commands")?;
            run_schema_command(&client, &cli.gateway_url, &cli.header_name, &admin_key, command).await
        }
        Command::Status { message_id } => run_status_command(&client, &cli.gateway_url, &message_id).await,
        Command::Health => run_health_command(&client, &cli.health_url).await,
    }
}

async fn run_status_command(client: &Client, gateway_url: &str, message_id: &str) -> anyhow::Result<()> {
    let response = client.get(format!("{gateway_url}/v1/messages/{message_id}/status")).send().await.context("request failed")?;
    print_response(response).await
}

async fn run_health_command(client: &Client, health_url: &str) -> anyhow::Result<()> {
    let live = client.get(format!("{health_url}/health")).send().await.context("liveness request failed")?;
    print_response(live).await?;
    let ready = client.get(format!("{health_url}/ready")).send().await.context("readiness request failed")?;
    print_response(ready).await
}

async fn run_agent_command(
    client: &Client,
    base_url: &str,
    header_name: &str,
    admin_key: &str,
    command: AgentCommand,
) -> anyhow::Result<()> {
    match command {
        AgentCommand::Register { address, mode, push_target, headers, supported_schemas, requires_schema } => {
            let supported_schemas = supported_schemas
                .iter()
                .map(|raw| agentry_common::SchemaIdentifier::parse(raw))
                .collect::<Result<Vec<_>, _>>()
                .context("invalid schema identifier")?;
            let request = RegisterAgentRequest {
                address,
                delivery_mode: mode.into(),
                push_target,
                headers: headers.into_iter().collect::<HashMap<_, _>>(),
                supported_schemas,
                requires_schema,
            };
            let response = client
                .post(format!("{base_url}/v1/admin/agents"))
                .header(header_name, admin_key)
                .json(&request)
                .send()
                .await
                .context("request failed")?;
            print_response(response).await
        }
        AgentCommand::List => {
            let response = client.get(format!("{base_url}/v1/admin/agents")).header(header_name, admin_key).send().await?;
            print_response(response).await
        }
        AgentCommand::Get { address } => {
            let response = client
                .get(format!("{base_url}/v1/admin/agents/{address}"))
                .header(header_name, admin_key)
                .send()
                .await?;
            print_response(response).await
        }
        AgentCommand::Unregister { address } => {
            let response = client
                .delete(format!("{base_url}/v1/admin/agents/{address}"))
                .header(header_name, admin_key)
                .send()
                .await?;
            print_status(response).await
        }
    }
}

async fn run_schema_command(
    client: &Client,
    base_url: &str,
    header_name: &str,
    admin_key: &str,
    command: SchemaCommand,
) -> anyhow::Result<()> {
    match command {
        SchemaCommand::Register { id, definition_file, force } => {
            let definition: Value = serde_json::from_str(&std::fs::read_to_string(&definition_file)?)?;
            let request = RegisterSchemaRequest { id: agentry_common::SchemaIdentifier::parse(&id)?, definition, force };
            let response = client
                .post(format!("{base_url}/v1/admin/schemas"))
                .header(header_name, admin_key)
                .json(&request)
                .send()
                .await?;
            print_response(response).await
        }
        SchemaCommand::Update { id, definition_file } => {
            let definition: Value = serde_json::from_str(&std::fs::read_to_string(&definition_file)?)?;
            let request = UpdateSchemaRequest { definition };
            let response = client
                .put(format!("{base_url}/v1/admin/schemas/{id}"))
                .header(header_name, admin_key)
                .json(&request)
                .send()
                .await?;
            print_response(response).await
        }
        SchemaCommand::List { pattern } => {
            let mut request = client.get(format!("{base_url}/v1/admin/schemas")).header(header_name, admin_key);
            if let Some(pattern) = pattern {
                request = request.query(&[("pattern", pattern)]);
            }
            print_response(request.send().await?).await
        }
        SchemaCommand::Get { id } => {
            let response = client.get(format!("{base_url}/v1/admin/schemas/{id}")).header(header_name, admin_key).send().await?;
            print_response(response).await
        }
        SchemaCommand::Delete { id } => {
            let response = client.delete(format!("{base_url}/v1/admin/schemas/{id}")).header(header_name, admin_key).send().await?;
            print_status(response).await
        }
        SchemaCommand::Validate { id, payload_file } => {
            let payload: Value = serde_json::from_str(&std::fs::read_to_string(&payload_file)?)?;
            let request = ValidatePayloadRequest { payload };
            let response = client
                .post(format!("{base_url}/v1/admin/schemas/{id}/validate"))
                .header(header_name, admin_key)
                .json(&request)
                .send()
                .await?;
            print_response(response).await
        }
    }
}

async fn print_response(response: reqwest::Response) -> anyhow::Result<()> {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        bail!("request failed with status {status}");
    }
    Ok(())
}

async fn print_status(response: reqwest::Response) -> anyhow::Result<()> {
    let status = response.status();
    if status == StatusCode::NO_CONTENT || status.is_success() {
        println!("ok ({status})");
        Ok(())
    } else {
        let body: Value = response.json().await.unwrap_or(Value::Null);
        println!("{}", serde_json::to_string_pretty(&body)?);
        bail!("request failed with status {status}");
    }
}
