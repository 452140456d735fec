//! Run the structured-output weather agent, or format a saved invocation.
//!
//! Provider credentials come from `API_KEY`, `BASE_URL` and `MODEL_NAME`
//! (a `.env` file in the working directory is loaded first).
//!
//! # Examples
//!
//! ```sh
//! # Both directives, default question
//! tether run
//!
//! # Agent-level enforcement only, with request payload logging
//! tether run --no-tool-strategy --debug --query "weather in Paris?"
//!
//! # One-shot JSON mode call
//! tether joke
//!
//! # Normalize a saved invocation result
//! tether format result.json
//! cat result.json | tether format -
//! ```

use clap::{Args, Parser, Subcommand};
use std::io::{self, Read};
use std::process;
use tether::prelude::*;
use tether::{Error, ErrorRecord};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Structured-output agent harness for OpenAI-compatible endpoints.
#[derive(Parser)]
#[command(name = "tether", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the weather agent a question and print the canonical record
    Run(RunArgs),
    /// Ask for a joke in JSON mode, without tools or the agent loop
    Joke {
        /// Prompt; it should name the `setup` and `punchline` keys
        #[arg(
            long,
            default_value = "Tell me a joke about dogs. Reply in JSON with the keys 'setup' and 'punchline'."
        )]
        prompt: String,
    },
    /// Normalize a saved invocation result (JSON) into the canonical record
    Format {
        /// Path to the invocation result, or `-` for stdin
        input: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Question sent as the human message
    #[arg(long, default_value = "get me the weather in SF")]
    query: String,

    /// Skip tool-level schema enforcement
    #[arg(long)]
    no_tool_strategy: bool,

    /// Skip agent-level schema enforcement
    #[arg(long)]
    no_agent_strategy: bool,

    /// Log request payloads and raise the log filter to debug
    #[arg(long)]
    debug: bool,

    /// Maximum model calls before giving up
    #[arg(long, default_value_t = 10)]
    max_rounds: u32,

    /// Run tool calls one at a time instead of concurrently
    #[arg(long)]
    sequential_tools: bool,
}

fn init_tracing(debug: bool) {
    let default = if debug { "tether=debug" } else { "tether=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();
}

async fn run(args: &RunArgs) -> Result<CanonicalOutputRecord, Error> {
    let settings = ProviderSettings::from_env()?;
    let schema = Arc::new(StructuredSchema::contact_info());

    let config = AgentConfig::new(&settings.model, DEFAULT_SYSTEM_PROMPT)
        .with_max_rounds(args.max_rounds)
        .with_sequential_tools(args.sequential_tools)
        .with_extra_body("enable_cache", true);

    let mut agent = Agent::from_settings(&settings, ToolSet::new().with(GetWeather), config)?
        .with_hooks(Hooks::new().with_logging());
    if !args.no_agent_strategy {
        agent = agent.with_response_format(Arc::clone(&schema));
    }

    let mut options = InvocationOptions::default().with_debug(args.debug);
    if !args.no_tool_strategy {
        options = options.with_response_format(schema);
    }

    agent
        .invoke_formatted(vec![AgentMessage::human(&args.query)], options)
        .await
}

async fn joke(prompt: &str) -> Result<serde_json::Value, Error> {
    let settings = ProviderSettings::from_env()?;
    let config = AgentConfig::new(&settings.model, DEFAULT_SYSTEM_PROMPT);
    let agent = Agent::from_settings(&settings, ToolSet::new(), config)?;
    let joke = agent
        .invoke_json_mode(&StructuredSchema::joke(), prompt)
        .await?;
    Ok(serde_json::Value::Object(joke))
}

fn format_file(input: &str) -> Result<CanonicalOutputRecord, Error> {
    let raw = if input == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(input)?
    };
    let result: InvocationResult = serde_json::from_str(&raw)?;
    Ok(format_response(result, &RoleMapper::default())?)
}

fn to_json(value: impl serde::Serialize) -> Result<String, Error> {
    Ok(serde_json::to_string_pretty(&value)?)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let debug = matches!(&cli.command, Command::Run(args) if args.debug);
    init_tracing(debug);

    let outcome = match &cli.command {
        Command::Run(args) => run(args).await.and_then(to_json),
        Command::Joke { prompt } => joke(prompt).await.and_then(to_json),
        Command::Format { input } => format_file(input).and_then(to_json),
    };

    match outcome {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!("{e}");
            let record = ErrorRecord::from(&e);
            match serde_json::to_string_pretty(&record) {
                Ok(json) => println!("{json}"),
                Err(_) => eprintln!("Error: {e}"),
            }
            process::exit(1);
        }
    }
}
