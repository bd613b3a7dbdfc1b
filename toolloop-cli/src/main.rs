//! Toolloop CLI - Chat with a tool-using agent from the terminal

mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use toolloop_core::agent::{Agent, AgentOutcome};
use toolloop_core::config::ToolloopConfig;
use toolloop_core::eval::{EvalHarness, EvalRunConfig, EvalSuite};
use toolloop_core::llm::{LLMProviderFactory, Message};
use toolloop_core::tools::builtin;
use tracing::info;

use terminal::{Input, TerminalApproval, TerminalObserver};

#[derive(Parser)]
#[command(name = "toolloop")]
#[command(about = "Tool-calling LLM agent for your working directory", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to toolloop.toml plus TOOLLOOP_* variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat session
    Chat(RunArgs),
    /// Answer a single prompt and exit
    Run {
        /// The user message
        prompt: String,

        #[command(flatten)]
        args: RunArgs,
    },
    /// Run an evaluation suite of tool-selection cases
    Eval {
        /// YAML or JSON fixture file
        fixture: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Version information
    Version,
}

#[derive(Args, Clone)]
struct RunArgs {
    /// Run tools without asking
    #[arg(long)]
    no_approval: bool,

    /// Model calls allowed per user message
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Directory the file and shell tools operate in
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Model name
    #[arg(short, long)]
    model: Option<String>,

    /// Wait for complete responses instead of streaming
    #[arg(long)]
    no_stream: bool,

    /// Print token usage after each model call
    #[arg(long)]
    usage: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut ToolloopConfig) {
        if self.no_approval {
            config.agent.require_approval = false;
        }
        if let Some(max) = self.max_iterations {
            config.agent.max_iterations = max;
        }
        if let Some(workdir) = &self.workdir {
            config.workdir = Some(workdir.clone());
        }
        if let Some(model) = &self.model {
            config.llm.model = Some(model.clone());
        }
        if self.no_stream {
            config.agent.streaming = false;
        }
    }
}

/// Cancel `token` on the first Ctrl-C; abort the returned handle to stop listening
fn cancel_on_ctrl_c(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling run");
            token.cancel();
        }
    })
}

fn load_config(path: Option<&PathBuf>) -> Result<ToolloopConfig> {
    let config = match path {
        Some(path) => ToolloopConfig::from_file(path)?,
        None => ToolloopConfig::load()?,
    };
    Ok(config)
}

async fn build_agent(config: &ToolloopConfig, input: &Input, show_usage: bool) -> Result<Agent> {
    let workdir = match &config.workdir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to resolve working directory")?,
    };
    let registry = builtin::registry(&workdir)?;
    let provider = LLMProviderFactory::create(&config.llm).await?;

    info!(
        model = %provider.model_info().model_name,
        workdir = %workdir.display(),
        tools = registry.len(),
        "Agent ready"
    );

    let agent = Agent::builder(provider)
        .registry(Arc::new(registry))
        .gate(Arc::new(TerminalApproval::new(input.clone())))
        .observer(Arc::new(TerminalObserver::new(show_usage)))
        .config(config.agent.clone())
        .executor_config(config.tools.clone())
        .context_config(config.context.clone())
        .build()?;
    Ok(agent)
}

async fn run_turn(agent: &Agent, history: Vec<Message>, prompt: String) -> AgentOutcome {
    let token = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(token.clone());
    let outcome = agent.run(history, prompt, Some(token)).await;
    watcher.abort();
    outcome
}

async fn chat(config: ToolloopConfig, args: &RunArgs) -> Result<()> {
    let input = Input::stdin();
    let agent = build_agent(&config, &input, args.usage).await?;
    let mut history: Vec<Message> = Vec::new();

    println!("toolloop {} - type /exit to quit, /clear to reset", toolloop_core::VERSION);
    loop {
        let Some(line) = input.read_line("\n> ").await else {
            break;
        };
        let prompt = line.trim();
        match prompt {
            "" => continue,
            "/exit" | "/quit" => break,
            "/clear" => {
                history.clear();
                println!("History cleared.");
                continue;
            }
            _ => {}
        }

        let outcome = run_turn(&agent, std::mem::take(&mut history), prompt.to_string()).await;
        history = outcome.history;
    }
    Ok(())
}

async fn run_once(config: ToolloopConfig, args: &RunArgs, prompt: String) -> Result<()> {
    let input = Input::stdin();
    let agent = build_agent(&config, &input, args.usage).await?;
    let outcome = run_turn(&agent, Vec::new(), prompt).await;
    if !outcome.is_completed() {
        bail!("run stopped: {}", outcome.stop_reason);
    }
    Ok(())
}

async fn eval(config: ToolloopConfig, fixture: PathBuf, json: bool) -> Result<()> {
    let suite = EvalSuite::load(&fixture)?;
    let provider = LLMProviderFactory::create(&config.llm).await?;
    let run_config = EvalRunConfig {
        max_iterations: config.agent.max_iterations,
        system_prompt: config.agent.system_prompt.clone(),
        settings: config.agent.settings.clone(),
        ..Default::default()
    };

    info!(
        suite = suite.name.as_deref().unwrap_or("unnamed"),
        cases = suite.cases.len(),
        "Running evaluation"
    );
    let report = EvalHarness::with_config(provider, run_config)
        .run_all(&suite.cases)
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    if !report.all_passed() {
        bail!("{} of {} cases failed", report.total - report.passed, report.total);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with streamed answers
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("toolloop {}", env!("CARGO_PKG_VERSION"));
            println!("toolloop-core {}", toolloop_core::VERSION);
        }
        Commands::Chat(args) => {
            let mut config = load_config(cli.config.as_ref())?;
            args.apply(&mut config);
            config.validate()?;
            chat(config, &args).await?;
        }
        Commands::Run { prompt, args } => {
            let mut config = load_config(cli.config.as_ref())?;
            args.apply(&mut config);
            config.validate()?;
            run_once(config, &args, prompt).await?;
        }
        Commands::Eval { fixture, json } => {
            let config = load_config(cli.config.as_ref())?;
            eval(config, fixture, json).await?;
        }
    }

    Ok(())
}
