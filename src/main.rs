//! toolbridge command-line entry point.
//!
//! - `serve-store`: people-store query tools (port 8000)
//! - `serve-news`: news/reference tools (port 8001)
//! - `chat`: discover a running server and talk to it through an agent

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use toolbridge::agent::profiles::{NEWS_PORT, STORE_PORT};
use toolbridge::agent::{
    default_profiles, run_repl, AgentContext, AgentSession, OllamaReasoner, ServerProfile,
    ToolSetKind,
};
use toolbridge::client::{discover, Endpoint, ToolClient};
use toolbridge::ipc::{serve_stdio, IpcServer, ServerContext};
use toolbridge::tools::{self, Tool, ToolRegistry};
use toolbridge::types::{ServerConfig, TransportKind};
use toolbridge::{Config, Error};

type BoxError = Box<dyn std::error::Error>;

#[derive(Debug, Parser)]
#[command(name = "toolbridge", version, about = "Tool servers and an agent that finds them")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the people-store query tools.
    ServeStore {
        #[command(flatten)]
        serve: ServeArgs,
        /// SQLite database file.
        #[arg(long)]
        db: Option<String>,
        /// Only let each tool run its own statement kind.
        #[arg(long)]
        strict: bool,
    },
    /// Serve the news/reference tools.
    ServeNews {
        #[command(flatten)]
        serve: ServeArgs,
    },
    /// Discover a running server and chat with an agent bound to its tools.
    Chat(ChatArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportArg {
    Stream,
    Stdio,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Stream => TransportKind::Stream,
            TransportArg::Stdio => TransportKind::Stdio,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileArg {
    Store,
    News,
}

impl From<ProfileArg> for ToolSetKind {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Store => ToolSetKind::Store,
            ProfileArg::News => ToolSetKind::News,
        }
    }
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[arg(long, value_enum, default_value = "stream")]
    transport: TransportArg,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    path: Option<String>,
    /// Upper bound on one tool call, e.g. `30s`.
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    timeout: Option<Duration>,
}

impl ServeArgs {
    fn apply(self, server: &mut ServerConfig, name: &str, default_port: u16) {
        server.name = name.to_string();
        server.transport = self.transport.into();
        if std::env::var_os("TOOLBRIDGE_PORT").is_none() {
            server.port = default_port;
        }
        if let Some(host) = self.host {
            server.host = host;
        }
        if let Some(port) = self.port {
            server.port = port;
        }
        if let Some(path) = self.path {
            server.path = path;
        }
        if let Some(timeout) = self.timeout {
            server.request_timeout = timeout;
        }
    }
}

#[derive(Debug, Args)]
struct ChatArgs {
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    ollama_url: Option<String>,
    /// Do not print tool calls and results.
    #[arg(long)]
    quiet: bool,
    /// Spawn this command as a pipe server instead of discovering one.
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    pipe: Option<Vec<String>>,
    /// Tool set the pipe server provides.
    #[arg(long, value_enum, default_value = "store")]
    profile: ProfileArg,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let mut config = Config::from_env();
    toolbridge::observability::init_tracing(&config.observability);

    match cli.command {
        Command::ServeStore { serve, db, strict } => {
            serve.apply(&mut config.server, "people-store", STORE_PORT);
            if let Some(db) = db {
                config.server.db_path = db;
            }
            let registry = tools::store_registry(&config.server.db_path, strict)?;
            run_server(registry, config).await
        }
        Command::ServeNews { serve } => {
            serve.apply(&mut config.server, "news", NEWS_PORT);
            let registry = tools::news_registry(config.server.request_timeout)?;
            run_server(registry, config).await
        }
        Command::Chat(args) => run_chat(args, config).await,
    }
}

async fn run_server(registry: ToolRegistry, config: Config) -> Result<(), BoxError> {
    tracing::debug!("{}", registry.generate_prompt());
    let ctx = ServerContext::new(Arc::new(registry), &config.server);

    match config.server.transport {
        TransportKind::Stream => {
            let server = IpcServer::new(ctx, config.server.bind_addr(), config.ipc);
            cancel_on_ctrl_c(server.cancel_token());
            server.serve().await?;
        }
        TransportKind::Stdio => {
            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());
            serve_stdio(ctx, config.ipc, cancel).await?;
        }
    }
    Ok(())
}

fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            cancel.cancel();
        }
    });
}

async fn run_chat(args: ChatArgs, mut config: Config) -> Result<(), BoxError> {
    if let Some(model) = args.model {
        config.agent.model = model;
    }
    if let Some(url) = args.ollama_url {
        config.agent.ollama_url = url;
    }

    let profile = match args.pipe {
        Some(mut command) if !command.is_empty() => {
            let program = command.remove(0);
            ServerProfile::new(args.profile.into(), Endpoint::pipe(program, command))
        }
        _ => match discover(&default_profiles(), &config.client).await {
            Ok(profile) => profile,
            Err(e @ Error::NoServerFound(_)) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
            Err(e) => return Err(e.into()),
        },
    };
    println!("Connected to {} server at {}", profile.name, profile.endpoint);

    let client = ToolClient::connect(profile.endpoint.clone(), config.client.clone()).await?;
    let remote = client.list_tools().await?;
    for tool in &remote {
        println!("{} {}", tool.name(), tool.describe().description);
    }
    let tools: Vec<Arc<dyn Tool>> = remote
        .into_iter()
        .map(|tool| Arc::new(tool) as Arc<dyn Tool>)
        .collect();

    let ctx = AgentContext {
        reasoner: Arc::new(OllamaReasoner::from_config(&config.agent)?),
        config: config.agent.clone(),
    };
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut session = AgentSession::new(ctx, profile.preamble.clone(), tools);
    let events = if args.quiet {
        None
    } else {
        session = session.with_observer(events_tx);
        Some(&mut events_rx)
    };

    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    tokio::select! {
        result = run_repl(&mut session, input, &mut output, events) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }
    Ok(())
}
