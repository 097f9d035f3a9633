mod repl;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use jarvis::net::types::Persona;
use jarvis::state::chat::DEFAULT_MODE;
use jarvis::state::files::parent_of;
use jarvis::state::memory::MemoryTab;
use jarvis::sync::chat::ChatSync;
use jarvis::sync::files::FilesSync;
use jarvis::sync::graph::GraphSync;
use jarvis::sync::memory::MemorySync;
use jarvis::{Backend, ClientConfig, ClientError, FileTokenStore, HttpBackend, Session};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing {0}")]
    MissingInput(&'static str),
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            Self::Client(e) => e.error_code(),
            Self::Json(_) => "E_JSON",
            Self::Io(_) => "E_IO",
            Self::MissingInput(_) => "E_MISSING_INPUT",
        }
    }

    fn requires_login(&self) -> bool {
        matches!(self, Self::Client(e) if e.requires_login())
    }
}

#[derive(Parser, Debug)]
#[command(name = "jarvis", about = "Command-line client for the Jarvis assistant")]
struct Cli {
    /// Backend base URL (overrides JARVIS_API_URL).
    #[arg(long)]
    api_url: Option<String>,

    /// Session token file (overrides JARVIS_TOKEN_PATH).
    #[arg(long)]
    token_path: Option<PathBuf>,

    /// Log debug detail to stderr.
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session token.
    Login(Credentials),
    /// Create an account. Log in afterwards.
    Signup(Credentials),
    /// Remove the stored session token.
    Logout,
    /// Show the logged-in user.
    Whoami,
    Modes(ModesCommand),
    Chats(ChatsCommand),
    /// Send one message and print the reply.
    Send {
        #[arg(long)]
        mode: Option<String>,
        /// Chat to send to; defaults to the mode's newest chat.
        #[arg(long)]
        chat: Option<String>,
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Set the assistant persona (Generalist, Coder, Architect, Sentinel).
    Persona { persona: Persona },
    Memory(MemoryCommand),
    Graph(GraphCommand),
    Files(FilesCommand),
    /// Interactive chat session.
    Chat {
        #[arg(long)]
        mode: Option<String>,
    },
}

#[derive(Args, Debug)]
struct Credentials {
    username: String,
    /// Read from stdin when omitted.
    #[arg(long, env = "JARVIS_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct ModesCommand {
    #[command(subcommand)]
    command: ModesSubcommand,
}

#[derive(Subcommand, Debug)]
enum ModesSubcommand {
    List,
    /// Make a mode active on the backend (creates it if new).
    Switch { name: String },
    /// Delete a mode with its chats and memory.
    Delete { name: String },
}

#[derive(Args, Debug)]
struct ChatsCommand {
    #[command(subcommand)]
    command: ChatsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ChatsSubcommand {
    List {
        #[arg(long)]
        mode: Option<String>,
    },
    New {
        #[arg(long)]
        mode: Option<String>,
    },
    Show { chat_id: String },
    Delete { chat_id: String },
}

#[derive(Args, Debug)]
struct MemoryCommand {
    #[command(subcommand)]
    command: MemorySubcommand,
}

#[derive(Subcommand, Debug)]
enum MemorySubcommand {
    List {
        #[arg(long)]
        mode: Option<String>,
        /// Show episodic history instead of core facts.
        #[arg(long)]
        episodic: bool,
        #[arg(long, default_value = "")]
        search: String,
    },
    DeleteFact { fact_id: String },
    DeleteEpisode {
        episode_id: String,
        #[arg(long)]
        mode: Option<String>,
    },
}

#[derive(Args, Debug)]
struct GraphCommand {
    #[command(subcommand)]
    command: GraphSubcommand,
}

#[derive(Subcommand, Debug)]
enum GraphSubcommand {
    Show,
    /// Show one node with the edges touching it.
    Node { id: String },
    /// Extract entities and relations from text into the graph.
    Generate {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct FilesCommand {
    #[command(subcommand)]
    command: FilesSubcommand,
}

#[derive(Subcommand, Debug)]
enum FilesSubcommand {
    Monitored,
    Add { path: String },
    Remove { path: String },
    Scan { path: String },
    /// Open the directory picker on the backend host.
    Browse,
    List { path: String },
    /// List the parent of a path.
    Up { path: String },
}

struct App {
    backend: Arc<dyn Backend>,
    session: Session,
}

impl App {
    fn new(config: &ClientConfig) -> Result<Self, CliError> {
        let tokens = Arc::new(FileTokenStore::new(config.token_path.clone()));
        tracing::debug!(api_url = %config.api_url, token_path = %tokens.path().display(), "client configured");
        let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(config, tokens.clone())?);
        let session = Session::new(backend.clone(), tokens);
        Ok(Self { backend, session })
    }

    fn mode(mode: Option<String>) -> String {
        mode.unwrap_or_else(|| DEFAULT_MODE.to_owned())
    }

    /// Chat synchronizer bound to `mode`, with its chats loaded.
    async fn chat_sync(&self, mode: &str) -> Result<ChatSync, CliError> {
        let sync = ChatSync::with_mode(self.backend.clone(), mode);
        sync.list_chats(mode).await?;
        Ok(sync)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_max_level(level).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error [{}]: {e}", e.code());
            if e.requires_login() {
                eprintln!("log in again with `jarvis login <username>`");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.api_url.as_deref() {
        config = config.with_api_url(url)?;
    }
    if let Some(path) = cli.token_path {
        config = config.with_token_path(path);
    }

    let app = App::new(&config)?;
    match cli.command {
        Command::Login(creds) => run_login(&app, creds).await,
        Command::Signup(creds) => {
            let password = password_or_prompt(creds.password).await?;
            app.session.signup(&creds.username, &password).await?;
            println!("account '{}' created; log in with `jarvis login {}`", creds.username.trim(), creds.username.trim());
            Ok(())
        }
        Command::Logout => {
            app.session.logout()?;
            println!("logged out");
            Ok(())
        }
        Command::Whoami => match app.session.restore().await? {
            Some(user) => print_json(&user),
            None => Err(ClientError::NotAuthenticated.into()),
        },
        Command::Modes(cmd) => run_modes(&app, cmd.command).await,
        Command::Chats(cmd) => run_chats(&app, cmd.command).await,
        Command::Send { mode, chat, message } => run_send(&app, App::mode(mode), chat, &message.join(" ")).await,
        Command::Persona { persona } => {
            app.backend.set_persona(persona).await?;
            println!("persona set to {persona}");
            Ok(())
        }
        Command::Memory(cmd) => run_memory(&app, cmd.command).await,
        Command::Graph(cmd) => run_graph(&app, cmd.command).await,
        Command::Files(cmd) => run_files(&app, cmd.command).await,
        Command::Chat { mode } => {
            let sync = app.chat_sync(&App::mode(mode)).await?;
            repl::run(&sync).await
        }
    }
}

async fn run_login(app: &App, creds: Credentials) -> Result<(), CliError> {
    let password = password_or_prompt(creds.password).await?;
    let user = app.session.login(&creds.username, &password).await?;
    println!("logged in as {}", user.username);
    Ok(())
}

async fn run_modes(app: &App, command: ModesSubcommand) -> Result<(), CliError> {
    let sync = ChatSync::new(app.backend.clone());
    match command {
        ModesSubcommand::List => {
            let modes = sync.list_modes().await?;
            print_json(&modes)
        }
        ModesSubcommand::Switch { name } => {
            let chats = sync.switch_mode(&name).await?;
            println!("active mode: {} ({} chats)", sync.active_mode(), chats.len());
            Ok(())
        }
        ModesSubcommand::Delete { name } => {
            sync.delete_mode(&name).await?;
            println!("deleted mode {name}");
            Ok(())
        }
    }
}

async fn run_chats(app: &App, command: ChatsSubcommand) -> Result<(), CliError> {
    match command {
        ChatsSubcommand::List { mode } => {
            let sync = app.chat_sync(&App::mode(mode)).await?;
            let state = sync.snapshot();
            let rows: Vec<Value> = state
                .chats
                .iter()
                .map(|chat| {
                    json!({
                        "id": chat.id,
                        "title": chat.display_title(),
                        "selected": state.selected_chat_id.as_deref() == Some(chat.id.as_str()),
                    })
                })
                .collect();
            print_json(&rows)
        }
        ChatsSubcommand::New { mode } => {
            let mode = App::mode(mode);
            let sync = ChatSync::with_mode(app.backend.clone(), &mode);
            let chat = sync.create_chat(&mode).await?;
            print_json(&chat)
        }
        ChatsSubcommand::Show { chat_id } => {
            let sync = ChatSync::new(app.backend.clone());
            sync.select_chat(&chat_id).await?;
            print_json(&sync.snapshot().messages)
        }
        ChatsSubcommand::Delete { chat_id } => {
            ChatSync::new(app.backend.clone()).delete_chat(&chat_id).await?;
            println!("deleted chat {chat_id}");
            Ok(())
        }
    }
}

async fn run_send(app: &App, mode: String, chat: Option<String>, message: &str) -> Result<(), CliError> {
    let sync = app.chat_sync(&mode).await?;
    if let Some(chat_id) = chat {
        sync.select_chat(&chat_id).await?;
    }
    let reply = sync.send_message(message).await?;
    println!("{}", reply.content);
    Ok(())
}

async fn run_memory(app: &App, command: MemorySubcommand) -> Result<(), CliError> {
    let sync = MemorySync::new(app.backend.clone());
    match command {
        MemorySubcommand::List { mode, episodic, search } => {
            sync.load(&App::mode(mode)).await?;
            let tab = if episodic { MemoryTab::Episodic } else { MemoryTab::Semantic };
            let rows: Vec<Value> =
                sync.filtered(tab, &search).into_iter().map(|(id, text)| json!({ "id": id, "text": text })).collect();
            print_json(&rows)
        }
        MemorySubcommand::DeleteFact { fact_id } => {
            sync.delete_fact(&fact_id).await?;
            println!("deleted fact {fact_id}");
            Ok(())
        }
        MemorySubcommand::DeleteEpisode { episode_id, mode } => {
            let mode = App::mode(mode);
            app.backend.delete_episode(&episode_id, &mode).await?;
            println!("deleted episode {episode_id} from {mode}");
            Ok(())
        }
    }
}

async fn run_graph(app: &App, command: GraphSubcommand) -> Result<(), CliError> {
    let sync = GraphSync::new(app.backend.clone());
    match command {
        GraphSubcommand::Show => sync.refresh().await?,
        GraphSubcommand::Generate { text } => sync.generate(&text.join(" ")).await?,
        GraphSubcommand::Node { id } => {
            sync.refresh().await?;
            let state = sync.snapshot();
            let Some(node) = state.node(&id) else {
                println!("no node {id}");
                return Ok(());
            };
            let edges: Vec<_> = state.edges_of(&id).collect();
            return print_json(&json!({ "node": node, "edges": edges }));
        }
    }
    let graph = sync.snapshot().graph;
    print_json(&json!({ "nodes": graph.nodes, "edges": graph.edges }))
}

async fn run_files(app: &App, command: FilesSubcommand) -> Result<(), CliError> {
    let sync = FilesSync::new(app.backend.clone());
    match command {
        FilesSubcommand::Monitored => {
            let dirs = sync.refresh().await?;
            print_json(&dirs)
        }
        FilesSubcommand::Add { path } => {
            sync.add(&path).await?;
            print_json(&sync.snapshot().directories)
        }
        FilesSubcommand::Remove { path } => {
            sync.remove(&path).await?;
            print_json(&sync.snapshot().directories)
        }
        FilesSubcommand::Scan { path } => {
            sync.scan(&path).await?;
            println!("scan started for {path}");
            Ok(())
        }
        FilesSubcommand::Browse => {
            match sync.browse().await? {
                Some(path) => println!("{path}"),
                None => println!("no directory selected"),
            }
            Ok(())
        }
        FilesSubcommand::List { path } => {
            sync.view(&path).await?;
            print_json(&sync.snapshot().entries)
        }
        FilesSubcommand::Up { path } => {
            let Some(parent) = parent_of(&path) else {
                println!("{path} has no parent");
                return Ok(());
            };
            sync.view(&parent).await?;
            let state = sync.snapshot();
            print_json(&json!({ "path": state.current_path, "items": state.entries }))
        }
    }
}

async fn password_or_prompt(password: Option<String>) -> Result<String, CliError> {
    if let Some(password) = password {
        return Ok(password);
    }
    let mut stderr = tokio::io::stderr();
    stderr.write_all(b"password: ").await?;
    stderr.flush().await?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let password = line.trim_end_matches(['\r', '\n']).to_owned();
    if password.is_empty() {
        return Err(CliError::MissingInput("password"));
    }
    Ok(password)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
