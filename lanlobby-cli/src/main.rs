use clap::{Parser, Subcommand, ValueEnum};
use lanlobby_cli::{CliError, LogConfig, Result, TcpTransport};
use lanlobby_core::{
    HostSettings, JoinRequest, NatAssist, SessionEvent, DEFAULT_MAX_MEMBERS, DEFAULT_PORT,
};
use lanlobby_session::{
    event_channel, SessionConfig, SessionController, SessionHandle, SessionMessage, SessionRuntime,
};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "lanlobby")]
#[command(version, about = "Host or join a small multiplayer session over TCP")]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host a new session
    Host {
        /// Your display name
        #[arg(short = 'n', long, default_value = "Host")]
        name: String,

        /// Name shown at the top of the roster listing
        #[arg(short = 's', long, default_value = "LAN Lobby")]
        server_name: String,

        /// Port to listen on
        #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Maximum members, host included
        #[arg(short = 'm', long, default_value_t = DEFAULT_MAX_MEMBERS)]
        max_members: usize,

        #[arg(long, value_enum, default_value_t = NatAssistArg::Auto)]
        nat_assist: NatAssistArg,

        /// Address to list for the host (defaults to loopback)
        #[arg(long)]
        advertise: Option<IpAddr>,
    },

    /// Join a running session
    Join {
        /// Your display name
        #[arg(short = 'n', long)]
        name: String,

        /// Host IPv4 address
        #[arg(short = 'i', long)]
        ip: String,

        /// Host port
        #[arg(short = 'p', long, default_value = "25000")]
        port: String,
    },

    /// Print the JSON schema of session messages
    Schema,
}

#[derive(Clone, Copy, ValueEnum)]
enum NatAssistArg {
    Auto,
    On,
    Off,
}

impl From<NatAssistArg> for NatAssist {
    fn from(arg: NatAssistArg) -> Self {
        match arg {
            NatAssistArg::Auto => NatAssist::Auto,
            NatAssistArg::On => NatAssist::Enabled,
            NatAssistArg::Off => NatAssist::Disabled,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::dev()
    } else {
        LogConfig::default()
    };
    let log_config = if cli.json_logs {
        log_config.with_json()
    } else {
        log_config
    };
    log_config.init()?;

    match cli.command {
        Commands::Host {
            name,
            server_name,
            port,
            max_members,
            nat_assist,
            advertise,
        } => {
            if advertise.is_some_and(|address| address.is_unspecified()) {
                return Err(CliError::InvalidConfig(
                    "--advertise needs an address other players can reach".to_string(),
                ));
            }
            let settings = HostSettings::new(name, server_name)
                .with_port(port)
                .with_max_members(max_members)
                .with_nat_assist(nat_assist.into());
            run_session(advertise, |handle| async move {
                handle.create_session(settings).await
            })
            .await
        }
        Commands::Join { name, ip, port } => {
            let request = JoinRequest::new(name, ip, port);
            run_session(None, |handle| async move { handle.join_session(request).await }).await
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(SessionMessage);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

/// Start the runtime, run `start` against it, then serve the terminal until
/// the session ends or the user quits
async fn run_session<F, Fut>(advertise: Option<IpAddr>, start: F) -> Result<()>
where
    F: FnOnce(SessionHandle) -> Fut,
    Fut: std::future::Future<Output = lanlobby_session::Result<()>>,
{
    let (sink, transport_events) = event_channel();
    let mut transport = TcpTransport::new(sink);
    if let Some(address) = advertise {
        transport = transport.with_advertised_address(address);
    }

    let config = SessionConfig::default();
    let probe = Arc::new(transport.clone());
    let controller = SessionController::new(transport, probe, config.clone());
    let runtime = SessionRuntime::spawn(controller, transport_events, config);
    let handle = runtime.handle();

    // Subscribe first so the start-up notices are not missed
    let events = handle.subscribe_events();

    let outcome = match start(handle.clone()).await {
        Ok(()) => interact(&handle, events).await,
        Err(e) => {
            print_pending(events);
            Err(CliError::Session(e))
        }
    };

    runtime.shutdown().await;
    outcome
}

async fn interact(
    handle: &SessionHandle,
    mut events: tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("Type to chat, /who for the roster, /quit to leave");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }

            line = stdin.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.trim() {
                    "" => {}
                    "/quit" => break,
                    "/who" => match handle.snapshot().mirror {
                        Some(listing) => print!("{}", listing.text()),
                        None => println!("No roster yet"),
                    },
                    text => {
                        if let Err(e) = handle.send_chat(text).await {
                            warn!(error = %e, "Chat not sent");
                        }
                    }
                }
            }

            event = events.recv() => match event {
                Ok(event) => {
                    if !render(&event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped session events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}

/// Print an event; `false` once the session is over
fn render(event: &SessionEvent) -> bool {
    match event {
        SessionEvent::ChatReceived(chat) => {
            println!("{}: {}", chat.sender_display_name, chat.text);
        }
        other => {
            if let Some(notice) = other.notice() {
                println!("{}", notice);
            }
        }
    }

    !matches!(
        event,
        SessionEvent::Disconnected { .. } | SessionEvent::ConnectionError { .. }
    )
}

fn print_pending(mut events: tokio::sync::broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        render(&event);
    }
}
