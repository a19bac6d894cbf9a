// smsgate command-line tool -- exercises a GSM gateway from the shell.
//
// Usage:
//   smsgate ping
//   smsgate listen --duration 600
//   smsgate command gsm show spans
//   smsgate command --wait 10 gsm show version
//   smsgate sms +15551234567 hello from the gateway
//   smsgate --env-file ./gateway.env --host 10.0.0.2 sms --sim 3 100 balance
//
// Connection settings come from the env file (default /opt/sms/.env) and
// the process environment; --host/--port/--user/--secret override both.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use smsgate::{
    DEFAULT_ENV_FILE, EnvSource, GatewayBuilder, GatewayClient, GatewayConfig, GatewayEvent,
    SmsMessage, normalize_sim,
};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// smsgate -- talk to a GSM/SMS gateway from the command line.
#[derive(Parser)]
#[command(name = "smsgate", version, about)]
struct Cli {
    /// KEY=VALUE file with GATEWAY_* (or TG_*) settings. A missing file is
    /// not an error.
    #[arg(long, default_value = DEFAULT_ENV_FILE)]
    env_file: String,

    /// Gateway host, overriding GATEWAY_HOST.
    #[arg(long)]
    host: Option<String>,

    /// Manager-interface port, overriding GATEWAY_PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Login user, overriding GATEWAY_USER.
    #[arg(long)]
    user: Option<String>,

    /// Login secret, overriding GATEWAY_SECRET.
    #[arg(long)]
    secret: Option<String>,

    /// Seconds to wait for the first successful login.
    #[arg(long, default_value_t = 10)]
    ready_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print inbound SMS and session events as they arrive.
    Listen {
        /// Duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Send the keepalive command and print the reply.
    Ping,

    /// Send a raw gateway CLI command and print the reply.
    Command {
        /// Seconds to wait for the reply.
        #[arg(long, default_value_t = 4)]
        wait: u64,

        /// The command, e.g. `gsm show spans`.
        #[arg(required = true, trailing_var_arg = true)]
        raw: Vec<String>,
    },

    /// Send an SMS and print the replies to all three command variants.
    Sms {
        /// SIM/port to send through (e.g. 2 or "port2"); defaults to
        /// GATEWAY_DEFAULT_SIM.
        #[arg(long)]
        sim: Option<String>,

        /// Destination number.
        number: String,

        /// Message text.
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<GatewayConfig> {
    let mut env = EnvSource::load(&cli.env_file)
        .with_context(|| format!("failed to read env file {}", cli.env_file))?;

    if let Some(host) = &cli.host {
        env.set("GATEWAY_HOST", host);
    }
    if let Some(port) = cli.port {
        env.set("GATEWAY_PORT", port.to_string());
    }
    if let Some(user) = &cli.user {
        env.set("GATEWAY_USER", user);
    }
    if let Some(secret) = &cli.secret {
        env.set("GATEWAY_SECRET", secret);
    }

    GatewayConfig::from_env(&env).context("incomplete gateway configuration")
}

fn build_client(config: GatewayConfig) -> Result<GatewayClient> {
    GatewayBuilder::from_config(config)
        .on_sms(|sms: SmsMessage| async move {
            println!(
                "[sms] from {} via SIM {} at {}: {}",
                sms.sender, sms.sim_port, sms.timestamp, sms.text
            );
            Ok::<(), smsgate::Error>(())
        })
        .build()
        .context("invalid gateway configuration")
}

/// Start the session loop, wait for the first login, then run `request`.
async fn after_login<F>(client: &GatewayClient, ready_timeout: u64, request: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let addr = client.config().addr();
    client.spawn();
    tracing::debug!(%addr, "waiting for gateway login");
    client
        .wait_ready(Duration::from_secs(ready_timeout))
        .await
        .with_context(|| format!("gateway at {addr} did not accept a login"))?;
    request.await
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Runs the session loop itself and never waits for a login: an unreachable
/// gateway only shows up as `Reconnecting` events.
async fn cmd_listen(client: &GatewayClient, duration_secs: u64) -> Result<()> {
    let mut event_rx = client.subscribe();
    client.spawn();

    println!(
        "Listening for inbound SMS from {} (Ctrl-C to stop)...",
        client.config().addr()
    );

    let deadline = (duration_secs > 0).then(|| Instant::now() + Duration::from_secs(duration_secs));

    loop {
        let timeout = match deadline {
            Some(dl) => {
                let remaining = dl.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    println!("Listen duration elapsed.");
                    break;
                }
                remaining
            }
            None => Duration::from_secs(3600),
        };

        match tokio::time::timeout(timeout, event_rx.recv()).await {
            // The handler already printed it.
            Ok(Ok(GatewayEvent::SmsReceived(_))) => {}
            Ok(Ok(event)) => println!("[event] {event:?}"),
            Ok(Err(RecvError::Lagged(n))) => {
                println!("[warning] missed {n} events (consumer too slow)");
            }
            Ok(Err(RecvError::Closed)) => {
                println!("Event channel closed.");
                break;
            }
            Err(_) => {
                if deadline.is_some() {
                    println!("Listen duration elapsed.");
                    break;
                }
            }
        }
    }

    Ok(())
}

async fn cmd_ping(client: &GatewayClient) -> Result<()> {
    let reply = client.ping().await.context("keepalive command failed")?;
    println!("{reply}");
    Ok(())
}

async fn cmd_command(client: &GatewayClient, raw: &[String], wait_secs: u64) -> Result<()> {
    let command = raw.join(" ");
    if command.trim().is_empty() {
        bail!("empty command");
    }
    let reply = client
        .send_command(&command, Duration::from_secs(wait_secs))
        .await
        .with_context(|| format!("command {command:?} failed"))?;
    println!("{reply}");
    Ok(())
}

async fn cmd_sms(
    client: &GatewayClient,
    number: &str,
    text: &[String],
    sim: Option<&str>,
) -> Result<()> {
    let default_sim = client.config().default_sim;
    let sim = sim.map_or(default_sim, |raw| normalize_sim(raw, default_sim));
    let text = text.join(" ");

    let replies = client
        .send_sms(number, &text, sim)
        .await
        .with_context(|| format!("failed to send SMS to {number}"))?;

    for (i, reply) in replies.iter().enumerate() {
        println!("[variant {}] {reply}", i + 1);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let client = build_client(config)?;
    let ready = cli.ready_timeout;

    let result = match &cli.command {
        Command::Listen { duration } => cmd_listen(&client, *duration).await,
        Command::Ping => after_login(&client, ready, cmd_ping(&client)).await,
        Command::Command { wait, raw } => {
            after_login(&client, ready, cmd_command(&client, raw, *wait)).await
        }
        Command::Sms { sim, number, text } => {
            after_login(&client, ready, cmd_sms(&client, number, text, sim.as_deref())).await
        }
    };

    client.shutdown();
    result
}
