//! `walletpilot` binary: REPL, one-shot chat, HTTP gateway, diagnostics.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use tracing_subscriber::EnvFilter;

use walletpilot::agent::Agent;
use walletpilot::channels::repl::ReplChannel;
use walletpilot::channels::web::server::{GatewayState, generate_auth_token, start_server};
use walletpilot::config::{Config, WalletBackendKind};
use walletpilot::llm::LlmClient;
use walletpilot::llm::openai::OpenAiCompatibleClient;
use walletpilot::tools::default_registry;
use walletpilot::wallet::WalletBackend;
use walletpilot::wallet::remote::RemoteWallet;
use walletpilot::wallet::simulated::SimulatedWallet;

#[derive(Parser, Debug)]
#[command(name = "walletpilot", version, about = "Conversational wallet copilot")]
struct Cli {
    /// Explicit settings file (default: ~/.walletpilot/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat session (default).
    Repl,
    /// Send one message, print the reply, and exit.
    Once {
        /// The message to send.
        message: String,
    },
    /// Run the HTTP gateway.
    Serve,
    /// Probe configuration, the model endpoint, and the wallet backend.
    Doctor {
        /// Exit non-zero when any check fails.
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("walletpilot=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Repl) {
        Command::Repl => run_repl(&config).await,
        Command::Once { message } => run_once(&config, &message).await,
        Command::Serve => run_serve(&config).await,
        Command::Doctor { strict } => run_doctor(&config, strict).await,
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_with_file(path).context("failed to load configuration"),
        None => Config::load().context("failed to load configuration"),
    }
}

fn build_llm(config: &Config) -> anyhow::Result<Arc<dyn LlmClient>> {
    let client = OpenAiCompatibleClient::new(
        "openai_compatible",
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
        config.llm.temperature,
    )
    .context("failed to build model client")?;
    Ok(Arc::new(client))
}

async fn build_wallet(config: &Config) -> anyhow::Result<Arc<dyn WalletBackend>> {
    match config.wallet.backend {
        WalletBackendKind::Simulated => Ok(Arc::new(SimulatedWallet::new(
            &config.wallet.seed,
            config.wallet.network.clone(),
        ))),
        WalletBackendKind::Remote => {
            let url = config
                .wallet
                .service_url
                .as_deref()
                .context("remote wallet backend requires WALLET_SERVICE_URL")?;
            let wallet = RemoteWallet::connect(url, config.wallet.service_token.clone())
                .await
                .context("failed to connect to the wallet service")?;
            Ok(Arc::new(wallet))
        }
    }
}

async fn build_agent(config: &Config) -> anyhow::Result<Agent> {
    let llm = build_llm(config)?;
    let wallet = build_wallet(config).await?;
    let registry = Arc::new(default_registry(Arc::clone(&wallet)));
    Agent::initialize(llm, wallet, registry, &config.agent)
        .await
        .context("failed to initialize agent session")
}

async fn run_repl(config: &Config) -> anyhow::Result<()> {
    let mut agent = build_agent(config).await?;
    ReplChannel::new()
        .run(&mut agent)
        .await
        .context("repl failed")
}

async fn run_once(config: &Config, message: &str) -> anyhow::Result<()> {
    let mut agent = build_agent(config).await?;
    let reply = agent.submit_user_message(message).await;
    println!("{}", reply.message);
    if reply.pending.is_some() {
        // One-shot mode cannot confirm; drop the frozen transaction.
        agent.cancel_pending_transaction();
        eprintln!("(a fund-moving operation needs confirmation; use the repl or the gateway)");
    }
    Ok(())
}

async fn run_serve(config: &Config) -> anyhow::Result<()> {
    let llm = build_llm(config)?;
    let wallet = build_wallet(config).await?;
    let registry = Arc::new(default_registry(Arc::clone(&wallet)));

    let token = match &config.gateway.auth_token {
        Some(token) => token.clone(),
        None => {
            let generated = generate_auth_token();
            println!("gateway auth token: {generated}");
            SecretString::from(generated)
        }
    };

    let state = Arc::new(GatewayState::new(
        llm,
        wallet,
        registry,
        config.agent.clone(),
        config.gateway.chat_rate_limit,
        config.gateway.chat_rate_window_secs,
    ));
    let addr = start_server(config.gateway.bind_addr(), Arc::clone(&state), token)
        .await
        .context("failed to start gateway")?;
    println!("walletpilot gateway on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    state.shutdown().await;
    Ok(())
}

enum CheckResult {
    Pass(String),
    Fail(String),
    Skip(String),
}

fn check(name: &str, result: CheckResult, passed: &mut u32, failed: &mut u32) {
    match result {
        CheckResult::Pass(detail) => {
            *passed += 1;
            println!("  [pass] {name}: {detail}");
        }
        CheckResult::Fail(detail) => {
            *failed += 1;
            println!("  [FAIL] {name}: {detail}");
        }
        CheckResult::Skip(reason) => {
            println!("  [skip] {name}: {reason}");
        }
    }
}

async fn run_doctor(config: &Config, strict: bool) -> anyhow::Result<()> {
    println!("WalletPilot Doctor");
    println!("==================\n");

    let mut passed = 0u32;
    let mut failed = 0u32;

    check(
        "Resolved configuration",
        CheckResult::Pass(format!(
            "model '{}' at {}, wallet backend {:?} on {}",
            config.llm.model, config.llm.base_url, config.wallet.backend, config.wallet.network
        )),
        &mut passed,
        &mut failed,
    );

    check(
        "Bootstrap env file",
        {
            let path = walletpilot::bootstrap::walletpilot_env_path();
            if path.exists() {
                CheckResult::Pass(path.display().to_string())
            } else {
                CheckResult::Skip(format!("{} not present (env vars only)", path.display()))
            }
        },
        &mut passed,
        &mut failed,
    );

    check(
        "LLM API key",
        if config.llm.api_key.is_some() {
            CheckResult::Pass("set".to_string())
        } else {
            CheckResult::Skip("not set (fine for local endpoints)".to_string())
        },
        &mut passed,
        &mut failed,
    );

    check(
        "LLM endpoint reachability",
        match OpenAiCompatibleClient::new(
            "openai_compatible",
            config.llm.base_url.clone(),
            config.llm.api_key.clone(),
            config.llm.model.clone(),
            config.llm.temperature,
        ) {
            Ok(client) => match client.probe().await {
                Ok(()) => CheckResult::Pass(config.llm.base_url.clone()),
                Err(e) => CheckResult::Fail(e.to_string()),
            },
            Err(e) => CheckResult::Fail(e.to_string()),
        },
        &mut passed,
        &mut failed,
    );

    check(
        "Wallet backend",
        match build_wallet(config).await {
            Ok(wallet) => match wallet.wallet_info().await {
                Ok(info) => CheckResult::Pass(format!(
                    "{} on {} ({})",
                    info.address,
                    info.network,
                    info.display_balance()
                )),
                Err(e) => CheckResult::Fail(e.to_string()),
            },
            Err(e) => CheckResult::Fail(e.to_string()),
        },
        &mut passed,
        &mut failed,
    );

    check(
        "Gateway auth token",
        if let Some(token) = &config.gateway.auth_token {
            if token.expose_secret().len() >= 16 {
                CheckResult::Pass("configured".to_string())
            } else {
                CheckResult::Fail("configured token is shorter than 16 characters".to_string())
            }
        } else {
            CheckResult::Skip("unset; a random token is generated at serve time".to_string())
        },
        &mut passed,
        &mut failed,
    );

    println!("\n{passed} passed, {failed} failed");
    if strict && failed > 0 {
        anyhow::bail!("{failed} doctor check(s) failed");
    }
    Ok(())
}
