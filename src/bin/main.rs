//! wallet-session CLI - drive a wallet session against simulated wallets
//!
//! Every invocation opens the session for `--app` (file-backed), silently
//! restores the remembered wallet, runs one command and exits:
//!   wallet-session wallets               → registered wallets and capabilities
//!   wallet-session select Phantom        → remember a wallet
//!   wallet-session connect               → connect the selected wallet
//!   wallet-session status                → session state, balance, explorer link
//!   wallet-session balance               → fetch the balance now
//!   wallet-session sign-message <text>   → sign UTF-8 text
//!   wallet-session send [memo]           → quote, sign, submit, confirm
//!   wallet-session disconnect            → disconnect and forget the wallet
//!   wallet-session restore               → silent restore only
//!   wallet-session watch                 → follow state and balance until Ctrl+C
//!
//! Configuration:
//!   --app <name>        store namespace (default: wallet-session)
//!   --cluster <name>    devnet | testnet | mainnet-beta
//!   WALLET_SESSION_*    see `ContextConfig::from_env`
//!
//! Output format:
//!   --json     Output raw JSON (default for non-tty)
//!   --pretty   Pretty-print JSON (default for tty)

use anyhow::{anyhow, bail, Context as _, Result};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::debug;

use wallet_session::logging::init_logging;
use wallet_session::simulated::{demo_cluster, demo_registry};
use wallet_session::{
    install_signal_handlers, Cluster, ContextConfig, RestoreOutcome, TransactionPayload,
    WalletContext,
};

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("wallet-session {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let Some(command) = opts.command.clone() else {
        print_usage();
        return;
    };

    let result = tokio::runtime::Runtime::new()
        .context("Failed to start runtime")
        .and_then(|rt| rt.block_on(run(&command, &opts)));

    let pretty = opts.pretty || (!opts.json && std::io::stdout().is_terminal());
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": format!("{:#}", e)}), pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.unwrap_or_else(|_| value.to_string())
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    args: Vec<String>,
    app: Option<String>,
    cluster: Option<String>,
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--json" => opts.json = true,
                "--pretty" => opts.pretty = true,
                "--app" | "-a" => {
                    if i + 1 < args.len() {
                        opts.app = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--cluster" | "-c" => {
                    if i + 1 < args.len() {
                        opts.cluster = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        // First positional is command, the rest are its arguments
        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }
        opts.args = positional;
        opts
    }

    fn text(&self) -> Option<String> {
        if self.args.is_empty() {
            None
        } else {
            Some(self.args.join(" "))
        }
    }
}

fn print_usage() {
    println!(
        r#"wallet-session - wallet session lifecycle demo

USAGE:
    wallet-session <COMMAND> [ARGS] [OPTIONS]

COMMANDS:
    wallets               List registered wallets
    select <name>         Choose a wallet (remembered across runs)
    connect               Connect the selected wallet
    status                Show session state and balance
    balance               Fetch the balance now
    sign-message <text>   Sign a UTF-8 message
    send [memo]           Send a transaction carrying <memo>
    disconnect            Disconnect and forget the wallet
    restore               Silently restore the remembered wallet
    watch                 Follow state and balance until Ctrl+C

OPTIONS:
    -a, --app <name>        Store namespace [default: wallet-session]
    -c, --cluster <name>    devnet | testnet | mainnet-beta
        --json              Raw JSON output
        --pretty            Pretty JSON output
    -h, --help              Show this help
    -V, --version           Show version
"#
    );
}

async fn open_context(opts: &ParsedArgs, auto_connect: bool) -> Result<WalletContext> {
    let app = opts.app.clone().unwrap_or_else(|| "wallet-session".into());
    let mut config = ContextConfig::from_env(app).with_auto_connect(auto_connect);
    if let Some(raw) = opts.cluster.as_deref() {
        let cluster = Cluster::from_str(raw).ok_or_else(|| anyhow!("Invalid cluster: {}", raw))?;
        config = config.with_cluster(cluster);
    }
    debug!("opening context {:?}", config);
    WalletContext::open(config, demo_registry(), Arc::new(demo_cluster()))
        .await
        .context("Failed to open session store")
}

async fn run(command: &str, opts: &ParsedArgs) -> Result<Value> {
    match command {
        "wallets" | "ls" => cmd_wallets(opts).await,
        "select" => cmd_select(opts).await,
        "connect" => cmd_connect(opts).await,
        "status" => cmd_status(opts).await,
        "balance" => cmd_balance(opts).await,
        "sign-message" | "sign" => cmd_sign_message(opts).await,
        "send" => cmd_send(opts).await,
        "disconnect" => cmd_disconnect(opts).await,
        "restore" => cmd_restore(opts).await,
        "watch" => cmd_watch(opts).await,
        other => bail!("Unknown command: {}", other),
    }
}

async fn cmd_wallets(opts: &ParsedArgs) -> Result<Value> {
    let ctx = open_context(opts, false).await?;
    let wallets = ctx.wallets();
    Ok(json!({
        "wallets": wallets,
        "count": wallets.len(),
        "remembered": ctx.session().persisted().map(|p| p.provider_name),
    }))
}

async fn cmd_select(opts: &ParsedArgs) -> Result<Value> {
    let name = opts.text().ok_or_else(|| anyhow!("Wallet required: wallet-session select <name>"))?;
    let ctx = open_context(opts, false).await?;
    let descriptor = ctx.select(&name)?;
    Ok(json!({
        "status": "selected",
        "wallet": descriptor.info(),
        "state": ctx.state(),
    }))
}

async fn cmd_connect(opts: &ParsedArgs) -> Result<Value> {
    let ctx = open_context(opts, true).await?;
    if ctx.state().selected_provider_name.is_none() {
        bail!("No wallet selected. Run 'wallet-session select <name>' first.");
    }
    let account = match ctx.session().account() {
        Some(account) => account,
        None => ctx.connect().await?,
    };
    Ok(json!({
        "status": "connected",
        "account": account,
        "short": account.short(),
        "explorer": ctx.explorer_url(),
    }))
}

async fn cmd_status(opts: &ParsedArgs) -> Result<Value> {
    let ctx = open_context(opts, true).await?;
    let balance = ctx.refresh_balance().await;
    Ok(json!({
        "state": ctx.state(),
        "balance": balance.as_ref().map(|b| b.display()),
        "explorer": ctx.explorer_url(),
        "cluster": ctx.config().cluster.as_str(),
    }))
}

async fn cmd_balance(opts: &ParsedArgs) -> Result<Value> {
    let ctx = open_context(opts, true).await?;
    if !ctx.state().connected() {
        bail!("wallet not connected");
    }
    match ctx.refresh_balance().await {
        Some(snapshot) => Ok(json!({
            "account": snapshot.account_id,
            "lamports": snapshot.lamports,
            "sol": snapshot.display(),
            "fetchedAt": snapshot.fetched_at.to_rfc3339(),
        })),
        None => {
            let reason = ctx.balance_view().last_error.unwrap_or_else(|| "no balance".into());
            bail!("Balance unavailable: {}", reason)
        }
    }
}

async fn cmd_sign_message(opts: &ParsedArgs) -> Result<Value> {
    let text = opts.text().ok_or_else(|| anyhow!("Text required: wallet-session sign-message <text>"))?;
    let ctx = open_context(opts, true).await?;
    let signature = ctx.sign_text(&text).await?;
    Ok(json!({
        "message": text,
        "signature": hex::encode(signature),
        "signer": ctx.session().account(),
    }))
}

async fn cmd_send(opts: &ParsedArgs) -> Result<Value> {
    let memo = opts.text().unwrap_or_else(|| "wallet-session demo transfer".into());
    let ctx = open_context(opts, true).await?;
    let id = ctx.send_transaction(TransactionPayload::new(memo.into_bytes())).await?;
    Ok(json!({
        "status": "confirmed",
        "submission": id,
        "balance": ctx.balance().map(|b| b.display()),
    }))
}

async fn cmd_disconnect(opts: &ParsedArgs) -> Result<Value> {
    let ctx = open_context(opts, true).await?;
    ctx.disconnect().await?;
    Ok(json!({"status": "disconnected", "state": ctx.state()}))
}

async fn cmd_restore(opts: &ParsedArgs) -> Result<Value> {
    let ctx = open_context(opts, false).await?;
    let resolved = ctx.session().resolve_persisted().map(|d| d.name().to_string());
    let outcome = ctx.restore().await;
    let (status, detail) = match &outcome {
        RestoreOutcome::Restored(account) => ("restored", json!({"account": account})),
        RestoreOutcome::NothingSaved => ("nothing-saved", Value::Null),
        RestoreOutcome::Skipped { provider, reason } => {
            ("skipped", json!({"wallet": provider, "reason": reason}))
        }
    };
    Ok(json!({
        "status": status,
        "resolved": resolved,
        "detail": detail,
        "state": ctx.state(),
    }))
}

async fn cmd_watch(opts: &ParsedArgs) -> Result<Value> {
    let ctx = open_context(opts, true).await?;
    let shutdown = install_signal_handlers();
    let mut signal = shutdown.signal();
    let mut states = ctx.subscribe();
    let mut balances = ctx.poller().subscribe();
    let pretty = opts.pretty;

    let initial = states.borrow_and_update().clone();
    println!("{}", render(&json!({"state": initial}), pretty));
    loop {
        tokio::select! {
            _ = signal.wait() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                println!("{}", render(&json!({"state": state}), pretty));
            }
            changed = balances.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = balances.borrow_and_update().clone();
                println!("{}", render(&json!({"balance": view}), pretty));
            }
        }
    }

    let state = ctx.state();
    Ok(json!({"status": "stopped", "state": state}))
}
