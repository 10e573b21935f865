use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use sucata::access::paywall::PaywallError;
use sucata::access::{AccessGate, RoutePolicy};
use sucata::backend::http::HttpBackend;
use sucata::backend::{AuthProvider, BackendError, Plan, User};
use sucata::checkout::clipboard::{CopyMethod, PrintedCode, TerminalClipboard, copy_with_fallback};
use sucata::checkout::display::{Urgency, format_countdown, progress_fraction};
use sucata::checkout::{CheckoutError, CheckoutFlow, CheckoutForm, CheckoutOutcome, CheckoutUpdate, RejectReason};
use sucata::config::{AppConfig, CheckoutConfig, ConfigError, GateConfig};
use sucata::events::SyncBus;

/// Extra wait beyond the configured recheck delay before giving up.
const RECHECK_GRACE: Duration = Duration::from_secs(10);
/// Countdown lines are printed at this cadence until the warning threshold.
const TICK_PRINT_EVERY_SECS: u32 = 30;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
    #[error(transparent)]
    Paywall(#[from] PaywallError),
    #[error("not signed in; set SUCATA_ACCESS_TOKEN")]
    NotSignedIn,
    #[error("timed out waiting for access recheck")]
    RecheckTimeout,
}

#[derive(Parser, Debug)]
#[command(name = "sucata", about = "Access gate and PIX checkout client for the scrap-yard POS backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show what the gate decides for each path.
    Access {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Pay for a plan with PIX.
    Checkout(CheckoutArgs),
    /// Activate the free trial from the paywall.
    Trial,
}

#[derive(Args, Debug)]
struct CheckoutArgs {
    #[arg(long)]
    plan_id: String,
    #[arg(long)]
    plan_name: String,
    #[arg(long)]
    amount_cents: u64,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    cpf: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = AppConfig::from_env()?;
    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    let bus = SyncBus::new();
    let user = backend.current_user().await?;

    match cli.command {
        Command::Access { paths } => run_access(backend, bus, user, &paths).await,
        Command::Checkout(args) => run_checkout(backend, bus, config.checkout, user, args).await,
        Command::Trial => run_trial(backend, bus, config.gate, user).await,
    }
}

async fn run_access(
    backend: Arc<HttpBackend>,
    bus: SyncBus,
    user: Option<User>,
    paths: &[String],
) -> Result<(), CliError> {
    let mut gate = AccessGate::new(backend, RoutePolicy::default(), bus);
    gate.set_user(user);

    for path in paths {
        let decision = gate.evaluate(path).await;
        match decision.redirect_target() {
            Some(target) => println!("{path}\t{decision:?}\t-> {target}"),
            None => println!("{path}\t{decision:?}"),
        }
    }
    if gate.user().is_some() {
        println!("flags: {:?}", gate.flags());
    }
    Ok(())
}

async fn run_checkout(
    backend: Arc<HttpBackend>,
    bus: SyncBus,
    config: CheckoutConfig,
    user: Option<User>,
    args: CheckoutArgs,
) -> Result<(), CliError> {
    let user = user.ok_or(CliError::NotSignedIn)?;
    let form = CheckoutForm { first_name: args.first_name, last_name: args.last_name, email: args.email, cpf: args.cpf };
    let plan = Plan { id: args.plan_id, name: args.plan_name, amount_cents: args.amount_cents };

    let mut flow = CheckoutFlow::new(backend.clone(), backend, bus, config, user.id);
    let payment = flow.submit(&form, plan).await?;
    println!("PIX payment {} created; pay within {}", payment.id, format_countdown(config.window_secs));
    match copy_with_fallback(&TerminalClipboard, &PrintedCode, &payment.qr_code) {
        Ok(CopyMethod::Primary) => println!("payment code copied to clipboard"),
        Ok(CopyMethod::Fallback) => println!("copy the payment code above"),
        Err(e) => eprintln!("could not copy payment code: {e}"),
    }

    let window = config.window_secs;
    let outcome = tokio::select! {
        outcome = flow.run_to_completion(|update| print_update(update, window)) => outcome,
        _ = tokio::signal::ctrl_c() => CheckoutOutcome::Closed,
    };

    match outcome {
        CheckoutOutcome::Approved(summary) => match summary {
            Some(s) => match s.expires_at {
                Some(expires_at) => println!("approved: {} active until {expires_at}", s.plan_name),
                None => println!("approved: {}", s.plan_name),
            },
            None => println!("approved"),
        },
        CheckoutOutcome::Rejected(RejectReason::Expired) => println!("payment window expired; start a new checkout"),
        CheckoutOutcome::Rejected(RejectReason::Declined(status)) => println!("payment {}", status.as_str()),
        CheckoutOutcome::Closed => {
            flow.close();
            println!("checkout closed");
        }
    }
    Ok(())
}

fn print_update(update: &CheckoutUpdate, window: u32) {
    match update {
        CheckoutUpdate::Tick { time_left } => {
            let urgency = Urgency::for_time_left(*time_left);
            if urgency != Urgency::Normal || time_left % TICK_PRINT_EVERY_SECS == 0 {
                let pct = progress_fraction(*time_left, window) * 100.0;
                println!("{} left ({pct:.0}%) {urgency:?}", format_countdown(*time_left));
            }
        }
        CheckoutUpdate::Verifying => println!("verifying payment..."),
        CheckoutUpdate::PollFailed(reason) => eprintln!("status check failed: {reason}"),
        CheckoutUpdate::Approved(_) | CheckoutUpdate::Rejected(_) => {}
    }
}

async fn run_trial(backend: Arc<HttpBackend>, bus: SyncBus, config: GateConfig, user: Option<User>) -> Result<(), CliError> {
    if user.is_none() {
        return Err(CliError::NotSignedIn);
    }
    let mut gate = AccessGate::new(backend.clone(), RoutePolicy::default(), bus);
    gate.set_user(user);
    println!("home before: {:?}", gate.evaluate("/").await);

    let grant = gate.activate_trial(backend.as_ref(), config.trial_recheck()).await?;
    match grant.expires_at {
        Some(expires_at) => println!("trial active until {expires_at}"),
        None => println!("trial active"),
    }

    let rechecked = tokio::time::timeout(config.trial_recheck() + RECHECK_GRACE, gate.on_event("/"))
        .await
        .map_err(|_| CliError::RecheckTimeout)?;
    if let Some((kind, decision)) = rechecked {
        println!("home after {}: {decision:?}", kind.as_str());
    }
    println!("flags: {:?}", gate.flags());
    Ok(())
}
