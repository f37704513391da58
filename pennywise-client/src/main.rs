//! # Pennywise CLI
//!
//! Drives the client core against a live backend. Every command restores
//! the session from the credential file first.
//!
//! ## Usage
//!
//! ```bash
//! PENNYWISE_API_URL=http://localhost:8001/api cargo run -p pennywise-client -- status
//! pennywise login ada@example.com secret1
//! pennywise set-pin 1234
//! pennywise checkout http://localhost:3000
//! pennywise confirm "http://localhost:3000/payment/success?session_id=cs_test_123"
//! ```

use anyhow::{bail, Context};
use pennywise_client::{ClientConfig, Pennywise};
use pennywise_payments::reconciler::{ReconcileOutcome, ReconcileView};
use pennywise_shared::auth::gate::GateDecision;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "\
Usage: pennywise <command> [args]

Commands:
  status                              Show the session and gate decision
  login <email> <password>            Sign in
  register <name> <email> <password>  Create an account and sign in
  logout                              Sign out
  set-pin <pin>                       Set the app PIN (4-6 digits)
  unlock <pin>                        Verify the PIN
  forgot-password <email>             Request a password reset email
  checkout <origin-url>               Start a Pro checkout
  confirm <return-url>                Confirm a payment from its return URL";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pennywise_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = ClientConfig::from_env().context("Failed to load configuration")?;
    let client = Pennywise::new(config)?;

    tracing::debug!(
        "Pennywise v{} ({})",
        env!("CARGO_PKG_VERSION"),
        client.config().api.base_url
    );

    client.session().bootstrap().await;

    match (command.as_str(), rest) {
        ("status", []) => print_status(&client),
        ("login", [email, password]) => {
            let user = client.session().login(email, password).await?;
            println!("Signed in as {} <{}>", user.name, user.email);
            print_status(&client);
        }
        ("register", [name, email, password]) => {
            let user = client.session().register(name, email, password).await?;
            println!("Registered {} <{}>", user.name, user.email);
        }
        ("logout", []) => {
            client.session().logout();
            println!("Signed out");
        }
        ("set-pin", [pin]) => {
            client.session().update_pin(pin).await?;
            println!("PIN updated");
        }
        ("unlock", [pin]) => {
            client.session().verify_pin(pin).await?;
            print_status(&client);
        }
        ("forgot-password", [email]) => {
            client.session().forgot_password(email).await?;
            println!("If an account exists for {}, a reset email is on its way", email);
        }
        ("checkout", [origin]) => {
            let checkout = client.checkout(origin).await?;
            println!("Open this URL to pay: {}", checkout.url);
            if let Some(session_id) = checkout.session_id {
                println!("Checkout session: {}", session_id);
            }
        }
        ("confirm", [return_url]) => confirm(&client, return_url).await?,
        _ => bail!("Unknown command or wrong arguments\n\n{}", USAGE),
    }

    Ok(())
}

fn print_status(client: &Pennywise) {
    let state = client.session().snapshot();
    let entitlement = client.session().entitlement();

    match state.user() {
        Some(user) => println!(
            "User: {} <{}>  tier: {}  locked: {}",
            user.name,
            user.email,
            if entitlement.is_pro { "pro" } else { "free" },
            state.is_locked()
        ),
        None => println!("Not signed in"),
    }

    match client.session().gate() {
        GateDecision::ShowLockScreen => println!("Gate: locked, run `pennywise unlock <pin>`"),
        decision => match decision.redirect() {
            Some(route) => println!("Gate: redirect to {}", route.path()),
            None => println!("Gate: {:?}", decision),
        },
    }
}

async fn confirm(client: &Pennywise, return_url: &str) -> anyhow::Result<()> {
    let Some(reconciler) = client.payment_return(return_url) else {
        println!("No checkout session in the return URL; go to /settings");
        return Ok(());
    };

    let Some(task) = reconciler.start() else {
        bail!("Payment confirmation could not start");
    };

    let mut progress = reconciler.subscribe();
    let printer = tokio::spawn(async move {
        let mut shown = None;
        loop {
            let view = ReconcileView::from(&*progress.borrow_and_update());
            if let Some(line) = progress_line(&view) {
                if shown.as_ref() != Some(&line) {
                    println!("{}", line);
                    shown = Some(line);
                }
            }
            if progress.changed().await.is_err() {
                break;
            }
        }
    });

    let outcome = task.finished().await;
    printer.abort();

    match (outcome, reconciler.view()) {
        (ReconcileOutcome::Cancelled, _) => bail!("Payment confirmation cancelled"),
        (_, ReconcileView::Success { continue_to, amount, currency }) => {
            match (amount, currency) {
                (Some(amount), Some(currency)) => println!(
                    "Payment confirmed: {:.2} {}",
                    amount,
                    currency.to_uppercase()
                ),
                _ => println!("Payment confirmed"),
            }
            println!("Pro unlocked. Continue at {}", continue_to.path());
            Ok(())
        }
        (_, ReconcileView::Failed { retry_to }) => {
            bail!("Payment failed. Try again from {}", retry_to.path())
        }
        (_, ReconcileView::TimedOut { retry_to }) => bail!(
            "Payment not confirmed in time. Check again later or retry from {}",
            retry_to.path()
        ),
        (_, ReconcileView::Checking { .. }) => bail!("Payment confirmation stopped early"),
    }
}

/// Progress line for a reconciler that is still checking
fn progress_line(view: &ReconcileView) -> Option<String> {
    match view {
        ReconcileView::Checking {
            attempt,
            max_attempts,
        } => Some(format!("Checking payment... ({}/{})", attempt, max_attempts)),
        _ => None,
    }
}
