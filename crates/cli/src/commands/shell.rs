//! Interactive cart shell.
//!
//! Reads one command per line from stdin. Cart commands act on the local
//! store immediately; sync with the server happens in the background and its
//! outcomes are printed as they arrive.
//!
//! ```text
//! > login shopper@example.com secret
//! > add 66a1
//! > set 66b7 3
//! > show
//! > total
//! > logout
//! ```

use std::io::Write as _;
use std::str::FromStr;

use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use freshcart_core::Price;
use freshcart_storefront::error::{AppError, Result, add_breadcrumb};
use freshcart_storefront::{Storefront, SyncEvent};

const HELP: &str = "\
commands:
  login [<email> <password>]  sign in (no arguments: configured credentials)
  logout                      sign out and clear the cart
  whoami                      show the signed-in user
  add <product>               add one unit
  set <product> <quantity>    set an exact quantity (0 or less removes)
  remove <product>            remove one unit
  show                        list cart lines with prices
  count                       number of items
  total                       cart total
  catalog [refresh]           list products (refresh: bypass the cache)
  reconcile                   reload the cart from the server
  help                        this text
  quit                        exit";

/// One parsed shell line.
#[derive(Debug, PartialEq, Eq)]
pub enum ShellCommand {
    Login(Option<(String, String)>),
    Logout,
    Whoami,
    Add(String),
    Set(String, i64),
    Remove(String),
    Show,
    Count,
    Total,
    Catalog { refresh: bool },
    Reconcile,
    Help,
    Quit,
}

impl FromStr for ShellCommand {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().ok_or_else(|| "empty command".to_string())?;
        let args: Vec<&str> = words.collect();

        let parsed = match (command.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("login", []) => Self::Login(None),
            ("login", [email, password]) => {
                Self::Login(Some(((*email).to_string(), (*password).to_string())))
            }
            ("logout", []) => Self::Logout,
            ("whoami", []) => Self::Whoami,
            ("add", [id]) => Self::Add((*id).to_string()),
            ("set", [id, quantity]) => {
                let quantity = quantity
                    .parse::<i64>()
                    .map_err(|_| format!("'{quantity}' is not a whole number"))?;
                Self::Set((*id).to_string(), quantity)
            }
            ("remove" | "rm", [id]) => Self::Remove((*id).to_string()),
            ("show" | "ls", []) => Self::Show,
            ("count", []) => Self::Count,
            ("total", []) => Self::Total,
            ("catalog", []) => Self::Catalog { refresh: false },
            ("catalog", ["refresh"]) => Self::Catalog { refresh: true },
            ("reconcile", []) => Self::Reconcile,
            ("help" | "?", []) => Self::Help,
            ("quit" | "exit", []) => Self::Quit,
            (
                "login" | "logout" | "whoami" | "add" | "set" | "remove" | "rm" | "show" | "ls"
                | "count" | "total" | "catalog" | "reconcile" | "help" | "?" | "quit" | "exit",
                _,
            ) => return Err(format!("wrong arguments for '{command}' (try 'help')")),
            _ => return Err(format!("unknown command '{command}' (try 'help')")),
        };
        Ok(parsed)
    }
}

enum Flow {
    Continue,
    Quit,
}

/// Run the shell until `quit` or end of input.
///
/// # Errors
///
/// Returns an error if stdin cannot be read.
pub async fn run(storefront: &Storefront) -> Result<()> {
    let printer = spawn_event_printer(storefront);

    sign_in_at_start(storefront).await;
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ShellCommand>() {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        match execute(storefront, command).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => {
                e.report();
                println!("error: {e}");
            }
        }
    }

    storefront.sync().shutdown().await;
    printer.abort();
    Ok(())
}

fn prompt() {
    print!("> ");
    std::io::stdout().flush().ok();
}

/// Print sync outcomes as they arrive, like toasts in a UI.
fn spawn_event_printer(storefront: &Storefront) -> tokio::task::JoinHandle<()> {
    let mut events = storefront.sync().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SyncEvent::Pushed { version }) => {
                    tracing::debug!(version, "Cart saved");
                }
                Ok(event) => println!("\n[sync] {event}"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed sync events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn sign_in_at_start(storefront: &Storefront) {
    if let Some(credentials) = &storefront.config().credentials {
        if let Err(e) = login(storefront, credentials.email.as_str(), &credentials.password).await
        {
            e.report();
            println!("automatic login failed: {e}");
        }
    } else if let Some(user) = storefront.auth().restore().await {
        println!("session restored for {} <{}>", user.name, user.email);
    }
}

async fn login(storefront: &Storefront, email: &str, password: &SecretString) -> Result<()> {
    let user = storefront.auth().login(email, password).await?;
    println!("signed in as {} <{}>", user.name, user.email);
    Ok(())
}

async fn execute(storefront: &Storefront, command: ShellCommand) -> Result<Flow> {
    let cart = storefront.cart();

    match command {
        ShellCommand::Login(Some((email, password))) => {
            login(storefront, &email, &SecretString::from(password)).await?;
        }
        ShellCommand::Login(None) => {
            let credentials = storefront.config().credentials.as_ref().ok_or_else(|| {
                AppError::BadRequest(
                    "no credentials configured; use 'login <email> <password>'".into(),
                )
            })?;
            login(storefront, credentials.email.as_str(), &credentials.password).await?;
        }
        ShellCommand::Logout => {
            storefront.auth().logout().await?;
            println!("signed out");
        }
        ShellCommand::Whoami => match storefront.auth().current_user() {
            Some(user) => println!("{} <{}> ({})", user.name, user.email, user.id),
            None => println!("not signed in"),
        },
        ShellCommand::Add(id) => {
            add_breadcrumb("cart", "Added item", Some(&[("product_id", id.as_str())]));
            cart.add(id);
        }
        ShellCommand::Set(id, quantity) => {
            add_breadcrumb("cart", "Set quantity", Some(&[("product_id", id.as_str())]));
            cart.set_quantity(id, quantity);
        }
        ShellCommand::Remove(id) => {
            add_breadcrumb("cart", "Removed item", Some(&[("product_id", id.as_str())]));
            cart.remove(id);
        }
        ShellCommand::Show => {
            let lines = storefront.catalog().lines(&cart.cart()).await?;
            if lines.is_empty() {
                println!("cart is empty");
            }
            for line in lines {
                let name = line.name.as_deref().unwrap_or("(not in catalog)");
                let unit = line
                    .unit_price
                    .map_or_else(|| "-".to_string(), |p| p.to_string());
                println!(
                    "{:<26} {:<24} {:>3} x {:>9} = {:>10}",
                    line.id.as_str(),
                    name,
                    line.quantity,
                    unit,
                    line.subtotal.to_string()
                );
            }
        }
        ShellCommand::Count => println!("{}", cart.count()),
        ShellCommand::Total => {
            let total = storefront.catalog().total(cart).await?;
            println!("{total}");
        }
        ShellCommand::Catalog { refresh } => {
            if refresh {
                storefront.api().invalidate_catalog().await;
            }
            let catalog = storefront.catalog().catalog().await?;
            let currency = storefront.config().currency;
            for product in catalog.sorted() {
                println!(
                    "{:<26} {:<24} {:>10}{}",
                    product.id.as_str(),
                    product.name,
                    Price::new(product.offer_price, currency).to_string(),
                    if product.in_stock { "" } else { "  (out of stock)" }
                );
            }
        }
        ShellCommand::Reconcile => storefront.sync().reconcile(),
        ShellCommand::Help => println!("{HELP}"),
        ShellCommand::Quit => return Ok(Flow::Quit),
    }

    Ok(Flow::Continue)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cart_commands() {
        assert_eq!(
            "add 66a1".parse::<ShellCommand>().unwrap(),
            ShellCommand::Add("66a1".into())
        );
        assert_eq!(
            "set 66a1 -2".parse::<ShellCommand>().unwrap(),
            ShellCommand::Set("66a1".into(), -2)
        );
        assert_eq!(
            "  RM   66a1 ".parse::<ShellCommand>().unwrap(),
            ShellCommand::Remove("66a1".into())
        );
    }

    #[test]
    fn test_parse_login_forms() {
        assert_eq!(
            "login".parse::<ShellCommand>().unwrap(),
            ShellCommand::Login(None)
        );
        assert_eq!(
            "login a@b.co pw".parse::<ShellCommand>().unwrap(),
            ShellCommand::Login(Some(("a@b.co".into(), "pw".into())))
        );
        assert!("login a@b.co".parse::<ShellCommand>().is_err());
    }

    #[test]
    fn test_parse_errors_are_descriptive() {
        let err = "set 66a1 lots".parse::<ShellCommand>().unwrap_err();
        assert!(err.contains("not a whole number"));

        let err = "frobnicate".parse::<ShellCommand>().unwrap_err();
        assert!(err.contains("unknown command"));

        assert_eq!(
            "catalog refresh".parse::<ShellCommand>().unwrap(),
            ShellCommand::Catalog { refresh: true }
        );

        let err = "add".parse::<ShellCommand>().unwrap_err();
        assert!(err.contains("wrong arguments"));
    }
}
