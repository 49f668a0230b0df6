use std::error::Error;

use clap::{Args, Parser, Subcommand};
use ledger::{CardCodec, Ledger, Money, Registration, Role};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;
use uuid::Uuid;

mod prompt;
mod settings;

type CliResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "bankcards")]
#[command(about = "Administration of the bank card ledger")]
struct Cli {
    /// Settings file name, extension optional.
    #[arg(long, default_value = "settings")]
    config: String,

    /// Database connection string; overrides the settings.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Administrator to act as. The password is read from
    /// `BANKCARDS_OPERATOR_PASSWORD` or prompted for.
    #[arg(long, env = "BANKCARDS_OPERATOR")]
    operator: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Card(Card),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Create an account; the password is prompted for.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "USER", value_parser = parse_role)]
        role: Role,
    },
    List(PageArgs),
    Block {
        id: i64,
    },
    /// Remove a user and every card it owns.
    Delete {
        id: i64,
    },
}

#[derive(Args, Debug)]
struct Card {
    #[command(subcommand)]
    command: CardCommand,
}

#[derive(Subcommand, Debug)]
enum CardCommand {
    Issue {
        #[arg(long)]
        owner: i64,
    },
    List {
        #[arg(long)]
        owner: Option<i64>,
        /// Only with `--owner`: narrow to one card number.
        #[arg(long, requires = "owner")]
        number: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    Find {
        number: String,
    },
    Status {
        id: Uuid,
        /// ACTIVE, BLOCKED or EXPIRED.
        status: String,
    },
    Balance {
        id: Uuid,
    },
    Transfer {
        #[arg(long)]
        from: Uuid,
        #[arg(long)]
        to: Uuid,
        #[arg(long)]
        amount: Money,
    },
    Delete {
        id: Uuid,
    },
}

#[derive(Args, Debug)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: u64,
    #[arg(long, default_value_t = 20)]
    size: u64,
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.to_ascii_uppercase().parse().map_err(|_| format!("unknown role: {raw}"))
}

fn print_json(value: &impl Serialize) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect_db(url: &str) -> CliResult<sea_orm::DatabaseConnection> {
    let db = sea_orm::Database::connect(url).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Authenticates the operator, if any, and checks it is an administrator.
async fn check_operator(ledger: &Ledger, operator: Option<&str>) -> CliResult<()> {
    let Some(operator) = operator else {
        return Ok(());
    };
    let password = match std::env::var("BANKCARDS_OPERATOR_PASSWORD") {
        Ok(password) => password,
        Err(_) => prompt::password("Operator password: ")?,
    };
    let principal = ledger.authenticate(operator, &password).await?;
    principal.require_admin()?;
    tracing::info!(operator, "operator authenticated");
    Ok(())
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(&cli.config)?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(format!(
            "bankcards={level},ledger={level}",
            level = settings.app.level
        ))
        .init();

    let url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database.url());
    let db = connect_db(&url).await?;
    let codec = CardCodec::from_secret(&settings.encryption.secret_key, &settings.encryption.salt)?;
    let ledger = Ledger::builder().database(db).codec(codec).build().await?;

    check_operator(&ledger, cli.operator.as_deref()).await?;

    match cli.command {
        Command::User(User { command }) => match command {
            UserCommand::Register { username, role } => {
                let password = prompt::new_password()?;
                let user = ledger
                    .register(Registration {
                        username,
                        password,
                        role,
                    })
                    .await?;
                print_json(&user)?;
            }
            UserCommand::List(page) => print_json(&ledger.users(page.page, page.size).await?)?,
            UserCommand::Block { id } => {
                ledger.block_user(id).await?;
                println!("blocked user {id}");
            }
            UserCommand::Delete { id } => {
                ledger.delete_user(id).await?;
                println!("deleted user {id}");
            }
        },
        Command::Card(Card { command }) => match command {
            CardCommand::Issue { owner } => print_json(&ledger.issue_card(owner).await?)?,
            CardCommand::List {
                owner,
                number,
                page,
            } => {
                let cards = match (owner, number) {
                    (Some(owner), Some(number)) => {
                        ledger
                            .cards_by_owner_and_number(owner, &number, page.page, page.size)
                            .await?
                    }
                    (Some(owner), None) => {
                        ledger.cards_by_owner(owner, page.page, page.size).await?
                    }
                    (None, _) => ledger.cards(page.page, page.size).await?,
                };
                print_json(&cards)?;
            }
            CardCommand::Find { number } => print_json(&ledger.card_by_number(&number).await?)?,
            CardCommand::Status { id, status } => {
                print_json(&ledger.set_card_status(id, &status).await?)?
            }
            CardCommand::Balance { id } => println!("{}", ledger.card_balance(id).await?),
            CardCommand::Transfer { from, to, amount } => {
                ledger.transfer(from, to, amount).await?;
                println!("transferred {amount} from {from} to {to}");
            }
            CardCommand::Delete { id } => {
                ledger.delete_card(id).await?;
                println!("deleted card {id}");
            }
        },
    }

    Ok(())
}
