//! pingworld -- command-line client for the Ping World API.
//!
//! Loads configuration, restores the stored session, and runs one command.

use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use pingworld_client::{Config, PingClient};

// ---------------------------------------------------------------------------
// CLI argument parsing (minimal, no clap dependency)
// ---------------------------------------------------------------------------

enum Command {
    Login { nickname: String },
    Signup { nickname: String, contacts: String, country: Option<String> },
    Logout,
    Me,
    Ping,
    Pings { page: Option<u32>, limit: Option<u32> },
    Streak,
    Leaderboard { limit: Option<u32> },
    DeleteAccount,
    Health,
}

struct CliArgs {
    config_path: Option<PathBuf>,
    password: Option<String>,
    command: Command,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut args = std::env::args().skip(1);
    let mut config_path = None;
    let mut password = None;
    let mut country = None;
    let mut page = None;
    let mut limit = None;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(value(&mut args, "--config")?));
            }
            "--password" | "-p" => password = Some(value(&mut args, "--password")?),
            "--country" => country = Some(value(&mut args, "--country")?),
            "--page" => page = Some(number(&mut args, "--page")?),
            "--limit" | "-n" => limit = Some(number(&mut args, "--limit")?),
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("pingworld {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            other if other.starts_with('-') => {
                bail!("Unknown argument: {other}\nRun with --help for usage information.");
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let Some(name) = positional.next() else {
        print_usage();
        std::process::exit(1);
    };
    let mut operand = |what: &str| {
        positional
            .next()
            .with_context(|| format!("`{name}` requires <{what}>"))
    };

    let command = match name.as_str() {
        "login" => Command::Login {
            nickname: operand("nickname")?,
        },
        "signup" => Command::Signup {
            nickname: operand("nickname")?,
            contacts: operand("contacts")?,
            country,
        },
        "logout" => Command::Logout,
        "me" => Command::Me,
        "ping" => Command::Ping,
        "pings" => Command::Pings { page, limit },
        "streak" => Command::Streak,
        "leaderboard" => Command::Leaderboard { limit },
        "delete-account" => Command::DeleteAccount,
        "health" => Command::Health,
        other => bail!("Unknown command: {other}\nRun with --help for usage information."),
    };

    Ok(CliArgs {
        config_path,
        password,
        command,
    })
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    args.next()
        .with_context(|| format!("{flag} requires a value"))
}

fn number(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<u32> {
    let raw = value(args, flag)?;
    raw.parse()
        .with_context(|| format!("{flag} expects a positive number, got '{raw}'"))
}

fn print_usage() {
    println!(
        "\
pingworld {version} -- Ping World command-line client

USAGE:
    pingworld [OPTIONS] <COMMAND>

COMMANDS:
    login <nickname>                 Sign in
    signup <nickname> <contacts>     Create an account and sign in
    logout                           Sign out and clear the stored session
    me                               Show the signed-in profile
    ping                             Send a ping
    pings                            List received pings
    streak                           Show your streak
    leaderboard                      Show the leaderboard
    delete-account                   Delete your account
    health                           Check the API is up

OPTIONS:
    -c, --config <PATH>      Path to configuration file
    -p, --password <PASS>    Password for login/signup
        --country <CODE>     Country for signup
        --page <N>           Page of received pings [default: 1]
    -n, --limit <N>          Page size / leaderboard length
    -h, --help               Print this help message
    -V, --version            Print version information

ENVIRONMENT:
    RUST_LOG                 Override log level (e.g. RUST_LOG=debug)
    PINGWORLD_CONFIG         Alternative to --config flag
    PINGWORLD_PASSWORD       Alternative to --password flag
    PINGWORLD_*              Configuration overrides
",
        version = env!("CARGO_PKG_VERSION")
    );
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?
        .block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let cli = parse_args()?;

    // PINGWORLD_CONFIG is an alternative to --config
    let config_path = cli
        .config_path
        .or_else(|| std::env::var("PINGWORLD_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(default_config_path);

    let config = Config::load(&config_path)?;
    init_tracing(&config);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        backend = %config.storage.backend,
        "Starting pingworld"
    );

    let client = PingClient::builder().config(config).build().await?;
    let password = cli
        .password
        .or_else(|| std::env::var("PINGWORLD_PASSWORD").ok());

    run(&client, cli.command, password).await
}

async fn run(client: &PingClient, command: Command, password: Option<String>) -> anyhow::Result<()> {
    match command {
        Command::Login { nickname } => {
            let password = password.context("login requires --password or PINGWORLD_PASSWORD")?;
            let session = client.auth().login(&nickname, &password).await?;
            println!("Logged in as {}", session.user.nickname);
        }
        Command::Signup {
            nickname,
            contacts,
            country,
        } => {
            let password = password.context("signup requires --password or PINGWORLD_PASSWORD")?;
            let session = client
                .auth()
                .signup(&nickname, &password, &contacts, country.as_deref())
                .await?;
            println!("Signed up as {}", session.user.nickname);
        }
        Command::Logout => {
            client.auth().logout().await?;
            println!("Logged out");
        }
        Command::Me => {
            require_session(client).await?;
            let user = client.users().me().await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::Ping => {
            require_session(client).await?;
            client.ping().send().await?;
            println!("Ping sent");
        }
        Command::Pings { page, limit } => {
            require_session(client).await?;
            let pings = client.ping().received(page, limit).await?;
            if pings.is_empty() {
                println!("No pings yet");
            }
            for ping in pings {
                println!(
                    "{}  {}  {}",
                    ping.created_at.as_deref().unwrap_or("-"),
                    ping.sender_nickname.as_deref().unwrap_or("someone"),
                    ping.sender_contacts.as_deref().unwrap_or(""),
                );
            }
        }
        Command::Streak => {
            require_session(client).await?;
            let streak = client.streak().me().await?;
            println!("Current streak: {}  (longest: {})", streak.current, streak.longest);
        }
        Command::Leaderboard { limit } => {
            require_session(client).await?;
            let entries = client.leaderboard().top(limit).await?;
            for (idx, entry) in entries.iter().enumerate() {
                let rank = entry.rank.map_or(idx + 1, |r| r as usize);
                println!(
                    "{rank:>3}. {:<20} {:>5}  {}",
                    entry.nickname,
                    entry.score,
                    entry.country.as_deref().unwrap_or("")
                );
            }
        }
        Command::DeleteAccount => {
            require_session(client).await?;
            client.users().delete_me().await?;
            println!("Account deleted");
        }
        Command::Health => {
            let status = client.health().check().await?;
            if !status.is_ok() {
                bail!("API reports status '{}'", status.status);
            }
            println!("ok");
        }
    }
    Ok(())
}

async fn require_session(client: &PingClient) -> anyhow::Result<()> {
    if !client.session().is_authenticated().await {
        bail!(pingworld_client::Error::NotAuthenticated);
    }
    Ok(())
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("pingworld").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("pingworld.toml"))
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

fn init_tracing(config: &Config) {
    // RUST_LOG env var takes precedence over config file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        EnvFilter::new(format!("pingworld_client={level},pingworld={level},warn"))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
