//! stakeview - aggregate staking positions across Cosmos networks
//!
//! Usage:
//!   stakeview balances <chain>:<address>[:<valoper>] ...
//!   stakeview user <user_id>
//!   stakeview params <chain> ...
//!   stakeview link <user_id> <chain>:<address>[:<valoper>]
//!
//! Environment variables:
//!   STAKEVIEW_DB_PATH - SQLite metadata database (default: stakeview.db)
//!   STAKEVIEW_SCHEMA_DIR - Schema directory (default: sql)
//!   QUERY_TIMEOUT_MS - Per-query timeout (default: 10000)
//!   PRICE_FEED_URL - CoinGecko API base (default: https://api.coingecko.com/api/v3)

use dotenv::dotenv;
use log::info;
use rusqlite::Connection;
use stakeview::config::AggregatorConfig;
use stakeview::pipeline::{run_schema_migrations, Aggregator, CoinGeckoFeed, SqliteMetadataStore};
use stakeview::query::{LcdClientFactory, LogTelemetry};
use stakeview::types::{AccountTarget, NetworkName};
use std::sync::Arc;

const USAGE: &str = "Usage:
  stakeview balances <chain>:<address>[:<valoper>] ...
  stakeview user <user_id>
  stakeview params <chain> ...
  stakeview link <user_id> <chain>:<address>[:<valoper>]";

enum Command {
    Balances(Vec<AccountTarget>),
    User(i64),
    Params(Vec<NetworkName>),
    Link(i64, AccountTarget),
}

fn parse_command(args: &[String]) -> Result<Command, String> {
    let (name, rest) = args.split_first().ok_or_else(|| USAGE.to_string())?;

    let parse_user = |raw: &str| raw.parse::<i64>().map_err(|_| format!("Invalid user id: {}", raw));

    match name.as_str() {
        "balances" if !rest.is_empty() => rest
            .iter()
            .map(|raw| raw.parse::<AccountTarget>().map_err(|e| e.to_string()))
            .collect::<Result<Vec<_>, _>>()
            .map(Command::Balances),
        "user" if rest.len() == 1 => parse_user(rest[0].as_str()).map(Command::User),
        "params" if !rest.is_empty() => rest
            .iter()
            .map(|raw| NetworkName::parse(raw).map_err(|e| e.to_string()))
            .collect::<Result<Vec<_>, _>>()
            .map(Command::Params),
        "link" if rest.len() == 2 => {
            let user_id = parse_user(rest[0].as_str())?;
            let account = rest[1].parse::<AccountTarget>().map_err(|e| e.to_string())?;
            Ok(Command::Link(user_id, account))
        }
        _ => Err(USAGE.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    // Logs go to stderr so stdout stays pure JSON
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_command(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        }
    };

    let config = AggregatorConfig::from_env();
    config.validate()?;

    info!("🚀 stakeview");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Query timeout: {}ms", config.query_timeout_ms);
    info!("   └─ Price feed: {}", config.price_feed_url);

    let mut conn = Connection::open(&config.db_path)?;
    run_schema_migrations(&mut conn, &config.schema_dir)?;
    let metadata = Arc::new(SqliteMetadataStore::from_connection(conn));

    let telemetry = Arc::new(LogTelemetry::new());
    let aggregator = Aggregator::new(
        metadata.clone(),
        metadata.clone(),
        Arc::new(CoinGeckoFeed::new(config.price_feed_url.clone())?),
        Arc::new(LcdClientFactory::new(config.query_timeout())),
        telemetry.clone(),
    );

    let response = match command {
        Command::Balances(accounts) => aggregator.aggregate_balances(accounts).await?,
        Command::User(user_id) => aggregator.aggregate_user_balances(user_id).await?,
        Command::Params(networks) => aggregator.aggregate_network_params(networks).await?,
        Command::Link(user_id, account) => {
            metadata.link_account(user_id, &account)?;
            info!("🔗 Linked {} on {} to user {}", account.address, account.network, user_id);
            return Ok(());
        }
    };

    let (succeeded, failed) = telemetry.totals();
    info!("📡 Remote calls: {} ok, {} failed", succeeded, failed);

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_bad_invocation_returns_plain_usage() {
        for bad in [&[][..], &["balances"][..], &["user", "1", "2"][..], &["frobnicate"][..]] {
            match parse_command(&args(bad)) {
                Err(message) => {
                    assert_eq!(message, USAGE);
                    assert!(message.contains('\n'));
                }
                Ok(_) => panic!("accepted {:?}", bad),
            }
        }
    }

    #[test]
    fn test_parse_commands() {
        assert!(matches!(
            parse_command(&args(&["balances", "cosmoshub:cosmos1abc", "osmosis:osmo1abc:osmovaloper1abc"])),
            Ok(Command::Balances(accounts)) if accounts.len() == 2
        ));
        assert!(matches!(parse_command(&args(&["user", "42"])), Ok(Command::User(42))));
        assert!(matches!(
            parse_command(&args(&["user", "abc"])),
            Err(message) if message == "Invalid user id: abc"
        ));
        assert!(matches!(
            parse_command(&args(&["link", "7", "juno:juno1abc"])),
            Ok(Command::Link(7, account)) if account.address == "juno1abc"
        ));
        assert!(matches!(
            parse_command(&args(&["params", "cosmoshub", "osmosis"])),
            Ok(Command::Params(networks)) if networks.len() == 2
        ));
    }
}
