use anyhow::Result;
use structopt::StructOpt;

use plexfind::{config, Manager, PlexTv, DEFAULT_MAX_RESULTS};

#[derive(Debug, StructOpt)]
#[structopt(name = "plexfind", about = "Aggregate and fuzzy-search user access across Plex accounts")]
struct Opt {
    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Validate each configured account's token
    Accounts,
    /// List reachable servers across all accounts
    Servers {
        /// Bypass the cache and re-query upstream
        #[structopt(long)]
        refresh: bool,
    },
    /// List user-access records across all servers
    Users {
        #[structopt(long)]
        refresh: bool,
    },
    /// Fuzzy-search aggregated users by email, username or display title
    Search {
        query: String,
        /// Maximum number of matches to return
        #[structopt(long, default_value = "25")]
        limit: usize,
        #[structopt(long)]
        refresh: bool,
    },
    /// Request a device-link PIN and print its authorization URL
    Link {
        /// Present a specific client identifier instead of the derived one
        #[structopt(long)]
        client_identifier: Option<String>,
    },
    /// Check whether a previously requested PIN has been authorized
    LinkStatus {
        id: i64,
        #[structopt(long)]
        client_identifier: String,
    },
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let opt = Opt::from_args();

    let config = config::load()?;
    let client = PlexTv::new()?;
    let mut manager = Manager::new(client, config.accounts, config.cache_ttl);

    let output = match opt.command {
        Command::Accounts => serde_json::to_value(manager.validate_accounts())?,
        Command::Servers { refresh } => serde_json::to_value(manager.get_servers(refresh))?,
        Command::Users { refresh } => {
            serde_json::to_value(manager.get_users_across_servers(refresh)?)?
        }
        Command::Search {
            query,
            limit,
            refresh,
        } => {
            let limit = if limit == 0 { DEFAULT_MAX_RESULTS } else { limit };
            serde_json::to_value(manager.search_users(&query, limit, refresh)?)?
        }
        Command::Link { client_identifier } => {
            serde_json::to_value(manager.generate_auth_pin(client_identifier.as_deref())?)?
        }
        Command::LinkStatus {
            id,
            client_identifier,
        } => serde_json::to_value(manager.check_auth_pin_status(id, &client_identifier)?)?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
