use clap::{Parser, ValueEnum};
use log::info;
use server::network::{Server, ServerConfig};
use server::store::{JsonFileStore, MemoryStore, WorldStore};
use shared::PlacePolicy;
use std::path::PathBuf;

/// What placing a block below the top of a stack does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    /// Replace the layer with the new block
    Overwrite,
    /// Add the block to the layer unless it is already there
    Decorate,
}

impl From<PolicyArg> for PlacePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Overwrite => PlacePolicy::Overwrite,
            PolicyArg::Decorate => PlacePolicy::Decorate,
        }
    }
}

/// Authoritative server for the shared isometric world
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Side length of the square map
    #[clap(short, long, default_value_t = shared::MAP_SIZE)]
    map_size: usize,
    /// Maximum number of concurrent clients
    #[clap(long, default_value = "32")]
    max_clients: usize,
    /// JSON file the world is loaded from and saved to; in-memory if omitted
    #[clap(short, long)]
    save_file: Option<PathBuf>,
    /// Placement behaviour below the top of a stack
    #[clap(long, value_enum, default_value = "overwrite")]
    place_policy: PolicyArg,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let store: Box<dyn WorldStore> = match &args.save_file {
        Some(path) => {
            let store = JsonFileStore::new(path);
            info!("Persisting world to {}", store.path().display());
            Box::new(store)
        }
        None => {
            info!("No save file given, world will not survive a restart");
            Box::new(MemoryStore::new())
        }
    };

    let config = ServerConfig {
        map_size: args.map_size,
        max_clients: args.max_clients,
        place_policy: args.place_policy.into(),
    };

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, config, store).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
