//! TreapDB CLI Client
//!
//! Command-line interface for interacting with TreapDB.

use std::collections::BTreeMap;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use treapdb::network::Client;
use treapdb::Result;

/// TreapDB CLI
#[derive(Parser, Debug)]
#[command(name = "treapdb-cli")]
#[command(about = "CLI for the TreapDB key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:11811")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Entries with start <= key < end
    Range {
        start: String,
        end: String,

        /// Maximum number of entries
        #[arg(short, long, default_value = "100")]
        limit: u32,
    },

    /// Entries whose key starts with a prefix
    Prefix {
        prefix: String,

        /// Maximum number of entries
        #[arg(short, long, default_value = "100")]
        limit: u32,
    },

    /// The k smallest entries
    Kmin { k: u32 },

    /// The k largest entries
    Kmax { k: u32 },

    /// Number of entries
    Len,

    /// Remove a key (accepted, but never deletes)
    Remove { key: String },

    /// Ping the server
    Ping,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut client = Client::connect(&args.server)?;

    match args.command {
        Commands::Get { key } => match client.get(&key)? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Put { key, value } => {
            client.put(&key, value.as_bytes())?;
            println!("OK");
        }
        Commands::Range { start, end, limit } => print_entries(&client.range(&start, &end, limit)?),
        Commands::Prefix { prefix, limit } => print_entries(&client.prefix(&prefix, limit)?),
        Commands::Kmin { k } => print_entries(&client.kmin(k)?),
        Commands::Kmax { k } => print_entries(&client.kmax(k)?),
        Commands::Len => println!("{}", client.length()?),
        Commands::Remove { key } => println!("{}", client.remove(&key)?),
        Commands::Ping => {
            client.ping()?;
            println!("PONG");
        }
    }

    Ok(())
}

fn print_entries(entries: &BTreeMap<String, Vec<u8>>) {
    for (key, value) in entries {
        println!("{}\t{}", key, String::from_utf8_lossy(value));
    }
    println!("({} entries)", entries.len());
}
