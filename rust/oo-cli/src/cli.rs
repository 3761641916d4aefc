use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use oo_client::{ClientConfig, ResolutionMode};
use oo_credentials::PublicKey;

#[derive(Debug, Parser)]
#[command(name = "oo")]
#[command(bin_name = "oo")]
#[command(about = "Store opaque objects behind end-to-end encrypted capabilities", long_about = None)]
pub struct OoCli {
    #[command(subcommand)]
    pub command: Command,

    /// Object store URL
    #[arg(long, global = true, env = "OOSTORE_URL")]
    pub url: Option<String>,

    /// Directory holding the key pair (default: ~/.oo)
    #[arg(long, global = true, env = "OO_HOME")]
    pub home: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout: u64,

    /// Discharge independent caveats concurrently
    #[arg(long, global = true)]
    pub concurrent: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new opaque object from input, output its capability
    New {
        #[command(flatten)]
        io: Io,

        /// Content type sent with the object
        #[arg(short = 't', long)]
        content_type: Option<String>,
    },

    /// Fetch and decrypt the object a capability refers to
    Fetch {
        #[command(flatten)]
        io: Io,
    },

    /// Add a caveat to a capability
    Cond {
        #[command(flatten)]
        io: Io,

        /// Third-party location that must discharge the condition
        #[arg(short, long)]
        location: Option<String>,

        /// Public key (did:key) of the third-party authority
        #[arg(short, long)]
        key: Option<PublicKey>,

        /// Condition text; words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        condition: Vec<String>,
    },

    /// Delete the object a capability refers to
    #[command(visible_aliases = ["del", "rm"])]
    Delete {
        /// Read the capability from this file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Create the key pair and print its public key
    Init {
        /// Replace an existing key pair
        #[arg(long)]
        overwrite: bool,
    },

    /// Print the public key, creating the key pair if needed
    Key,
}

#[derive(Debug, Args)]
pub struct Io {
    /// Read from this file instead of stdin
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl OoCli {
    /// Key home from `--home`/`OO_HOME`, else `~/.oo`
    pub fn home(&self) -> Result<PathBuf> {
        match &self.home {
            Some(home) => Ok(home.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(".oo"))
                .context("cannot determine the home directory; use --home or OO_HOME"),
        }
    }

    /// Client configuration for commands that talk to the store
    pub fn config(&self, needs_store: bool) -> Result<ClientConfig> {
        let url = match (&self.url, needs_store) {
            (Some(url), _) => url.clone(),
            (None, false) => String::new(),
            (None, true) => return Err(anyhow!("--url or OOSTORE_URL is required")),
        };

        let resolution = if self.concurrent {
            ResolutionMode::Concurrent
        } else {
            ResolutionMode::Sequential
        };

        Ok(ClientConfig::new(url, self.home()?)
            .with_timeout(self.timeout)
            .with_resolution(resolution))
    }
}
