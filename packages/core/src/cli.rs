use clap::{Parser, Subcommand};

use crate::config::{parse_origin, Config};

/// PeerShare pricing and accrual CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "peershare",
    version,
    about = "Quote, simulate and settle peer-to-peer bandwidth sharing sessions"
)]
pub struct Cli {
    /// Base rate per GB, before multipliers
    #[arg(long, global = true)]
    pub base_rate: Option<f64>,

    /// Accrual tick interval in seconds
    #[arg(long, global = true)]
    pub tick_seconds: Option<u64>,

    /// Assumed consumption while connected, in GB per hour
    #[arg(long, global = true)]
    pub gb_per_hour: Option<f64>,

    /// JSON file with the node directory
    #[arg(long, global = true)]
    pub nodes_file: Option<String>,

    /// Device position as "<latitude>,<longitude>"; node distances are measured from it
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub origin: Option<String>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Price one GB for a peer at the given distance
    Quote {
        /// Distance to the peer in kilometres
        #[arg(long)]
        distance: f64,

        /// Demand level: low, medium or high
        #[arg(long, default_value = "medium")]
        demand: String,

        /// Ask the AI service to explain the quote
        #[arg(long)]
        explain: bool,
    },

    /// List nodes matching the share settings, nearest first
    Nodes {
        /// Include unavailable and out-of-range nodes
        #[arg(long)]
        all: bool,
    },

    /// Connect to a node, accrue for a while, then disconnect and settle
    Simulate {
        /// Node id from `peershare nodes`; the nearest matching node when omitted
        #[arg(long)]
        node: Option<String>,

        #[arg(long, default_value = "medium")]
        demand: String,

        /// How long to stay connected
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },

    /// Check card details before adding them as a payment method
    Card {
        #[arg(long)]
        number: String,

        /// Expiry as MM/YY
        #[arg(long)]
        expiry: String,

        #[arg(long)]
        cvv: String,
    },

    /// List a customer's saved payment methods
    Methods {
        customer: String,
    },

    /// Send a question to the assistant
    Ask {
        prompt: Vec<String>,
    },
}

impl Cli {
    /// Apply flag overrides on top of environment configuration.
    pub fn apply(&self, config: &mut Config) -> Result<(), String> {
        if let Some(base_rate) = self.base_rate {
            config.base_rate = base_rate;
        }
        if let Some(tick_seconds) = self.tick_seconds {
            config.tick_seconds = tick_seconds;
        }
        if let Some(gb_per_hour) = self.gb_per_hour {
            config.gb_per_hour = gb_per_hour;
        }
        if let Some(nodes_file) = &self.nodes_file {
            config.nodes_file = Some(nodes_file.clone());
        }
        if let Some(origin) = &self.origin {
            config.origin = Some(parse_origin(origin)?);
        }
        Ok(())
    }
}
