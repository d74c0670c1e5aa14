use clap::{Parser, Subcommand};

/// Metrics Gateway — token-protected stock/weather metrics with Databox push
#[derive(Parser)]
#[command(name = "metrics-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to bind (overrides GATEWAY_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Fetch stock metrics once and print them as JSON
    Stocks {
        /// Comma-separated ticker symbols
        #[arg(long, default_value = "AAPL,MSFT")]
        symbols: String,
        /// Return the built-in demo dataset instead of calling Marketstack
        #[arg(long)]
        demo: bool,
    },

    /// Fetch weather metrics once and print them as JSON
    Weather {
        /// Comma-separated city names
        #[arg(long, default_value = "Ljubljana,Maribor,Ptuj")]
        cities: String,
        /// Return the built-in demo dataset instead of calling Weatherstack
        #[arg(long)]
        demo: bool,
    },

    /// List configured users and their scopes
    Users,
}
