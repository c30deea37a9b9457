use clap::{Parser, Subcommand};

/// Partage: access-control gateway for the project-sharing API
#[derive(Parser)]
#[command(name = "partage", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to PARTAGE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Issue bearer tokens with the configured signing secret
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Password policy and hashing helpers
    Password {
        #[command(subcommand)]
        command: PasswordCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a token for an existing user id
    Issue {
        #[arg(long)]
        user_id: i64,
        /// Lifetime in seconds (defaults to PARTAGE_TOKEN_TTL_SECS)
        #[arg(long)]
        ttl_secs: Option<i64>,
    },
    /// Verify a token and print the identity it carries
    Verify {
        #[arg(long)]
        token: String,
    },
}

#[derive(Subcommand)]
pub enum PasswordCommands {
    /// Check a password against the strength policy and print its hash
    Hash {
        #[arg(long, env = "PARTAGE_PASSWORD")]
        password: String,
    },
    /// Check a password against the strength policy only
    Check {
        #[arg(long, env = "PARTAGE_PASSWORD")]
        password: String,
    },
}
