//! Interactive chat client for the chatgate gateway.
//!
//! Joins one room and sends each input line as a chat frame. Reconnects on
//! connection loss (max 5 attempts with 5 second interval).
//!
//! Run with:
//! ```not_rust
//! cargo run --bin chatgate-client -- --chat room-1 --token <jwt>
//! cargo run --bin chatgate-client -- --chat room-1 --dev-secret dev-secret --dev-user alice
//! cargo run --bin chatgate-client -- --chat room-1 --user-id alice
//! ```

use chatgate_client::{ClientIdentity, ConnectTarget, run_client};
use chatgate_server::infrastructure::auth::TokenVerifier;
use chatgate_shared::logger::setup_logger;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chatgate-client")]
#[command(about = "Interactive chat client for the chatgate gateway", long_about = None)]
struct Args {
    /// Gateway base URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8083")]
    url: String,

    /// Chat room to join
    #[arg(short = 'c', long)]
    chat: String,

    /// Signed bearer token
    #[arg(short = 't', long, conflicts_with_all = ["user_id", "dev_secret"])]
    token: Option<String>,

    /// Unverified user ID (gateway must allow direct identity)
    #[arg(long, conflicts_with = "dev_secret")]
    user_id: Option<String>,

    /// Shared secret used to mint a local token for `--dev-user`
    #[arg(long, requires = "dev_user")]
    dev_secret: Option<String>,

    /// Subject of the locally minted token
    #[arg(long, requires = "dev_secret")]
    dev_user: Option<String>,

    /// Lifetime of the locally minted token in minutes
    #[arg(long, default_value_t = 60)]
    dev_ttl_minutes: i64,
}

impl Args {
    fn identity(&self) -> Result<ClientIdentity, String> {
        if let Some(token) = &self.token {
            return Ok(ClientIdentity::Token(token.clone()));
        }
        if let (Some(secret), Some(user)) = (&self.dev_secret, &self.dev_user) {
            let token = TokenVerifier::new(secret)
                .issue(user, chrono::Duration::minutes(self.dev_ttl_minutes))
                .map_err(|e| format!("Failed to mint dev token: {}", e))?;
            return Ok(ClientIdentity::Token(token));
        }
        if let Some(user_id) = &self.user_id {
            return Ok(ClientIdentity::Direct(user_id.clone()));
        }
        Ok(ClientIdentity::Anonymous)
    }
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let identity = match args.identity() {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };
    if identity == ClientIdentity::Anonymous {
        tracing::warn!("No credentials given; joining as anonymous (read-only)");
    }

    let target = ConnectTarget::new(args.url, args.chat, identity);

    if let Err(e) = run_client(target).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
