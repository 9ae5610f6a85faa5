use crate::{
    api::{self, ServerConfig, Storage},
    cli::commands::{auth, gate, session},
};
use anyhow::Result;
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    /// `None` runs on in-memory stores.
    pub dsn: Option<SecretString>,
    pub skip_bootstrap: bool,
    pub session: session::Options,
    pub auth: auth::Options,
    pub gate: gate::Options,
}

impl Args {
    #[must_use]
    pub fn server_config(self) -> ServerConfig {
        let storage = match self.dsn {
            Some(dsn) => Storage::Postgres {
                dsn,
                bootstrap: !self.skip_bootstrap,
            },
            None => Storage::InMemory,
        };

        ServerConfig {
            port: self.port,
            storage,
            session_policy: self.session.policy(),
            prune_interval: self.session.prune_interval(),
            auth: self.session.auth_config(),
            resolver: self.auth.resolver_config(),
            gate: self.gate.gate_config(),
            session_secret: self.session.secret,
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!(
        port = args.port,
        in_memory = args.dsn.is_none(),
        auto_register = args.auth.auto_register,
        rejection_mode = %args.gate.rejection_mode,
        "Starting server"
    );

    api::new(args.server_config()).await
}
