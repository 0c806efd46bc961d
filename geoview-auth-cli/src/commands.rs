//! Subcommands and their execution

use clap::{Parser, Subcommand};
use geoview_auth::{auth, AuthConfig, AuthOutcome, Credentials, TokenManager};
use serde_json::json;

#[derive(Parser)]
#[command(name = "geoview-auth", version, about = "Tokens for secured ArcGIS map services")]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(long, short, global = true, env = "GEOVIEW_AUTH_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a default configuration file
    Init {
        #[arg(default_value = "geoview-auth.json")]
        path: String,
    },

    /// Exchange credentials for a token
    Login {
        #[arg(long)]
        server: Option<String>,

        #[arg(long, short)]
        username: String,

        #[arg(long, env = "GEOVIEW_PASSWORD", hide_env_values = true)]
        password: String,

        /// Remember the credentials for later `token` calls
        #[arg(long)]
        remember: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a bearer token obtained from remembered credentials
    Token {
        #[arg(long)]
        server: Option<String>,
    },

    /// Forget the credentials remembered by `login --remember`
    Logout {
        #[arg(long)]
        server: Option<String>,
    },

    /// Show whether credentials are remembered for a server
    Status {
        #[arg(long)]
        server: Option<String>,
    },
}

pub async fn run(command: Command, config: &AuthConfig) -> anyhow::Result<()> {
    let manager = TokenManager::start(config)?;

    match command {
        Command::Init { .. } => anyhow::bail!("init runs before any configuration is loaded"),

        Command::Login {
            server,
            username,
            password,
            remember,
            json,
        } => {
            let server = config.server_or_default(server.as_deref())?;
            let credentials = Credentials::new(username, password, server);

            let result = manager.exchange_token(&credentials).await;
            if json {
                let ok = result.is_ok();
                let outcome = AuthOutcome::from(result);
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                if !ok {
                    anyhow::bail!("Authentication failed");
                }
            } else {
                let token = result?;
                println!(
                    "Authenticated with {}; token valid until {}",
                    server,
                    token.expires.to_rfc3339()
                );
            }

            if remember {
                manager.store_credentials(&credentials)?;
                println!("Credentials remembered for {server}");
            }
        }

        Command::Token { server } => {
            let server = config.server_or_default(server.as_deref())?;
            let token = manager.auto_authenticate(server).await?;
            println!("{}", token.token);
        }

        Command::Logout { server } => {
            let server = config.server_or_default(server.as_deref())?;
            // Tokens live only as long as this process; stored credentials
            // are what lets a later `token` sign in again
            manager.clear_token(server).await;
            if manager.has_stored_credentials(server) {
                manager.remove_stored_credentials(server)?;
                println!("Logged out of {server}; stored credentials removed");
            } else {
                println!("No stored credentials for {server}");
            }
        }

        Command::Status { server } => {
            let server = config.server_or_default(server.as_deref())?;
            let status = json!({
                "server": server,
                "storage_key": auth::storage_key(server),
                "stored_credentials": manager.has_stored_credentials(server),
                "exchange_mode": config.exchange.mode,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_login_arguments() {
        let cli = Cli::try_parse_from([
            "geoview-auth",
            "login",
            "--server",
            "https://x",
            "-u",
            "alice",
            "--password",
            "secret",
            "--remember",
        ])
        .unwrap();

        match cli.command {
            Command::Login {
                server,
                username,
                remember,
                ..
            } => {
                assert_eq!(server.as_deref(), Some("https://x"));
                assert_eq!(username, "alice");
                assert!(remember);
            }
            _ => panic!("expected the login command"),
        }
    }

    #[test]
    fn test_logout_arguments() {
        let cli = Cli::try_parse_from(["geoview-auth", "logout", "--server", "https://x"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Logout { server } if server.as_deref() == Some("https://x")
        ));
        assert!(Cli::try_parse_from(["geoview-auth", "logout", "--forget"]).is_err());
    }

    #[test]
    fn test_init_default_path() {
        let cli = Cli::try_parse_from(["geoview-auth", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init { path } if path == "geoview-auth.json"));
    }
}
