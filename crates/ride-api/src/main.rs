//! ride-api server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the ride API over HTTP.
//!
//! # Tokens
//!
//! The config maps SHA-256 digests of API tokens to user ids:
//!
//! ```toml
//! [api_tokens]
//! "9f86d081884c7d65…" = 1
//! ```
//!
//! `--hash-token` prints the digest of a token read from stdin.
//! `--create-admin <username> --email <email>` provisions an administrator and
//! prints a fresh token together with the config line for it.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use ride_api::{
  AppState, ServerConfig,
  auth::{self, AuthConfig},
};
use ride_core::{store::RideStore as _, user::NewUser};
use ride_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Ride dispatch API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the SHA-256 digest of a token entered on stdin and exit.
  #[arg(long)]
  hash_token: bool,

  /// Create an administrator with this username, print a token and exit.
  #[arg(long, value_name = "USERNAME", requires = "email")]
  create_admin: Option<String>,

  /// Email address for `--create-admin`.
  #[arg(long)]
  email: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_token {
    let token = read_stdin_line("Token: ")?;
    println!("{}", auth::token_digest(&token));
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("RIDE"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(username) = cli.create_admin {
    let email = cli.email.context("--create-admin requires --email")?;
    let user = store
      .add_user(NewUser::admin(username.clone(), email))
      .await
      .with_context(|| format!("failed to create admin {username:?}"))?;

    let token = auth::generate_token();
    let digest = auth::token_digest(&token);
    tracing::info!(user_id = user.id, %username, "created admin user");
    println!("Token: {token}");
    println!("Add to config.toml under [api_tokens]:");
    println!("\"{digest}\" = {}", user.id);
    return Ok(());
  }

  if server_cfg.api_tokens.is_empty() {
    tracing::warn!("no api_tokens configured; every request will be rejected");
  }

  let state = AppState {
    store: Arc::new(store),
    auth:  Arc::new(AuthConfig::new(server_cfg.api_tokens.clone())),
  };

  let app = ride_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read one line from stdin, without its line ending.
fn read_stdin_line(prompt: &str) -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  eprint!("{prompt}");
  io::stderr().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
