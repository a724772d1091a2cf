//! secrets-walker - Hierarchical Secret Materializer
//!
//! Walks one group's subtree in a Vault-style key/value secret store,
//! fetches every leaf secret and writes each field as a file named after
//! the field into an environment directory (by default the s6 container
//! environment directory).
//!
//! # Features
//!
//! - **Concurrent Discovery**: every sub-directory is listed in its own
//!   future; sibling failures cancel the walk.
//!
//! - **Bounded Requests**: a shared limiter caps in-flight store requests,
//!   with bounded retries on connection failures and timeouts.
//!
//! - **Single Writer**: fetched fields are funneled through a bounded
//!   channel to one writer task that owns the output directory.
//!
//! - **Token Exchange**: a store token is obtained from the exchange
//!   service unless `VAULT_TOKEN` overrides it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Token Exchange (EXCHANGE_HOST)                 │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ GET /group/token/<group>
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Secret Store  /v1/<mount>/<group>/              │
//! └──────────────┬─────────────────────────────────▲────────────────┘
//!                │ LIST (?list=true)               │ READ
//!                ▼                                 │
//! ┌──────────────────────────────┐   ┌─────────────┴────────────────┐
//! │          TreeWalker          │   │       SecretCollector        │
//! │  - one future per directory  │──►│  - one future per leaf       │
//! │  - visited set + depth guard │   │  - bounded write channel     │
//! └──────────────────────────────┘   └─────────────┬────────────────┘
//!                                                  │
//!                                                  ▼
//!                                      ┌──────────────────────┐
//!                                      │  writer task/DirSink │
//!                                      │  <output>/<FIELD>    │
//!                                      └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Materialize group "payments" using the token exchange
//! VAULT_ADDR=https://vault.internal VAULT_GROUP=payments \
//!     EXCHANGE_HOST=tokens.internal secrets-walker
//!
//! # Local testing with an explicit token and output directory
//! VAULT_ADDR=http://127.0.0.1:8200 VAULT_TOKEN=dev-root \
//!     secrets-walker --group payments -o ./env
//! ```

pub mod auth;
pub mod collector;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod progress;
pub mod store;
pub mod walker;

pub use auth::{acquire_token, AuthToken};
pub use collector::{CollectStats, DirSink, SecretCollector, SecretSink};
pub use config::{CliArgs, RunConfig, StoreAddr, TokenSource};
pub use context::{RunContext, RunProgress};
pub use coordinator::{RunCoordinator, RunStats};
pub use error::{MaterializerError, Result};
pub use store::{HttpGateway, HttpGatewayBuilder, MemoryStore, RequestKind, SecretStore};
pub use walker::TreeWalker;
