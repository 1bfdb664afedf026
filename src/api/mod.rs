//! Purpose: Public client surface for talking to a KE-chain site.
//! Exports: `Client`, `Query`, configuration values, transports, routes, and schemas.
//! Role: Everything the models and the CLI need to reach the server lives behind this module.
//! Invariants: Models never build URLs by hand; they name a `Resource`.
//! Invariants: The transport is swappable; nothing here assumes a real network.

mod client;
mod config;
mod replay;
mod routes;
mod schema;
mod transport;

pub use crate::core::error::{Error, ErrorKind, to_exit_code};
pub use client::{Client, NewService, Query, get_project, get_project_with};
pub(crate) use client::created_payload;
pub use config::{
    ClientConfig, KECHAIN_CHECK_CERTIFICATES, KECHAIN_FORCE_ENV_USE, KECHAIN_PASSWORD,
    KECHAIN_SCOPE, KECHAIN_SCOPE_ID, KECHAIN_SCOPE_STATUS, KECHAIN_TOKEN, KECHAIN_URL,
    KECHAIN_USERNAME, ProjectRequest, ScopeSelector, parse_env_bool,
};
pub use replay::{RecordedRequest, ReplayTransport};
pub use routes::{Resource, build_url, normalize_base_url};
pub use schema::{MetaSchema, WidgetSchemas};
pub use transport::{HttpTransport, Method, Request, Response, Transport};
