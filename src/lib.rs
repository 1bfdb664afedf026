//! Purpose: Typed client library for the KE-chain PLM REST API, shared with the `kechain` CLI.
//! Exports: `api` (client, config, transports, schemas), `core` (errors, enums, ids), `models` (entities).
//! Role: Library crate root; the binary only parses arguments and formats output.
//! Invariants: Nothing in the library reads process-global state unless asked to (`from_env`, `get_project`).
//! Invariants: Every write is validated locally before it reaches the transport.
pub mod api;
pub mod core;
pub mod models;
