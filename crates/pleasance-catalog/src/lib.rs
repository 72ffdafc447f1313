//! Client for the Pleasance content API.
//!
//! Three bulk endpoints are used by the worker:
//! - `GET  /api/bulk/queue` — subjects waiting for (or done with) generation
//! - `POST /api/bulk/sections` — upsert generated sections
//! - `POST /api/bulk/mark-processed` — flag subjects as done

pub mod client;

pub use client::{CatalogClient, CatalogError, PushSummary};
