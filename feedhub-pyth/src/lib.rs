//! Pyth integration for the Price Feed Hub
//!
//! This crate provides a client for the Pyth Hermes REST API, which serves
//! the latest published price for any set of feed identifiers without
//! requiring authentication.
//!
//! The client implements [`feedhub_core::PriceSource`] so the ingestion
//! scheduler can poll it without knowing about Hermes.

pub mod client;
pub mod types;

pub use client::PythClient;
pub use types::{LatestPricesResponse, ParsedPriceUpdate, PriceQuote, HERMES_API_BASE};
