//! Core types and trait definitions for the ride dispatch record keeper.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::RideStore`]; the query engine and the
//! instrumentation layer are written against that trait only.

// Implementations use native `async fn`; the trait spells out `Send` bounds.
#![allow(async_fn_in_trait)]

pub mod engine;
pub mod error;
pub mod event;
pub mod instrument;
pub mod lifecycle;
pub mod query;
pub mod ride;
pub mod store;
pub mod user;
pub mod view;

pub use error::{Error, Result};
