//! # callbridge
//!
//! Bridges a callback-based asynchronous client into per-request streams.
//!
//! - [`client`]: the callback interface ([`client::AsyncClient`],
//!   [`client::CompletionListener`]) and [`client::SampleClient`]
//! - [`event`]: the hot [`event::CompletionBus`] and filtered
//!   [`event::RequestView`]s over it
//! - [`adapter`]: [`adapter::StreamAdapter`], which wires the two together
//! - [`config`]: delay policy and channel sizing

pub mod adapter;
pub mod client;
pub mod config;
pub mod error;
pub mod event;

// Re-exports
pub use adapter::StreamAdapter;
pub use error::*;
