//! # Completion events
//!
//! Every callback the client makes is republished on a [`CompletionBus`], a
//! hot broadcast channel. Callers look at it through a [`RequestView`], which
//! filters the bus down to one request identifier and maps the status to a
//! `bool`.
//!
//! ```text
//! ┌──────────┐ on_complete ┌─────────────┐ publish ┌───────────────┐
//! │  Client  │────────────▶│ BusListener │────────▶│ CompletionBus │
//! └──────────┘             └─────────────┘         └───────┬───────┘
//!                                                          │ filter(id) / map
//!                                                  ┌───────▼───────┐
//!                                                  │  RequestView  │
//!                                                  └───────────────┘
//! ```

pub mod event_bus;
pub mod request_view;

pub use event_bus::*;
pub use request_view::*;
