//! Unified input.raw_event.v1 schema
//!
//! This module defines the framework-agnostic input schema for raw
//! input-device events and the adapter that reads recorded streams.

mod raw_event;
mod adapter;

pub use raw_event::*;
pub use adapter::*;
