//! HTTP transport to the backend's StreamChat endpoint.

pub mod client;
pub mod headers;

pub use client::{CursorClient, FragmentStream};
