//! Network access for the worker.
//!
//! The worker never talks to reqwest directly; it goes through the
//! [`Network`] trait so strategies can be driven by a scripted stub.

mod client;
#[cfg(test)]
pub mod stub;
mod types;

pub use client::{HttpNetwork, Network};
pub use types::{Request, Response};
