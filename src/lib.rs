//! Turnstile - Token-Gated API Gateway
//!
//! This crate implements an HTTP gateway that gates every inbound request
//! through an admission-control pipeline: credential lookup, expiry check,
//! route authorization, and a cluster-wide fixed-window rate quota enforced
//! through a shared Redis counter store. Admitted requests are forwarded to
//! a backend resolved from an ordered prefix route table.

pub mod admission;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod routing;
pub mod store;
