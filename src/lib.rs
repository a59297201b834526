//! Tollgate - In-process Rate Limiting
//!
//! This crate decides, per caller key, whether a request may proceed. The
//! [`ratelimit`] module holds four interchangeable algorithms behind one
//! admission trait; [`server`] wraps them in a small TCP line protocol so
//! other processes can ask for decisions.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod server;
