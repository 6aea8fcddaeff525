#![forbid(unsafe_code)]

//! tdconv: convert an authenticated messaging session into a `tdata`
//! directory for another client.
//!
//! Library entry point exposing the conversion core. The binary (`main.rs`)
//! is a thin CLI wrapper around this library.

pub mod backends;
pub mod discovery;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod proxy;
pub mod resolver;
pub mod settings;
