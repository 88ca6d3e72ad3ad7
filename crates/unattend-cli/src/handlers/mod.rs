//! Command handlers.
//!
//! Each handler parses CLI input, calls into the install engine and
//! formats the result for the terminal. No install logic lives here.

pub mod config;
pub mod normalize;
pub mod resolve;
pub mod run;
