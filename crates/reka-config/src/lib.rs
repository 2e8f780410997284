//! reka configuration
//!
//! Loads the `reka.kdl` document: enabled providers and their credentials,
//! the refresh interval, lifecycle rules, exclude rules and the state backend.
//!
//! Rules are kept in their raw configuration form here. The rule engine in
//! `reka-cloud` maps them onto typed conditions and performs the semantic
//! validation (one condition per rule, unique names, parsable dates).

pub mod discovery;
pub mod error;
pub mod model;
pub mod parser;

pub use discovery::*;
pub use error::*;
pub use model::*;
pub use parser::*;
