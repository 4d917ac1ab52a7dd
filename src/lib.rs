//! Pattern-filter highlighting engine.
//!
//! Groups of filters are matched against a document, the matches are
//! aggregated into a style-keyed decoration plan, and a matched-lines view can
//! replace the document with only the lines that matched. [`controller`] ties
//! the pieces together behind the JSON message protocol in [`message`].

pub mod constants;
pub mod controller;
pub mod core;
pub mod document;
pub mod error;
pub mod filter;
pub mod highlight;
pub mod message;
pub mod scheduler;
pub mod state;
pub mod style;
