//! Financial Tutor Backend
//!
//! A personal-finance education backend that:
//! - Simulates budgets with synchronously derived totals
//! - Tracks savings goals per user
//! - Generates personalized learning paths with a language model and fans
//!   them out into a hierarchical document store atomically
//! - Produces financial-health recommendations
//! - Drives a chatbot tutor over an ephemeral transcript
//!
//! WRITE FLOW:
//! EDIT → DIRTY CHECK → DETACHED MERGE-WRITE → MIRROR BACK

pub mod api;
pub mod budget;
pub mod error;
pub mod fanout;
pub mod generation;
pub mod models;
pub mod store;
pub mod sync;
pub mod tutor;

pub use error::Result;

// Re-export common types
pub use models::*;
