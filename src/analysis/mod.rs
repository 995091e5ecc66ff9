//! Result and orchestration modules
//!
//! - Result types
//! - Tempo summaries
//! - Model cache
//! - Parallel batch decoding

pub mod batch;
pub mod cache;
pub mod result;
pub mod tempo;
