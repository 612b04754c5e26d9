//! Spec Model: loads an OpenAPI document and derives the set of testable
//! resources from it.

mod document;
mod pairing;

pub use document::*;
pub use pairing::*;
