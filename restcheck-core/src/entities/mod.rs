//! Entities shared by the spec model, the synthesizer, the executor, the
//! validator, the orchestrator and the report aggregator.

mod http;
mod resource;
mod schema;
mod step;

pub use http::*;
pub use resource::*;
pub use schema::*;
pub use step::*;
