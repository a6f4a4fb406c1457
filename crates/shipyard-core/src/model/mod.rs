//! Data model

mod job;
mod request;
mod topology;

pub use job::*;
pub use request::*;
pub use topology::*;
