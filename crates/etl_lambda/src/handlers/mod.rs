pub mod invocation;
pub mod pipeline;
