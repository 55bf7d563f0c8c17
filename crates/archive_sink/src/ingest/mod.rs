mod jsonl_consumer;
mod wire;

pub use jsonl_consumer::*;
pub use wire::*;
