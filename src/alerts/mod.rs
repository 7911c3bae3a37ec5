pub mod channels;
pub mod engine;
pub mod triggers;

pub use engine::AlertEngine;
pub use triggers::{arbitrage, TriggerResult};
