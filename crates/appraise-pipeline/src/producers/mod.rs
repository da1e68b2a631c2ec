//! The five signal producer adapters.

pub mod baseline;
pub mod cochange;
pub mod mutation;
pub mod risk;
pub mod statics;

pub use baseline::BaselineProducer;
pub use cochange::CoChangeProducer;
pub use mutation::MutationProducer;
pub use risk::RiskProducer;
pub use statics::StaticProducer;
