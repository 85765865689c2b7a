// Adapters layer: concrete implementations for external systems (geodata sources, predictor, http).

pub mod elevation;
pub mod http;
pub mod observe;
pub mod predictor;
pub mod soil;
pub mod weather;
