// src/services/mod.rs
pub mod comparison;
pub mod features;
pub mod history;
pub mod image_processor;
pub mod normalizer;
pub mod provider;

#[cfg(test)]
pub mod test_support;

pub use comparison::{ComparisonOrchestrator, RandomSwap, SwapStrategy};
pub use features::FeatureService;
pub use history::SessionHistory;
pub use image_processor::ImageProcessor;
pub use provider::{HttpTransport, ProviderClient, ReqwestTransport};
