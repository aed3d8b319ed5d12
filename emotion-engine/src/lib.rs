pub mod analyzer;
pub mod classifier;

pub use analyzer::EmotionAnalyzer;
pub use classifier::{EmotionClassifier, HuggingFaceClassifier};
