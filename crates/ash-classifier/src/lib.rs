pub mod pipeline;

pub use pipeline::{ClassificationOutcome, ClassifierPipeline};
