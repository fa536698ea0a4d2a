// Image classification: trait-based abstraction for swappable providers.
//
// The ImageClassifier trait defines the interface. ContentSafetyClient
// implements it against Azure AI Content Safety; tests plug in fixed-result
// fakes without touching the rest of the pipeline.

pub mod content_safety;
pub mod traits;
