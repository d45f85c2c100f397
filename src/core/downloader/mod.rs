pub mod fetch;
pub mod store;

pub use fetch::{Fetcher, HttpFetcher};
pub use store::{ArtifactSource, ArtifactStore, EnsureOutcome};
