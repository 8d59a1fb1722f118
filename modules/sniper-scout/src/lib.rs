pub mod crawl;
pub mod engine;
pub mod extractor;
pub mod filter;
pub mod notify;
pub mod retry;
pub mod scout;
pub mod seen;
pub mod sources;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
