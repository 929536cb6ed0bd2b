pub mod collection_driver;

pub use collection_driver::{CollectSummary, CollectionDriver, RunOutcome, RunReport, RunRequest};
