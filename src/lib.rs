pub mod config;
pub mod ingest;
pub mod period;
pub mod pipeline;
pub mod process;
pub mod schema;
pub mod stats;

pub use config::{RuleSet, RunOptions};
pub use period::ReferencePeriod;
pub use pipeline::{run, run_and_deliver, Delivery, RunOutput, OUTPUT_FILE_NAME, OUTPUT_MIME};
