pub mod settings;

pub use settings::{default_transcripts_root, RetentionLimits, RetryPolicy, Settings};
