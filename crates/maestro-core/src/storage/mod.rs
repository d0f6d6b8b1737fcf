mod atomic;
pub mod brain;
pub mod merge;
pub mod normalize;
pub mod offsets;

pub use atomic::{archive, write_atomic};
pub use brain::MemoryStore;
pub use merge::{MergeStats, Preserved};
pub use normalize::normalize_error;
pub use offsets::OffsetStore;
