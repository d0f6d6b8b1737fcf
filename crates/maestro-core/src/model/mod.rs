pub mod iteration;
pub mod memory;
pub mod transcript;

pub use iteration::{IterationMode, IterationState};
pub use memory::{
    CompactNote, ErrorNote, MemoryBatch, MemoryCategory, MemoryEntry, Note, NoteSource,
};
pub use transcript::{tool_result_text, ContentBlock, MessageContent, RecordMessage, TranscriptRecord};
