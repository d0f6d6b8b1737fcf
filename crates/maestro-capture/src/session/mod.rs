pub mod locator;

pub use locator::{
    discover_session, locate_session, SessionHandle, SessionLookup, TranscriptsSnapshot,
};
