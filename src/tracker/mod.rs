pub mod selection;
pub mod timebase;

pub use selection::{select_subject, NormalizedPoint, SelectionState, DEFAULT_SUBJECT_INDEX};
pub use timebase::{Timebase, DEFAULT_FRAME_RATE};
