//! Live progress for a run: the race-free completion counter, the text bar,
//! and the single relay task that owns the output surface.
mod relay;
mod render;
mod state;


pub use relay::{Progress, ProgressEvent, ProgressOptions, ProgressReporter, RelayOutput};
pub use render::{DEFAULT_BAR_WIDTH, ProgressBar};
pub use state::ProgressState;
