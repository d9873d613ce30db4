//! Console output and progress reporting for the installer.

mod output;
mod progress;

pub use output::{Output, Verbosity};
pub use progress::{format_bytes, ProgressManager};
