mod keys;
mod mode;
mod outline;
mod preview;
mod state;

pub use mode::{Focus, ViewMode};
pub use state::{App, StatusLevel};
