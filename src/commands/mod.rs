//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod remote;
pub mod serve;
pub mod translate;
pub mod utils;

// Re-export main command functions
pub use remote::{execute_remote, RemoteArgs};
pub use serve::{execute_serve, PidFile, ServeArgs};
pub use translate::{execute_translate, TranslateArgs};
pub use utils::display_version;
