//! CLI commands module.

mod callback;
mod oneshot;
mod process;
mod util;

pub use callback::CallbackCommand;
pub use oneshot::OneshotCommand;
pub use process::ProcessCommand;

pub(crate) use util::*;
