//! Ad presentation lifecycle.
//!
//! Attach/detach for inline containers, exclusive show for fullscreen
//! formats, and the sandbox placeholder path.

mod container;
mod controller;

pub use container::AdContainer;
pub use controller::{PresentationController, PresentationMode, ShowGuard};
