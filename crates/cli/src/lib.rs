//! backmirror CLI library
//!
//! Exposes the console, configuration and locking pieces used by the `bm`
//! binary so they can be tested without spawning it.

pub mod console;
pub mod locks;
pub mod system_config;
pub mod util;
