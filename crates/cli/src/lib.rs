//! Library side of the dirwatch binary
//!
//! Settings resolution, event output and log setup live here so they can
//! be tested without a Windows host.

pub mod logging;
pub mod output;
pub mod settings;
