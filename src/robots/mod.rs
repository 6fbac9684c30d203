//! Robots.txt handling
//!
//! The site's robots file is read once per run. When it cannot be read the
//! policy stays open (`RobotsState::LoadFailed`) and a warning is logged.

mod parser;
mod policy;

pub use parser::ParsedRobots;
pub use policy::{RobotsPolicy, RobotsState};
