//! Go package analyzer.
//!
//! Determines which files in a directory belong to a buildable Go package,
//! under what build constraints, and with what cgo metadata - without
//! requiring any of the package's dependencies to be present. Intended to run
//! inside an execution sandbox before a dependency graph exists.

pub mod cgo;
pub mod classifier;
pub mod cli;
pub mod constraint;
pub mod context;
pub mod logging;
pub mod output;
pub mod package;
pub mod scanner;
pub mod utils;

pub use context::BuildContext;
pub use package::{analyze_package, Package};
