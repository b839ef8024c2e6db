//! Command implementations for the respawn CLI.
//!
//! - [`run`] - Supervise the target until a shutdown signal arrives
//! - [`routes`] - Print the route table the proxy would use
//!
//! Each command provides an `execute` function that takes the parsed
//! arguments and the global logging flags.

pub mod routes;
pub mod run;

pub use routes::execute as routes_execute;
pub use run::execute as run_execute;
