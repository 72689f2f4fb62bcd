//! Pipeline integration suite entry point.

mod determinism;
mod e2e;
mod fixture;
mod halt;
mod resume;
