// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod config;
pub mod history;
pub mod library;
pub mod render;
pub mod runtime;
pub mod session;

pub const TICK_RATE_MS: u64 = 100;
