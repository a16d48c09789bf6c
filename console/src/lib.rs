#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Console session: command execution, output buffering, and alert forwarding.

/// Ordered output line buffer drained into command replies.
#[path = "../buffer.rs"]
pub mod buffer;

/// Command dispatch surface and the named-command registry.
#[path = "../registry.rs"]
pub mod registry;

/// Session state machine, dashboard, and the serve loop.
#[path = "../session.rs"]
pub mod session;

/// Mission-log telemetry handle for console events.
#[path = "../telemetry.rs"]
pub mod telemetry;

pub use buffer::OutputBuffer;
pub use registry::{CommandHandler, CommandRegistry, CommandSurface, FnCommand};
pub use session::{ConsoleSession, StatusReporter};
pub use telemetry::{ConsoleTelemetry, ConsoleTelemetryBuilder};
