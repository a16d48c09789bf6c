#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Wire protocol and duplex transport connecting the controller to the console.

/// Typed envelopes, wire frames, session state machine, and the error taxonomy.
#[path = "../protocol.rs"]
pub mod protocol;

/// Point-to-point duplex channel with newline-delimited JSON frames.
#[path = "../channel.rs"]
pub mod channel;

pub use channel::{DuplexChannel, LinkListener};
pub use protocol::{Envelope, EnvelopeKind, Frame, LinkError, SessionState};
