#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Simulation collaborator surface: clock reads, MET display, status snapshots.

/// Clock source trait and the manually advanced simulation clock.
#[path = "../clock.rs"]
pub mod clock;

/// Mission-elapsed-time rendering.
#[path = "../met.rs"]
pub mod met;

/// Static spacecraft status snapshot feeding the console dashboard.
#[path = "../status.rs"]
pub mod status;

pub use clock::{ClockError, ClockSource, SimClock};
pub use met::Met;
pub use status::MissionProfile;
