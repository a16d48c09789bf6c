#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Controller loop: drives the console one command at a time while staying
//! receptive to unsolicited alerts.

/// Mission agent collaborator trait and the scripted test agent.
#[path = "../agent.rs"]
pub mod agent;

/// Client-role link with reply/alert routing and bounded reply waits.
#[path = "../client.rs"]
pub mod client;

/// The connect / decide / command / disconnect cycle.
#[path = "../runtime.rs"]
pub mod runtime;

pub use agent::{AgentAction, MissionAgent, ScriptedAgent};
pub use client::{ControllerConfig, ControllerLink};
pub use runtime::ControllerLoop;
