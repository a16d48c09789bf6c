//! The connect / decide / command / disconnect cycle.

use anyhow::{Context, Result};

use crate::{
    agent::{AgentAction, MissionAgent},
    client::ControllerLink,
};

/// Drives one request/response cycle at a time against the console while
/// relaying unsolicited alerts to the agent as interrupts.
pub struct ControllerLoop {
    link: ControllerLink,
}

impl ControllerLoop {
    /// Wraps an established link.
    #[must_use]
    pub const fn new(link: ControllerLink) -> Self {
        Self { link }
    }

    /// Runs the full session: CONNECT, agent cycles, DISCONNECT.
    ///
    /// Returns the agent's final answer. Any alert that crossed a reply wait
    /// reaches [`MissionAgent::handle_alert`] before the agent is asked for
    /// its next action.
    pub async fn run(&mut self, agent: &mut dyn MissionAgent) -> Result<String> {
        let mut crossed = Vec::new();
        let mut observation = self
            .link
            .open_session(|alert| crossed.push(alert))
            .await
            .context("opening console session")?;

        loop {
            for alert in crossed.drain(..) {
                agent.handle_alert(&alert).await?;
            }
            while let Some(alert) = self.link.try_alert() {
                agent.handle_alert(&alert).await?;
            }

            match agent.next_action(&observation).await? {
                AgentAction::Final(answer) => {
                    self.link
                        .close_session()
                        .await
                        .context("closing console session")?;
                    tracing::info!("session finished");
                    return Ok(answer);
                }
                AgentAction::Command(line) => {
                    tracing::info!(command = %line, "dispatching command");
                    observation = self
                        .link
                        .send_command(&line, |alert| crossed.push(alert))
                        .await
                        .with_context(|| format!("running command '{line}'"))?;
                }
            }
        }
    }
}
