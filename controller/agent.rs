//! Mission agent collaborator trait and the scripted test agent.

use std::collections::VecDeque;

use anyhow::Result;
use async_trait::async_trait;

/// Action chosen by the agent after seeing console output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentAction {
    /// Send one command line to the console.
    Command(String),
    /// Terminate the session with a final answer.
    Final(String),
}

/// The autonomous decision maker driving the controller loop.
///
/// The loop relays console text in and actions out; alerts interrupt the
/// cadence and arrive through [`MissionAgent::handle_alert`] before the
/// observation they crossed.
#[async_trait]
pub trait MissionAgent: Send {
    /// Decides the next action given the latest console text.
    async fn next_action(&mut self, observation: &str) -> Result<AgentAction>;

    /// Receives an unsolicited alert, outside the command/reply cadence.
    async fn handle_alert(&mut self, alert: &str) -> Result<()>;
}

/// Replays a fixed command list, then answers with a terminal message.
///
/// Drives the demo subcommand and the end-to-end tests in place of a live
/// language-model agent.
#[derive(Debug)]
pub struct ScriptedAgent {
    script: VecDeque<String>,
    final_answer: String,
    /// Every observation the agent was shown, in order.
    pub transcript: Vec<String>,
    /// Every alert delivered to the agent, in order.
    pub alerts: Vec<String>,
}

impl ScriptedAgent {
    /// Creates an agent that runs the given commands and then finishes.
    #[must_use]
    pub fn new<I, S>(script: I, final_answer: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: script.into_iter().map(Into::into).collect(),
            final_answer: final_answer.into(),
            transcript: Vec::new(),
            alerts: Vec::new(),
        }
    }
}

#[async_trait]
impl MissionAgent for ScriptedAgent {
    async fn next_action(&mut self, observation: &str) -> Result<AgentAction> {
        self.transcript.push(observation.to_owned());
        Ok(self.script.pop_front().map_or_else(
            || AgentAction::Final(self.final_answer.clone()),
            AgentAction::Command,
        ))
    }

    async fn handle_alert(&mut self, alert: &str) -> Result<()> {
        self.alerts.push(alert.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_script_then_finishes() {
        let mut agent = ScriptedAgent::new(["get_alarms"], "mission complete");
        assert_eq!(
            agent.next_action("dashboard").await.unwrap(),
            AgentAction::Command("get_alarms".into())
        );
        assert_eq!(
            agent.next_action("No alarms set").await.unwrap(),
            AgentAction::Final("mission complete".into())
        );
        assert_eq!(agent.transcript.len(), 2);
    }
}
