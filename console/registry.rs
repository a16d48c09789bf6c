//! Command dispatch surface and the named-command registry.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::buffer::OutputBuffer;

/// Executes one command line, capturing all output in the buffer.
///
/// Every invocation completes with buffered text, success or failure; no
/// error ever crosses this boundary as anything but output lines.
#[async_trait]
pub trait CommandSurface: Send + Sync {
    /// Runs the given line against the surface.
    async fn execute(&self, line: &str, out: &mut OutputBuffer);
}

/// One named operation behind the registry.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Runs the handler with the remainder of the command line as arguments.
    async fn run(&self, args: &str, out: &mut OutputBuffer) -> Result<()>;
}

/// Adapter turning a synchronous closure into a [`CommandHandler`].
pub struct FnCommand<F>(pub F);

#[async_trait]
impl<F> CommandHandler for FnCommand<F>
where
    F: Fn(&str, &mut OutputBuffer) -> Result<()> + Send + Sync,
{
    async fn run(&self, args: &str, out: &mut OutputBuffer) -> Result<()> {
        (self.0)(args, out)
    }
}

struct CommandEntry {
    help: String,
    handler: Arc<dyn CommandHandler>,
}

/// Insertion-ordered registry mapping command name to handler.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    entries: Arc<RwLock<IndexMap<String, CommandEntry>>>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a named command.
    pub fn register(
        &self,
        name: impl Into<String>,
        help: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) {
        self.entries.write().insert(
            name.into(),
            CommandEntry {
                help: help.into(),
                handler,
            },
        );
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no commands are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Writes the command listing into the buffer.
    pub fn render_help(&self, out: &mut OutputBuffer) {
        out.push("Available commands:");
        for (name, entry) in self.entries.read().iter() {
            out.push(format!("  {name} - {}", entry.help));
        }
        out.push("  help - List available commands");
    }
}

#[async_trait]
impl CommandSurface for CommandRegistry {
    async fn execute(&self, line: &str, out: &mut OutputBuffer) {
        let line = line.trim();
        if line.is_empty() {
            out.push_error("empty command");
            return;
        }
        let (name, args) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(name, rest)| (name, rest.trim()));

        if name == "help" {
            self.render_help(out);
            return;
        }

        // Clone the handler out so the lock is not held across the await.
        let handler = self
            .entries
            .read()
            .get(name)
            .map(|entry| Arc::clone(&entry.handler));

        match handler {
            Some(handler) => {
                if let Err(err) = handler.run(args, out).await {
                    out.push_error(err);
                }
            }
            None => out.push_error(format!("unknown command '{name}', type 'help' for a listing")),
        }
    }
}
