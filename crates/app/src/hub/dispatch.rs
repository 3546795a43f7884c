//! Command dispatch: hub side of the per-adapter mailboxes.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, timeout_at};

use shipsafe_domain::command::{Ack, Command, CommandFailure};
use shipsafe_domain::subsystem::Subsystem;

/// What an adapter answers for one command.
pub type CommandReply = Result<Ack, CommandFailure>;

/// A command plus the channel its outcome goes back on.
#[derive(Debug)]
pub struct CommandEnvelope {
    pub command: Command,
    pub reply: oneshot::Sender<CommandReply>,
}

/// Routes commands to the mailbox of the owning subsystem adapter.
#[derive(Debug, Default)]
pub struct CommandDispatcher {
    mailboxes: HashMap<Subsystem, mpsc::Sender<CommandEnvelope>>,
}

impl CommandDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the mailbox for `subsystem`, replacing any previous one.
    pub fn register(
        &mut self,
        subsystem: Subsystem,
        capacity: usize,
    ) -> mpsc::Receiver<CommandEnvelope> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        if self.mailboxes.insert(subsystem, sender).is_some() {
            tracing::warn!(%subsystem, "replaced existing command mailbox");
        }
        receiver
    }

    #[must_use]
    pub fn is_registered(&self, subsystem: Subsystem) -> bool {
        self.mailboxes.contains_key(&subsystem)
    }

    /// Submit `commands` in order, then await every reply against one
    /// deadline `timeout` from now.
    ///
    /// Outcomes come back in command order. A missing adapter is a
    /// rejection, a stopped adapter counts as offline and an expired
    /// deadline as a timeout.
    pub async fn dispatch(&self, commands: &[Command], timeout: Duration) -> Vec<CommandReply> {
        let deadline = Instant::now() + timeout;

        let mut pending = Vec::with_capacity(commands.len());
        for command in commands {
            pending.push(self.submit(command, deadline).await);
        }

        let mut outcomes = Vec::with_capacity(commands.len());
        for (command, submitted) in commands.iter().zip(pending) {
            let outcome = match submitted {
                Err(failure) => Err(failure),
                Ok(reply) => match timeout_at(deadline, reply).await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(_)) => Err(CommandFailure::device_offline(format!(
                        "{} adapter dropped the command",
                        command.subsystem()
                    ))),
                    Err(_) => Err(CommandFailure::timeout(format!(
                        "no acknowledgment within {}ms",
                        timeout.as_millis()
                    ))),
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn submit(
        &self,
        command: &Command,
        deadline: Instant,
    ) -> Result<oneshot::Receiver<CommandReply>, CommandFailure> {
        let subsystem = command.subsystem();
        let Some(mailbox) = self.mailboxes.get(&subsystem) else {
            return Err(CommandFailure::rejected(format!(
                "no {subsystem} adapter registered"
            )));
        };
        let (reply, receiver) = oneshot::channel();
        let envelope = CommandEnvelope {
            command: command.clone(),
            reply,
        };
        match timeout_at(deadline, mailbox.send(envelope)).await {
            Ok(Ok(())) => Ok(receiver),
            Ok(Err(_)) => Err(CommandFailure::device_offline(format!(
                "{subsystem} adapter is not running"
            ))),
            Err(_) => Err(CommandFailure::timeout(format!(
                "{subsystem} mailbox stayed full"
            ))),
        }
    }
}
