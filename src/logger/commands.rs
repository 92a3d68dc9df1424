//! Admin command execution

use std::sync::Arc;

use super::{ChatLogger, Handle};
use crate::command::{join_reply, leave_reply, Command};
use crate::protocol::{ChatConnection, ConnectionFactory, Message};

impl<F: ConnectionFactory> ChatLogger<F> {
    /// Execute a control-channel message and reply on the shard it came from
    ///
    /// Messages from non-admins (unless privileged), unknown verbs and
    /// malformed commands are ignored without a reply.
    pub(crate) async fn run_command(self: &Arc<Self>, handle: &Handle<F>, msg: &Message) {
        if !self.admins.authorizes(msg) {
            tracing::trace!(nick = %msg.nick, "Ignoring command from non-admin");
            return;
        }
        let Some(command) = Command::parse(&msg.text) else {
            return;
        };

        tracing::info!(
            nick = %msg.nick,
            kind = %msg.kind,
            shard = handle.id(),
            command = ?command,
            "Running command"
        );

        let reply = match &command {
            Command::Join(channel) => {
                let result = self.join(channel, true).await;
                join_reply(channel, &result)
            }
            Command::Leave(channel) => {
                let result = self.leave(channel).await;
                Some(leave_reply(channel, &result))
            }
        };

        if let Some(reply) = reply {
            handle.connection().send(&msg.channel, &reply).await;
        }
    }
}
