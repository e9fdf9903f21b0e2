use crate::guard::{CommandGuard, GuardError};
use crate::menu::cmd_select;
use crate::message::{Delivery, InteractiveMessage, Message};
use crate::render::{RenderError, SelectionRenderer};
use crate::state::{BUILDER_INDICATOR, BlockActionStates, FieldTag, extract_state};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Guard(#[from] GuardError),
}

/// One interaction delivered by a host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InboundEvent {
    /// Routing text, e.g. `@builder --verbs`. Empty text starts a new session.
    #[serde(default)]
    pub command: String,
    #[serde(default = "default_interactive")]
    pub interactive: bool,
    #[serde(default)]
    pub state: Option<BlockActionStates>,
}

impl InboundEvent {
    pub fn start() -> Self {
        Self {
            command: String::new(),
            interactive: true,
            state: None,
        }
    }

    pub fn field(field: FieldTag, state: BlockActionStates) -> Self {
        Self {
            command: field.token().to_string(),
            interactive: true,
            state: Some(state),
        }
    }
}

fn default_interactive() -> bool {
    true
}

/// Routes inbound events through state extraction and the render cascade.
#[derive(Clone)]
pub struct CommandBuilder {
    guard: CommandGuard,
    renderer: SelectionRenderer,
    allowed_cmds: Vec<String>,
}

impl CommandBuilder {
    pub fn new(
        guard: CommandGuard,
        renderer: SelectionRenderer,
        allowed_cmds: Vec<String>,
    ) -> Self {
        Self {
            guard,
            renderer,
            allowed_cmds,
        }
    }

    /// Empty text or text addressed to the builder.
    pub fn should_handle(text: &str) -> bool {
        let text = text.trim();
        text.is_empty() || text.starts_with(BUILDER_INDICATOR)
    }

    pub fn binary(&self) -> &str {
        self.renderer.binary()
    }

    pub async fn handle(&self, event: &InboundEvent) -> Result<Message, BuilderError> {
        if !event.interactive {
            debug!("interactive command builder is not supported, requesting a full command");
            return Ok(Message::plaintext(format!(
                "Please specify the {} command",
                self.binary()
            )));
        }

        let cmds = self.guard.filter_supported_cmds(&self.allowed_cmds);
        if cmds.is_empty() {
            return Ok(Message::plaintext(format!(
                "Unfortunately none of the configured {:?} commands are supported by the interactive command builder.",
                self.allowed_cmds.join(",")
            )));
        }

        let args = event.command.split_whitespace().collect::<Vec<_>>();
        if args.len() < 2 {
            return self.initial_message(&cmds);
        }
        let trigger = format!("{} {}", args[0], args[1]);

        let mut state = extract_state(event.state.as_ref(), self.binary());
        debug!(
            command = ?state.command,
            verb = ?state.verb,
            resource_name = ?state.resource_name,
            namespace = ?state.namespace,
            "extracted builder state"
        );

        let routed = match FieldTag::from_token(&trigger) {
            Some(FieldTag::Command) => {
                let allowed = state
                    .command
                    .as_deref()
                    .map_or(Ok(()), |cmd| self.guard.ensure_allowed_cmd(cmd, &cmds));
                if allowed.is_ok() {
                    // a new command invalidates everything picked for the previous one
                    state.clear_after_command();
                }
                allowed
            }
            Some(FieldTag::Verb) => {
                info!("selecting verb");
                state.resource_name = None;
                Ok(())
            }
            Some(FieldTag::Namespace) => {
                // the resource name may not exist in the new namespace
                state.resource_name = None;
                Ok(())
            }
            Some(FieldTag::ResourceName | FieldTag::Filter) => Ok(()),
            None => Err(GuardError::CmdNotSupported(trigger.clone())),
        };

        match routed {
            Ok(()) => {}
            Err(GuardError::CmdNotSupported(unsupported)) => {
                return Ok(unsupported_message(self.binary(), &cmds, &unsupported));
            }
            Err(err) => return Err(err.into()),
        }

        let block_id = state
            .block_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let outcome = self
            .renderer
            .render(&cmds, state)
            .await
            .inspect_err(|err| error!(error = %err, "cannot render the command builder"))?;

        Ok(Message::Interactive(InteractiveMessage::from_outcome(
            block_id,
            self.binary(),
            &outcome,
        )))
    }

    /// Starts a session under a fresh block id. Hosts keep widget state per block id,
    /// so every later update must reuse it.
    fn initial_message(&self, cmds: &[String]) -> Result<Message, BuilderError> {
        let root = cmd_select(cmds, None).ok_or(RenderError::RequiredMenuEmpty)?;
        Ok(Message::Interactive(InteractiveMessage::new(
            Uuid::new_v4().to_string(),
            self.binary(),
            root,
            Delivery::NewEphemeral,
        )))
    }
}

fn unsupported_message(binary: &str, cmds: &[String], unsupported: &str) -> Message {
    let Some(root) = cmd_select(cmds, None) else {
        return Message::plaintext(format!("{binary} command builder has no commands to offer"));
    };

    Message::Interactive(
        InteractiveMessage::new(
            Uuid::new_v4().to_string(),
            binary,
            root,
            Delivery::ReplaceOriginal,
        )
        .with_notice(format!(
            "❗ Unfortunately, interactive command builder doesn't support {unsupported:?} command yet. Supported commands: {}.",
            cmds.join(", ")
        )),
    )
}
