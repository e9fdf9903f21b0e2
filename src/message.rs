use crate::menu::Menu;
use crate::render::RenderOutcome;
use crate::state::FieldTag;
use serde::Serialize;

/// How the host should deliver an interactive message.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Replace the previous interactive message of the same session.
    ReplaceOriginal,
    /// Send a brand-new message visible only to the requesting user.
    NewEphemeral,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct MenuWidget {
    pub action_id: String,
    #[serde(flatten)]
    pub menu: Menu,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Section {
    Preview {
        command: String,
    },
    FilterInput {
        block_id: String,
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial: Option<String>,
    },
    Notice {
        text: String,
    },
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct InteractiveMessage {
    /// Id of the dropdown block; hosts must keep it stable for the whole session.
    pub block_id: String,
    pub delivery: Delivery,
    pub root: MenuWidget,
    pub extra: Vec<MenuWidget>,
    pub sections: Vec<Section>,
}

impl InteractiveMessage {
    pub fn new(block_id: impl Into<String>, binary: &str, root: Menu, delivery: Delivery) -> Self {
        Self {
            block_id: block_id.into(),
            delivery,
            root: widget(binary, root),
            extra: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub fn from_outcome(
        block_id: impl Into<String>,
        binary: &str,
        outcome: &RenderOutcome,
    ) -> Self {
        let block_id = block_id.into();
        let mut message = Self::new(
            block_id.clone(),
            binary,
            outcome.root().clone(),
            Delivery::ReplaceOriginal,
        );
        message.extra = outcome
            .extra_menus()
            .into_iter()
            .map(|menu| widget(binary, menu.clone()))
            .collect();

        if let Some(preview) = outcome.preview() {
            message.sections.push(Section::Preview {
                command: preview.to_string(),
            });
            message.sections.push(Section::FilterInput {
                block_id: filter_block_id(&block_id),
                action_id: FieldTag::Filter.action_id(binary),
                initial: outcome.state().filter.clone(),
            });
        }
        message
    }

    pub fn with_notice(mut self, text: impl Into<String>) -> Self {
        self.sections.push(Section::Notice { text: text.into() });
        self
    }

    /// Root menu first, then the extra ones.
    pub fn menus(&self) -> impl Iterator<Item = &MenuWidget> {
        std::iter::once(&self.root).chain(self.extra.iter())
    }

    pub fn preview(&self) -> Option<&str> {
        self.sections.iter().find_map(|section| match section {
            Section::Preview { command } => Some(command.as_str()),
            _ => None,
        })
    }
}

/// A render result handed to the host.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Interactive(InteractiveMessage),
    Plaintext {
        text: String,
        only_visible_for_you: bool,
    },
}

impl Message {
    pub fn plaintext(text: impl Into<String>) -> Self {
        Self::Plaintext {
            text: text.into(),
            only_visible_for_you: true,
        }
    }
}

/// The filter input lives in its own block; its id embeds the filter token so state
/// extraction can tell it apart from the dropdown block.
pub fn filter_block_id(block_id: &str) -> String {
    format!("{} {block_id}", FieldTag::Filter.token())
}

fn widget(binary: &str, menu: Menu) -> MenuWidget {
    MenuWidget {
        action_id: menu.field.action_id(binary),
        menu,
    }
}
