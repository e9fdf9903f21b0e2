use crate::menu::MenuOption;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix shared by every interactive builder token.
pub const BUILDER_INDICATOR: &str = "@builder";

/// Logical field a widget stands for.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTag {
    Command,
    Verb,
    ResourceName,
    Namespace,
    Filter,
}

impl FieldTag {
    pub const ALL: [Self; 5] = [
        Self::Command,
        Self::Verb,
        Self::ResourceName,
        Self::Namespace,
        Self::Filter,
    ];

    /// Stable routing token, also used as the inbound command text for the field.
    pub fn token(self) -> &'static str {
        match self {
            Self::Command => "@builder --cmds",
            Self::Verb => "@builder --verbs",
            Self::ResourceName => "@builder --resource-name",
            Self::Namespace => "@builder --namespace",
            Self::Filter => "@builder --filter-query",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|tag| tag.token().eq_ignore_ascii_case(token))
    }

    /// Widget identifier: the routing token prefixed with the CLI binary name.
    pub fn action_id(self, binary: &str) -> String {
        format!("{binary} {}", self.token())
    }

    pub fn from_action_id(action_id: &str, binary: &str) -> Option<Self> {
        let stripped = action_id.strip_prefix(binary).unwrap_or(action_id);
        Self::from_token(stripped)
    }
}

/// Value reported for one widget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<MenuOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ActionValue {
    pub fn selected(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            selected_option: Some(MenuOption::new(value.clone(), value)),
            value: None,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            selected_option: None,
            value: Some(value.into()),
        }
    }
}

/// Widget values grouped by block (menu group) id, then by widget id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockActionStates {
    #[serde(default)]
    pub values: BTreeMap<String, BTreeMap<String, ActionValue>>,
}

/// Canonical snapshot of the user's choices, rebuilt for every inbound event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionState {
    pub block_id: Option<String>,
    pub command: Option<String>,
    pub verb: Option<String>,
    pub resource_name: Option<String>,
    pub namespace: Option<String>,
    pub filter: Option<String>,
}

impl SelectionState {
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or_default()
    }

    pub fn verb(&self) -> &str {
        self.verb.as_deref().unwrap_or_default()
    }

    pub fn clear_target(&mut self) {
        self.resource_name = None;
        self.namespace = None;
    }

    pub fn clear_after_command(&mut self) {
        self.verb = None;
        self.clear_target();
    }

    fn set(&mut self, field: FieldTag, value: Option<String>) {
        let slot = match field {
            FieldTag::Command => &mut self.command,
            FieldTag::Verb => &mut self.verb,
            FieldTag::ResourceName => &mut self.resource_name,
            FieldTag::Namespace => &mut self.namespace,
            FieldTag::Filter => &mut self.filter,
        };
        *slot = value;
    }
}

/// Turns raw widget values into a [`SelectionState`]. Missing input yields the empty state.
pub fn extract_state(states: Option<&BlockActionStates>, binary: &str) -> SelectionState {
    let Some(states) = states else {
        return SelectionState::default();
    };

    let mut selection = SelectionState::default();
    for (block_id, actions) in &states.values {
        // the filter input lives in its own block that is replaced independently
        if !block_id.contains(FieldTag::Filter.token()) {
            selection.block_id = Some(block_id.clone());
        }

        for (action_id, action) in actions {
            let Some(field) = FieldTag::from_action_id(action_id, binary) else {
                continue;
            };
            let raw = match field {
                FieldTag::Filter => action.value.clone(),
                _ => action
                    .selected_option
                    .as_ref()
                    .map(|option| option.value.clone()),
            };
            selection.set(field, raw.filter(|value| !value.trim().is_empty()));
        }
    }

    selection
}

#[cfg(test)]
mod tests {
    use super::{ActionValue, BlockActionStates, FieldTag, SelectionState, extract_state};
    use std::collections::BTreeMap;

    fn states(blocks: Vec<(&str, Vec<(String, ActionValue)>)>) -> BlockActionStates {
        BlockActionStates {
            values: blocks
                .into_iter()
                .map(|(block, actions)| {
                    (
                        block.to_string(),
                        actions.into_iter().collect::<BTreeMap<_, _>>(),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn missing_state_is_empty_selection() {
        assert_eq!(extract_state(None, "kbcli"), SelectionState::default());
        assert_eq!(
            extract_state(Some(&BlockActionStates::default()), "kbcli"),
            SelectionState::default()
        );
    }

    #[test]
    fn tokens_round_trip_through_action_ids() {
        for tag in FieldTag::ALL {
            assert_eq!(FieldTag::from_action_id(&tag.action_id("kbcli"), "kbcli"), Some(tag));
            assert_eq!(FieldTag::from_token(tag.token()), Some(tag));
        }
        assert_eq!(FieldTag::from_token("  @BUILDER --Verbs "), Some(FieldTag::Verb));
        assert_eq!(FieldTag::from_token("@builder --unknown"), None);
    }

    #[test]
    fn extracts_every_field_and_keeps_dropdown_block_id() {
        let bag = states(vec![
            (
                "0b8d2f3e-dropdowns",
                vec![
                    (
                        FieldTag::Command.action_id("kbcli"),
                        ActionValue::selected("cluster"),
                    ),
                    (FieldTag::Verb.action_id("kbcli"), ActionValue::selected("list")),
                    (
                        FieldTag::ResourceName.action_id("kbcli"),
                        ActionValue::selected("pg-main"),
                    ),
                    (
                        FieldTag::Namespace.action_id("kbcli"),
                        ActionValue::selected("demo"),
                    ),
                ],
            ),
            (
                "@builder --filter-query block",
                vec![(
                    FieldTag::Filter.action_id("kbcli"),
                    ActionValue::text("Running"),
                )],
            ),
        ]);

        let selection = extract_state(Some(&bag), "kbcli");

        assert_eq!(selection.block_id.as_deref(), Some("0b8d2f3e-dropdowns"));
        assert_eq!(selection.command(), "cluster");
        assert_eq!(selection.verb(), "list");
        assert_eq!(selection.resource_name.as_deref(), Some("pg-main"));
        assert_eq!(selection.namespace.as_deref(), Some("demo"));
        assert_eq!(selection.filter.as_deref(), Some("Running"));
    }

    #[test]
    fn unknown_widgets_and_blank_values_are_ignored() {
        let bag = states(vec![(
            "block",
            vec![
                ("kbcli @builder --other".to_string(), ActionValue::selected("x")),
                (FieldTag::Verb.action_id("kbcli"), ActionValue::selected("  ")),
                (FieldTag::Command.action_id("kbcli"), ActionValue::default()),
            ],
        )]);

        let selection = extract_state(Some(&bag), "kbcli");

        assert_eq!(selection.block_id.as_deref(), Some("block"));
        assert_eq!(selection.command, None);
        assert_eq!(selection.verb, None);
    }

    #[test]
    fn clearing_after_command_keeps_filter() {
        let mut selection = SelectionState {
            block_id: Some("block".to_string()),
            command: Some("cluster".to_string()),
            verb: Some("list".to_string()),
            resource_name: Some("pg".to_string()),
            namespace: Some("demo".to_string()),
            filter: Some("x".to_string()),
        };

        selection.clear_after_command();

        assert_eq!(selection.command(), "cluster");
        assert_eq!(selection.verb, None);
        assert_eq!(selection.resource_name, None);
        assert_eq!(selection.namespace, None);
        assert_eq!(selection.filter.as_deref(), Some("x"));
    }
}
