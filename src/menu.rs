use crate::state::FieldTag;
use serde::{Deserialize, Serialize};

/// Hard cap on real options rendered in one menu.
pub const DROPDOWN_ITEMS_LIMIT: usize = 100;

/// Value of the placeholder option shown when a leaf menu has nothing to offer.
pub const EMPTY_CHOICE_VALUE: &str = "@builder --empty";

/// Value of the trailing option that reports truncated items. Resource names can't
/// contain `@` or spaces, so this never collides with real data.
pub const TRUNCATED_VALUE: &str = "@builder --truncated";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    pub label: String,
    pub value: String,
}

impl MenuOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    pub fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self::new(value.clone(), value)
    }

    /// Placeholder and truncation entries are not selectable data.
    pub fn is_synthetic(&self) -> bool {
        self.value == EMPTY_CHOICE_VALUE || self.value == TRUNCATED_VALUE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Menu {
    pub field: FieldTag,
    pub placeholder: String,
    pub options: Vec<MenuOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<MenuOption>,
}

impl Menu {
    /// True when `value` is a real (non-synthetic) option of this menu.
    pub fn contains_value(&self, value: &str) -> bool {
        self.options
            .iter()
            .any(|option| !option.is_synthetic() && option.value == value)
    }

    pub fn selected_value(&self) -> Option<&str> {
        self.initial.as_ref().map(|option| option.value.as_str())
    }

    pub fn is_empty_choice(&self) -> bool {
        self.options.iter().all(MenuOption::is_synthetic)
    }
}

/// Builds a bounded menu. Returns `None` for an empty item list; the initial option is
/// kept only if it is one of the rendered real options.
pub fn build_menu(
    field: FieldTag,
    placeholder: impl Into<String>,
    items: Vec<MenuOption>,
    initial: Option<&str>,
) -> Option<Menu> {
    if items.is_empty() {
        return None;
    }

    let options = cap_options(items);
    let initial = initial.and_then(|value| {
        options
            .iter()
            .find(|option| !option.is_synthetic() && option.value == value)
            .cloned()
    });

    Some(Menu {
        field,
        placeholder: placeholder.into(),
        options,
        initial,
    })
}

pub fn empty_choice_menu(field: FieldTag, placeholder: impl Into<String>, label: &str) -> Menu {
    Menu {
        field,
        placeholder: placeholder.into(),
        options: vec![MenuOption::new(label, EMPTY_CHOICE_VALUE)],
        initial: None,
    }
}

pub fn cmd_select(cmds: &[String], selected: Option<&str>) -> Option<Menu> {
    build_menu(
        FieldTag::Command,
        "Select command",
        cmds.iter().cloned().map(MenuOption::plain).collect(),
        selected,
    )
}

pub fn verb_select(verbs: &[String], selected: Option<&str>) -> Option<Menu> {
    build_menu(
        FieldTag::Verb,
        "Select verb",
        verbs.iter().cloned().map(MenuOption::plain).collect(),
        selected,
    )
}

pub fn resource_names_select(names: Vec<String>, selected: Option<&str>) -> Menu {
    build_menu(
        FieldTag::ResourceName,
        "Select resource name",
        names.into_iter().map(MenuOption::plain).collect(),
        selected,
    )
    .unwrap_or_else(empty_resource_name_select)
}

pub fn empty_resource_name_select() -> Menu {
    empty_choice_menu(
        FieldTag::ResourceName,
        "Select resource name",
        "No resources found",
    )
}

pub fn namespace_select(options: Vec<MenuOption>, initial: Option<&str>) -> Menu {
    build_menu(FieldTag::Namespace, "Select namespace", options, initial).unwrap_or_else(|| {
        empty_choice_menu(FieldTag::Namespace, "Select namespace", "No namespaces found")
    })
}

fn cap_options(mut items: Vec<MenuOption>) -> Vec<MenuOption> {
    if items.len() <= DROPDOWN_ITEMS_LIMIT {
        return items;
    }

    let hidden = items.len() - DROPDOWN_ITEMS_LIMIT;
    items.truncate(DROPDOWN_ITEMS_LIMIT);
    let noun = if hidden == 1 { "item" } else { "items" };
    items.push(MenuOption::new(
        format!("… and {hidden} more {noun} not shown"),
        TRUNCATED_VALUE,
    ));
    items
}

#[cfg(test)]
mod tests {
    use super::{
        DROPDOWN_ITEMS_LIMIT, MenuOption, TRUNCATED_VALUE, build_menu, cmd_select,
        empty_resource_name_select, namespace_select, resource_names_select,
    };
    use crate::state::FieldTag;
    use proptest::prelude::*;

    fn names(count: usize) -> Vec<String> {
        (0..count).map(|idx| format!("pg-{idx:03}")).collect()
    }

    #[test]
    fn empty_items_build_no_menu() {
        assert!(build_menu(FieldTag::Verb, "Select verb", Vec::new(), None).is_none());
        assert!(cmd_select(&[], Some("cluster")).is_none());
    }

    #[test]
    fn initial_option_must_be_among_options() {
        let cmds = vec!["cluster".to_string(), "kubeblocks".to_string()];

        let menu = cmd_select(&cmds, Some("kubeblocks"));
        assert_eq!(
            menu.as_ref().and_then(|menu| menu.selected_value()),
            Some("kubeblocks")
        );

        let menu = cmd_select(&cmds, Some("addon"));
        assert_eq!(menu.as_ref().and_then(|menu| menu.selected_value()), None);
    }

    #[test]
    fn long_lists_gain_one_truncation_notice() {
        let menu = resource_names_select(names(250), None);

        assert_eq!(menu.options.len(), DROPDOWN_ITEMS_LIMIT + 1);
        let notice = &menu.options[DROPDOWN_ITEMS_LIMIT];
        assert_eq!(notice.value, TRUNCATED_VALUE);
        assert_eq!(notice.label, "… and 150 more items not shown");
        assert!(!menu.contains_value(TRUNCATED_VALUE));
        assert!(menu.contains_value("pg-099"));
        assert!(!menu.contains_value("pg-100"));
    }

    #[test]
    fn truncated_selection_is_dropped() {
        let menu = resource_names_select(names(150), Some("pg-120"));

        assert_eq!(menu.selected_value(), None);
    }

    #[test]
    fn empty_resource_menu_is_present_but_empty() {
        let menu = resource_names_select(Vec::new(), Some("pg"));

        assert_eq!(menu, empty_resource_name_select());
        assert!(menu.is_empty_choice());
        assert!(!menu.contains_value("pg"));
    }

    #[test]
    fn namespace_menu_falls_back_to_placeholder() {
        let menu = namespace_select(Vec::new(), None);
        assert!(menu.is_empty_choice());

        let menu = namespace_select(
            vec![
                MenuOption::new("default (namespace)", "default"),
                MenuOption::plain("demo"),
            ],
            Some("default"),
        );
        assert_eq!(menu.selected_value(), Some("default"));
        assert!(!menu.is_empty_choice());
    }

    proptest! {
        #[test]
        fn menus_never_exceed_the_cap_plus_notice(count in 1usize..400) {
            let menu = resource_names_select(names(count), None);
            let real = menu.options.iter().filter(|option| !option.is_synthetic()).count();
            let synthetic = menu.options.len() - real;

            prop_assert_eq!(real, count.min(DROPDOWN_ITEMS_LIMIT));
            prop_assert_eq!(synthetic, usize::from(count > DROPDOWN_ITEMS_LIMIT));
        }
    }
}
