use crate::builder::InboundEvent;
use crate::input::Action;
use crate::message::{InteractiveMessage, MenuWidget, Message, Section, filter_block_id};
use crate::state::{ActionValue, BlockActionStates, FieldTag};
use chrono::Local;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InputMode {
    Normal,
    Filter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    None,
    Dispatch(InboundEvent),
}

/// Terminal stand-in for a chat client: it shows the last message and reports widget
/// values back the same way a chat platform would.
#[derive(Debug, Clone)]
pub struct App {
    running: bool,
    mode: InputMode,
    show_help: bool,
    cluster: String,
    context: String,
    binary: String,
    status: String,
    input: String,
    message: Option<InteractiveMessage>,
    focus: usize,
    cursors: Vec<usize>,
    last_preview: Option<String>,
    last_update: Option<String>,
}

impl App {
    pub fn new(cluster: String, context: String, binary: String) -> Self {
        Self {
            running: true,
            mode: InputMode::Normal,
            show_help: false,
            cluster,
            context,
            binary,
            status: "Starting command builder".to_string(),
            input: String::new(),
            message: None,
            focus: 0,
            cursors: Vec::new(),
            last_preview: None,
            last_update: None,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn cursor(&self, menu_index: usize) -> usize {
        self.cursors.get(menu_index).copied().unwrap_or_default()
    }

    pub fn last_preview(&self) -> Option<&str> {
        self.last_preview.as_deref()
    }

    pub fn last_update(&self) -> Option<&str> {
        self.last_update.as_deref()
    }

    pub fn menus(&self) -> Vec<&MenuWidget> {
        self.message
            .as_ref()
            .map(|message| message.menus().collect())
            .unwrap_or_default()
    }

    pub fn filter_text(&self) -> Option<&str> {
        self.message
            .as_ref()?
            .sections
            .iter()
            .find_map(|section| match section {
                Section::FilterInput { initial, .. } => {
                    Some(initial.as_deref().unwrap_or_default())
                }
                _ => None,
            })
    }

    pub fn notice(&self) -> Option<&str> {
        self.message
            .as_ref()?
            .sections
            .iter()
            .find_map(|section| match section {
                Section::Notice { text } => Some(text.as_str()),
                _ => None,
            })
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn apply_message(&mut self, message: Message) {
        self.last_update = Some(Local::now().format("%H:%M:%S").to_string());
        let message = match message {
            Message::Interactive(message) => message,
            Message::Plaintext { text, .. } => {
                self.set_status(text);
                return;
            }
        };

        self.cursors = message
            .menus()
            .map(|widget| {
                widget
                    .menu
                    .initial
                    .as_ref()
                    .and_then(|initial| {
                        widget
                            .menu
                            .options
                            .iter()
                            .position(|option| option == initial)
                    })
                    .unwrap_or_default()
            })
            .collect();
        // jump to the first menu still waiting for a pick
        self.focus = message
            .menus()
            .position(|widget| widget.menu.initial.is_none())
            .unwrap_or_else(|| self.focus.min(self.cursors.len().saturating_sub(1)));

        self.last_preview = message.preview().map(str::to_string);
        let status = match (message.preview(), message.menus().nth(self.focus)) {
            (Some(preview), _) => format!("$ {preview}"),
            (None, Some(widget)) => widget.menu.placeholder.clone(),
            (None, None) => String::new(),
        };
        self.set_status(status);
        self.message = Some(message);
        if let Some(notice) = self.notice().map(str::to_string) {
            self.set_status(notice);
        }
    }

    /// The values a chat client would report: every menu's current pick plus the
    /// filter text, grouped by block.
    pub fn widget_values(&self) -> BlockActionStates {
        let mut states = BlockActionStates::default();
        let Some(message) = &self.message else {
            return states;
        };

        let block = states.values.entry(message.block_id.clone()).or_default();
        for widget in message.menus() {
            if let Some(initial) = &widget.menu.initial {
                block.insert(
                    widget.action_id.clone(),
                    ActionValue {
                        selected_option: Some(initial.clone()),
                        value: None,
                    },
                );
            }
        }

        for section in &message.sections {
            if let Section::FilterInput {
                block_id,
                action_id,
                initial: Some(text),
            } = section
            {
                states
                    .values
                    .entry(block_id.clone())
                    .or_default()
                    .insert(action_id.clone(), ActionValue::text(text.clone()));
            }
        }
        states
    }

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        if self.show_help && !matches!(action, Action::ToggleHelp) {
            self.show_help = false;
        }

        match action {
            Action::Quit => {
                self.running = false;
                AppCommand::None
            }
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
                AppCommand::None
            }
            Action::NextMenu => {
                self.move_focus(1);
                AppCommand::None
            }
            Action::PrevMenu => {
                self.move_focus(-1);
                AppCommand::None
            }
            Action::Down => {
                self.move_cursor(1);
                AppCommand::None
            }
            Action::Up => {
                self.move_cursor(-1);
                AppCommand::None
            }
            Action::Top => {
                self.move_cursor(isize::MIN);
                AppCommand::None
            }
            Action::Bottom => {
                self.move_cursor(isize::MAX);
                AppCommand::None
            }
            Action::Select => self.select_focused(),
            Action::Restart => {
                self.message = None;
                self.cursors.clear();
                self.focus = 0;
                self.set_status("Starting a new command");
                AppCommand::Dispatch(InboundEvent::start())
            }
            Action::StartFilter => {
                let Some(current) = self.filter_text() else {
                    self.set_status("Pick a command and a verb before filtering");
                    return AppCommand::None;
                };
                self.input = current.to_string();
                self.mode = InputMode::Filter;
                AppCommand::None
            }
            Action::SubmitInput => self.submit_filter(),
            Action::CancelInput => {
                self.mode = InputMode::Normal;
                self.input.clear();
                AppCommand::None
            }
            Action::Backspace => {
                self.input.pop();
                AppCommand::None
            }
            Action::InputChar(c) => {
                self.input.push(c);
                AppCommand::None
            }
        }
    }

    fn move_focus(&mut self, delta: isize) {
        let count = self.cursors.len();
        if count == 0 {
            return;
        }
        self.focus = (self.focus as isize + delta).rem_euclid(count as isize) as usize;
    }

    fn move_cursor(&mut self, delta: isize) {
        let Some(len) = self
            .menus()
            .get(self.focus)
            .map(|widget| widget.menu.options.len())
        else {
            return;
        };
        let Some(cursor) = self.cursors.get_mut(self.focus) else {
            return;
        };
        let max = len.saturating_sub(1) as isize;
        *cursor = (*cursor as isize).saturating_add(delta).clamp(0, max) as usize;
    }

    fn select_focused(&mut self) -> AppCommand {
        let cursor = self.cursor(self.focus);
        let Some((field, action_id, option)) = self.menus().get(self.focus).and_then(|widget| {
            widget
                .menu
                .options
                .get(cursor)
                .map(|option| (widget.menu.field, widget.action_id.clone(), option.clone()))
        }) else {
            return AppCommand::None;
        };

        if option.is_synthetic() {
            self.set_status(format!("{} is not selectable", option.label));
            return AppCommand::None;
        }

        let mut values = self.widget_values();
        if let Some(block_id) = self.message.as_ref().map(|message| message.block_id.clone()) {
            values.values.entry(block_id).or_default().insert(
                action_id,
                ActionValue {
                    selected_option: Some(option),
                    value: None,
                },
            );
        }
        AppCommand::Dispatch(InboundEvent::field(field, values))
    }

    fn submit_filter(&mut self) -> AppCommand {
        self.mode = InputMode::Normal;
        let text = std::mem::take(&mut self.input);
        let Some(block_id) = self.message.as_ref().map(|message| message.block_id.clone()) else {
            return AppCommand::None;
        };

        let mut values = self.widget_values();
        values
            .values
            .entry(filter_block_id(&block_id))
            .or_default()
            .insert(FieldTag::Filter.action_id(&self.binary), ActionValue::text(text));
        AppCommand::Dispatch(InboundEvent::field(FieldTag::Filter, values))
    }
}

#[cfg(test)]
mod tests {
    use super::{App, AppCommand, InputMode};
    use crate::builder::InboundEvent;
    use crate::input::Action;
    use crate::menu::{MenuOption, cmd_select, empty_resource_name_select, verb_select};
    use crate::message::{
        Delivery, InteractiveMessage, MenuWidget, Message, Section, filter_block_id,
    };
    use crate::state::{FieldTag, extract_state};

    fn app() -> App {
        App::new(
            "https://127.0.0.1:6443".to_string(),
            "kind-dev".to_string(),
            "kbcli".to_string(),
        )
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn verb_message() -> Message {
        let Some(root) = cmd_select(&strings(&["cluster", "kubeblocks"]), Some("cluster")) else {
            panic!("command menu must build");
        };
        let Some(verbs) = verb_select(&strings(&["list", "describe"]), None) else {
            panic!("verb menu must build");
        };
        let mut message =
            InteractiveMessage::new("block", "kbcli", root, Delivery::ReplaceOriginal);
        message.extra.push(MenuWidget {
            action_id: FieldTag::Verb.action_id("kbcli"),
            menu: verbs,
        });
        Message::Interactive(message)
    }

    fn dispatched(command: AppCommand) -> InboundEvent {
        match command {
            AppCommand::Dispatch(event) => event,
            AppCommand::None => panic!("expected a dispatched event"),
        }
    }

    #[test]
    fn message_focuses_first_unpicked_menu() {
        let mut app = app();

        app.apply_message(verb_message());

        assert_eq!(app.menus().len(), 2);
        assert_eq!(app.focus(), 1);
        assert_eq!(app.cursor(0), 0);
        assert_eq!(app.status(), "Select verb");
        assert!(app.last_update().is_some());
    }

    #[test]
    fn selecting_reports_all_current_values() {
        let mut app = app();
        app.apply_message(verb_message());

        app.apply_action(Action::Down);
        let event = dispatched(app.apply_action(Action::Select));

        assert_eq!(event.command, FieldTag::Verb.token());
        let state = extract_state(event.state.as_ref(), "kbcli");
        assert_eq!(state.block_id.as_deref(), Some("block"));
        assert_eq!(state.command(), "cluster");
        assert_eq!(state.verb(), "describe");
    }

    #[test]
    fn focus_wraps_around_menus() {
        let mut app = app();
        app.apply_message(verb_message());

        app.apply_action(Action::NextMenu);
        assert_eq!(app.focus(), 0);
        app.apply_action(Action::PrevMenu);
        assert_eq!(app.focus(), 1);
    }

    #[test]
    fn cursor_stays_inside_menu() {
        let mut app = app();
        app.apply_message(verb_message());

        app.apply_action(Action::Bottom);
        app.apply_action(Action::Down);
        assert_eq!(app.cursor(1), 1);
        app.apply_action(Action::Top);
        app.apply_action(Action::Up);
        assert_eq!(app.cursor(1), 0);
    }

    #[test]
    fn placeholder_options_are_not_dispatched() {
        let Some(root) = cmd_select(&strings(&["cluster"]), Some("cluster")) else {
            panic!("command menu must build");
        };
        let mut message =
            InteractiveMessage::new("block", "kbcli", root, Delivery::ReplaceOriginal);
        message.extra.push(MenuWidget {
            action_id: FieldTag::ResourceName.action_id("kbcli"),
            menu: empty_resource_name_select(),
        });
        let mut app = app();
        app.apply_message(Message::Interactive(message));

        assert_eq!(app.focus(), 1);
        assert_eq!(app.apply_action(Action::Select), AppCommand::None);
        assert!(app.status().ends_with("is not selectable"));
    }

    #[test]
    fn filter_submission_uses_separate_block() {
        let Some(root) = cmd_select(&strings(&["cluster"]), Some("cluster")) else {
            panic!("command menu must build");
        };
        let mut message =
            InteractiveMessage::new("block", "kbcli", root, Delivery::ReplaceOriginal);
        message.sections.push(Section::Preview {
            command: "kbcli cluster list".to_string(),
        });
        message.sections.push(Section::FilterInput {
            block_id: filter_block_id("block"),
            action_id: FieldTag::Filter.action_id("kbcli"),
            initial: None,
        });
        let mut app = app();
        app.apply_message(Message::Interactive(message));
        assert_eq!(app.last_preview(), Some("kbcli cluster list"));

        app.apply_action(Action::StartFilter);
        assert_eq!(app.mode(), InputMode::Filter);
        for c in "Running".chars() {
            app.apply_action(Action::InputChar(c));
        }
        let event = dispatched(app.apply_action(Action::SubmitInput));

        assert_eq!(app.mode(), InputMode::Normal);
        let state = extract_state(event.state.as_ref(), "kbcli");
        assert_eq!(state.block_id.as_deref(), Some("block"));
        assert_eq!(state.filter.as_deref(), Some("Running"));
    }

    #[test]
    fn preview_follows_the_latest_message() {
        let Some(root) = cmd_select(&strings(&["cluster"]), Some("cluster")) else {
            panic!("command menu must build");
        };
        let mut message =
            InteractiveMessage::new("block", "kbcli", root, Delivery::ReplaceOriginal);
        message.sections.push(Section::Preview {
            command: "kbcli cluster describe pg -n demo".to_string(),
        });
        let mut app = app();
        app.apply_message(Message::Interactive(message));
        assert_eq!(app.last_preview(), Some("kbcli cluster describe pg -n demo"));

        // switching command leaves the verb open again, so there is nothing to preview
        app.apply_message(verb_message());

        assert_eq!(app.last_preview(), None);
        assert_eq!(app.status(), "Select verb");
    }

    #[test]
    fn filter_needs_a_preview() {
        let mut app = app();
        app.apply_message(verb_message());

        assert_eq!(app.apply_action(Action::StartFilter), AppCommand::None);
        assert_eq!(app.mode(), InputMode::Normal);
    }

    #[test]
    fn plaintext_goes_to_status_and_keeps_menus() {
        let mut app = app();
        app.apply_message(verb_message());

        app.apply_message(Message::plaintext("Please specify the kbcli command"));

        assert_eq!(app.status(), "Please specify the kbcli command");
        assert_eq!(app.menus().len(), 2);
    }

    #[test]
    fn restart_requests_a_new_session() {
        let mut app = app();
        app.apply_message(verb_message());

        let event = dispatched(app.apply_action(Action::Restart));

        assert_eq!(event, InboundEvent::start());
        assert!(app.menus().is_empty());
    }

    #[test]
    fn widget_values_skip_menus_without_pick() {
        let mut app = app();
        app.apply_message(verb_message());

        let values = app.widget_values();

        let block = values.values.get("block").cloned().unwrap_or_default();
        assert_eq!(block.len(), 1);
        assert_eq!(
            block
                .get(&FieldTag::Command.action_id("kbcli"))
                .and_then(|value| value.selected_option.clone()),
            Some(MenuOption::plain("cluster"))
        );
    }
}
