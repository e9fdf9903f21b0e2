use crate::guard::{Command, CommandGuard, ResourceCatalogue};
use crate::k8s::NamespaceLister;
use crate::menu::{
    DROPDOWN_ITEMS_LIMIT, Menu, MenuOption, cmd_select, empty_resource_name_select,
    namespace_select, resource_names_select, verb_select,
};
use crate::runner::CommandRunner;
use crate::state::SelectionState;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const DEFAULT_NAMESPACE_NAME: &str = "default";
const DEFAULT_NAMESPACE_SUFFIX: &str = " (namespace)";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("command dropdown select cannot be empty")]
    RequiredMenuEmpty,
}

/// Literal command line shown to the user, rebuilt on every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPreview {
    binary: String,
    args: Vec<String>,
}

impl CommandPreview {
    /// `command verb [resourceName] [-n namespace] [--filter="text"]`
    pub fn build(binary: &str, command: &Command, state: &SelectionState) -> Self {
        let mut args = vec![command.name.clone()];
        args.extend(state.verb.iter().cloned());
        args.extend(state.resource_name.iter().cloned());

        if command.namespaced
            && let Some(namespace) = &state.namespace
        {
            args.push("-n".to_string());
            args.push(namespace.clone());
        }

        if let Some(filter) = &state.filter {
            args.push(format!("--filter={filter:?}"));
        }

        Self {
            binary: binary.to_string(),
            args,
        }
    }

    /// The command line without the binary name.
    pub fn args_line(&self) -> String {
        self.args.join(" ")
    }
}

impl Display for CommandPreview {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.args.is_empty() {
            return write!(f, "{}", self.binary);
        }
        write!(f, "{} {}", self.binary, self.args_line())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMenus {
    pub resources: Menu,
    pub namespaces: Menu,
}

/// Result of one cascade pass. `state` is the selection after invalid fields were cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// No command picked yet, or the command takes no verb.
    RootOnly {
        state: SelectionState,
        commands: Menu,
        preview: Option<CommandPreview>,
    },
    /// The command takes a verb and none of its verbs is selected.
    NeedsVerb {
        state: SelectionState,
        commands: Menu,
        verbs: Menu,
    },
    /// Resource and namespace menus are shown, no resource name is selected.
    NeedsResource {
        state: SelectionState,
        commands: Menu,
        verbs: Menu,
        targets: TargetMenus,
        preview: CommandPreview,
    },
    /// Nothing left to pick: either a resource name is selected or the command has no
    /// resource kind (`targets` is `None`).
    Complete {
        state: SelectionState,
        commands: Menu,
        verbs: Menu,
        targets: Option<TargetMenus>,
        preview: CommandPreview,
    },
}

impl RenderOutcome {
    pub fn state(&self) -> &SelectionState {
        match self {
            Self::RootOnly { state, .. }
            | Self::NeedsVerb { state, .. }
            | Self::NeedsResource { state, .. }
            | Self::Complete { state, .. } => state,
        }
    }

    pub fn root(&self) -> &Menu {
        match self {
            Self::RootOnly { commands, .. }
            | Self::NeedsVerb { commands, .. }
            | Self::NeedsResource { commands, .. }
            | Self::Complete { commands, .. } => commands,
        }
    }

    /// Menus after the root one, in display order.
    pub fn extra_menus(&self) -> Vec<&Menu> {
        match self {
            Self::RootOnly { .. } => Vec::new(),
            Self::NeedsVerb { verbs, .. } => vec![verbs],
            Self::NeedsResource { verbs, targets, .. } => {
                vec![verbs, &targets.resources, &targets.namespaces]
            }
            Self::Complete { verbs, targets, .. } => {
                let mut menus = vec![verbs];
                if let Some(targets) = targets {
                    menus.push(&targets.resources);
                    menus.push(&targets.namespaces);
                }
                menus
            }
        }
    }

    pub fn preview(&self) -> Option<&CommandPreview> {
        match self {
            Self::RootOnly { preview, .. } => preview.as_ref(),
            Self::NeedsVerb { .. } => None,
            Self::NeedsResource { preview, .. } | Self::Complete { preview, .. } => Some(preview),
        }
    }
}

/// Settings the renderer needs besides its collaborators.
#[derive(Debug, Clone, Default)]
pub struct RenderSettings {
    pub binary: String,
    pub default_namespace: String,
    pub allowed_namespaces: Vec<String>,
    pub kubeconfig: Option<PathBuf>,
}

/// Computes the menus and preview for a selection.
///
/// The renderer holds no per-session state: the same selection and the same
/// collaborator answers always produce the same outcome.
#[derive(Clone)]
pub struct SelectionRenderer {
    guard: CommandGuard,
    runner: Arc<dyn CommandRunner>,
    lister: Arc<dyn NamespaceLister>,
    catalogue: Option<ResourceCatalogue>,
    settings: RenderSettings,
}

impl SelectionRenderer {
    pub fn new(
        guard: CommandGuard,
        runner: Arc<dyn CommandRunner>,
        lister: Arc<dyn NamespaceLister>,
        settings: RenderSettings,
    ) -> Self {
        Self {
            guard,
            runner,
            lister,
            catalogue: None,
            settings,
        }
    }

    /// Live catalogue used to resolve command namespacing instead of the static table.
    pub fn with_catalogue(mut self, catalogue: ResourceCatalogue) -> Self {
        self.catalogue = Some(catalogue);
        self
    }

    pub fn binary(&self) -> &str {
        &self.settings.binary
    }

    pub async fn render(
        &self,
        allowed_cmds: &[String],
        mut state: SelectionState,
    ) -> Result<RenderOutcome, RenderError> {
        if state
            .command
            .as_ref()
            .is_some_and(|cmd| !allowed_cmds.contains(cmd))
        {
            state.command = None;
        }

        let commands = cmd_select(allowed_cmds, state.command.as_deref())
            .ok_or(RenderError::RequiredMenuEmpty)?;

        let Some(cmd) = state.command.clone() else {
            state.clear_after_command();
            return Ok(RenderOutcome::RootOnly {
                state,
                commands,
                preview: None,
            });
        };
        let command = self.guard.resolve_command(&cmd, self.catalogue.as_ref());

        // 1. Commands without verbs render only the command menu and a preview.
        let Some(verbs) = self
            .guard
            .allowed_verbs_for_cmd(&cmd)
            .and_then(|verbs| verb_select(verbs, state.verb.as_deref()))
        else {
            state.clear_after_command();
            let preview = CommandPreview::build(&self.settings.binary, &command, &state);
            return Ok(RenderOutcome::RootOnly {
                state,
                commands,
                preview: Some(preview),
            });
        };

        // 2. Without a valid verb the resource kind and its scope are unknown.
        if !state.verb.as_deref().is_some_and(|verb| verbs.contains_value(verb)) {
            state.clear_after_command();
            return Ok(RenderOutcome::NeedsVerb {
                state,
                commands,
                verbs,
            });
        }

        if state.namespace.is_none() && !self.settings.default_namespace.is_empty() {
            state.namespace = Some(self.settings.default_namespace.clone());
        }

        // 3. Commands without a resource kind are complete once the verb is known.
        let Some(resources) = self.resolve_resource_names(&state).await else {
            state.clear_target();
            let preview = CommandPreview::build(&self.settings.binary, &command, &state);
            return Ok(RenderOutcome::Complete {
                state,
                commands,
                verbs,
                targets: None,
                preview,
            });
        };
        let namespaces = self.resolve_namespaces(&state).await;

        // 4. Drop selections that are no longer offered.
        if !state
            .resource_name
            .as_deref()
            .is_some_and(|name| resources.contains_value(name))
        {
            state.resource_name = None;
        }
        if !state
            .namespace
            .as_deref()
            .is_some_and(|namespace| namespaces.contains_value(namespace))
        {
            state.namespace = None;
        }

        let preview = CommandPreview::build(&self.settings.binary, &command, &state);
        let targets = TargetMenus {
            resources,
            namespaces,
        };
        if state.resource_name.is_some() {
            return Ok(RenderOutcome::Complete {
                state,
                commands,
                verbs,
                targets: Some(targets),
                preview,
            });
        }

        Ok(RenderOutcome::NeedsResource {
            state,
            commands,
            verbs,
            targets,
            preview,
        })
    }

    /// `None` means the command has no resource kind; an empty menu means no names are
    /// available right now.
    async fn resolve_resource_names(&self, state: &SelectionState) -> Option<Menu> {
        if state.verb.is_none() {
            debug!("no verb selected, rendering empty resource name menu");
            return Some(empty_resource_name_select());
        }

        let resource = self.guard.resource_for_cmd(state.command())?;
        let mut command_line = resource_names_query(&resource.name);
        if let Some(namespace) = &state.namespace {
            command_line = format!("{command_line} -n {namespace}");
        }
        info!(command = %command_line, "listing resource names");

        let output = match self
            .runner
            .run_command(
                self.settings.kubeconfig.as_deref(),
                &self.settings.default_namespace,
                &command_line,
            )
            .await
        {
            Ok(output) => output,
            Err(error) => {
                warn!(
                    error = %format!("{error:#}"),
                    "cannot fetch resource names, rendering empty resource name menu"
                );
                return Some(empty_resource_name_select());
            }
        };

        Some(resource_names_select(
            non_empty_lines(&output),
            state.resource_name.as_deref(),
        ))
    }

    async fn resolve_namespaces(&self, state: &SelectionState) -> Menu {
        let initial = state.namespace.as_deref();
        let mut options = initial.map(namespace_option).into_iter().collect::<Vec<_>>();

        for name in self.collect_additional_namespaces().await {
            if Some(name.as_str()) == initial {
                continue;
            }
            options.push(MenuOption::plain(name));
        }

        namespace_select(options, initial)
    }

    async fn collect_additional_namespaces(&self) -> Vec<String> {
        if !self.settings.allowed_namespaces.is_empty() {
            return self.settings.allowed_namespaces.clone();
        }

        match self.lister.list_namespaces(DROPDOWN_ITEMS_LIMIT).await {
            Ok(namespaces) => namespaces,
            Err(error) => {
                warn!(
                    error = %format!("{error:#}"),
                    "cannot list namespaces, offering only the current one"
                );
                Vec::new()
            }
        }
    }
}

/// Cluster query printing one resource name per line.
pub fn resource_names_query(kind: &str) -> String {
    format!(
        r#"get {kind} --ignore-not-found=true -o go-template='{{{{range .items}}}}{{{{.metadata.name}}}}{{{{"\n"}}}}{{{{end}}}}'"#
    )
}

fn namespace_option(name: &str) -> MenuOption {
    if name == DEFAULT_NAMESPACE_NAME {
        return MenuOption::new(format!("{name}{DEFAULT_NAMESPACE_SUFFIX}"), name);
    }
    MenuOption::plain(name)
}

fn non_empty_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
