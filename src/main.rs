mod app;
mod builder;
mod cli;
mod config;
mod discovery;
mod guard;
mod input;
mod k8s;
mod menu;
mod message;
mod policy;
mod render;
mod runner;
mod state;
mod stdio;
mod ui;

use anyhow::{Context, Result};
use app::{App, AppCommand};
use builder::{CommandBuilder, InboundEvent};
use clap::Parser;
use cli::CliArgs;
use config::BuilderConfig;
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use discovery::{NoDiscovery, ResourceDiscovery};
use futures::StreamExt;
use guard::CommandGuard;
use k8s::{KubeGateway, NamespaceLister, NoNamespaces};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use render::{RenderSettings, SelectionRenderer};
use runner::BinaryRunner;
use std::fs::File;
use std::io::{self, Stdout};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;
const CATALOGUE_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);
const FALLBACK_NAMESPACE: &str = "default";

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter, args.log_file.as_deref(), args.stdio)?;

    let config = BuilderConfig::load(args.config.as_deref())?;
    if let Some(source) = &config.source {
        info!(config = %source.display(), "loaded builder config");
    }

    let kubeconfig = config.runner.kubeconfig_path();
    let gateway = if args.offline {
        None
    } else {
        match KubeGateway::connect(kubeconfig.as_deref()).await {
            Ok(gateway) => Some(gateway),
            Err(error) => {
                warn!(error = %format!("{error:#}"), "cannot reach the cluster, running offline");
                None
            }
        }
    };

    let default_namespace = resolve_default_namespace(&args, &config, gateway.as_ref());
    let (discovery, lister): (Arc<dyn ResourceDiscovery>, Arc<dyn NamespaceLister>) =
        match &gateway {
            Some(gateway) => (Arc::new(gateway.clone()), Arc::new(gateway.clone())),
            None => (Arc::new(NoDiscovery), Arc::new(NoNamespaces)),
        };

    let guard = CommandGuard::new(config.policy(), discovery);
    let mut renderer = SelectionRenderer::new(
        guard.clone(),
        Arc::new(BinaryRunner::new(
            config.runner.kubectl.clone(),
            config.runner.timeout(),
        )),
        lister,
        RenderSettings {
            binary: config.runner.binary.clone(),
            default_namespace,
            allowed_namespaces: config.allowed.namespaces.clone(),
            kubeconfig,
        },
    );
    if gateway.is_some() {
        match timeout(CATALOGUE_DISCOVERY_TIMEOUT, guard.build_resource_catalogue()).await {
            Ok(Ok(catalogue)) => {
                debug!(resources = catalogue.len(), "resource catalogue ready");
                renderer = renderer.with_catalogue(catalogue);
            }
            Ok(Err(error)) => {
                warn!(%error, "resource discovery failed, using the static resource table");
            }
            Err(_) => {
                warn!("resource discovery timed out, using the static resource table");
            }
        }
    }

    let builder = CommandBuilder::new(guard, renderer, config.allowed.cmds.clone());
    if args.stdio {
        return stdio::serve(&builder).await;
    }

    let (cluster, context) = gateway
        .as_ref()
        .map(|gateway| (gateway.cluster().to_string(), gateway.context().to_string()))
        .unwrap_or_else(|| ("offline".to_string(), "none".to_string()));
    let mut app = App::new(cluster, context, builder.binary().to_string());
    run(&mut app, &builder).await?;

    if let Some(preview) = app.last_preview() {
        println!("{preview}");
    }
    Ok(())
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>, stderr: bool) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();

    // the terminal belongs to the UI, so logs only go somewhere when asked for
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        let _ = subscriber
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init();
    } else if stderr {
        let _ = subscriber.with_writer(io::stderr).try_init();
    } else {
        let _ = subscriber.with_writer(io::sink).try_init();
    }

    Ok(())
}

/// `-n` wins over the config file, which wins over the kubeconfig context namespace.
fn resolve_default_namespace(
    args: &CliArgs,
    config: &BuilderConfig,
    gateway: Option<&KubeGateway>,
) -> String {
    args.namespace
        .iter()
        .chain(config.default_namespace.iter())
        .map(String::as_str)
        .chain(gateway.map(KubeGateway::default_namespace))
        .map(str::trim)
        .find(|namespace| !namespace.is_empty())
        .unwrap_or(FALLBACK_NAMESPACE)
        .to_string()
}

async fn run(app: &mut App, builder: &CommandBuilder) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, builder).await;
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    builder: &CommandBuilder,
) -> Result<()> {
    dispatch(terminal, app, builder, InboundEvent::start()).await?;

    let mut reader = EventStream::new();
    loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        if !app.running() {
            break;
        }

        match reader.next().await {
            Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                if let Some(action) = input::map_key(app.mode(), key) {
                    debug!("action={action:?}");
                    if let AppCommand::Dispatch(event) = app.apply_action(action) {
                        dispatch(terminal, app, builder, event).await?;
                    }
                }
            }
            Some(Ok(_)) => {}
            Some(Err(error)) => {
                app.set_status(format!("terminal event error: {error}"));
            }
            None => {
                app.set_status("terminal event stream closed");
                break;
            }
        }
    }

    Ok(())
}

/// Sends one event to the builder; listing can take a while, so the screen says so first.
async fn dispatch(
    terminal: &mut TuiTerminal,
    app: &mut App,
    builder: &CommandBuilder,
    event: InboundEvent,
) -> Result<()> {
    app.set_status("Loading…");
    terminal
        .draw(|frame| ui::render(frame, app))
        .context("failed to render terminal frame")?;

    match builder.handle(&event).await {
        Ok(message) => app.apply_message(message),
        Err(error) => app.set_status(format!("builder error: {error}")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::resolve_default_namespace;
    use crate::cli::CliArgs;
    use crate::config::BuilderConfig;
    use clap::Parser;

    #[test]
    fn flag_namespace_wins_over_config() {
        let args = CliArgs::parse_from(["kbcraft", "-n", "flag-ns"]);
        let config = BuilderConfig {
            default_namespace: Some("config-ns".to_string()),
            ..BuilderConfig::default()
        };

        assert_eq!(resolve_default_namespace(&args, &config, None), "flag-ns");
    }

    #[test]
    fn config_namespace_then_fallback() {
        let args = CliArgs::parse_from(["kbcraft"]);
        let config = BuilderConfig {
            default_namespace: Some("config-ns".to_string()),
            ..BuilderConfig::default()
        };
        assert_eq!(resolve_default_namespace(&args, &config, None), "config-ns");

        let blank = BuilderConfig {
            default_namespace: Some("  ".to_string()),
            ..BuilderConfig::default()
        };
        assert_eq!(resolve_default_namespace(&args, &blank, None), "default");
    }
}
