use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kbcraft",
    version,
    about = "Build kbcli commands step by step from cascading menus."
)]
pub struct CliArgs {
    /// Config file (default: $KBCRAFT_CONFIG, ./kbcraft.yaml, ~/.config/kbcraft/config.yaml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Namespace preselected in the namespace menu
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Read JSON events from stdin and write JSON messages to stdout
    #[arg(long)]
    pub stdio: bool,

    /// Do not connect to a cluster
    #[arg(long)]
    pub offline: bool,
}

#[cfg(test)]
mod tests {
    use super::CliArgs;
    use clap::Parser;

    #[test]
    fn parses_defaults() {
        let args = CliArgs::try_parse_from(["kbcraft"])
            .unwrap_or_else(|err| panic!("defaults must parse: {err}"));

        assert_eq!(args.log_filter, "info");
        assert!(!args.stdio);
        assert!(!args.offline);
        assert!(args.namespace.is_none());
    }

    #[test]
    fn parses_host_flags() {
        let args = CliArgs::try_parse_from([
            "kbcraft",
            "--stdio",
            "--offline",
            "-n",
            "demo",
            "--config",
            "/tmp/kbcraft.yaml",
        ])
        .unwrap_or_else(|err| panic!("flags must parse: {err}"));

        assert!(args.stdio);
        assert!(args.offline);
        assert_eq!(args.namespace.as_deref(), Some("demo"));
        assert_eq!(
            args.config.as_deref().and_then(|path| path.to_str()),
            Some("/tmp/kbcraft.yaml")
        );
    }
}
