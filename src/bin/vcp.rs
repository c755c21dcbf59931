//! `vcp` binary entry point: parses CLI args, installs the tracing
//! subscriber, dispatches to the stage (or `all`) handler, and maps a
//! `PanelError` to a process exit code.

use clap::Parser;
use vc_panel::cli::Cli;

fn install_tracing(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbosity > 0 {
        let level = match verbosity {
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    let cli = Cli::parse();
    install_tracing(cli.verbose);

    if let Err(err) = vc_panel::cli::run(cli) {
        tracing::error!(error = %err, "run failed");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
