use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use vmprobe::cli::{Cli, OutputFormat};
use vmprobe::config::ProbeConfig;
use vmprobe::engine::Engine;

/// Stderr verbosity: dropped samples and fallbacks always show, progress only with `--debug`
fn tracing_level(debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else {
        Level::WARN
    }
}

/// Initialize tracing subscriber on stderr
fn init_tracing(debug: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::default().add_directive(tracing_level(debug).into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = ProbeConfig::with_iterations(args.iterations);
    tracing::debug!("Effective configuration: {:?}", config);

    let engine = Engine::new(config)?;
    let report = engine.run();

    match args.format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => print!("{}", report.to_text()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_are_shown_without_debug() {
        assert_eq!(tracing_level(false), Level::WARN);
        assert!(Level::INFO > tracing_level(false));
    }

    #[test]
    fn test_debug_enables_progress_output() {
        assert_eq!(tracing_level(true), Level::DEBUG);
        assert!(Level::INFO <= tracing_level(true));
    }
}
