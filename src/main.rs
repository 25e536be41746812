//! StreamDebrid - debrid cache checks and direct links
//!
//! # Usage
//!
//! ```bash
//! streamdebrid check 0123456789abcdef0123456789abcdef01234567
//! streamdebrid files 0123456789abcdef0123456789abcdef01234567 --json
//! streamdebrid resolve 1234:5 --provider torbox
//! streamdebrid providers
//! ```

use anyhow::Result;
use clap::Parser;

use streamdebrid::cli::{Cli, Command, ExitCode, Output, ProvidersCmd};
use streamdebrid::{commands, logging, Config};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    run_cli(cli).await.into()
}

/// Load config from `--config` or the default path, then apply env and CLI overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    }
    .with_env();

    if let Some(kind) = cli.provider {
        config.provider = kind;
    }
    Ok(config)
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);

    // Descriptors need no credentials
    if matches!(cli.command, Command::Providers(_)) {
        return commands::providers_cmd(ProvidersCmd {}, &output);
    }

    let provider = match load_config(&cli).and_then(|c| c.build_provider()) {
        Ok(provider) => provider,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::InvalidArgs),
    };
    tracing::debug!(?provider, "provider ready");

    match cli.command {
        Command::Check(cmd) => commands::check_cmd(cmd, provider.as_ref(), &output).await,
        Command::Files(cmd) => commands::files_cmd(cmd, provider.as_ref(), &output).await,
        Command::Resolve(cmd) => commands::resolve_cmd(cmd, provider.as_ref(), &output).await,
        Command::Progress(cmd) => commands::progress_cmd(cmd, provider.as_ref(), &output).await,
        Command::UserHash(cmd) => commands::user_hash_cmd(cmd, provider.as_ref(), &output),
        Command::Providers(cmd) => commands::providers_cmd(cmd, &output),
    }
}
