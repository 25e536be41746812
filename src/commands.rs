//! CLI Command Handlers
//!
//! Each handler takes CLI args, the configured provider and Output, returns ExitCode.

use crate::cli::{
    validate_hash, CheckCmd, ExitCode, FilesCmd, FilesTarget, Output, ProgressCmd, ProvidersCmd,
    ResolveCmd, ResolveResponse, ResolveTarget, UserHashCmd, UserHashResponse,
};
use crate::debrid::{DebridProvider, ProviderKind};
use crate::models::{DebridFile, ProviderDescriptor, Torrent};

/// Validate every hash, reporting the first bad one
fn parse_torrents(hashes: &[String]) -> Result<Vec<Torrent>, String> {
    hashes
        .iter()
        .map(|h| {
            validate_hash(h)
                .map(Torrent::new)
                .map_err(|e| format!("{}: {}", e, h))
        })
        .collect()
}

// =============================================================================
// Check Command
// =============================================================================

pub async fn check_cmd(cmd: CheckCmd, provider: &dyn DebridProvider, output: &Output) -> ExitCode {
    let torrents = match parse_torrents(&cmd.hashes) {
        Ok(torrents) => torrents,
        Err(e) => return output.error(e, ExitCode::InvalidArgs),
    };

    output.info(format!(
        "Checking {} torrent(s) on {}...",
        torrents.len(),
        provider.descriptor().name
    ));

    let cached = provider.check_cached(&torrents).await;

    if let Err(e) = output.print(&cached) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

// =============================================================================
// Files Command
// =============================================================================

pub async fn files_cmd(cmd: FilesCmd, provider: &dyn DebridProvider, output: &Output) -> ExitCode {
    let target = match cmd.target() {
        Ok(target) => target,
        Err(e) => return output.error(e, ExitCode::InvalidArgs),
    };

    output.info(format!("Listing files for {}...", target.hash()));

    let result = match (&cmd.torrent_file, &target) {
        (Some(path), _) => match tokio::fs::read(path).await {
            Ok(bytes) => provider.files_from_buffer(&bytes, target.hash()).await,
            Err(e) => {
                return output.error(
                    format!("Failed to read {}: {}", path.display(), e),
                    ExitCode::InvalidArgs,
                )
            }
        },
        (None, FilesTarget::Magnet { magnet, hash }) => provider.files_from_magnet(magnet, hash).await,
        (None, FilesTarget::Hash(hash)) => provider.files_from_hash(hash).await,
    };

    match result {
        Ok(mut files) => {
            // Largest first, the main video is usually on top
            files.sort_by(|a: &DebridFile, b: &DebridFile| b.size.cmp(&a.size));
            if let Err(e) = output.list(&files) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Err(e) => output.debrid_error("Listing files failed", &e),
    }
}

// =============================================================================
// Resolve Command
// =============================================================================

pub async fn resolve_cmd(cmd: ResolveCmd, provider: &dyn DebridProvider, output: &Output) -> ExitCode {
    let target = match cmd.target() {
        Ok(target) => target,
        Err(e) => return output.error(e, ExitCode::InvalidArgs),
    };

    let result = match &target {
        ResolveTarget::File(id) => {
            let file = DebridFile {
                name: String::new(),
                size: 0,
                id: id.clone(),
                url: String::new(),
                ready: true,
            };
            provider.resolve_download_url(&file).await
        }
        ResolveTarget::Torrent(torrent) => {
            output.info(format!("Resolving largest file of {}...", torrent.hash()));
            provider.resolve_magnet(&torrent.magnet(), torrent.hash()).await
        }
    };

    match result {
        Ok(url) => {
            let response = ResolveResponse {
                target: cmd.target,
                url,
            };
            if let Err(e) = output.print(&response) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Err(e) => output.debrid_error("Resolve failed", &e),
    }
}

// =============================================================================
// Progress Command
// =============================================================================

pub async fn progress_cmd(cmd: ProgressCmd, provider: &dyn DebridProvider, output: &Output) -> ExitCode {
    let torrents = match parse_torrents(&cmd.hashes) {
        Ok(torrents) => torrents,
        Err(e) => return output.error(e, ExitCode::InvalidArgs),
    };

    match provider.torrent_progress(&torrents).await {
        Ok(progress) => {
            let sorted: std::collections::BTreeMap<_, _> = progress.into_iter().collect();
            if let Err(e) = output.print(&sorted) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Err(e) => output.debrid_error("Progress lookup failed", &e),
    }
}

// =============================================================================
// User Hash / Providers Commands
// =============================================================================

pub fn user_hash_cmd(_cmd: UserHashCmd, provider: &dyn DebridProvider, output: &Output) -> ExitCode {
    let response = UserHashResponse {
        provider: provider.descriptor().id.to_string(),
        user_hash: provider.user_hash(),
    };
    if let Err(e) = output.print(&response) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

/// Needs no credentials
pub fn providers_cmd(_cmd: ProvidersCmd, output: &Output) -> ExitCode {
    let descriptors: Vec<&ProviderDescriptor> =
        ProviderKind::all().iter().map(|k| k.descriptor()).collect();
    if let Err(e) = output.list(&descriptors) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}
