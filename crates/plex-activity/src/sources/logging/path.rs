//! Locating the server's active log file

use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the active server log
pub const LOG_FILE_NAME: &str = "Plex Media Server.log";

/// Candidate log locations for this platform, most specific first
pub fn default_log_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(dir) = std::env::var_os("PLEX_MEDIA_SERVER_APPLICATION_SUPPORT_DIR") {
        paths.push(
            PathBuf::from(dir)
                .join("Plex Media Server")
                .join("Logs")
                .join(LOG_FILE_NAME),
        );
    }

    if cfg!(target_os = "macos") {
        if let Some(home) = dirs::home_dir() {
            paths.push(
                home.join("Library")
                    .join("Logs")
                    .join("Plex Media Server")
                    .join(LOG_FILE_NAME),
            );
        }
    } else if cfg!(windows) {
        if let Some(local) = dirs::data_local_dir() {
            paths.push(
                local
                    .join("Plex Media Server")
                    .join("Logs")
                    .join(LOG_FILE_NAME),
            );
        }
    } else {
        paths.push(
            PathBuf::from("/var/lib/plexmediaserver/Library/Application Support")
                .join("Plex Media Server")
                .join("Logs")
                .join(LOG_FILE_NAME),
        );
        // Snap and user installs
        if let Some(data) = dirs::data_dir() {
            paths.push(
                data.join("Plex Media Server")
                    .join("Logs")
                    .join(LOG_FILE_NAME),
            );
        }
    }

    paths
}

/// Pick the configured path, or the first default location that exists
pub fn resolve_log_path(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        return Some(path.to_path_buf());
    }

    let found = default_log_paths().into_iter().find(|p| p.is_file());
    debug!("Discovered log path: {:?}", found);
    found
}
