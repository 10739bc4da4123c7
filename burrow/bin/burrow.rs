#[cfg(not(unix))]
compile_error!("Only unix is currently supported");

use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = find_config_file()?;
    let burrow = burrow::Burrow::load(&config_path)?;

    burrow.run().await
}

/// Find the configuration file using the following precedence:
/// 1. `BURROW_CONFIG` environment variable
/// 2. ./burrow.toml (current working directory)
/// 3. /etc/burrow/burrow.toml (system-wide config)
fn find_config_file() -> anyhow::Result<PathBuf> {
    if let Ok(env_path) = std::env::var("BURROW_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "BURROW_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = [
        PathBuf::from("./burrow.toml"),
        PathBuf::from("/etc/burrow/burrow.toml"),
    ];

    if let Some(path) = default_paths.iter().find(|path| path.exists()) {
        return Ok(path.clone());
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - BURROW_CONFIG environment variable\n{paths_tried}"
    )
}
