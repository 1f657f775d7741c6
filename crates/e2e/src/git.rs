use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::process::{run_checked, CommandSpec, ProcessRunner};

/// Top-level directory of the git checkout containing `start_dir`
pub async fn repository_root(runner: &dyn ProcessRunner, start_dir: &Path) -> E2eResult<PathBuf> {
    let cmd = CommandSpec::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(start_dir);

    let root = run_checked(runner, &cmd, E2eError::RepositoryRoot).await?;
    if root.is_empty() {
        return Err(E2eError::RepositoryRoot(
            "git rev-parse printed no path".to_string(),
        ));
    }

    debug!("repository root: {}", root);
    Ok(PathBuf::from(root))
}
