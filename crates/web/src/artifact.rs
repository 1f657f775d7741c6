//! Packaged application artifacts
//!
//! An artifact is a gzip tarball holding everything needed to host the
//! application without the source tree:
//!
//! ```text
//! strcalc.tar.gz
//! ├── app.toml
//! └── static/
//!     ├── index.html
//!     └── ...
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info};

use crate::config::{AppConfig, APP_CONFIG_FILE};
use crate::error::{WebError, WebResult};

/// Directory inside an artifact holding the static files
pub const ARTIFACT_STATIC_DIR: &str = "static";

/// Default artifact file name
pub const DEFAULT_ARTIFACT_NAME: &str = "strcalc.tar.gz";

/// An artifact extracted onto disk
#[derive(Debug, Clone)]
pub struct UnpackedArtifact {
    pub root: PathBuf,
}

impl UnpackedArtifact {
    pub fn config(&self) -> WebResult<AppConfig> {
        AppConfig::load_from_dir(&self.root)
    }

    pub fn static_dir(&self) -> PathBuf {
        self.root.join(ARTIFACT_STATIC_DIR)
    }
}

/// Package a config directory and static roots into an artifact at `output`.
///
/// Earlier static roots shadow later ones, matching how
/// [`StaticFiles`](crate::static_files::StaticFiles) resolves them.
pub fn package(config_dir: &Path, static_roots: &[PathBuf], output: &Path) -> WebResult<()> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(output)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    let config_path = AppConfig::path_in(config_dir);
    if config_path.is_file() {
        // Validate before shipping it
        AppConfig::load(&config_path)?;
        builder.append_path_with_name(&config_path, APP_CONFIG_FILE)?;
    } else {
        let content = toml::to_string_pretty(&AppConfig::default()).map_err(|e| WebError::Artifact {
            path: output.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, APP_CONFIG_FILE, content.as_bytes())?;
    }

    // Appended last-to-first so the earliest root's files overwrite on unpack
    for root in static_roots.iter().rev() {
        if root.is_dir() {
            debug!("packaging static root {}", root.display());
            builder.append_dir_all(ARTIFACT_STATIC_DIR, root)?;
        }
    }

    builder.into_inner()?.finish()?;
    info!("packaged {}", output.display());
    Ok(())
}

/// Extract the artifact at `archive` into `dest`
pub fn unpack(archive: &Path, dest: &Path) -> WebResult<UnpackedArtifact> {
    let file = File::open(archive)?;
    std::fs::create_dir_all(dest)?;

    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    tarball.set_overwrite(true);
    tarball.unpack(dest).map_err(|e| WebError::Artifact {
        path: archive.to_path_buf(),
        reason: e.to_string(),
    })?;

    debug!("unpacked {} into {}", archive.display(), dest.display());
    Ok(UnpackedArtifact {
        root: dest.to_path_buf(),
    })
}
