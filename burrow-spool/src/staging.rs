//! Two-phase file publication.
//!
//! Files are written under `tmp/` and renamed into `new/` once complete, so a
//! reader of `new/` only ever sees whole files. Both directories must live on
//! the same filesystem for the rename to be atomic.

use std::{
    io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use burrow_common::{ConfigError, internal};
use tokio::{
    fs,
    io::{AsyncRead, AsyncWriteExt},
};

/// Age after which an abandoned staging file is removed at startup.
pub const STALE_AFTER: Duration = Duration::from_secs(36 * 60 * 60);

/// A directory with `tmp/` and `new/` children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Maildir {
    root: PathBuf,
    tmp: PathBuf,
    new: PathBuf,
}

impl Maildir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            tmp: root.join("tmp"),
            new: root.join("new"),
            root,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Staging directory
    #[must_use]
    pub fn tmp(&self) -> &Path {
        &self.tmp
    }

    /// Live directory
    #[must_use]
    pub fn new_dir(&self) -> &Path {
        &self.new
    }

    /// Create the root, `tmp/` and `new/` if missing. Used at startup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Directory`] if a directory cannot be created or
    /// a non-directory is in the way.
    pub fn init(&self) -> Result<(), ConfigError> {
        for dir in [&self.root, &self.tmp, &self.new] {
            let exists = dir.try_exists().map_err(|source| ConfigError::Directory {
                path: dir.clone(),
                source,
            })?;

            if !exists {
                internal!("{} does not exist, creating...", dir.display());
                std::fs::create_dir_all(dir).map_err(|source| ConfigError::Directory {
                    path: dir.clone(),
                    source,
                })?;
            } else if !dir.is_dir() {
                return Err(ConfigError::Directory {
                    path: dir.clone(),
                    source: io::Error::new(
                        io::ErrorKind::NotADirectory,
                        format!("Expected {} to be a Directory, but it is not", dir.display()),
                    ),
                });
            }
        }

        Ok(())
    }

    /// Create `tmp/` and `new/` if missing.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from directory creation.
    pub async fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.tmp).await?;
        fs::create_dir_all(&self.new).await
    }

    /// Open a new staging file called `name`.
    ///
    /// # Errors
    ///
    /// Fails with [`io::ErrorKind::AlreadyExists`] if a staging file of that
    /// name is already present, or with any other I/O error from opening it.
    pub async fn stage(&self, name: &str) -> io::Result<StagedFile> {
        self.stage_as(name, name).await
    }

    /// Open a staging file called `staging_name` that commits to
    /// `new/<live_name>`.
    ///
    /// Committing replaces any file already published as `live_name`.
    ///
    /// # Errors
    ///
    /// As for [`Maildir::stage`].
    pub async fn stage_as(&self, staging_name: &str, live_name: &str) -> io::Result<StagedFile> {
        let staging = self.tmp.join(staging_name);
        let live = self.new.join(live_name);

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o660);

        let file = options.open(&staging).await?;

        Ok(StagedFile {
            file,
            staging,
            live,
            new_dir: self.new.clone(),
        })
    }

    /// Stage `bytes` under `name` and publish them.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error; nothing is published on failure.
    pub async fn publish(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let mut staged = self.stage(name).await?;
        staged.write_all(bytes).await?;
        staged.commit().await
    }

    /// Remove staging files last modified more than `max_age` ago.
    ///
    /// Returns how many were removed. Run at startup, before anything is
    /// being staged.
    ///
    /// # Errors
    ///
    /// Returns an error if `tmp/` cannot be listed.
    pub fn purge_stale(&self, max_age: Duration) -> io::Result<usize> {
        let now = SystemTime::now();
        let mut cleaned = 0;

        for entry in std::fs::read_dir(&self.tmp)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();

            if age > max_age {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => cleaned += 1,
                    Err(err) => internal!(
                        level = WARN,
                        "Unable to remove stale staging file {}: {err}",
                        entry.path().display()
                    ),
                }
            }
        }

        if cleaned > 0 {
            internal!(
                level = INFO,
                "Cleaned up {cleaned} stale staging files from {}",
                self.tmp.display()
            );
        }

        Ok(cleaned)
    }
}

/// A file being written under `tmp/`.
///
/// Nothing appears in `new/` until [`StagedFile::commit`]. Dropping it
/// without committing leaves the partial file in `tmp/` for
/// [`Maildir::purge_stale`] to collect.
#[derive(Debug)]
pub struct StagedFile {
    file: fs::File,
    staging: PathBuf,
    live: PathBuf,
    new_dir: PathBuf,
}

impl StagedFile {
    #[must_use]
    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    /// Where the file will appear once committed
    #[must_use]
    pub fn live_path(&self) -> &Path {
        &self.live
    }

    /// # Errors
    ///
    /// Propagates write errors.
    pub async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes).await
    }

    /// Copy everything from `reader` into the staging file.
    ///
    /// # Errors
    ///
    /// Propagates read or write errors.
    pub async fn copy_from<R>(&mut self, reader: &mut R) -> io::Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        tokio::io::copy(reader, &mut self.file).await
    }

    /// Flush, sync and rename into `new/`, returning the live path.
    ///
    /// The rename is the commit point. A failure to sync `new/` afterwards is
    /// logged and does not turn a published file into an error.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error up to and including the rename. On failure
    /// the file stays in `tmp/`.
    pub async fn commit(self) -> io::Result<PathBuf> {
        let Self {
            mut file,
            staging,
            live,
            new_dir,
        } = self;

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&staging, &live).await?;
        if let Err(err) = sync_dir(&new_dir).await {
            internal!(
                level = WARN,
                "Published {} but unable to sync {}: {err}",
                live.display(),
                new_dir.display()
            );
        }

        Ok(live)
    }
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
#[allow(clippy::unused_async)]
async fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
