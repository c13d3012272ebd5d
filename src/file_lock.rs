use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::sync::Arc;

use fs2::FileExt;
use log::info;
use log::warn;

use crate::Config;

/// An exclusive advisory lock on a log directory, held while a
/// [`CommitLog`](crate::CommitLog) is open.
///
/// The id of the holding process is written into the lock file, to tell who
/// holds it when another process fails to acquire it.
#[derive(Debug)]
pub(crate) struct FileLock {
    config: Arc<Config>,
    f: File,
}

impl FileLock {
    pub const LOCK_FILE_NAME: &'static str = "LOCK";

    pub(crate) fn new(config: Arc<Config>) -> Result<Self, io::Error> {
        let path = Self::lock_path(config.as_ref());

        let mut f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = f.try_lock_exclusive() {
            let holder = std::fs::read_to_string(&path).unwrap_or_default();
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!(
                    "Commit log directory '{}' is locked by process '{}'; \
                    error:({})",
                    config.dir,
                    holder.trim(),
                    e
                ),
            ));
        }

        f.set_len(0)?;
        write!(f, "{}", std::process::id())?;
        f.sync_data()?;

        info!("Directory lock acquired: {}", path);

        Ok(Self { config, f })
    }

    pub(crate) fn lock_path(config: &Config) -> String {
        format!("{}/{}", config.dir, Self::LOCK_FILE_NAME)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let path = Self::lock_path(self.config.as_ref());
        if let Err(e) = self.f.unlock() {
            warn!("Failed to release directory lock {}: {}", path, e);
            return;
        }
        info!("Directory lock released: {}", path);
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use crate::file_lock::FileLock;
    use crate::tests::context::TestContext;

    #[test]
    fn test_lock_file() -> Result<(), io::Error> {
        let ctx = TestContext::new()?;
        let config = ctx.arc_config();

        let lf = FileLock::new(config.clone())?;

        let content = std::fs::read_to_string(FileLock::lock_path(&config))?;
        assert_eq!(std::process::id().to_string(), content);

        let err = FileLock::new(config.clone()).unwrap_err();
        assert_eq!(io::ErrorKind::WouldBlock, err.kind());
        assert!(err.to_string().contains(&content), "{}", err);

        drop(lf);
        let _lf2 = FileLock::new(config.clone())?;
        Ok(())
    }
}
