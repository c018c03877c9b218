//! Opening factories
//!
//! Each factory takes the engine explicitly. The `*_current` variants
//! bind to the proactor running on this thread instead.

use crate::engine::{Engine, Proactor};
use crate::error::{Error, Result};
use crate::file::{LinuxFile, ReadOnlyFile, WriteFile};
use crate::io::{close_fd, fadvise, open_at};
use crate::log::{log_emit, LogLevel};
use crate::options::WriteOptions;
use std::path::Path;
use std::rc::Rc;

/// Open `path` for writing, creating it if needed.
///
/// Truncates an existing file unless `options.append` is set.
pub async fn open_write<E: Engine>(
    engine: &Rc<E>,
    path: impl AsRef<Path>,
    options: WriteOptions,
) -> Result<WriteFile<E>> {
    let mut file = WriteFile::new(Rc::clone(engine), path.as_ref());
    file.open(options.open_flags()).await?;
    Ok(file)
}

/// Open `path` read-only, record its size and hint sequential access.
///
/// If the size lookup or the hint fails, the descriptor is closed before
/// the error is returned.
pub async fn open_read<E: Engine>(engine: &Rc<E>, path: impl AsRef<Path>) -> Result<ReadOnlyFile<E>> {
    let path = path.as_ref();
    let fd = open_at(&**engine, path, libc::O_RDONLY | libc::O_CLOEXEC, 0).await?;

    let prepared = async {
        let size = engine.file_size(fd)?;
        fadvise(&**engine, fd, 0, 0, libc::POSIX_FADV_SEQUENTIAL).await?;
        Ok::<_, Error>(size)
    }
    .await;

    match prepared {
        Ok(size) => Ok(ReadOnlyFile::new(Rc::clone(engine), fd, size)),
        Err(e) => {
            if let Err(close_err) = close_fd(&**engine, fd).await {
                log_emit(
                    LogLevel::Warning,
                    &format!("close of {} after failed open: {}", path.display(), close_err),
                );
            }
            log_emit(
                LogLevel::Debug,
                &format!("open_read {} failed: {}", path.display(), e),
            );
            Err(e)
        }
    }
}

/// Open `path` with raw `flags` and `mode` as a [`LinuxFile`]
pub async fn open_linux<E: Engine>(
    engine: &Rc<E>,
    path: impl AsRef<Path>,
    flags: i32,
    mode: u32,
) -> Result<LinuxFile<E>> {
    let fd = open_at(&**engine, path.as_ref(), flags, mode).await?;
    Ok(LinuxFile::new(Rc::clone(engine), fd))
}

/// [`open_read`] on the proactor running this thread.
///
/// # Panics
///
/// If called outside [`Proactor::block_on`].
pub async fn open_read_current(path: impl AsRef<Path>) -> Result<ReadOnlyFile> {
    open_read(&Proactor::expect_current(), path).await
}

/// [`open_write`] on the proactor running this thread.
///
/// # Panics
///
/// If called outside [`Proactor::block_on`].
pub async fn open_write_current(
    path: impl AsRef<Path>,
    options: WriteOptions,
) -> Result<WriteFile> {
    open_write(&Proactor::expect_current(), path, options).await
}

/// [`open_linux`] on the proactor running this thread.
///
/// # Panics
///
/// If called outside [`Proactor::block_on`].
pub async fn open_linux_current(path: impl AsRef<Path>, flags: i32, mode: u32) -> Result<LinuxFile> {
    open_linux(&Proactor::expect_current(), path, flags, mode).await
}
