//! Lazily opened write file with an internal cursor

use super::Closable;
use crate::engine::{Engine, Proactor};
use crate::error::{Error, Result};
use crate::exact::write_all_tracked;
use crate::io::{close_detached, close_fd, open_at, write_some, FdRef, CLOSED_FD};
use crate::options::DEFAULT_FILE_MODE;
use std::fmt;
use std::io::IoSlice;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A file written sequentially from a cursor.
///
/// The descriptor is opened on demand by [`open`](Self::open), usually
/// through [`open_write`](crate::open_write). Every successful write moves
/// the cursor forward by the bytes written. Once closed, an instance
/// stays closed.
pub struct WriteFile<E: Engine = Proactor> {
    fd: RawFd,
    engine: Rc<E>,
    path: PathBuf,
    offs: u64,
    closed: bool,
}

impl<E: Engine> WriteFile<E> {
    /// Bind `path` to `engine` without opening anything
    pub fn new(engine: Rc<E>, path: impl Into<PathBuf>) -> Self {
        Self {
            fd: CLOSED_FD,
            engine,
            path: path.into(),
            offs: 0,
            closed: false,
        }
    }

    /// Open the file with `flags` and the default creation mode.
    ///
    /// Fails with [`Error::AlreadyOpen`] if a descriptor is already held
    /// and with [`Error::Closed`] after [`close`](Self::close).
    pub async fn open(&mut self, flags: i32) -> Result<()> {
        if self.fd >= 0 {
            return Err(Error::AlreadyOpen);
        }
        if self.closed {
            return Err(Error::Closed);
        }
        self.fd = open_at(&*self.engine, &self.path, flags, DEFAULT_FILE_MODE).await?;
        Ok(())
    }

    /// Write `bufs` at the cursor with a single operation.
    ///
    /// Best effort: the count may be short. The cursor advances by the
    /// count returned.
    ///
    /// # Panics
    ///
    /// If the file is not open or `bufs` is empty.
    pub async fn write_some(&mut self, bufs: &[IoSlice<'_>]) -> Result<usize> {
        let n = write_some(&*self.engine, self.fd, bufs, self.offs, 0).await?;
        self.offs += n as u64;
        Ok(n)
    }

    /// Write every byte of `bufs` at the cursor.
    ///
    /// The cursor advances by whatever was written, including the bytes
    /// that landed before an error.
    pub async fn write_all(&mut self, bufs: &[IoSlice<'_>]) -> Result<usize> {
        let view = FdRef {
            engine: &*self.engine,
            fd: self.fd,
        };
        let mut written = 0;
        let res = write_all_tracked(&view, bufs, self.offs, 0, &mut written).await;
        self.offs += written as u64;
        res.map(|()| written)
    }

    /// Close the file. Closing an unopened or closed file does nothing.
    pub async fn close(&mut self) -> Result<()> {
        self.closed = true;
        let fd = std::mem::replace(&mut self.fd, CLOSED_FD);
        close_fd(&*self.engine, fd).await
    }

    /// Path the file was created with
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset the next write targets
    pub fn position(&self) -> u64 {
        self.offs
    }

    /// Whether a descriptor is held
    pub fn is_open(&self) -> bool {
        self.fd >= 0
    }

    /// The underlying descriptor, or `-1` when not open
    pub fn raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl<E: Engine> Closable for WriteFile<E> {
    async fn close(&mut self) -> Result<()> {
        WriteFile::close(self).await
    }
}

impl<E: Engine> Drop for WriteFile<E> {
    fn drop(&mut self) {
        close_detached(&*self.engine, self.fd);
    }
}

impl<E: Engine> fmt::Debug for WriteFile<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteFile")
            .field("fd", &self.fd)
            .field("path", &self.path)
            .field("offs", &self.offs)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
