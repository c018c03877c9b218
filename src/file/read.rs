//! Read-only file with a size fixed at open

use super::{Closable, PositionalRead, SizedReadable};
use crate::engine::{Engine, Proactor};
use crate::error::Result;
use crate::exact::read_exact_at;
use crate::io::{close_detached, close_fd, read_at, read_some, CLOSED_FD};
use std::fmt;
use std::io::IoSliceMut;
use std::os::unix::io::RawFd;
use std::rc::Rc;

/// A file opened for reading, with exact-transfer reads.
///
/// Created by [`open_read`](crate::open_read). The size is captured once
/// at open and never refreshed.
pub struct ReadOnlyFile<E: Engine = Proactor> {
    fd: RawFd,
    size: u64,
    engine: Rc<E>,
}

impl<E: Engine> ReadOnlyFile<E> {
    pub(crate) fn new(engine: Rc<E>, fd: RawFd, size: u64) -> Self {
        Self { fd, size, engine }
    }

    /// Size in bytes captured at open
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The underlying descriptor, or `-1` once closed
    pub fn raw_fd(&self) -> RawFd {
        self.fd
    }

    /// Fill `bufs` starting at `offset`.
    ///
    /// Returns fewer bytes than requested only when end of file is reached.
    ///
    /// # Panics
    ///
    /// If the file has been closed and `bufs` is not empty.
    pub async fn read(&self, offset: u64, bufs: &mut [IoSliceMut<'_>]) -> Result<usize> {
        read_exact_at(self, bufs, offset, 0).await
    }

    /// Close the file. Closing an already closed file does nothing.
    pub async fn close(&mut self) -> Result<()> {
        let fd = std::mem::replace(&mut self.fd, CLOSED_FD);
        close_fd(&*self.engine, fd).await
    }
}

impl<E: Engine> PositionalRead for ReadOnlyFile<E> {
    async fn read_some_at(
        &self,
        bufs: &mut [IoSliceMut<'_>],
        offset: u64,
        flags: i32,
    ) -> Result<usize> {
        read_some(&*self.engine, self.fd, bufs, offset, flags).await
    }

    async fn read_one_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        read_at(&*self.engine, self.fd, buf, offset).await
    }
}

impl<E: Engine> SizedReadable for ReadOnlyFile<E> {
    fn size(&self) -> u64 {
        self.size
    }

    async fn read(&self, offset: u64, bufs: &mut [IoSliceMut<'_>]) -> Result<usize> {
        ReadOnlyFile::read(self, offset, bufs).await
    }
}

impl<E: Engine> Closable for ReadOnlyFile<E> {
    async fn close(&mut self) -> Result<()> {
        ReadOnlyFile::close(self).await
    }
}

impl<E: Engine> Drop for ReadOnlyFile<E> {
    fn drop(&mut self) {
        close_detached(&*self.engine, self.fd);
    }
}

impl<E: Engine> fmt::Debug for ReadOnlyFile<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyFile")
            .field("fd", &self.fd)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
