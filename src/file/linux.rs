//! Generic positional file

use super::{Closable, PositionalRead, PositionalWrite};
use crate::engine::{Engine, Proactor};
use crate::error::Result;
use crate::exact::{read_exact_at, write_all_at};
use crate::io::{close_detached, close_fd, read_at, read_some, write_some, CLOSED_FD};
use std::fmt;
use std::io::{IoSlice, IoSliceMut};
use std::os::unix::io::RawFd;
use std::rc::Rc;

/// A file opened with caller-chosen flags, addressed by explicit offsets.
///
/// `read_some` / `write_some` issue exactly one operation and may be
/// short; `read` / `write` loop until the whole buffer list is transferred.
pub struct LinuxFile<E: Engine = Proactor> {
    fd: RawFd,
    engine: Rc<E>,
}

impl<E: Engine> LinuxFile<E> {
    pub(crate) fn new(engine: Rc<E>, fd: RawFd) -> Self {
        Self { fd, engine }
    }

    /// One vectored read at `offset`
    pub async fn read_some(
        &self,
        bufs: &mut [IoSliceMut<'_>],
        offset: u64,
        flags: i32,
    ) -> Result<usize> {
        read_some(&*self.engine, self.fd, bufs, offset, flags).await
    }

    /// One vectored write at `offset`
    pub async fn write_some(&self, bufs: &[IoSlice<'_>], offset: u64, flags: i32) -> Result<usize> {
        write_some(&*self.engine, self.fd, bufs, offset, flags).await
    }

    /// Fill `bufs` from `offset`; short only at end of file
    pub async fn read(&self, bufs: &mut [IoSliceMut<'_>], offset: u64, flags: i32) -> Result<usize> {
        read_exact_at(self, bufs, offset, flags).await
    }

    /// Write all of `bufs` at `offset`
    pub async fn write(&self, bufs: &[IoSlice<'_>], offset: u64, flags: i32) -> Result<usize> {
        write_all_at(self, bufs, offset, flags).await
    }

    /// Close the file. Closing an already closed file does nothing.
    pub async fn close(&mut self) -> Result<()> {
        let fd = std::mem::replace(&mut self.fd, CLOSED_FD);
        close_fd(&*self.engine, fd).await
    }

    /// The underlying descriptor, or `-1` once closed
    pub fn raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl<E: Engine> PositionalRead for LinuxFile<E> {
    async fn read_some_at(
        &self,
        bufs: &mut [IoSliceMut<'_>],
        offset: u64,
        flags: i32,
    ) -> Result<usize> {
        LinuxFile::read_some(self, bufs, offset, flags).await
    }

    async fn read_one_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        read_at(&*self.engine, self.fd, buf, offset).await
    }
}

impl<E: Engine> PositionalWrite for LinuxFile<E> {
    async fn write_some_at(&self, bufs: &[IoSlice<'_>], offset: u64, flags: i32) -> Result<usize> {
        LinuxFile::write_some(self, bufs, offset, flags).await
    }
}

impl<E: Engine> Closable for LinuxFile<E> {
    async fn close(&mut self) -> Result<()> {
        LinuxFile::close(self).await
    }
}

impl<E: Engine> Drop for LinuxFile<E> {
    fn drop(&mut self) {
        close_detached(&*self.engine, self.fd);
    }
}

impl<E: Engine> fmt::Debug for LinuxFile<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinuxFile")
            .field("fd", &self.fd)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;
    use crate::op::OpKind;
    use crate::open::open_linux;

    fn rw_flags() -> i32 {
        libc::O_RDWR | libc::O_CREAT | libc::O_CLOEXEC
    }

    #[test]
    fn test_some_variants_may_be_short() {
        let engine = Rc::new(MockEngine::new());
        engine.set_max_transfer(Some(4));

        engine.block_on(async {
            let file = open_linux(&engine, "f", rw_flags(), 0o600).await.unwrap();
            let n = file.write_some(&[IoSlice::new(b"0123456789")], 0, 0).await.unwrap();
            assert_eq!(n, 4);

            let mut buf = [0u8; 10];
            let n = file.read_some(&mut [IoSliceMut::new(&mut buf)], 0, 0).await.unwrap();
            assert_eq!(n, 4);
            assert_eq!(&buf[..4], b"0123");
        });
    }

    #[test]
    fn test_roundtrip_misaligned_segments() {
        let engine = Rc::new(MockEngine::new());
        engine.set_max_transfer(Some(5));
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();

        engine.block_on(async {
            let file = open_linux(&engine, "f", rw_flags(), 0o600).await.unwrap();
            let parts = [&data[..333], &data[333..334], &data[334..777], &data[777..]];
            let iov: Vec<IoSlice<'_>> = parts.iter().map(|p| IoSlice::new(p)).collect();
            assert_eq!(file.write(&iov, 0, 0).await.unwrap(), 1000);

            let mut a = vec![0u8; 7];
            let mut b = vec![0u8; 500];
            let mut c = vec![0u8; 493];
            let n = file
                .read(
                    &mut [IoSliceMut::new(&mut a), IoSliceMut::new(&mut b), IoSliceMut::new(&mut c)],
                    0,
                    0,
                )
                .await
                .unwrap();
            assert_eq!(n, 1000);
            assert_eq!([a, b, c].concat(), data);
        });
    }

    #[test]
    fn test_roundtrip_empty_and_single() {
        let engine = Rc::new(MockEngine::new());

        engine.block_on(async {
            let file = open_linux(&engine, "f", rw_flags(), 0o600).await.unwrap();
            assert_eq!(file.write(&[], 0, 0).await.unwrap(), 0);
            assert_eq!(file.read(&mut [], 0, 0).await.unwrap(), 0);

            assert_eq!(file.write(&[IoSlice::new(b"one")], 0, 0).await.unwrap(), 3);
            let mut buf = [0u8; 3];
            assert_eq!(file.read(&mut [IoSliceMut::new(&mut buf)], 0, 0).await.unwrap(), 3);
            assert_eq!(&buf, b"one");
        });
        // open + write + read; the empty lists issued nothing
        assert_eq!(engine.count(OpKind::WriteV), 1);
        assert_eq!(engine.count(OpKind::ReadV), 1);
    }

    #[test]
    fn test_read_at_offset_hits_eof() {
        let engine = Rc::new(MockEngine::new());
        engine.add_file("f", b"0123456789");

        let (n, buf) = engine.block_on(async {
            let file = open_linux(&engine, "f", libc::O_RDONLY, 0).await.unwrap();
            let mut buf = [0u8; 8];
            let n = file.read(&mut [IoSliceMut::new(&mut buf)], 6, 0).await.unwrap();
            (n, buf)
        });
        assert_eq!(n, 4);
        assert_eq!(&buf[..4], b"6789");
    }

    #[test]
    fn test_close_then_drop() {
        let engine = Rc::new(MockEngine::new());
        let mut file = engine
            .block_on(open_linux(&engine, "f", rw_flags(), 0o600))
            .unwrap();
        assert!(file.raw_fd() >= 0);
        engine.block_on(file.close()).unwrap();
        engine.block_on(file.close()).unwrap();
        drop(file);
        assert_eq!(engine.count(OpKind::Close), 1);
    }

    #[test]
    fn test_forgotten_read_never_touches_caller_memory() {
        use std::future::Future;
        use std::task::{Context, Waker};

        let engine = Rc::new(MockEngine::new());
        engine.add_file("f", &[0xab; 32]);
        let file = engine
            .block_on(open_linux(&engine, "f", libc::O_RDONLY, 0))
            .unwrap();

        engine.set_deferred(true);
        let mut victim = vec![0u8; 32];
        {
            let mut bufs = [IoSliceMut::new(&mut victim)];
            let mut fut = Box::pin(file.read_some(&mut bufs, 0, 0));
            let mut cx = Context::from_waker(Waker::noop());
            assert!(fut.as_mut().poll(&mut cx).is_pending());
            std::mem::forget(fut);
        }
        victim.fill(0x11);
        assert_eq!(engine.run_pending(), 1);

        assert!(victim.iter().all(|&b| b == 0x11));
        assert_eq!(engine.stats().bytes_read(), 32);
        assert_eq!(engine.stats().current_in_flight(), 0);
    }
}
