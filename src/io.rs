//! Descriptor-level primitives
//!
//! Each function issues exactly one operation through
//! [`issue`](crate::completion::issue) and converts the raw result.
//! Positional reads and writes return whatever a single completion
//! transferred; see [`exact`](crate::exact) for the looping wrappers.
//!
//! Data travels through a buffer owned by the [`Op`]: writes copy the
//! caller's slices in at submission and reads copy the result out once the
//! completion arrives.

use crate::completion::{issue, Completion};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::file::PositionalWrite;
use crate::op::Op;

use std::ffi::CString;
use std::io::{IoSlice, IoSliceMut};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::Path;

/// Descriptor value of a file that is not (or no longer) open
pub(crate) const CLOSED_FD: RawFd = -1;

/// Offsets the kernel accepts; `u64::MAX` would mean "current position".
fn check_offset(offset: u64) -> Result<()> {
    if offset > i64::MAX as u64 {
        return Err(Error::InvalidArgument("file offset out of range"));
    }
    Ok(())
}

/// Copy the first `n` bytes of `data` across `bufs` in order
fn scatter(bufs: &mut [IoSliceMut<'_>], data: &[u8], n: usize) {
    let mut src = &data[..n.min(data.len())];
    for buf in bufs.iter_mut() {
        if src.is_empty() {
            break;
        }
        let take = buf.len().min(src.len());
        buf[..take].copy_from_slice(&src[..take]);
        src = &src[take..];
    }
}

/// Close `fd` through the engine.
///
/// A negative `fd` is already closed: returns `Ok(())` without issuing
/// anything. The caller owns resetting its stored descriptor.
pub async fn close_fd<E: Engine + ?Sized>(engine: &E, fd: RawFd) -> Result<()> {
    if fd < 0 {
        return Ok(());
    }
    Error::from_completion(issue(engine, Op::close(fd)).await).map(|_| ())
}

/// Close `fd` without waiting for the result.
///
/// Used from `Drop`; the engine logs a failure since nobody else can see it.
pub(crate) fn close_detached<E: Engine + ?Sized>(engine: &E, fd: RawFd) {
    if fd >= 0 {
        drop(engine.submit(Op::close(fd)));
    }
}

/// One vectored positional read (`preadv2`).
///
/// `bufs` is only written once the completion has arrived.
///
/// # Panics
///
/// If `fd` is negative or `bufs` is empty.
pub async fn read_some<E: Engine + ?Sized>(
    engine: &E,
    fd: RawFd,
    bufs: &mut [IoSliceMut<'_>],
    offset: u64,
    flags: i32,
) -> Result<usize> {
    assert!(fd >= 0, "read on a closed descriptor");
    assert!(!bufs.is_empty(), "read with an empty buffer list");
    check_offset(offset)?;
    let (res, op) = Completion::new(engine, Op::readv(fd, bufs, offset, flags)).await;
    let n = Error::from_completion(res)?;
    scatter(bufs, op.data(), n);
    Ok(n)
}

/// One vectored positional write (`pwritev2`).
///
/// # Panics
///
/// If `fd` is negative or `bufs` is empty.
pub async fn write_some<E: Engine + ?Sized>(
    engine: &E,
    fd: RawFd,
    bufs: &[IoSlice<'_>],
    offset: u64,
    flags: i32,
) -> Result<usize> {
    assert!(fd >= 0, "write on a closed descriptor");
    assert!(!bufs.is_empty(), "write with an empty buffer list");
    check_offset(offset)?;
    Error::from_completion(issue(engine, Op::writev(fd, bufs, offset, flags)).await)
}

/// One single-buffer positional read (`pread`).
///
/// # Panics
///
/// If `fd` is negative or `buf` is empty.
pub async fn read_at<E: Engine + ?Sized>(
    engine: &E,
    fd: RawFd,
    buf: &mut [u8],
    offset: u64,
) -> Result<usize> {
    assert!(fd >= 0, "read on a closed descriptor");
    assert!(!buf.is_empty(), "read into an empty buffer");
    check_offset(offset)?;
    let (res, op) = Completion::new(engine, Op::read(fd, buf.len(), offset)).await;
    let n = Error::from_completion(res)?;
    let data = op.data();
    let n = n.min(data.len());
    buf[..n].copy_from_slice(&data[..n]);
    Ok(n)
}

/// Open `path` relative to the working directory; returns the descriptor.
pub(crate) async fn open_at<E: Engine + ?Sized>(
    engine: &E,
    path: &Path,
    flags: i32,
    mode: u32,
) -> Result<RawFd> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| Error::InvalidArgument("path contains an interior NUL byte"))?;
    let fd = Error::from_completion(
        issue(engine, Op::open_at(libc::AT_FDCWD, c_path, flags, mode)).await,
    )?;
    Ok(fd as RawFd)
}

/// Advise the kernel about the access pattern for a range of `fd`.
pub(crate) async fn fadvise<E: Engine + ?Sized>(
    engine: &E,
    fd: RawFd,
    offset: u64,
    len: i64,
    advice: i32,
) -> Result<()> {
    Error::from_completion(issue(engine, Op::fadvise(fd, offset, len, advice)).await).map(|_| ())
}

/// A borrowed (engine, descriptor) pair, so the exact-transfer driver can
/// run over a bare descriptor.
pub(crate) struct FdRef<'a, E: Engine + ?Sized> {
    pub(crate) engine: &'a E,
    pub(crate) fd: RawFd,
}

impl<E: Engine + ?Sized> PositionalWrite for FdRef<'_, E> {
    async fn write_some_at(&self, bufs: &[IoSlice<'_>], offset: u64, flags: i32) -> Result<usize> {
        write_some(self.engine, self.fd, bufs, offset, flags).await
    }
}
