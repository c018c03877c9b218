// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 AuraIO Contributors


//! Operation descriptors submitted to an [`Engine`](crate::Engine)

use std::ffi::CString;
use std::fmt;
use std::io::{IoSlice, IoSliceMut};
use std::os::unix::io::RawFd;

/// Kind of a submitted operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// `openat(2)`
    OpenAt,
    /// `close(2)`
    Close,
    /// `preadv2(2)`
    ReadV,
    /// `pwritev2(2)`
    WriteV,
    /// `pread(2)` into a single buffer
    Read,
    /// `posix_fadvise(2)`
    Fadvise,
}

/// A fully populated kernel operation.
///
/// The descriptor owns everything the kernel dereferences: the path, the
/// data buffer and the iovec array that points into it. An engine keeps
/// the `Op` until the completion is reaped and then hands it back through
/// the [`CompletionSlot`](crate::CompletionSlot), so caller memory is never
/// visible to the kernel.
///
/// Variants are `#[non_exhaustive]` so they can only be built here.
pub enum Op {
    /// Open `path` relative to `dirfd`; result is the new descriptor
    #[non_exhaustive]
    OpenAt {
        /// Directory descriptor (`libc::AT_FDCWD` for the working directory)
        dirfd: RawFd,
        /// Path to open
        path: CString,
        /// `O_*` flags
        flags: i32,
        /// Creation mode
        mode: u32,
    },
    /// Close a descriptor
    #[non_exhaustive]
    Close {
        /// Descriptor to close
        fd: RawFd,
    },
    /// Vectored positional read
    #[non_exhaustive]
    ReadV {
        /// Source descriptor
        fd: RawFd,
        /// Destination bytes, one contiguous run per segment
        buf: Vec<u8>,
        /// Segments into `buf`
        iovecs: Vec<libc::iovec>,
        /// File offset
        offset: u64,
        /// `RWF_*` flags
        flags: i32,
    },
    /// Vectored positional write
    #[non_exhaustive]
    WriteV {
        /// Destination descriptor
        fd: RawFd,
        /// Gathered source bytes
        buf: Vec<u8>,
        /// Segments into `buf`
        iovecs: Vec<libc::iovec>,
        /// File offset
        offset: u64,
        /// `RWF_*` flags
        flags: i32,
    },
    /// Single-buffer positional read
    #[non_exhaustive]
    Read {
        /// Source descriptor
        fd: RawFd,
        /// Destination bytes
        buf: Vec<u8>,
        /// File offset
        offset: u64,
    },
    /// Access pattern advice
    #[non_exhaustive]
    Fadvise {
        /// Target descriptor
        fd: RawFd,
        /// Start of the advised range
        offset: u64,
        /// Length of the range (0 = to end of file)
        len: i64,
        /// `POSIX_FADV_*` value
        advice: i32,
    },
}

/// One iovec per segment length, laid end to end over `buf`
fn segments(buf: &mut [u8], lens: impl Iterator<Item = usize>) -> Vec<libc::iovec> {
    let base = buf.as_mut_ptr();
    let mut at = 0;
    lens.map(|len| {
        let v = libc::iovec {
            iov_base: base.wrapping_add(at) as *mut libc::c_void,
            iov_len: len,
        };
        at += len;
        v
    })
    .collect()
}

impl Op {
    pub(crate) fn open_at(dirfd: RawFd, path: CString, flags: i32, mode: u32) -> Self {
        Op::OpenAt {
            dirfd,
            path,
            flags,
            mode,
        }
    }

    pub(crate) fn close(fd: RawFd) -> Self {
        Op::Close { fd }
    }

    /// A read shaped like `bufs`; the data lands in the op's own buffer.
    pub(crate) fn readv(fd: RawFd, bufs: &[IoSliceMut<'_>], offset: u64, flags: i32) -> Self {
        let mut buf = vec![0u8; bufs.iter().map(|b| b.len()).sum()];
        let iovecs = segments(&mut buf, bufs.iter().map(|b| b.len()));
        Op::ReadV {
            fd,
            buf,
            iovecs,
            offset,
            flags,
        }
    }

    /// A write of a copy of `bufs`.
    pub(crate) fn writev(fd: RawFd, bufs: &[IoSlice<'_>], offset: u64, flags: i32) -> Self {
        let mut buf = Vec::with_capacity(bufs.iter().map(|b| b.len()).sum());
        for b in bufs {
            buf.extend_from_slice(b);
        }
        let iovecs = segments(&mut buf, bufs.iter().map(|b| b.len()));
        Op::WriteV {
            fd,
            buf,
            iovecs,
            offset,
            flags,
        }
    }

    pub(crate) fn read(fd: RawFd, len: usize, offset: u64) -> Self {
        // Longer requests simply complete short
        let len = len.min(u32::MAX as usize);
        Op::Read {
            fd,
            buf: vec![0u8; len],
            offset,
        }
    }

    pub(crate) fn fadvise(fd: RawFd, offset: u64, len: i64, advice: i32) -> Self {
        Op::Fadvise {
            fd,
            offset,
            len,
            advice,
        }
    }

    /// The operation kind
    pub fn kind(&self) -> OpKind {
        match self {
            Op::OpenAt { .. } => OpKind::OpenAt,
            Op::Close { .. } => OpKind::Close,
            Op::ReadV { .. } => OpKind::ReadV,
            Op::WriteV { .. } => OpKind::WriteV,
            Op::Read { .. } => OpKind::Read,
            Op::Fadvise { .. } => OpKind::Fadvise,
        }
    }

    /// The descriptor the operation targets (`dirfd` for opens)
    pub fn fd(&self) -> RawFd {
        match self {
            Op::OpenAt { dirfd, .. } => *dirfd,
            Op::Close { fd }
            | Op::ReadV { fd, .. }
            | Op::WriteV { fd, .. }
            | Op::Read { fd, .. }
            | Op::Fadvise { fd, .. } => *fd,
        }
    }

    /// Total bytes requested by a data operation, 0 otherwise
    pub fn requested_len(&self) -> usize {
        self.data().len()
    }

    /// The data buffer of a read or write, empty for other kinds
    pub fn data(&self) -> &[u8] {
        match self {
            Op::ReadV { buf, .. } | Op::WriteV { buf, .. } | Op::Read { buf, .. } => buf,
            _ => &[],
        }
    }
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::OpenAt {
                dirfd,
                path,
                flags,
                mode,
            } => f
                .debug_struct("OpenAt")
                .field("dirfd", dirfd)
                .field("path", path)
                .field("flags", &format_args!("{:#o}", flags))
                .field("mode", &format_args!("{:#o}", mode))
                .finish(),
            Op::Close { fd } => f.debug_struct("Close").field("fd", fd).finish(),
            Op::ReadV {
                fd,
                iovecs,
                offset,
                flags,
                ..
            }
            | Op::WriteV {
                fd,
                iovecs,
                offset,
                flags,
                ..
            } => f
                .debug_struct(if self.kind() == OpKind::ReadV { "ReadV" } else { "WriteV" })
                .field("fd", fd)
                .field("segments", &iovecs.len())
                .field("len", &self.requested_len())
                .field("offset", offset)
                .field("flags", flags)
                .finish(),
            Op::Read { fd, buf, offset } => f
                .debug_struct("Read")
                .field("fd", fd)
                .field("len", &buf.len())
                .field("offset", offset)
                .finish(),
            Op::Fadvise {
                fd,
                offset,
                len,
                advice,
            } => f
                .debug_struct("Fadvise")
                .field("fd", fd)
                .field("offset", offset)
                .field("len", len)
                .field("advice", advice)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readv_segments_cover_own_buffer() {
        let mut a = [0u8; 4];
        let mut b = [0u8; 6];
        let bufs = [IoSliceMut::new(&mut a), IoSliceMut::new(&mut b)];
        let op = Op::readv(3, &bufs, 128, 0);

        assert_eq!(op.kind(), OpKind::ReadV);
        assert_eq!(op.fd(), 3);
        assert_eq!(op.requested_len(), 10);
        match op {
            Op::ReadV {
                buf, iovecs, offset, ..
            } => {
                assert_eq!(iovecs.len(), 2);
                assert_eq!(iovecs[0].iov_base as *const u8, buf.as_ptr());
                assert_eq!(iovecs[1].iov_base as *const u8, buf[4..].as_ptr());
                assert_eq!(iovecs[1].iov_len, 6);
                assert_eq!(offset, 128);
            }
            other => panic!("unexpected op: {:?}", other),
        }
    }

    #[test]
    fn test_writev_copies_segments() {
        let mut src = *b"abc";
        let op = Op::writev(7, &[IoSlice::new(&src), IoSlice::new(b""), IoSlice::new(b"de")], 0, libc::RWF_DSYNC);
        src[0] = b'z';
        assert_eq!(op.kind(), OpKind::WriteV);
        assert_eq!(op.requested_len(), 5);
        assert_eq!(op.data(), b"abcde");
        assert_eq!(src[0], b'z');
    }

    #[test]
    fn test_open_fd_is_dirfd() {
        let op = Op::open_at(libc::AT_FDCWD, CString::new("f").unwrap(), libc::O_RDONLY, 0);
        assert_eq!(op.fd(), libc::AT_FDCWD);
        assert_eq!(op.requested_len(), 0);
        assert!(op.data().is_empty());
    }

    #[test]
    fn test_debug_output() {
        let op = Op::close(9);
        assert_eq!(format!("{:?}", op), "Close { fd: 9 }");

        let op = Op::read(4, 16, 32);
        let dbg = format!("{:?}", op);
        assert!(dbg.contains("Read"));
        assert!(dbg.contains("len: 16"));
    }
}
