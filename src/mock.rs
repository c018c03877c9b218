//! In-memory engine with scripted behavior
//!
//! [`MockEngine`] implements [`Engine`] over a map of path to bytes. It can
//! cap every transfer to a fixed size (forcing short completions), inject
//! errors per operation kind, and defer completions so several cooperative
//! units are in flight at once. Everything runs on the calling thread.
//!
//! ```
//! use aura_fs::mock::MockEngine;
//! use aura_fs::open_read;
//! use std::io::IoSliceMut;
//! use std::rc::Rc;
//!
//! let engine = Rc::new(MockEngine::new());
//! engine.add_file("greeting", b"hello");
//! engine.set_max_transfer(Some(2));
//!
//! let n = engine.block_on(async {
//!     let file = open_read(&engine, "greeting").await?;
//!     let mut buf = [0u8; 5];
//!     let n = file.read(0, &mut [IoSliceMut::new(&mut buf)]).await?;
//!     Ok::<_, aura_fs::Error>(n)
//! });
//! assert_eq!(n.unwrap(), 5);
//! ```

use crate::completion::CompletionSlot;
use crate::engine::Engine;
use crate::op::{Op, OpKind};
use crate::stats::{Counters, Stats};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::ffi::OsStr;
use std::fmt;
use std::future::Future;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

struct MockFd {
    path: PathBuf,
    flags: i32,
}

impl MockFd {
    fn readable(&self) -> bool {
        self.flags & libc::O_ACCMODE != libc::O_WRONLY
    }

    fn writable(&self) -> bool {
        self.flags & libc::O_ACCMODE != libc::O_RDONLY
    }
}

struct MockState {
    files: HashMap<PathBuf, Vec<u8>>,
    fds: HashMap<RawFd, MockFd>,
    next_fd: RawFd,
    max_transfer: Option<usize>,
    failures: Vec<(OpKind, i32)>,
    stat_failure: Option<i32>,
    log: Vec<OpKind>,
    deferred: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            files: HashMap::new(),
            fds: HashMap::new(),
            next_fd: 3,
            max_transfer: None,
            failures: Vec::new(),
            stat_failure: None,
            log: Vec::new(),
            deferred: false,
        }
    }
}

/// Scripted in-memory [`Engine`]
#[derive(Default)]
pub struct MockEngine {
    state: RefCell<MockState>,
    queue: RefCell<VecDeque<(Op, Rc<CompletionSlot>)>>,
    counters: Counters,
}

impl MockEngine {
    /// Create an engine with no files
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the file at `path`
    pub fn add_file(&self, path: impl AsRef<Path>, data: &[u8]) {
        self.state
            .borrow_mut()
            .files
            .insert(path.as_ref().to_path_buf(), data.to_vec());
    }

    /// Current contents of the file at `path`
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.state.borrow().files.get(path.as_ref()).cloned()
    }

    /// Cap every read and write to at most `max` bytes
    pub fn set_max_transfer(&self, max: Option<usize>) {
        self.state.borrow_mut().max_transfer = max;
    }

    /// Queue operations instead of completing them on submission.
    ///
    /// Queued operations complete in submission order, one per
    /// suspension of [`block_on`](Self::block_on).
    pub fn set_deferred(&self, deferred: bool) {
        self.state.borrow_mut().deferred = deferred;
    }

    /// Fail the next operation of `kind` with `errno`
    pub fn fail_next(&self, kind: OpKind, errno: i32) {
        self.state.borrow_mut().failures.push((kind, errno));
    }

    /// Fail the next [`Engine::file_size`] call with `errno`
    pub fn fail_next_stat(&self, errno: i32) {
        self.state.borrow_mut().stat_failure = Some(errno);
    }

    /// Kinds of every operation submitted so far, in order
    pub fn ops(&self) -> Vec<OpKind> {
        self.state.borrow().log.clone()
    }

    /// Number of submitted operations of `kind`
    pub fn count(&self, kind: OpKind) -> usize {
        self.state.borrow().log.iter().filter(|&&k| k == kind).count()
    }

    /// Number of descriptors currently open
    pub fn open_fds(&self) -> usize {
        self.state.borrow().fds.len()
    }

    /// Get current engine statistics
    pub fn stats(&self) -> Stats {
        self.counters.snapshot()
    }

    /// Complete every queued operation; returns how many ran
    pub fn run_pending(&self) -> usize {
        let mut n = 0;
        while self.step() {
            n += 1;
        }
        n
    }

    /// Run `future` to completion on this thread.
    ///
    /// # Panics
    ///
    /// If the future suspends while no operation is queued: it could
    /// never be resumed.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        let mut future = pin!(future);
        let mut cx = Context::from_waker(Waker::noop());
        loop {
            if let Poll::Ready(out) = future.as_mut().poll(&mut cx) {
                return out;
            }
            if !self.step() {
                panic!("future is pending but no operation is in flight");
            }
        }
    }

    /// Complete the oldest queued operation
    fn step(&self) -> bool {
        let next = self.queue.borrow_mut().pop_front();
        match next {
            Some((op, slot)) => {
                self.finish(op, &slot);
                true
            }
            None => false,
        }
    }

    fn finish(&self, mut op: Op, slot: &CompletionSlot) {
        let res = self.execute(&mut op);
        self.counters.on_complete(op.kind(), res);
        slot.complete(res, op);
    }

    fn execute(&self, op: &mut Op) -> i32 {
        let mut state = self.state.borrow_mut();
        let kind = op.kind();
        if let Some(pos) = state.failures.iter().position(|&(k, _)| k == kind) {
            let (_, errno) = state.failures.remove(pos);
            return -errno;
        }
        let max = state.max_transfer.unwrap_or(usize::MAX);

        match op {
            Op::OpenAt { path, flags, .. } => {
                let flags = *flags;
                let path = PathBuf::from(OsStr::from_bytes(path.as_bytes()));
                let exists = state.files.contains_key(&path);
                if !exists && flags & libc::O_CREAT == 0 {
                    return -libc::ENOENT;
                }
                if exists && flags & libc::O_CREAT != 0 && flags & libc::O_EXCL != 0 {
                    return -libc::EEXIST;
                }
                let data = state.files.entry(path.clone()).or_default();
                if flags & libc::O_TRUNC != 0 && flags & libc::O_ACCMODE != libc::O_RDONLY {
                    data.clear();
                }
                let fd = state.next_fd;
                state.next_fd += 1;
                state.fds.insert(
                    fd,
                    MockFd {
                        path,
                        flags,
                    },
                );
                fd
            }
            Op::Close { fd } => match state.fds.remove(fd) {
                Some(_) => 0,
                None => -libc::EBADF,
            },
            Op::ReadV {
                fd, buf, offset, ..
            }
            | Op::Read { fd, buf, offset } => {
                let Some(data) = state.readable(*fd) else {
                    return -libc::EBADF;
                };
                fill(data, *offset, max, buf) as i32
            }
            Op::WriteV {
                fd, buf, offset, ..
            } => {
                let append = match state.fds.get(fd) {
                    Some(f) if f.writable() => f.flags & libc::O_APPEND != 0,
                    _ => return -libc::EBADF,
                };
                let bytes = &buf[..buf.len().min(max)];
                let Some(data) = state.data_mut(*fd) else {
                    return -libc::EBADF;
                };
                let start = if append { data.len() } else { *offset as usize };
                let end = start + bytes.len();
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[start..end].copy_from_slice(bytes);
                bytes.len() as i32
            }
            Op::Fadvise { fd, .. } => {
                if state.fds.contains_key(fd) {
                    0
                } else {
                    -libc::EBADF
                }
            }
        }
    }
}

impl MockState {
    fn readable(&self, fd: RawFd) -> Option<&[u8]> {
        let f = self.fds.get(&fd).filter(|f| f.readable())?;
        self.files.get(&f.path).map(Vec::as_slice)
    }

    fn data_mut(&mut self, fd: RawFd) -> Option<&mut Vec<u8>> {
        let path = &self.fds.get(&fd)?.path;
        self.files.get_mut(path)
    }
}

/// Copy file bytes from `offset` into `buf`, at most `max`
fn fill(data: &[u8], offset: u64, max: usize, buf: &mut [u8]) -> usize {
    let start = usize::try_from(offset).map_or(data.len(), |o| o.min(data.len()));
    let n = (data.len() - start).min(max).min(buf.len());
    buf[..n].copy_from_slice(&data[start..start + n]);
    n
}

impl Engine for MockEngine {
    fn submit(&self, op: Op) -> Rc<CompletionSlot> {
        let slot = CompletionSlot::new();
        self.counters.on_submit();
        let deferred = {
            let mut state = self.state.borrow_mut();
            state.log.push(op.kind());
            state.deferred
        };
        if deferred {
            self.queue.borrow_mut().push_back((op, Rc::clone(&slot)));
        } else {
            self.finish(op, &slot);
        }
        slot
    }

    fn wait_for(&self, slot: &CompletionSlot) {
        while !slot.is_complete() {
            if !self.step() {
                panic!("waiting for an operation the mock engine never queued");
            }
        }
    }

    fn file_size(&self, fd: RawFd) -> io::Result<u64> {
        let mut state = self.state.borrow_mut();
        if let Some(errno) = state.stat_failure.take() {
            return Err(io::Error::from_raw_os_error(errno));
        }
        let f = state
            .fds
            .get(&fd)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))?;
        Ok(state.files.get(&f.path).map_or(0, |d| d.len() as u64))
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        self.run_pending();
    }
}

impl fmt::Debug for MockEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MockEngine")
            .field("files", &state.files.len())
            .field("open_fds", &state.fds.len())
            .field("queued", &self.queue.borrow().len())
            .field("max_transfer", &state.max_transfer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::issue;
    use std::ffi::CString;
    use std::io::{IoSlice, IoSliceMut};

    fn open(engine: &MockEngine, path: &str, flags: i32) -> RawFd {
        let path = CString::new(path).unwrap();
        engine.block_on(issue(engine, Op::open_at(libc::AT_FDCWD, path, flags, 0o644)))
    }

    #[test]
    fn test_descriptors_start_after_stdio() {
        let engine = MockEngine::new();
        engine.add_file("f", b"");
        assert_eq!(open(&engine, "f", libc::O_RDONLY), 3);
        assert_eq!(open(&engine, "f", libc::O_RDONLY), 4);
        assert_eq!(engine.open_fds(), 2);
    }

    #[test]
    fn test_access_mode_is_enforced() {
        let engine = MockEngine::new();
        engine.add_file("f", b"abc");
        let ro = open(&engine, "f", libc::O_RDONLY);
        let wo = open(&engine, "f", libc::O_WRONLY);

        let res = engine.block_on(issue(&engine, Op::writev(ro, &[IoSlice::new(b"x")], 0, 0)));
        assert_eq!(res, -libc::EBADF);

        let mut buf = [0u8; 3];
        let res = engine.block_on(issue(&engine, Op::readv(wo, &[IoSliceMut::new(&mut buf)], 0, 0)));
        assert_eq!(res, -libc::EBADF);
        assert_eq!(engine.stats().ops_failed(), 2);
    }

    #[test]
    fn test_append_ignores_offset() {
        let engine = MockEngine::new();
        engine.add_file("f", b"abc");
        let fd = open(&engine, "f", libc::O_WRONLY | libc::O_APPEND);
        let res = engine.block_on(issue(&engine, Op::writev(fd, &[IoSlice::new(b"de")], 0, 0)));
        assert_eq!(res, 2);
        assert_eq!(engine.contents("f").unwrap(), b"abcde");
    }

    #[test]
    fn test_max_transfer_spans_segments() {
        let engine = MockEngine::new();
        engine.add_file("f", b"abcdefgh");
        engine.set_max_transfer(Some(5));
        let fd = open(&engine, "f", libc::O_RDONLY);

        let mut a = [0u8; 3];
        let mut empty = [0u8; 0];
        let mut b = [0u8; 4];
        let mut bufs = [IoSliceMut::new(&mut a), IoSliceMut::new(&mut empty), IoSliceMut::new(&mut b)];
        let res = engine.block_on(crate::io::read_some(&engine, fd, &mut bufs, 1, 0));
        assert_eq!(res.unwrap(), 5);
        drop(bufs);
        assert_eq!(&a, b"bcd");
        assert_eq!(&b[..2], b"ef");
    }

    #[test]
    fn test_failures_match_kind_once() {
        let engine = MockEngine::new();
        engine.add_file("f", b"");
        engine.fail_next(OpKind::Close, libc::EINTR);
        let fd = open(&engine, "f", libc::O_RDONLY);
        assert!(fd >= 0);

        assert_eq!(engine.block_on(issue(&engine, Op::close(fd))), -libc::EINTR);
        assert_eq!(engine.block_on(issue(&engine, Op::close(fd))), 0);
    }

    #[test]
    fn test_deferred_completes_in_order() {
        let engine = MockEngine::new();
        engine.set_deferred(true);
        let first = engine.submit(Op::close(10));
        let second = engine.submit(Op::close(11));
        assert_eq!(engine.stats().current_in_flight(), 2);
        assert!(!first.is_complete());

        engine.wait_for(&first);
        assert!(first.is_complete());
        assert!(!second.is_complete());
        assert_eq!(engine.run_pending(), 1);
        assert!(second.is_complete());
    }

    #[test]
    #[should_panic(expected = "no operation is in flight")]
    fn test_block_on_detects_stuck_future() {
        let engine = MockEngine::new();
        engine.block_on(std::future::pending::<()>());
    }

    #[test]
    fn test_file_size() {
        let engine = MockEngine::new();
        engine.add_file("f", b"12345");
        let fd = open(&engine, "f", libc::O_RDONLY);
        assert_eq!(engine.file_size(fd).unwrap(), 5);
        assert_eq!(engine.file_size(99).unwrap_err().raw_os_error(), Some(libc::EBADF));

        engine.fail_next_stat(libc::EIO);
        assert!(engine.file_size(fd).is_err());
        assert_eq!(engine.file_size(fd).unwrap(), 5);
    }
}
