// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 AuraIO Contributors


//! Completion engines
//!
//! [`Engine`] is the boundary every file abstraction talks to: submit a
//! fully populated [`Op`], get a [`CompletionSlot`] that the engine fills
//! exactly once. [`Proactor`] is the io_uring implementation.

use crate::completion::CompletionSlot;
use crate::error::{Error, Result};
use crate::log::{log_emit, LogLevel};
use crate::op::Op;
use crate::options::Options;
use crate::stats::{Counters, Stats};

use io_uring::{opcode, squeue, types, IoUring};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::os::unix::io::RawFd;
use std::pin::pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// A thread-bound completion engine.
///
/// Implementations are driven from a single thread. Results are raw
/// kernel-style integers: negative values are negated errno codes.
pub trait Engine {
    /// Queue `op` and return the slot its result will be delivered to.
    ///
    /// Submission failures are delivered through the slot as a negative
    /// result, so every submitted operation completes exactly once.
    fn submit(&self, op: Op) -> Rc<CompletionSlot>;

    /// Drive the engine until `slot` has a result.
    fn wait_for(&self, slot: &CompletionSlot);

    /// Size in bytes of the file behind `fd`.
    ///
    /// A local synchronous stat; it does not go through the ring.
    fn file_size(&self, fd: RawFd) -> io::Result<u64>;
}

/// An operation the kernel has not completed yet
struct Pending {
    /// Owns the path, iovecs and data buffer the SQE points into
    op: Op,
    slot: Rc<CompletionSlot>,
}

thread_local! {
    static CURRENT: RefCell<Option<Rc<Proactor>>> = const { RefCell::new(None) };
}

/// Restores the previously running proactor when `block_on` returns
struct CurrentGuard {
    prev: Option<Rc<Proactor>>,
}

impl CurrentGuard {
    fn enter(proactor: Rc<Proactor>) -> Self {
        let prev = CURRENT.with(|c| c.borrow_mut().replace(proactor));
        Self { prev }
    }
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT.with(|c| *c.borrow_mut() = prev);
    }
}

/// Single-threaded io_uring proactor
///
/// Owns one ring. Futures created by the file abstractions are polled
/// by [`block_on`](Self::block_on); whenever they are all suspended the
/// proactor submits queued SQEs and waits for completions.
///
/// # Thread Safety
///
/// `Proactor` is neither `Send` nor `Sync`. Files hold an `Rc` to it, so
/// every operation runs on the thread that created the ring.
///
/// # Example
///
/// ```no_run
/// use aura_fs::{open_read_current, Proactor};
/// use std::io::IoSliceMut;
/// use std::rc::Rc;
///
/// # fn main() -> aura_fs::Result<()> {
/// let proactor = Rc::new(Proactor::new()?);
/// let n = proactor.block_on(async {
///     let file = open_read_current("/etc/hostname").await?;
///     let mut buf = vec![0u8; file.size() as usize];
///     let n = file.read(0, &mut [IoSliceMut::new(&mut buf)]).await?;
///     Ok::<_, aura_fs::Error>(n)
/// })?;
/// println!("read {} bytes", n);
/// # Ok(())
/// # }
/// ```
pub struct Proactor {
    ring: RefCell<IoUring>,
    pending: RefCell<HashMap<u64, Pending>>,
    next_id: Cell<u64>,
    counters: Counters,
}

impl Proactor {
    /// Create a new proactor with default options
    pub fn new() -> Result<Self> {
        Self::with_options(&Options::default())
    }

    /// Create a new proactor with custom options
    pub fn with_options(options: &Options) -> Result<Self> {
        let mut builder = IoUring::builder();
        if options.sqpoll {
            builder.setup_sqpoll(options.sqpoll_idle_ms);
        }
        let ring = builder
            .build(options.queue_depth)
            .map_err(Error::EngineCreate)?;

        log_emit(
            LogLevel::Info,
            &format!(
                "proactor created (depth {}, sqpoll {})",
                options.queue_depth, options.sqpoll
            ),
        );

        Ok(Self {
            ring: RefCell::new(ring),
            pending: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
            counters: Counters::default(),
        })
    }

    /// The proactor running [`block_on`](Self::block_on) on this thread, if any
    pub fn current() -> Option<Rc<Proactor>> {
        CURRENT.with(|c| c.borrow().clone())
    }

    /// The proactor running on this thread.
    ///
    /// # Panics
    ///
    /// If no proactor is running on this thread. Binding a file outside
    /// of `block_on` is a programming error.
    pub fn expect_current() -> Rc<Proactor> {
        match Self::current() {
            Some(p) => p,
            None => panic!("no aura_fs::Proactor is running on this thread"),
        }
    }

    /// Run `future` to completion on this thread.
    ///
    /// While the future runs, [`Proactor::current`] returns this proactor.
    ///
    /// # Panics
    ///
    /// If the ring fails irrecoverably while operations are in flight, or
    /// if the future suspends while nothing is in flight: it could never
    /// be resumed.
    pub fn block_on<F: Future>(self: &Rc<Self>, future: F) -> F::Output {
        let _guard = CurrentGuard::enter(Rc::clone(self));
        let mut future = pin!(future);
        let waker = Waker::noop();
        let mut cx = Context::from_waker(waker);

        loop {
            if let Poll::Ready(out) = future.as_mut().poll(&mut cx) {
                return out;
            }
            if self.counters.in_flight() == 0 {
                panic!("future is pending but no operation is in flight");
            }
            if let Err(e) = self.reap(true) {
                panic!("io_uring failed with operations in flight: {}", e);
            }
        }
    }

    /// Submit queued SQEs and process completions (non-blocking)
    ///
    /// Returns the number of completions processed.
    pub fn poll(&self) -> Result<usize> {
        Ok(self.reap(false)?)
    }

    /// Submit queued SQEs to the kernel without reaping completions
    pub fn flush(&self) -> Result<usize> {
        Ok(self.ring.borrow_mut().submit()?)
    }

    /// Get current engine statistics
    pub fn stats(&self) -> Stats {
        self.counters.snapshot()
    }

    fn push(&self, entry: &squeue::Entry) -> io::Result<()> {
        let mut ring = self.ring.borrow_mut();
        // Safety: the SQE points into the `Op` held in `pending`, which is
        // only released once the CQE has been reaped.
        if unsafe { ring.submission().push(entry) }.is_ok() {
            return Ok(());
        }
        // Queue full: hand what we have to the kernel and retry once
        ring.submit()?;
        let pushed = unsafe { ring.submission().push(entry) };
        pushed.map_err(|_| io::Error::from_raw_os_error(libc::EBUSY))
    }

    /// Submit pending SQEs and dispatch every available completion.
    ///
    /// With `wait`, blocks until at least one completion arrives if any
    /// operation is in flight.
    fn reap(&self, wait: bool) -> io::Result<usize> {
        let completions: Vec<(u64, i32)> = {
            let mut ring = self.ring.borrow_mut();
            let want = usize::from(wait && self.counters.in_flight() > 0);
            loop {
                match ring.submit_and_wait(want) {
                    Ok(_) => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    // CQ overflow backlog: drain what is there first
                    Err(e) if e.raw_os_error() == Some(libc::EBUSY) => break,
                    Err(e) => return Err(e),
                }
            }
            let reaped = ring
                .completion()
                .map(|cqe| (cqe.user_data(), cqe.result()))
                .collect();
            reaped
        };

        let n = completions.len();
        for (id, res) in completions {
            self.dispatch(id, res);
        }
        Ok(n)
    }

    fn dispatch(&self, id: u64, res: i32) {
        let Some(Pending { op, slot }) = self.pending.borrow_mut().remove(&id) else {
            return;
        };
        self.counters.on_complete(op.kind(), res);
        if res < 0 && Rc::strong_count(&slot) == 1 {
            // Nobody is waiting: a detached close from Drop
            log_emit(
                LogLevel::Warning,
                &format!(
                    "detached {:?} failed: {}",
                    op,
                    io::Error::from_raw_os_error(res.wrapping_neg())
                ),
            );
        }
        slot.complete(res, op);
    }
}

impl Engine for Proactor {
    fn submit(&self, mut op: Op) -> Rc<CompletionSlot> {
        let slot = CompletionSlot::new();
        let id = self.next_id.get();
        self.next_id.set(id.wrapping_add(1));

        let kind = op.kind();
        let entry = build_entry(&mut op).user_data(id);
        self.counters.on_submit();
        self.pending.borrow_mut().insert(
            id,
            Pending {
                op,
                slot: Rc::clone(&slot),
            },
        );

        if let Err(e) = self.push(&entry) {
            let removed = self.pending.borrow_mut().remove(&id);
            let res = -e.raw_os_error().unwrap_or(libc::EIO);
            self.counters.on_complete(kind, res);
            if let Some(Pending { op, .. }) = removed {
                slot.complete(res, op);
            }
        }
        slot
    }

    fn wait_for(&self, slot: &CompletionSlot) {
        while !slot.is_complete() {
            if let Err(e) = self.reap(true) {
                // Returning would leave the slot without a result
                panic!("io_uring failed while waiting for a completion: {}", e);
            }
        }
    }

    fn file_size(&self, fd: RawFd) -> io::Result<u64> {
        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut st) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(st.st_size as u64)
    }
}

impl Drop for Proactor {
    fn drop(&mut self) {
        // Detached closes may still be in flight
        let mut drained = 0;
        while self.counters.in_flight() > 0 {
            match self.reap(true) {
                Ok(n) => drained += n,
                Err(e) => {
                    log_emit(LogLevel::Error, &format!("proactor drain failed: {}", e));
                    break;
                }
            }
        }
        if drained > 0 {
            log_emit(
                LogLevel::Debug,
                &format!("proactor drained {} completions on drop", drained),
            );
        }
    }
}

fn build_entry(op: &mut Op) -> squeue::Entry {
    match op {
        Op::OpenAt {
            dirfd,
            path,
            flags,
            mode,
        } => opcode::OpenAt::new(types::Fd(*dirfd), path.as_ptr())
            .flags(*flags)
            .mode(*mode as _)
            .build(),
        Op::Close { fd } => opcode::Close::new(types::Fd(*fd)).build(),
        Op::ReadV {
            fd,
            iovecs,
            offset,
            flags,
            ..
        } => opcode::Readv::new(types::Fd(*fd), iovecs.as_ptr(), iovecs.len() as u32)
            .offset(*offset)
            .rw_flags(*flags as _)
            .build(),
        Op::WriteV {
            fd,
            iovecs,
            offset,
            flags,
            ..
        } => opcode::Writev::new(types::Fd(*fd), iovecs.as_ptr(), iovecs.len() as u32)
            .offset(*offset)
            .rw_flags(*flags as _)
            .build(),
        Op::Read { fd, buf, offset } => {
            opcode::Read::new(types::Fd(*fd), buf.as_mut_ptr(), buf.len() as u32)
                .offset(*offset)
                .build()
        }
        Op::Fadvise {
            fd,
            offset,
            len,
            advice,
        } => opcode::Fadvise::new(types::Fd(*fd), *len as _, *advice)
            .offset(*offset)
            .build(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::completion::issue;
    use std::ffi::CString;
    use std::io::{IoSlice, IoSliceMut, Write as _};
    use std::os::unix::ffi::OsStrExt;

    /// A proactor, or `None` when the kernel refuses io_uring
    /// (old kernels, seccomp-restricted containers).
    pub(crate) fn proactor() -> Option<Rc<Proactor>> {
        match Proactor::new() {
            Ok(p) => Some(Rc::new(p)),
            Err(e) => {
                eprintln!("skipping: io_uring unavailable: {}", e);
                None
            }
        }
    }

    #[test]
    fn test_current_is_none_outside_block_on() {
        assert!(Proactor::current().is_none());
    }

    #[test]
    #[should_panic(expected = "no aura_fs::Proactor is running")]
    fn test_expect_current_panics_without_proactor() {
        let _ = Proactor::expect_current();
    }

    #[test]
    fn test_current_inside_block_on() {
        let Some(proactor) = proactor() else { return };
        let inner = proactor.block_on(async { Proactor::current() });
        let inner = inner.expect("current proactor");
        assert!(Rc::ptr_eq(&inner, &proactor));
        assert!(Proactor::current().is_none());
    }

    #[test]
    fn test_with_options() {
        let opts = Options::new().queue_depth(8);
        match Proactor::with_options(&opts) {
            Ok(p) => assert_eq!(p.stats().ops_submitted(), 0),
            Err(Error::EngineCreate(e)) => eprintln!("skipping: {}", e),
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    #[test]
    fn test_poll_no_ops() {
        let Some(proactor) = proactor() else { return };
        assert_eq!(proactor.poll().unwrap(), 0);
        assert_eq!(proactor.flush().unwrap(), 0);
    }

    #[test]
    fn test_readv_writev_roundtrip() {
        let Some(proactor) = proactor() else { return };
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        tmpfile.write_all(b"AABBCCDD").unwrap();
        tmpfile.flush().unwrap();
        let path = CString::new(tmpfile.path().as_os_str().as_bytes()).unwrap();

        let (fd, n) = proactor.block_on(async {
            let fd = issue(&*proactor, Op::open_at(libc::AT_FDCWD, path, libc::O_RDWR, 0)).await;
            assert!(fd >= 0, "open failed: {}", fd);

            let mut a = [0u8; 4];
            let mut b = [0u8; 4];
            let mut bufs = [IoSliceMut::new(&mut a), IoSliceMut::new(&mut b)];
            let n = crate::io::read_some(&*proactor, fd, &mut bufs, 0, 0).await.unwrap();
            assert_eq!(&a, b"AABB");
            assert_eq!(&b, b"CCDD");

            let w = issue(&*proactor, Op::writev(fd, &[IoSlice::new(b"EE")], 8, 0)).await;
            assert_eq!(w, 2);
            (fd, n)
        });
        assert_eq!(n, 8);

        let res = proactor.block_on(issue(&*proactor, Op::close(fd)));
        assert_eq!(res, 0);
        assert_eq!(std::fs::read(tmpfile.path()).unwrap(), b"AABBCCDDEE");

        let stats = proactor.stats();
        assert_eq!(stats.ops_submitted(), 4);
        assert_eq!(stats.ops_completed(), 4);
        assert_eq!(stats.bytes_read(), 8);
        assert_eq!(stats.bytes_written(), 2);
        assert_eq!(stats.current_in_flight(), 0);
    }

    #[test]
    fn test_negative_result_for_bad_fd() {
        let Some(proactor) = proactor() else { return };
        let res = proactor.block_on(issue(&*proactor, Op::read(-1, 8, 0)));
        assert_eq!(res, -libc::EBADF);
        assert_eq!(proactor.stats().ops_failed(), 1);
    }

    #[test]
    fn test_file_size_is_local_stat() {
        let Some(proactor) = proactor() else { return };
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        tmpfile.write_all(&[7u8; 123]).unwrap();
        tmpfile.flush().unwrap();

        use std::os::unix::io::AsRawFd;
        let file = std::fs::File::open(tmpfile.path()).unwrap();
        assert_eq!(proactor.file_size(file.as_raw_fd()).unwrap(), 123);
        assert_eq!(proactor.stats().ops_submitted(), 0);
        assert!(proactor.file_size(-1).is_err());
    }

    #[test]
    fn test_dropped_completion_blocks_until_done() {
        let Some(proactor) = proactor() else { return };
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        tmpfile.write_all(b"hello").unwrap();
        tmpfile.flush().unwrap();

        use std::os::unix::io::AsRawFd;
        let file = std::fs::File::open(tmpfile.path()).unwrap();
        let pending = crate::completion::Completion::new(&*proactor, Op::read(file.as_raw_fd(), 5, 0));
        drop(pending);
        assert_eq!(proactor.stats().current_in_flight(), 0);
        assert_eq!(proactor.stats().bytes_read(), 5);
    }

    #[test]
    fn test_leaked_read_lands_in_engine_memory() {
        let Some(proactor) = proactor() else { return };
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        tmpfile.write_all(&[0xab; 64]).unwrap();
        tmpfile.flush().unwrap();

        use std::os::unix::io::AsRawFd;
        let file = std::fs::File::open(tmpfile.path()).unwrap();
        let mut victim = vec![0u8; 64];
        {
            let mut bufs = [IoSliceMut::new(&mut victim)];
            let mut fut = Box::pin(crate::io::read_some(&*proactor, file.as_raw_fd(), &mut bufs, 0, 0));
            let mut cx = Context::from_waker(Waker::noop());
            assert!(fut.as_mut().poll(&mut cx).is_pending());
            std::mem::forget(fut);
        }
        victim.fill(0x11);
        while proactor.stats().current_in_flight() > 0 {
            proactor.poll().unwrap();
        }
        assert_eq!(proactor.stats().bytes_read(), 64);
        assert!(victim.iter().all(|&b| b == 0x11));
    }

    #[test]
    fn test_block_on_detects_stuck_future() {
        let Some(proactor) = proactor() else { return };
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            proactor.block_on(std::future::pending::<()>())
        }));
        let payload = res.unwrap_err();
        let msg = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or_default();
        assert!(msg.contains("no operation is in flight"), "unexpected panic: {}", msg);
        assert!(Proactor::current().is_none());
    }
}
