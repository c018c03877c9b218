//! Fiber-style file I/O over io_uring
//!
//! Every operation is submitted to a completion engine and the calling
//! future suspends until its completion arrives. Code reads like blocking
//! I/O, but many files can be in flight at once on a single thread.
//!
//! # Quick Start
//!
//! ```no_run
//! use aura_fs::{open_read_current, open_write_current, Proactor, WriteOptions};
//! use std::io::{IoSlice, IoSliceMut};
//! use std::rc::Rc;
//!
//! fn main() -> aura_fs::Result<()> {
//!     let proactor = Rc::new(Proactor::new()?);
//!
//!     proactor.block_on(async {
//!         let mut out = open_write_current("/tmp/hello.txt", WriteOptions::new()).await?;
//!         out.write_all(&[IoSlice::new(b"hello, "), IoSlice::new(b"world")]).await?;
//!         out.close().await?;
//!
//!         let input = open_read_current("/tmp/hello.txt").await?;
//!         let mut buf = vec![0u8; input.size() as usize];
//!         let n = input.read(0, &mut [IoSliceMut::new(&mut buf)]).await?;
//!         println!("read {} bytes", n);
//!         Ok::<_, aura_fs::Error>(())
//!     })
//! }
//! ```
//!
//! # API Overview
//!
//! - [`Proactor`] - io_uring engine that drives the futures on its thread
//! - [`ReadOnlyFile`] - fixed size, exact-transfer reads
//! - [`WriteFile`] - sequential writes from a cursor, append or truncate
//! - [`LinuxFile`] - raw positional reads and writes
//! - [`read_exact_at`] / [`write_all_at`] - exact-transfer driver over the
//!   [`PositionalRead`] / [`PositionalWrite`] capabilities
//! - [`mock::MockEngine`] - in-memory engine for tests
//!
//! # Threading
//!
//! Files hold an `Rc` to their engine, so they are neither `Send` nor
//! `Sync`: every operation runs on the thread that owns the engine.
//!
//! # Buffers
//!
//! The kernel never sees caller memory. Each read or write owns its data
//! buffer inside the submitted [`Op`]: writes copy the caller's slices in
//! at submission, reads copy into the caller's slices once the completion
//! arrives. A future dropped while its operation is in flight blocks until
//! the completion arrives; a leaked one leaves the caller's slices untouched.

mod completion;
mod engine;
mod error;
mod exact;
mod file;
mod io;
mod log;
pub mod mock;
mod op;
mod open;
mod options;
mod stats;

pub use completion::{issue, Completion, CompletionSlot};
pub use engine::{Engine, Proactor};
pub use error::{Error, Result};
pub use exact::{read_all_at, read_exact_at, write_all_at, write_all_one_at};
pub use file::{Closable, LinuxFile, PositionalRead, PositionalWrite, ReadOnlyFile, SizedReadable, WriteFile};
pub use io::{close_fd, read_at, read_some, write_some};
pub use crate::log::{clear_log_handler, log_emit, set_log_handler, LogLevel};
pub use op::{Op, OpKind};
pub use open::{
    open_linux, open_linux_current, open_read, open_read_current, open_write, open_write_current,
};
pub use options::{Options, WriteOptions, DEFAULT_FILE_MODE};
pub use stats::Stats;
