//! File abstractions and the capabilities they share
//!
//! - [`ReadOnlyFile`] - fixed size, exact-transfer reads
//! - [`WriteFile`] - lazily opened, append or truncate, write cursor
//! - [`LinuxFile`] - raw positional reads and writes with caller offsets
//!
//! The exact-transfer driver in [`exact`](crate::exact) is written against
//! the capability traits below, not against a concrete file type.

mod linux;
mod read;
mod write;

pub use linux::LinuxFile;
pub use read::ReadOnlyFile;
pub use write::WriteFile;

use crate::error::Result;
use std::io::{IoSlice, IoSliceMut};

/// Single-shot positional reads.
///
/// A read may transfer fewer bytes than requested; 0 means end of file.
#[allow(async_fn_in_trait)]
pub trait PositionalRead {
    /// Read into `bufs` starting at `offset`, issuing one operation
    async fn read_some_at(
        &self,
        bufs: &mut [IoSliceMut<'_>],
        offset: u64,
        flags: i32,
    ) -> Result<usize>;

    /// Read into a single buffer starting at `offset`
    async fn read_one_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut one = [IoSliceMut::new(buf)];
        self.read_some_at(&mut one, offset, 0).await
    }
}

/// Single-shot positional writes. A write may be short.
#[allow(async_fn_in_trait)]
pub trait PositionalWrite {
    /// Write `bufs` starting at `offset`, issuing one operation
    async fn write_some_at(&self, bufs: &[IoSlice<'_>], offset: u64, flags: i32)
        -> Result<usize>;
}

/// A file with a size fixed at open time and exact-transfer reads
#[allow(async_fn_in_trait)]
pub trait SizedReadable {
    /// Size in bytes captured at open
    fn size(&self) -> u64;

    /// Fill `bufs` from `offset`; short only at end of file
    async fn read(&self, offset: u64, bufs: &mut [IoSliceMut<'_>]) -> Result<usize>;
}

/// A file whose descriptor can be released explicitly.
///
/// Closing twice is not an error; the second call issues nothing.
#[allow(async_fn_in_trait)]
pub trait Closable {
    /// Close the descriptor and invalidate it
    async fn close(&mut self) -> Result<()>;
}
