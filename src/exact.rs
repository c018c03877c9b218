//! Exact-transfer driver
//!
//! Repeats single-shot positional operations until the whole buffer list
//! is transferred. Reads stop early only at end of file; writes stop only
//! on error. Each retry targets the cumulative offset, so the transferred
//! bytes are always contiguous in the file.
//!
//! A completion that ends inside a buffer entry is finished with the
//! single-buffer loop ([`read_all_at`] / [`write_all_one_at`]) before the
//! vectored loop continues with the next entry.

use crate::error::{Error, Result};
use crate::file::{PositionalRead, PositionalWrite};
use std::io::{self, IoSlice, IoSliceMut};

/// `offset` moved forward by `by` bytes
fn advance(offset: u64, by: usize) -> Result<u64> {
    offset
        .checked_add(by as u64)
        .ok_or(Error::InvalidArgument("file offset overflows"))
}

/// Index of the first non-empty entry at or after `idx`
fn skip_empty(lens: impl Iterator<Item = usize>, idx: usize) -> usize {
    idx + lens.skip(idx).take_while(|&len| len == 0).count()
}

/// Fill every entry of `bufs` from `offset`.
///
/// Returns the number of bytes read, which is less than the total length of
/// `bufs` only if end of file was reached. An empty list issues nothing.
pub async fn read_exact_at<F: PositionalRead + ?Sized>(
    file: &F,
    bufs: &mut [IoSliceMut<'_>],
    offset: u64,
    flags: i32,
) -> Result<usize> {
    let mut total = 0usize;
    let mut idx = 0;

    loop {
        idx = skip_empty(bufs.iter().map(|b| b.len()), idx);
        if idx == bufs.len() {
            return Ok(total);
        }

        let remaining = &mut bufs[idx..];
        let requested: usize = remaining.iter().map(|b| b.len()).sum();
        let n = file
            .read_some_at(remaining, advance(offset, total)?, flags)
            .await?
            .min(requested);
        if n == 0 {
            return Ok(total);
        }
        total += n;

        let mut left = n;
        while left > 0 {
            let len = bufs[idx].len();
            if left >= len {
                left -= len;
                idx += 1;
                continue;
            }
            let tail = &mut bufs[idx][left..];
            let want = tail.len();
            let got = read_all_at(file, tail, advance(offset, total)?).await?;
            total += got;
            if got < want {
                return Ok(total);
            }
            idx += 1;
            left = 0;
        }
    }
}

/// Fill `buf` from `offset` with single-buffer reads.
///
/// Returns fewer bytes than `buf.len()` only at end of file.
pub async fn read_all_at<F: PositionalRead + ?Sized>(
    file: &F,
    buf: &mut [u8],
    offset: u64,
) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let want = buf.len() - filled;
        let n = file
            .read_one_at(&mut buf[filled..], advance(offset, filled)?)
            .await?
            .min(want);
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Write every entry of `bufs` starting at `offset`.
///
/// Returns the total length of `bufs`. A completion that writes nothing for
/// a non-empty request fails with [`io::ErrorKind::WriteZero`].
pub async fn write_all_at<F: PositionalWrite + ?Sized>(
    file: &F,
    bufs: &[IoSlice<'_>],
    offset: u64,
    flags: i32,
) -> Result<usize> {
    let mut written = 0;
    write_all_tracked(file, bufs, offset, flags, &mut written).await?;
    Ok(written)
}

/// Write all of `buf` starting at `offset` with single-buffer writes
pub async fn write_all_one_at<F: PositionalWrite + ?Sized>(
    file: &F,
    buf: &[u8],
    offset: u64,
    flags: i32,
) -> Result<usize> {
    let mut written = 0;
    write_one_tracked(file, buf, offset, flags, &mut written).await?;
    Ok(written)
}

/// [`write_all_at`] that reports progress through `written`, including the
/// bytes that landed before an error.
pub(crate) async fn write_all_tracked<F: PositionalWrite + ?Sized>(
    file: &F,
    bufs: &[IoSlice<'_>],
    offset: u64,
    flags: i32,
    written: &mut usize,
) -> Result<()> {
    let start = *written;
    let mut idx = 0;

    loop {
        idx = skip_empty(bufs.iter().map(|b| b.len()), idx);
        if idx == bufs.len() {
            return Ok(());
        }

        let remaining = &bufs[idx..];
        let requested: usize = remaining.iter().map(|b| b.len()).sum();
        let pos = advance(offset, *written - start)?;
        let n = file
            .write_some_at(remaining, pos, flags)
            .await?
            .min(requested);
        if n == 0 {
            return Err(write_zero());
        }
        *written += n;

        let mut left = n;
        while left > 0 {
            let len = bufs[idx].len();
            if left >= len {
                left -= len;
                idx += 1;
                continue;
            }
            let pos = advance(offset, *written - start)?;
            write_one_tracked(file, &bufs[idx][left..], pos, flags, written).await?;
            idx += 1;
            left = 0;
        }
    }
}

async fn write_one_tracked<F: PositionalWrite + ?Sized>(
    file: &F,
    buf: &[u8],
    offset: u64,
    flags: i32,
    written: &mut usize,
) -> Result<()> {
    let mut done = 0;
    while done < buf.len() {
        let rest = &buf[done..];
        let n = file
            .write_some_at(&[IoSlice::new(rest)], advance(offset, done)?, flags)
            .await?
            .min(rest.len());
        if n == 0 {
            return Err(write_zero());
        }
        done += n;
        *written += n;
    }
    Ok(())
}

fn write_zero() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::WriteZero,
        "write completed with zero bytes",
    ))
}
