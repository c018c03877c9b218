//! File copy example
//!
//! Copies a file chunk by chunk. Each read and write suspends the copy
//! future until the proactor reaps its completion.
//!
//! Usage: cargo run --example file_copy -- <source> <destination>

use aura_fs::{open_read_current, open_write_current, Proactor, Result, WriteOptions};
use std::env;
use std::io::{IoSlice, IoSliceMut};
use std::rc::Rc;
use std::time::Instant;

const CHUNK_SIZE: usize = 256 * 1024; // 256KB chunks

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <source> <destination>", args[0]);
        eprintln!("\nCopies a file using io_uring file I/O.");
        std::process::exit(1);
    }

    let src_path = &args[1];
    let dst_path = &args[2];

    println!("aura-fs File Copy");
    println!("=================");
    println!("Source:      {}", src_path);
    println!("Destination: {}", dst_path);

    let proactor = Rc::new(Proactor::new()?);
    let start_time = Instant::now();

    let total_copied = proactor.block_on(async {
        let src = open_read_current(src_path).await?;
        let file_size = src.size();
        println!(
            "File size:   {} bytes ({:.2} MB)",
            file_size,
            file_size as f64 / (1024.0 * 1024.0)
        );

        let mut dst = open_write_current(dst_path, WriteOptions::new()).await?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut offset: u64 = 0;

        println!("\nCopying...");
        while offset < file_size {
            let n = src.read(offset, &mut [IoSliceMut::new(&mut buf)]).await?;
            if n == 0 {
                break; // EOF
            }
            dst.write_all(&[IoSlice::new(&buf[..n])]).await?;
            offset += n as u64;

            let progress = 100.0 * offset as f64 / file_size as f64;
            eprint!("\rProgress: {:.1}%", progress);
        }

        dst.close().await?;
        Ok::<_, aura_fs::Error>(dst.position())
    })?;

    let elapsed = start_time.elapsed().as_secs_f64();

    println!("\n\n=== Results ===");
    println!("Bytes copied: {}", total_copied);
    println!("Elapsed time: {:.3} seconds", elapsed);
    if elapsed > 0.0 {
        println!(
            "Throughput:   {:.2} MB/s",
            (total_copied as f64 / (1024.0 * 1024.0)) / elapsed
        );
    }

    let stats = proactor.stats();
    println!("\nProactor statistics:");
    println!("  Ops completed:     {}", stats.ops_completed());
    println!("  Ops failed:        {}", stats.ops_failed());
    println!("  Bytes read:        {}", stats.bytes_read());
    println!("  Bytes written:     {}", stats.bytes_written());
    println!("  Peak in-flight:    {}", stats.peak_in_flight());

    println!("\nDone! File copied successfully.");
    Ok(())
}
