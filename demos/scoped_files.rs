//! # Example: scoped_files
//!
//! Appends a thousand lines to a file while holding at most one handle at a time.
//!
//! ## Flow
//! ```text
//! for_each_scoped(0..1000)
//!     ├─► open(item)        OpenOptions::append
//!     ├─► body(item, file)  writeln!
//!     └─► release(file)     end of every iteration, also on error
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example scoped_files
//! ```

use std::fs::{File, OpenOptions};
use std::io::Write;

use lifeline::{acquire, for_each_scoped};

fn main() -> std::io::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("output.txt");

    let written = for_each_scoped(
        0..1000,
        |_| OpenOptions::new().append(true).create(true).open(&path),
        |file: File| drop(file),
        |i, file| writeln!(file, "Line {i}"),
    )?;
    println!("[main] wrote {written} lines");

    let mut summary = acquire(
        || OpenOptions::new().append(true).open(&path),
        |file: File| {
            let _ = file.sync_all();
            println!("[main] summary handle released");
        },
    )?;
    writeln!(summary, "-- {written} lines --")?;
    summary.release();

    let text = std::fs::read_to_string(&path)?;
    println!("[main] file has {} lines", text.lines().count());
    Ok(())
}
