//! Shared test utilities for integration tests
//!
//! Provides the markdown fixture used by the CLI tests.

#![allow(dead_code)]

use assert_fs::prelude::*;

/// Notes on three distinct topics plus an exact copy of one of them.
pub fn make_notes_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("notes/ownership.md")
        .write_str(
            "---\ntitle: Ownership\n---\n\n# Ownership Basics\n\n\
             Rust gives every value exactly 1 owner. Moving a value transfers ownership \
             to the new binding. The Borrow Checker rejects dangling references.\n\n\
             Borrowing lets code read a value without taking ownership. Mutable borrows \
             are exclusive while they live.\n",
        )
        .expect("write ownership.md");

    tmp.child("notes/cargo.md")
        .write_str(
            "# Cargo Workspaces\n\n\
             Cargo builds 3 member crates from a single Cargo.lock file. Workspace members \
             share one target directory.\n\n\
             Release profiles enable LTO and strip debug info. Features gate optional \
             dependencies at compile time.\n",
        )
        .expect("write cargo.md");

    tmp.child("notes/deep/async.md")
        .write_str(
            "# Async Runtimes\n\n\
             Tokio schedules futures across 8 worker threads by default. Each task is a \
             state machine polled by the Executor.\n\n\
             Blocking calls stall the worker thread. Use spawn_blocking for CPU heavy work.\n",
        )
        .expect("write async.md");

    // Exact duplicate of the ownership notes
    tmp.child("notes/copy_of_ownership.md")
        .write_str(
            "# Ownership Basics\n\n\
             Rust gives every value exactly 1 owner. Moving a value transfers ownership \
             to the new binding. The Borrow Checker rejects dangling references.\n\n\
             Borrowing lets code read a value without taking ownership. Mutable borrows \
             are exclusive while they live.\n",
        )
        .expect("write copy_of_ownership.md");

    // Not markdown, must be ignored
    tmp.child("notes/readme.txt")
        .write_str("plain text")
        .expect("write readme.txt");

    tmp
}
