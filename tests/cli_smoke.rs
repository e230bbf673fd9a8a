//! End-to-end runs of the `mpk` binary on a small markdown fixture.

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::process::Command;

mod util;

/// Binary under test, run inside `dir` so no stray config is picked up
fn mpk(dir: &assert_fs::TempDir) -> Command
{
    let mut cmd = Command::cargo_bin("mpk").expect("mpk binary");
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env_remove("MEMORYPACK_LOG");
    cmd
}

#[test]
fn compress_writes_single_knowledge_base()
{
    let tmp = util::make_notes_fixture();

    mpk(&tmp)
        .args(["--no-color", "compress", "notes", "-o", "out", "--topic", "Rust Notes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Compression Statistics"))
        .stdout(predicate::str::contains("Duplicates removed"))
        .stdout(predicate::str::contains("knowledge_base.md"));

    let kb = tmp.child("out/knowledge_base.md");
    kb.assert(predicate::path::is_file());
    kb.assert(predicate::str::starts_with("# Knowledge Base: Rust Notes\n"));
    kb.assert(predicate::str::contains("> Compressed by memorypack | 4 files |"));
    kb.assert(predicate::str::contains("## Overview"));
    kb.assert(predicate::str::contains("## Topics"));
    kb.assert(predicate::str::contains("## Facts"));
}

#[test]
fn compress_multi_writes_three_files()
{
    let tmp = util::make_notes_fixture();

    mpk(&tmp)
        .args(["--quiet", "compress", "notes", "-o", "out", "--format", "multi", "--chunk-size", "40"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    tmp.child("out/overview.md")
        .assert(predicate::path::is_file());
    tmp.child("out/facts.md")
        .assert(predicate::str::starts_with("# Facts: Knowledge Base"));

    let index = std::fs::read_to_string(
        tmp.child("out/index.json")
            .path(),
    )
    .expect("index.json");
    let v: Value = serde_json::from_str(&index).expect("valid json");
    assert_eq!(v["file_count"], 4);
    assert!(
        v["groups"]
            .as_array()
            .is_some_and(|g| !g.is_empty())
    );
}

#[test]
fn dry_run_writes_nothing()
{
    let tmp = util::make_notes_fixture();

    mpk(&tmp)
        .args(["--dry-run", "--no-color", "compress", "notes", "-o", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DRY RUN: Would write:"));

    tmp.child("out")
        .assert(predicate::path::missing());
}

#[test]
fn missing_input_fails()
{
    let tmp = util::make_notes_fixture();

    mpk(&tmp)
        .args(["--quiet", "compress", "no_such_dir"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn prune_shrinks_an_existing_knowledge_base()
{
    let tmp = util::make_notes_fixture();

    mpk(&tmp)
        .args(["--quiet", "compress", "notes", "-o", "out", "--chunk-size", "30"])
        .assert()
        .success();

    mpk(&tmp)
        .args(["--no-color", "prune", "out/knowledge_base.md", "--max-tokens", "1", "-o", "pruned.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("topics"));

    let pruned = memorypack::output::parser::parse_knowledge_base(
        tmp.child("pruned.md")
            .path(),
    )
    .expect("pruned file parses");
    assert_eq!(pruned.groups.len(), 1, "budget of 1 keeps exactly one topic");
}

#[test]
fn prune_keeps_topics_of_heading_led_notes()
{
    let tmp = assert_fs::TempDir::new().unwrap();
    tmp.child("notes/memory.md")
        .write_str("## Memory Layout\n\nRust stores 3 values on the Stack. Boxed values live on the Heap.\n")
        .unwrap();
    tmp.child("notes/cargo.md")
        .write_str("### Cargo Profiles\n\nRelease builds enable LTO in Cargo.toml. Debug builds skip it.\n")
        .unwrap();
    tmp.child("notes/tokio.md")
        .write_str("# Tokio Runtime\n\nTokio schedules tasks on 4 Worker threads. Blocking calls use a Pool.\n")
        .unwrap();

    mpk(&tmp)
        .args(["--quiet", "compress", "notes", "-o", "out"])
        .assert()
        .success();
    mpk(&tmp)
        .args(["--quiet", "prune", "out/knowledge_base.md", "--no-merge", "-o", "pruned.md"])
        .assert()
        .success();

    let parse = |rel: &str| {
        memorypack::output::parser::parse_knowledge_base(
            tmp.child(rel)
                .path(),
        )
        .expect("knowledge base parses")
    };
    let before = parse("out/knowledge_base.md");
    let after = parse("pruned.md");

    assert_eq!(before.groups.len(), 2, "three notes fall back to min_k topics");
    assert_eq!(after.groups.len(), before.groups.len());
    for (a, b) in after
        .groups
        .iter()
        .zip(&before.groups)
    {
        assert_eq!(a.label, b.label);
        assert!(!a.summary.is_empty(), "topic {} lost its summary", a.label);
    }
}

#[test]
fn init_refuses_to_overwrite_without_force()
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    mpk(&tmp)
        .args(["init"])
        .assert()
        .success();
    tmp.child("memorypack.toml")
        .assert(predicate::str::contains("[pipeline]"));

    mpk(&tmp)
        .args(["init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    mpk(&tmp)
        .args(["init", "--force"])
        .assert()
        .success();
}

#[test]
fn config_file_sets_the_topic()
{
    let tmp = util::make_notes_fixture();
    tmp.child("memorypack.toml")
        .write_str("[pipeline]\ntopic = \"From Config\"\n")
        .expect("write config");

    mpk(&tmp)
        .args(["--quiet", "compress", "notes", "-o", "out"])
        .assert()
        .success();

    tmp.child("out/knowledge_base.md")
        .assert(predicate::str::starts_with("# Knowledge Base: From Config"));
}

#[test]
fn completions_print_to_stdout()
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    mpk(&tmp)
        .args(["completions", "bash", "--stdout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mpk"));
}
