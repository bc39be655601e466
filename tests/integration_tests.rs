use assert_cmd::Command;
use predicates::str::{contains, diff};

const BLINK_LISTING: &str = "\
000: unless (bits[000] set) jump 002+1
001: bits[001] := 1
002: jump 003+1
003: bits[001] := 0
004: (int16s[000])++
005: <end of program>
";

fn rung() -> Command {
    Command::cargo_bin("rung").unwrap()
}

#[test]
fn requires_a_subcommand() {
    rung().assert().failure();
}

#[test]
fn checks_both_formats() {
    for file in ["tests/files/blink.int", "tests/files/blink.lds"] {
        rung()
            .arg("check")
            .arg(file)
            .assert()
            .success()
            .stdout(contains("Success"))
            .stdout(contains("6 instructions, 3 symbols"));
    }
}

#[test]
fn disassembles() {
    for file in ["tests/files/blink.int", "tests/files/blink.lds"] {
        rung()
            .arg("dis")
            .arg(file)
            .arg("--minimal")
            .assert()
            .success()
            .stdout(diff(BLINK_LISTING));
    }
}

#[test]
fn lists_symbols() {
    rung()
        .arg("symbols")
        .arg("tests/files/blink.int")
        .arg("--minimal")
        .assert()
        .success()
        .stdout(diff("Xosc bits[000]\nYled bits[001]\na int16s[000]\n"));
}

#[test]
fn compiles_to_image() {
    let dest = std::env::temp_dir().join(format!("rung-blink-{}.int", std::process::id()));
    rung()
        .arg("compile")
        .arg("tests/files/blink.lds")
        .arg(&dest)
        .assert()
        .success()
        .stdout(contains("Saved"));

    let emitted = std::fs::read_to_string(&dest).unwrap();
    let _ = std::fs::remove_file(&dest);
    let expected = include_str!("files/blink.int").replace("\r\n", "\n");
    assert_eq!(emitted, expected);
}

#[test]
fn reports_load_errors() {
    rung()
        .arg("check")
        .arg("tests/files/truncated.int")
        .assert()
        .failure()
        .stderr(contains("load::section"));

    rung()
        .arg("check")
        .arg("tests/files/bad_jump.lds")
        .assert()
        .failure()
        .stderr(contains("asm::jump"));
}

#[test]
fn rejects_unknown_extension() {
    rung()
        .arg("check")
        .arg("Cargo.toml")
        .assert()
        .failure()
        .stderr(contains("unknown extension"));
}

#[test]
fn respects_capacity_flags() {
    rung()
        .arg("check")
        .arg("tests/files/blink.int")
        .arg("--ops")
        .arg("4")
        .assert()
        .failure()
        .stderr(contains("load::size"));
}
