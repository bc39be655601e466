use assert_cmd::Command;
use predicates::str::{contains, diff};

fn run(file: &str) -> Command {
    let mut cmd = Command::cargo_bin("rung").unwrap();
    cmd.env_remove("RUNG_TRACE")
        .arg("run")
        .arg(file)
        .arg("--fast")
        .arg("--minimal");
    cmd
}

#[test]
fn blinks() {
    let expected = "\
cycle 0: a=1 Yled=1
cycle 1: a=2 Yled=0
cycle 2: a=3 Yled=1
";
    for file in ["tests/files/blink.int", "tests/files/blink.lds"] {
        run(file)
            .args(["--cycles", "3", "--toggle", "Xosc", "--watch", "a", "--watch", "Yled"])
            .assert()
            .success()
            .stdout(diff(expected));
    }
}

#[test]
fn holds_inputs() {
    run("tests/files/blink.int")
        .args(["--cycles", "2", "--set", "Xosc=0", "--watch", "Yled"])
        .assert()
        .success()
        .stdout(diff("cycle 0: Yled=0\ncycle 1: Yled=0\n"));
}

#[test]
fn traces_instructions() {
    let expected = "\
-- cycle 0
000: unless (bits[000] set) jump 002+1
001: bits[001] := 1
002: jump 003+1
004: (int16s[000])++
005: <end of program>
";
    run("tests/files/blink.int")
        .env("RUNG_TRACE", "1")
        .args(["--cycles", "1", "--toggle", "Xosc"])
        .assert()
        .success()
        .stderr(diff(expected));
}

#[test]
fn rejects_unknown_names() {
    run("tests/files/blink.int")
        .args(["--cycles", "1", "--watch", "nothing"])
        .assert()
        .failure()
        .stderr(contains("driver::symbol"));

    run("tests/files/blink.int")
        .args(["--cycles", "1", "--set", "Yled=1"])
        .assert()
        .failure()
        .stderr(contains("driver::input"));

    run("tests/files/blink.int")
        .args(["--cycles", "1", "--set", "Xosc"])
        .assert()
        .failure()
        .stderr(contains("NAME=VALUE"));
}

#[test]
fn guard_stops_runaway_cycles() {
    run("tests/files/spin.lds")
        .args(["--cycles", "1", "--features", "guard"])
        .assert()
        .failure()
        .stderr(contains("did not finish"));
}
