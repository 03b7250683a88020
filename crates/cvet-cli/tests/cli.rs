use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn cvet() -> Command {
    Command::cargo_bin("cvet").unwrap()
}

fn write_source(dir: &TempDir, name: &str, source: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, source).unwrap();
    path
}

const CLEAN: &str = r"
int add(int a, int b)
{
    return a + b;
}
";

const NULL_DEREF: &str = r"
int fetch(/*@null@*/ int *p)
{
    return *p;
}
";

const USE_BEFORE_DEF: &str = r"
int stale(void)
{
    int x;
    return x + 1;
}
";

#[test]
fn test_check_clean_file_exits_zero() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "clean.c", CLEAN);

    cvet()
        .arg("check")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("no problems found"));
}

#[test]
fn test_check_reports_null_deref_and_exits_one() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "deref.c", NULL_DEREF);

    cvet()
        .arg("check")
        .arg(&file)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("null-deref"))
        .stdout(predicate::str::contains("deref.c:"));
}

#[test]
fn test_check_suppress_kind() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "deref.c", NULL_DEREF);

    cvet()
        .arg("check")
        .arg("--suppress")
        .arg("null-deref")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("no problems found"));
}

#[test]
fn test_check_only_filters_other_kinds() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "both.c", NULL_DEREF);

    cvet()
        .arg("check")
        .arg("--only")
        .arg("use-before-definition")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("no problems found"));
}

#[test]
fn test_check_rejects_unknown_kind() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "clean.c", CLEAN);

    cvet()
        .arg("check")
        .arg("--suppress")
        .arg("not-a-kind")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown diagnostic kind"));
}

#[test]
fn test_check_json_output() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "stale.c", USE_BEFORE_DEF);

    let output = cvet()
        .arg("check")
        .arg("--json")
        .arg(&file)
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["diagnostics"][0]["kind"], "use-before-definition");
    assert_eq!(value["summaries"][0]["name"], "stale");
}

#[test]
fn test_check_writes_summaries_file() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "clean.c", CLEAN);
    let summaries = dir.path().join("summaries.json");

    cvet()
        .arg("check")
        .arg("--summaries")
        .arg(&summaries)
        .arg(&file)
        .assert()
        .success();

    let value: serde_json::Value =
        serde_json::from_slice(&fs::read(&summaries).unwrap()).unwrap();
    assert_eq!(value[0]["name"], "add");
    assert_eq!(value[0]["exit"], "MustReturn");
}

#[test]
fn test_check_multiple_files() {
    let dir = TempDir::new().unwrap();
    let clean = write_source(&dir, "clean.c", CLEAN);
    let deref = write_source(&dir, "deref.c", NULL_DEREF);

    cvet()
        .arg("check")
        .arg(&clean)
        .arg(&deref)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("deref.c:"));
}

#[test]
fn test_parse_valid_file() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "clean.c", CLEAN);

    cvet()
        .arg("parse")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("VALID"));
}

#[test]
fn test_parse_invalid_file() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "broken.c", "int f( {");

    cvet()
        .arg("parse")
        .arg(&file)
        .assert()
        .failure()
        .stdout(predicate::str::contains("INVALID"));
}

#[test]
fn test_contracts_lists_annotated_function() {
    let dir = TempDir::new().unwrap();
    let file = write_source(
        &dir,
        "contracts.c",
        r"
int counter;

void bump(/*@notnull@*/ int *by) /*@globals counter@*/ /*@modifies counter@*/
{
    counter = counter + *by;
}
",
    );

    cvet()
        .arg("contracts")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("bump"))
        .stdout(predicate::str::contains("globals: counter"))
        .stdout(predicate::str::contains("modifies: counter"));
}

#[test]
fn test_contracts_json_output() {
    let dir = TempDir::new().unwrap();
    let file = write_source(
        &dir,
        "exits.c",
        r"
/*@exits@*/ void die(/*@notnull@*/ char *reason);
",
    );

    let output = cvet()
        .arg("contracts")
        .arg("--json")
        .arg(&file)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value[0]["name"], "die");
    assert_eq!(value[0]["exits"], "MustExit");
    assert_eq!(value[0]["params"][0]["not_null"], true);
}

#[test]
fn test_contracts_empty_file() {
    let dir = TempDir::new().unwrap();
    let file = write_source(&dir, "empty.c", "");

    cvet()
        .arg("contracts")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("no contracts found"));
}

#[test]
fn test_check_missing_file_fails() {
    cvet()
        .arg("check")
        .arg("does-not-exist.c")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.c"));
}
