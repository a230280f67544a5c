use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

/// What the shell observes for `std::process::exit(code)`.
fn observed(code: i32) -> i32 {
    if cfg!(unix) { code & 0xff } else { code }
}

fn write_workbook(dir: &Path, sheets: &[(&str, Vec<Vec<&str>>)]) -> PathBuf {
    let mut book = umya_spreadsheet::new_file();
    for (name, rows) in sheets {
        let _ = book.new_sheet(*name);
        let sheet = book
            .get_sheet_by_name_mut(name)
            .expect("sheet just added");
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let cell = sheet.get_cell_mut(((c + 1) as u32, (r + 1) as u32));
                match value.parse::<f64>() {
                    Ok(number) if r >= 3 => {
                        cell.set_value_number(number);
                    }
                    _ => {
                        cell.set_value(*value);
                    }
                }
            }
        }
    }
    let path = dir.join("config.xlsx");
    umya_spreadsheet::writer::xlsx::write(&book, &path).expect("write xlsx");
    path
}

fn items() -> Vec<Vec<&'static str>> {
    vec![
        vec!["item id", "display name", "weight"],
        vec!["required int32", "string", "float"],
        vec!["id", "name", "weight"],
        vec!["1", "Sword", "2.5"],
        vec!["2", "Shield", "7"],
    ]
}

fn sheetproto(dir: &Path, workbook: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sheetproto").expect("binary builds");
    cmd.current_dir(dir)
        .arg(workbook)
        .arg("--no-compile")
        .arg("--output")
        .arg(dir.join("build_out"))
        .arg("--schema-dir")
        .arg(dir.join("protocol"))
        .arg("-q");
    cmd
}

#[test]
fn compiles_named_sheets_and_skips_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let workbook = write_workbook(dir.path(), &[("Item-items", items())]);

    sheetproto(dir.path(), &workbook)
        .assert()
        .success()
        .stdout(predicate::str::contains("[Item-items] Interpreter Success!!!"))
        .stdout(predicate::str::contains("[Item-items] Parse Success!!! (2 rows)"))
        .stdout(predicate::str::contains("Sheet1").not());

    let root = dir.path();
    assert!(root.join("protocol/Item.schema").is_file());
    assert!(root.join("build_out/bin/Item.bin").is_file());
    assert!(root.join("build_out/log/sheetproto.log").is_file());
    let text = std::fs::read_to_string(root.join("build_out/log/Item.txt")).unwrap();
    assert!(text.contains("name: \"Shield\""));
    assert!(text.contains("weight: 2.5"));
}

#[test]
fn data_failure_exits_with_data_code() {
    let dir = tempfile::tempdir().unwrap();
    let mut rows = items();
    rows[4][0] = "two";
    let workbook = write_workbook(dir.path(), &[("Item-items", rows)]);

    sheetproto(dir.path(), &workbook)
        .assert()
        .code(observed(-4))
        .stdout(predicate::str::contains("Interpreter Success!!!"))
        .stdout(predicate::str::contains("Parse Failed!!!"))
        .stderr(predicate::str::contains("A5"));
}

#[test]
fn schema_failure_exits_with_schema_code() {
    let dir = tempfile::tempdir().unwrap();
    let rows = vec![vec![""], vec!["repeated int32"], vec!["id"], vec!["1"]];
    let workbook = write_workbook(dir.path(), &[("Item-items", rows)]);

    sheetproto(dir.path(), &workbook)
        .assert()
        .code(observed(-3))
        .stdout(predicate::str::contains("Interpreter Failed!!!"))
        .stdout(predicate::str::contains("Parse").not());
}

#[test]
fn schema_mode_only_writes_schemas() {
    let dir = tempfile::tempdir().unwrap();
    let workbook = write_workbook(dir.path(), &[("Item-items", items())]);

    sheetproto(dir.path(), &workbook)
        .args(["--mode", "schema"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Parse").not());
    assert!(dir.path().join("protocol/Item.schema").is_file());
    assert!(!dir.path().join("build_out/bin/Item.bin").exists());
}

#[test]
fn missing_workbook_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    sheetproto(dir.path(), &dir.path().join("absent.xlsx"))
        .assert()
        .code(observed(-1))
        .stderr(predicate::str::contains("absent.xlsx"));
}

#[test]
fn config_file_supplies_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let workbook = write_workbook(dir.path(), &[("Item-items", items())]);
    std::fs::write(
        dir.path().join("sheetproto.yaml"),
        "schema_extension: proto\npackage: game\n",
    )
    .unwrap();

    sheetproto(dir.path(), &workbook).assert().success();
    let schema = std::fs::read_to_string(dir.path().join("protocol/Item.proto")).unwrap();
    assert!(schema.contains("package game;"));
}
