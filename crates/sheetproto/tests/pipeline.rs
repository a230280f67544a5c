use std::fs;
use std::path::Path;

use sheetproto::{
    CompileError, Mode, NoopCompiler, PhaseError, Pipeline, RunError, SchemaCompiler,
    SheetFailure, SheetprotoConfig,
};
use sheetproto_core::{Record, SchemaOptions, SheetError, SheetHeader, Value, build_schema};
use sheetproto_workbook::{MemoryGrid, MemoryWorkbook};

fn config(root: &Path, mode: Mode) -> SheetprotoConfig {
    SheetprotoConfig {
        output_dir: root.join("build_out"),
        schema_dir: root.join("protocol"),
        mode,
        compile: false,
        ..SheetprotoConfig::default()
    }
}

fn pipeline(root: &Path, mode: Mode) -> Pipeline {
    Pipeline::with_compiler(config(root, mode), Box::new(NoopCompiler))
}

fn items_grid(second_id: &str) -> MemoryGrid {
    MemoryGrid::from_rows(vec![
        vec!["item id", "display name"],
        vec!["required int32", "string"],
        vec!["id", "name"],
        vec!["1", "Sword"],
        vec![second_id, "Shield"],
    ])
}

struct RejectingCompiler;

impl SchemaCompiler for RejectingCompiler {
    fn compile(&self, schema: &Path) -> Result<(), CompileError> {
        Err(CompileError::SchemaCompileFailed {
            schema: schema.to_path_buf(),
            reason: "rejected".to_string(),
        })
    }
}

#[test]
fn all_mode_writes_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let mut workbook = MemoryWorkbook::new()
        .with_sheet("Item-items", items_grid("2"))
        .with_sheet("Notes", MemoryGrid::from_rows(vec![vec!["free text"]]));

    let summary = pipeline(dir.path(), Mode::All)
        .run_reader(&mut workbook)
        .unwrap();
    assert_eq!(summary.skipped, vec!["Notes".to_string()]);
    assert_eq!(summary.sheets.len(), 1);

    let report = &summary.sheets[0];
    assert_eq!(report.record, "Item");
    assert_eq!(report.rows_encoded, 2);
    let schema = fs::read_to_string(dir.path().join("protocol/Item.schema")).unwrap();
    assert!(schema.contains("message Item {"));
    assert!(schema.contains("message Item_array {"));

    let bytes = fs::read(dir.path().join("build_out/bin/Item.bin")).unwrap();
    let binding = build_schema(
        &SheetHeader::read(&items_grid("2")),
        "Item",
        &SchemaOptions::default(),
    )
    .unwrap()
    .binding;
    let array = Record::decode(&bytes, &binding.array_of()).unwrap();
    let items = array.list(1);
    assert_eq!(items.len(), 2);
    let second = items[1].as_message().unwrap();
    assert_eq!(second.single(2), Some(&Value::String("Shield".into())));

    let text = fs::read_to_string(dir.path().join("build_out/log/Item.txt")).unwrap();
    assert!(text.contains("name: \"Sword\""));
}

#[test]
fn schema_mode_skips_the_data_phase() {
    let dir = tempfile::tempdir().unwrap();
    let mut workbook = MemoryWorkbook::new().with_sheet("Item-items", items_grid("oops"));
    let summary = pipeline(dir.path(), Mode::Schema)
        .run_reader(&mut workbook)
        .unwrap();
    let report = &summary.sheets[0];
    assert!(report.schema_path.is_some());
    assert!(report.binary_path.is_none());
    assert!(!dir.path().join("build_out/bin/Item.bin").exists());
}

#[test]
fn data_mode_writes_no_schema() {
    let dir = tempfile::tempdir().unwrap();
    let mut workbook = MemoryWorkbook::new().with_sheet("Item-items", items_grid("2"));
    let summary = pipeline(dir.path(), Mode::Data)
        .run_reader(&mut workbook)
        .unwrap();
    assert!(summary.sheets[0].schema_path.is_none());
    assert!(!dir.path().join("protocol").exists());
    assert!(dir.path().join("build_out/bin/Item.bin").is_file());
}

#[test]
fn bad_cell_is_a_data_failure_and_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut workbook = MemoryWorkbook::new()
        .with_sheet("Item-items", items_grid("2"))
        .with_sheet("Broken-items", items_grid("oops"))
        .with_sheet("Later-items", items_grid("3"));

    let err = pipeline(dir.path(), Mode::All)
        .run_reader(&mut workbook)
        .unwrap_err();
    let RunError::Sheet {
        sheet,
        failure,
        completed,
    } = err
    else {
        panic!("expected a sheet failure");
    };
    assert_eq!(sheet, "Broken-items");
    assert_eq!(completed.sheets.len(), 1);
    assert_eq!(failure.exit_code(), -4);
    match failure {
        SheetFailure::Data(PhaseError::Sheet(SheetError::CellConversion { cell, .. })) => {
            assert_eq!(cell, "A5");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!dir.path().join("build_out/bin/Later.bin").exists());
}

#[test]
fn malformed_header_fails_the_schema_phase() {
    let dir = tempfile::tempdir().unwrap();
    let grid = MemoryGrid::from_rows(vec![vec![""], vec!["repeated int32"], vec!["id"]]);
    let mut workbook = MemoryWorkbook::new().with_sheet("Item-items", grid.clone());
    let err = pipeline(dir.path(), Mode::All)
        .run_reader(&mut workbook)
        .unwrap_err();
    assert!(matches!(
        err,
        RunError::Sheet {
            failure: SheetFailure::Schema(PhaseError::Sheet(SheetError::MalformedHeader { .. })),
            ..
        }
    ));

    // Without a schema phase the same header fails while encoding.
    let mut workbook = MemoryWorkbook::new().with_sheet("Item-items", grid);
    let err = pipeline(dir.path(), Mode::Data)
        .run_reader(&mut workbook)
        .unwrap_err();
    assert!(matches!(
        err,
        RunError::Sheet {
            failure: SheetFailure::Data(_),
            ..
        }
    ));
}

#[test]
fn compiler_failure_is_a_schema_failure() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline =
        Pipeline::with_compiler(config(dir.path(), Mode::All), Box::new(RejectingCompiler));
    let mut workbook = MemoryWorkbook::new().with_sheet("Item-items", items_grid("2"));
    let err = pipeline.run_reader(&mut workbook).unwrap_err();
    let RunError::Sheet { failure, .. } = err else {
        panic!("expected a sheet failure");
    };
    assert_eq!(failure.exit_code(), -3);
    assert!(matches!(
        failure.phase_error(),
        PhaseError::Compile(CompileError::SchemaCompileFailed { .. })
    ));
    // The schema file is written before the compiler runs.
    assert!(dir.path().join("protocol/Item.schema").is_file());
}

#[test]
fn enum_definitions_are_read_from_the_schema_dir() {
    let dir = tempfile::tempdir().unwrap();
    let protocol = dir.path().join("protocol");
    fs::create_dir_all(&protocol).unwrap();
    fs::write(
        protocol.join("enum.proto"),
        "syntax = \"proto3\";\npackage cfg;\nenum Color {\n  COLOR_NONE = 0;\n  RED = 1; // warm\n  BLUE = 2;\n}\n",
    )
    .unwrap();
    let grid = MemoryGrid::from_rows(vec![
        vec!["", ""],
        vec!["int32", "enum-Color"],
        vec!["id", "color"],
        vec!["1", "BLUE"],
    ]);
    let mut workbook = MemoryWorkbook::new().with_sheet("Paint-colors", grid);
    pipeline(dir.path(), Mode::All)
        .run_reader(&mut workbook)
        .unwrap();

    let schema = fs::read_to_string(protocol.join("Paint.schema")).unwrap();
    assert!(schema.contains("import \"enum.proto\";"));
    let text = fs::read_to_string(dir.path().join("build_out/log/Paint.txt")).unwrap();
    assert!(text.contains("color: BLUE"));
}

#[test]
fn missing_enum_file_reports_the_unknown_type() {
    let dir = tempfile::tempdir().unwrap();
    let grid = MemoryGrid::from_rows(vec![
        vec!["", ""],
        vec!["int32", "enum-Color"],
        vec!["id", "color"],
        vec!["1", "BLUE"],
    ]);
    let mut workbook = MemoryWorkbook::new().with_sheet("Paint-colors", grid);
    let err = pipeline(dir.path(), Mode::All)
        .run_reader(&mut workbook)
        .unwrap_err();
    assert!(matches!(
        err,
        RunError::Sheet {
            failure: SheetFailure::Data(PhaseError::Sheet(SheetError::UnknownEnumType { .. })),
            ..
        }
    ));
}
