// Integration test for the calamine backend; fixtures are written with umya.
use sheetproto_workbook::{CalamineWorkbook, Grid, GridError, WorkbookReader};

fn write_fixture(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("grid.xlsx");
    let mut book = umya_spreadsheet::new_file();
    let sheet = book.new_sheet("Item-config").expect("add sheet");
    // umya addresses cells as (col, row), 1-based
    sheet.get_cell_mut((1, 1)).set_value("identifier");
    sheet.get_cell_mut((1, 2)).set_value("int32");
    sheet.get_cell_mut((1, 3)).set_value("id");
    sheet.get_cell_mut((1, 4)).set_value_number(7);
    sheet.get_cell_mut((2, 4)).set_value_number(2.5);
    sheet.get_cell_mut((3, 5)).set_value("tail");
    umya_spreadsheet::writer::xlsx::write(&book, &path).expect("write xlsx");
    path
}

#[test]
fn calamine_lists_sheets_in_order() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = write_fixture(tmp.path());
    let wb = CalamineWorkbook::open(&path).expect("open workbook");
    assert_eq!(
        wb.sheet_names(),
        vec!["Sheet1".to_string(), "Item-config".to_string()]
    );
}

#[test]
fn calamine_reads_cells_as_text() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = write_fixture(tmp.path());
    let mut wb = CalamineWorkbook::open(&path).expect("open workbook");
    let grid = wb.read_sheet("Item-config").expect("read sheet");

    assert_eq!(grid.cell(0, 0), "identifier");
    assert_eq!(grid.cell(1, 0), "int32");
    assert_eq!(grid.cell(2, 0), "id");
    assert_eq!(grid.cell(3, 0), "7");
    assert_eq!(grid.cell(3, 1), "2.5");
    assert_eq!(grid.cell(4, 2), "tail");
    assert_eq!(grid.cell(4, 0), "");
    assert_eq!(grid.row_count(), 5);
    assert_eq!(grid.col_count(), 3);
}

#[test]
fn calamine_missing_sheet_is_reported() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = write_fixture(tmp.path());
    let mut wb = CalamineWorkbook::open(&path).expect("open workbook");
    match wb.read_sheet("Nope-x") {
        Err(GridError::MissingSheet(name)) => assert_eq!(name, "Nope-x"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn calamine_open_failure_names_path() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("missing.xlsx");
    match CalamineWorkbook::open(&path) {
        Err(GridError::Open { path: reported, .. }) => assert_eq!(reported, path),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected open failure"),
    }
}
