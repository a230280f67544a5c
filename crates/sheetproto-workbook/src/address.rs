//! A1-style naming for diagnostics.

/// Convert a 0-based column index to spreadsheet letters (`0` → `A`, `27` → `AB`).
pub fn column_to_letters(mut col: usize) -> String {
    let mut buf = Vec::new();
    loop {
        let rem = (col % 26) as u8;
        buf.push(b'A' + rem);
        col /= 26;
        if col == 0 {
            break;
        }
        col -= 1;
    }
    buf.reverse();
    buf.into_iter().map(char::from).collect()
}

/// A1 name of a 0-based `(row, col)` cell.
pub fn cell_name(row: usize, col: usize) -> String {
    format!("{}{}", column_to_letters(col), row + 1)
}
