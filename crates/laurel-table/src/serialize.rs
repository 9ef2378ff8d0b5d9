//! CSV serializer. `\n` line endings; quotes only where RFC 4180 needs them.

use std::borrow::Cow;

use crate::Table;

// ─── Cell escaping ───────────────────────────────────────────────────────────

/// Cells containing a delimiter, quote or line break are quoted, as are cells
/// with leading or trailing spaces so readers that trim keep them intact.
fn needs_quoting(s: &str) -> bool {
  s.contains([',', '"', '\n', '\r']) || s.starts_with(' ') || s.ends_with(' ')
}

fn escape_cell(s: &str) -> Cow<'_, str> {
  if needs_quoting(s) {
    Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
  } else {
    Cow::Borrowed(s)
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

fn write_row<S: AsRef<str>>(out: &mut String, cells: &[S]) {
  for (i, cell) in cells.iter().enumerate() {
    if i > 0 {
      out.push(',');
    }
    out.push_str(&escape_cell(cell.as_ref()));
  }
  out.push('\n');
}

pub(crate) fn serialize(table: &Table) -> String {
  let mut out = String::new();
  write_row(&mut out, table.header());
  for row in table.rows() {
    write_row(&mut out, row.as_slice());
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_cells_are_not_quoted() {
    assert_eq!(escape_cell("Physics"), "Physics");
    assert_eq!(escape_cell("0.125"), "0.125");
    assert_eq!(escape_cell(""), "");
  }

  #[test]
  fn special_cells_are_quoted() {
    assert_eq!(escape_cell("a,b"), "\"a,b\"");
    assert_eq!(escape_cell("say \"hi\""), "\"say \"\"hi\"\"\"");
    assert_eq!(escape_cell("x\ny"), "\"x\ny\"");
    assert_eq!(escape_cell(" lead"), "\" lead\"");
  }

  #[test]
  fn table_layout() {
    let mut table = Table::new(["rank", "full_name"]).unwrap();
    table.push_row(["1", "Hau, Lene"]).unwrap();
    assert_eq!(serialize(&table), "rank,full_name\n1,\"Hau, Lene\"\n");
  }
}
