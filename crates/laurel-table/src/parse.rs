//! CSV tokenizer.
//!
//! Pipeline:
//!   raw &str
//!     └─ parse_records()   → Vec<(line, Vec<String>)>
//!          └─ crate::parse() → header + width-checked rows

use crate::error::{Error, Result};

/// Tokenizer state carried across characters.
struct Cursor {
  records:  Vec<(usize, Vec<String>)>,
  row:      Vec<String>,
  cell:     String,
  /// The current cell opened with a quote (and has since closed it).
  quoted:   bool,
  line:     usize,
  row_line: usize,
}

impl Cursor {
  fn end_cell(&mut self) {
    self.row.push(std::mem::take(&mut self.cell));
    self.quoted = false;
  }

  fn end_row(&mut self) {
    let was_quoted = self.quoted;
    self.end_cell();
    let row = std::mem::take(&mut self.row);
    // A bare empty line is skipped; `""` on its own line is a real row.
    let blank = row.len() == 1 && row[0].is_empty() && !was_quoted;
    if !blank {
      self.records.push((self.row_line, row));
    }
  }
}

/// Split `input` into rows of unescaped cells, each tagged with the 1-based
/// line on which it starts. Quoted cells may contain `,`, `""` and newlines.
pub(crate) fn parse_records(input: &str) -> Result<Vec<(usize, Vec<String>)>> {
  let input = input.strip_prefix('\u{feff}').unwrap_or(input);
  let mut cur = Cursor {
    records:  Vec::new(),
    row:      Vec::new(),
    cell:     String::new(),
    quoted:   false,
    line:     1,
    row_line: 1,
  };
  let mut in_quotes = false;
  let mut chars = input.chars().peekable();

  while let Some(c) = chars.next() {
    if in_quotes {
      match c {
        '"' if chars.peek() == Some(&'"') => {
          chars.next();
          cur.cell.push('"');
        }
        '"' => in_quotes = false,
        '\n' => {
          cur.line += 1;
          cur.cell.push('\n');
        }
        _ => cur.cell.push(c),
      }
      continue;
    }

    match c {
      '"' if cur.cell.is_empty() && !cur.quoted => {
        in_quotes = true;
        cur.quoted = true;
      }
      ',' => cur.end_cell(),
      '\r' if chars.peek() == Some(&'\n') => {}
      '\n' => {
        cur.end_row();
        cur.line += 1;
        cur.row_line = cur.line;
      }
      _ if cur.quoted => return Err(Error::TrailingAfterQuote { line: cur.line }),
      _ => cur.cell.push(c),
    }
  }

  if in_quotes {
    return Err(Error::UnterminatedQuote { line: cur.row_line });
  }
  if !cur.row.is_empty() || !cur.cell.is_empty() || cur.quoted {
    cur.end_row();
  }

  Ok(cur.records)
}
