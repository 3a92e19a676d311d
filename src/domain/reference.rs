use regex::Regex;

/// Typed address into a spreadsheet: a column, a row, a single cell, or one of
/// the three range shapes. Every variant is validated at construction; there
/// is no way to hold a malformed reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetReference {
    Column(String),
    Row(u32),
    Cell(String, u32),
    ColumnRange(String, String),
    RowRange(u32, u32),
    /// A rectangular range between two cell endpoints, e.g. `A1:C10`.
    Range(Box<SpreadsheetReference>, Box<SpreadsheetReference>),
}

fn column_pattern() -> Regex { Regex::new(r"^[A-Z]+$").unwrap() }

fn cell_pattern() -> Regex { Regex::new(r"^([A-Z]+)([1-9][0-9]*)$").unwrap() }

impl SpreadsheetReference {
    pub fn column(letters: impl Into<String>) -> Result<Self, String> {
        let letters = letters.into();
        if column_pattern().is_match(&letters) {
            Ok(Self::Column(letters))
        } else {
            Err(format!("Invalid column: {letters:?}"))
        }
    }

    pub fn row(number: u32) -> Result<Self, String> {
        if number >= 1 {
            Ok(Self::Row(number))
        } else {
            Err(format!("Invalid row: {number}"))
        }
    }

    pub fn cell(column: impl Into<String>, row: u32) -> Result<Self, String> {
        let column = column.into();
        if !column_pattern().is_match(&column) {
            return Err(format!("Invalid column: {column:?}"));
        }
        if row < 1 {
            return Err(format!("Invalid row: {row}"));
        }
        Ok(Self::Cell(column, row))
    }

    /// Parse a single cell, e.g. `"B7"`.
    pub fn of_cell(raw: &str) -> Result<Self, String> {
        let caps = cell_pattern()
            .captures(raw)
            .ok_or_else(|| format!("Invalid cell reference: {raw:?}"))?;
        let column = caps[1].to_string();
        let row: u32 = caps[2].parse().map_err(|_| format!("Invalid row in {raw:?}"))?;
        Ok(Self::Cell(column, row))
    }

    /// Parse a range, e.g. `"A1:B2"`. Both endpoints must themselves be valid
    /// cells; `"A1:B"` (a non-cell endpoint) fails.
    pub fn of_range(raw: &str) -> Result<Self, String> {
        let mut parts = raw.splitn(2, ':');
        let left = parts.next().ok_or_else(|| format!("Invalid range: {raw:?}"))?;
        let right = parts.next().ok_or_else(|| format!("Invalid range: {raw:?}"))?;
        let left = Self::of_cell(left)?;
        let right = Self::of_cell(right)?;

        let (lc, lr) = left.as_cell_parts().expect("of_cell always returns Cell");
        let (rc, rr) = right.as_cell_parts().expect("of_cell always returns Cell");

        if lc == rc {
            return Ok(Self::ColumnRange(lc.to_string(), rc.to_string()).into_range(left, right));
        }
        if lr == rr {
            return Ok(Self::RowRange(lr, rr).into_range(left, right));
        }
        Ok(Self::Range(Box::new(left), Box::new(right)))
    }

    fn as_cell_parts(&self) -> Option<(&str, u32)> {
        match self {
            Self::Cell(c, r) => Some((c.as_str(), *r)),
            _ => None,
        }
    }

    /// `ColumnRange`/`RowRange` are degenerate shapes of `Range` sharing a
    /// column or row; keep both endpoints around so `to_a1` can render exact
    /// cells rather than re-deriving them.
    fn into_range(
        self,
        left: Self,
        right: Self,
    ) -> Self {
        Self::Range(Box::new(left), Box::new(right))
    }

    /// Extract the column letter. For ranges, the left endpoint's column wins.
    pub fn column_letter(&self) -> Result<&str, String> {
        match self {
            Self::Column(c) => Ok(c),
            Self::Cell(c, _) => Ok(c),
            Self::ColumnRange(c, _) => Ok(c),
            Self::Range(left, _) => left.column_letter(),
            Self::Row(_) | Self::RowRange(_, _) => Err("reference has no column".to_string()),
        }
    }

    /// Extract the row number. For ranges, the left endpoint's row wins.
    pub fn row_number(&self) -> Result<u32, String> {
        match self {
            Self::Row(r) => Ok(*r),
            Self::Cell(_, r) => Ok(*r),
            Self::RowRange(r, _) => Ok(*r),
            Self::Range(left, _) => left.row_number(),
            Self::Column(_) | Self::ColumnRange(_, _) => Err("reference has no row".to_string()),
        }
    }

    /// Zero-based `(column_index, row_index)`, where `A` -> 0, row 1 -> 0.
    pub fn to_zero_based_indices(&self) -> Result<(u32, u32), String> {
        let col = self.column_letter()?;
        let row = self.row_number()?;
        Ok((column_to_index(col), row - 1))
    }

    /// A1-form rendering. A single-cell select (`Column` or `Row` alone) is
    /// expanded to `X:X` per spec; cells and ranges render as-is.
    pub fn to_a1(&self) -> String {
        match self {
            Self::Column(c) => format!("{c}:{c}"),
            Self::Row(r) => format!("{r}:{r}"),
            Self::Cell(c, r) => format!("{c}{r}"),
            Self::ColumnRange(a, b) => format!("{a}:{b}"),
            Self::RowRange(a, b) => format!("{a}:{b}"),
            Self::Range(left, right) => format!("{}:{}", left.to_a1(), right.to_a1()),
        }
    }
}

fn column_to_index(letters: &str) -> u32 {
    letters
        .bytes()
        .fold(0u32, |acc, b| acc * 26 + (b - b'A' + 1) as u32)
        - 1
}

#[cfg(test)]
mod tests {
    use claims::assert_err;
    use claims::assert_ok;

    use super::SpreadsheetReference;

    #[test]
    fn column_ok() { assert_ok!(SpreadsheetReference::column("AB")); }

    #[test]
    fn column_rejects_lowercase_and_digits() {
        assert_err!(SpreadsheetReference::column("ab"));
        assert_err!(SpreadsheetReference::column("A1"));
    }

    #[test]
    fn row_rejects_zero() { assert_err!(SpreadsheetReference::row(0)); }

    #[test]
    fn cell_of_cell() {
        let c = assert_ok!(SpreadsheetReference::of_cell("B7"));
        assert_eq!(c.column_letter().unwrap(), "B");
        assert_eq!(c.row_number().unwrap(), 7);
    }

    #[test]
    fn range_ok_full_cells() { assert_ok!(SpreadsheetReference::of_range("A1:B2")); }

    #[test]
    fn range_rejects_partial_endpoint() { assert_err!(SpreadsheetReference::of_range("A1:B")); }

    #[test]
    fn range_extraction_uses_left_endpoint() {
        let r = assert_ok!(SpreadsheetReference::of_range("C3:E9"));
        assert_eq!(r.column_letter().unwrap(), "C");
        assert_eq!(r.row_number().unwrap(), 3);
    }

    #[test]
    fn zero_based_indices() {
        let a1 = assert_ok!(SpreadsheetReference::of_cell("A1"));
        assert_eq!(a1.to_zero_based_indices().unwrap(), (0, 0));
        let c10 = assert_ok!(SpreadsheetReference::of_cell("C10"));
        assert_eq!(c10.to_zero_based_indices().unwrap(), (2, 9));
    }

    #[test]
    fn a1_rendering_expands_single_selectors() {
        let col = assert_ok!(SpreadsheetReference::column("A"));
        assert_eq!(col.to_a1(), "A:A");
        let row = assert_ok!(SpreadsheetReference::row(3));
        assert_eq!(row.to_a1(), "3:3");
        let cell = assert_ok!(SpreadsheetReference::of_cell("B7"));
        assert_eq!(cell.to_a1(), "B7");
    }

    #[test]
    fn a1_rendering_range_as_is() {
        let range = assert_ok!(SpreadsheetReference::of_range("A1:B2"));
        assert_eq!(range.to_a1(), "A1:B2");
    }
}
