use calamine::{Data, Range};

/// A single sheet cell, decoupled from the workbook reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Formula errors such as `#REF!`; reading one is a cell access failure.
    Error(String),
}

impl Cell {
    /// Text form used for every comparison the scanner makes. `None` for
    /// error cells.
    pub fn render(&self) -> Option<String> {
        match self {
            Cell::Empty => Some(String::new()),
            Cell::Text(s) => Some(s.clone()),
            Cell::Int(i) => Some(i.to_string()),
            Cell::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(format!("{f:.0}")),
            Cell::Float(f) => Some(f.to_string()),
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Error(_) => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty => Cell::Empty,
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Int(i) => Cell::Int(*i),
            Data::Float(f) => Cell::Float(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::Float(dt.as_f64()),
            Data::Error(e) => Cell::Error(e.to_string()),
        }
    }
}

/// Dense rectangular view of one sheet, addressed by absolute (row, col).
/// Positions outside the used area read as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
}

static EMPTY: Cell = Cell::Empty;

impl Grid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// Build a grid from string literals; blank strings become empty cells.
    #[cfg(test)]
    pub fn from_strings(rows: &[&[&str]]) -> Self {
        Self::new(
            rows.iter()
                .map(|row| row.iter().map(|v| Cell::from(*v)).collect())
                .collect(),
        )
    }

    /// Calamine ranges are relative to their first used cell; re-anchor them
    /// so the grid always starts at A1.
    pub fn from_range(range: &Range<Data>) -> Self {
        let Some((start_row, start_col)) = range.start() else {
            return Self::default();
        };
        let (height, width) = range.get_size();
        let total_rows = start_row as usize + height;
        let total_cols = start_col as usize + width;
        let mut rows = vec![vec![Cell::Empty; total_cols]; total_rows];
        for (row, col, value) in range.cells() {
            rows[start_row as usize + row][start_col as usize + col] = Cell::from(value);
        }
        Self { rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    pub fn set(&mut self, row: usize, col: usize, cell: Cell) {
        if self.rows.len() <= row {
            self.rows.resize(row + 1, Vec::new());
        }
        let r = &mut self.rows[row];
        if r.len() <= col {
            r.resize(col + 1, Cell::Empty);
        }
        r[col] = cell;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_floats_render_without_fraction() {
        assert_eq!(Cell::Float(24.0).render().as_deref(), Some("24"));
        assert_eq!(Cell::Float(24.5).render().as_deref(), Some("24.5"));
        assert_eq!(Cell::Int(-3).render().as_deref(), Some("-3"));
        assert_eq!(Cell::Error("#REF!".into()).render(), None);
    }

    #[test]
    fn out_of_bounds_reads_empty() {
        let grid = Grid::from_strings(&[&["a", "b"]]);
        assert_eq!(grid.get(0, 1), &Cell::Text("b".into()));
        assert_eq!(grid.get(5, 5), &Cell::Empty);
    }

    #[test]
    fn set_grows_grid() {
        let mut grid = Grid::default();
        grid.set(3, 2, Cell::Int(7));
        assert_eq!(grid.height(), 4);
        assert_eq!(grid.get(3, 2), &Cell::Int(7));
        assert_eq!(grid.get(3, 1), &Cell::Empty);
    }

    #[test]
    fn range_is_reanchored() {
        let mut range: Range<Data> = Range::new((2, 1), (3, 2));
        range.set_value((2, 1), Data::String("Team A".into()));
        range.set_value((3, 2), Data::Float(3.0));
        let grid = Grid::from_range(&range);
        assert_eq!(grid.get(2, 1), &Cell::Text("Team A".into()));
        assert_eq!(grid.get(3, 2), &Cell::Float(3.0));
        assert_eq!(grid.get(0, 0), &Cell::Empty);
    }
}
