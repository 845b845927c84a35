//! Tabular output (spec §4.7 "Tables"), grounded on `table_send` in the
//! original helpfile renderer: column widths are the max content width per
//! column (header row included), rows are optionally packed multiple-per-
//! line, and the header may repeat once per packed group.

#[derive(Debug, Clone, Copy, Default)]
pub struct TableFlags {
    pub no_headers: bool,
    pub repeat_headers: bool,
    pub repeat_rows: bool,
    pub pad_left: bool,
}

/// `rows[0]` is the header row; every row must have the same column count.
#[derive(Debug, Clone)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    fn column_widths(&self) -> Vec<usize> {
        let width = self.rows.first().map_or(0, |r| r.len());
        let mut widths = vec![0usize; width];
        for row in &self.rows {
            for (col, cell) in row.iter().enumerate() {
                widths[col] = widths[col].max(cell.chars().count());
            }
        }
        widths
    }

    /// Render into output lines bounded by `line_width`.
    pub fn render(&self, line_width: usize, flags: TableFlags) -> Vec<String> {
        if self.rows.is_empty() {
            return Vec::new();
        }
        let widths = self.column_widths();
        let column_set_width: usize = widths.iter().map(|w| w + 1).sum();
        let reps_per_line = if flags.repeat_rows && line_width > column_set_width {
            (line_width / column_set_width).max(1)
        } else {
            1
        };

        let mut out = Vec::new();
        if !flags.no_headers {
            let header_reps = if flags.repeat_headers { reps_per_line } else { 1 };
            let mut line = String::new();
            for _ in 0..header_reps {
                push_row(&mut line, &self.rows[0], &widths, flags.pad_left);
            }
            out.push(line.trim_end().to_string());
        }

        let data_start = if flags.no_headers { 0 } else { 1 };
        let mut line = String::new();
        let mut packed = 0;
        for row in &self.rows[data_start..] {
            push_row(&mut line, row, &widths, flags.pad_left);
            packed += 1;
            if packed == reps_per_line {
                out.push(line.trim_end().to_string());
                line.clear();
                packed = 0;
            }
        }
        if packed > 0 {
            out.push(line.trim_end().to_string());
        }
        out
    }
}

fn push_row(line: &mut String, row: &[String], widths: &[usize], pad_left: bool) {
    for (col, cell) in row.iter().enumerate() {
        let pad = widths[col].saturating_sub(cell.chars().count());
        if pad_left {
            line.extend(std::iter::repeat(' ').take(pad));
            line.push_str(cell);
        } else {
            line.push_str(cell);
            line.extend(std::iter::repeat(' ').take(pad));
        }
        line.push(' ');
    }
}
