//! Text grid with columns aligned on their widest cell.

use std::io::{self, Write};

pub type Line = Vec<String>;

#[derive(Debug, Clone)]
pub struct Grid {
    lines: Vec<Line>,
    margin: String,
    spacing: String,
}

impl Default for Grid {
    fn default() -> Self {
        Self { lines: Vec::new(), margin: String::new(), spacing: " ".to_string() }
    }
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn add_line<I, S>(&mut self, line: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.push(line.into_iter().map(Into::into).collect());
    }

    /// Add one column on the last line.
    pub fn add_column(&mut self, text: impl Into<String>) {
        if self.lines.is_empty() {
            self.lines.push(Line::new());
        }
        if let Some(last) = self.lines.last_mut() {
            last.push(text.into());
        }
    }

    /// Underline the cells of the last line, after the given first columns.
    pub fn add_underlines(&mut self, first_columns: &[&str], underline: char) {
        let Some(prev) = self.lines.last() else {
            return;
        };
        let mut next: Line = first_columns.iter().map(|s| s.to_string()).collect();
        while next.len() < prev.len() {
            next.push(underline.to_string().repeat(width(&prev[next.len()])));
        }
        self.lines.push(next);
    }

    pub fn set_margin(&mut self, width: usize) {
        self.margin = " ".repeat(width);
    }

    pub fn set_spacing(&mut self, width: usize) {
        self.spacing = " ".repeat(width);
    }

    /// Remove the columns, starting at `first`, which are empty in all lines
    /// after the `skip` header lines.
    pub fn remove_empty_columns(&mut self, first: usize, skip: usize) {
        let count = self.lines.iter().map(Vec::len).max().unwrap_or(0);
        for column in (first..count).rev() {
            let empty = self
                .lines
                .iter()
                .skip(skip)
                .all(|line| line.get(column).map_or(true, String::is_empty));
            if empty {
                for line in &mut self.lines {
                    if column < line.len() {
                        line.remove(column);
                    }
                }
            }
        }
    }

    /// Remove the lines, after the `skip` header lines, with only empty
    /// cells starting at column `first`.
    pub fn remove_empty_lines(&mut self, first: usize, skip: usize) {
        let mut index = 0;
        self.lines.retain(|line| {
            index += 1;
            index <= skip || line.iter().skip(first).any(|cell| !cell.is_empty())
        });
    }

    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        let mut widths: Vec<usize> = Vec::new();
        for line in &self.lines {
            for (i, cell) in line.iter().enumerate() {
                let w = width(cell);
                match widths.get_mut(i) {
                    Some(max) => *max = (*max).max(w),
                    None => widths.push(w),
                }
            }
        }

        for line in &self.lines {
            out.write_all(self.margin.as_bytes())?;
            for (i, cell) in line.iter().enumerate() {
                out.write_all(cell.as_bytes())?;
                // The last cell of a line is not padded.
                if i + 1 < line.len() {
                    write!(out, "{}{}", " ".repeat(widths[i] - width(cell)), self.spacing)?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

fn width(text: &str) -> usize {
    text.chars().count()
}
