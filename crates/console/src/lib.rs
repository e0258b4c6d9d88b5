use std::sync::Arc;

fn format_with_label(label: &str, message: &str) -> String {
    format!("[{label}] {message}")
}

/// Prefixes every message with the label of the pipeline task that emitted
/// it, writing through the task's progress bar.
pub struct Logger<'a> {
    progress: &'a mut printer::MultiProgressBar,
    label: Arc<str>,
}

impl Logger<'_> {
    pub fn new_progress(progress: &mut printer::MultiProgressBar, label: Arc<str>) -> Logger {
        Logger { progress, label }
    }

    pub fn debug(&mut self, message: &str) {
        self.log(printer::Level::Debug, message);
    }

    pub fn message(&mut self, message: &str) {
        self.log(printer::Level::Message, message);
    }

    pub fn info(&mut self, message: &str) {
        self.log(printer::Level::Info, message);
    }

    fn log(&mut self, level: printer::Level, message: &str) {
        self.progress.log(
            level,
            format_with_label(self.label.as_ref(), message).as_str(),
        );
    }
}

/// Fixed-width console table used for the apps listing and the final
/// deployment summary.
pub struct Table {
    headers: Vec<Arc<str>>,
    rows: Vec<Vec<Arc<str>>>,
}

impl Table {
    pub fn new(headers: Vec<Arc<str>>) -> Self {
        Table {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<Arc<str>>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.len()).collect();
        for row in self.rows.iter() {
            for (index, cell) in row.iter().enumerate() {
                if index < widths.len() && cell.len() > widths[index] {
                    widths[index] = cell.len();
                }
            }
        }
        widths
    }

    fn format_row(row: &[Arc<str>], widths: &[usize]) -> String {
        let mut line = String::new();
        for (index, width) in widths.iter().enumerate() {
            let cell = row.get(index).map(|c| c.as_ref()).unwrap_or("");
            line.push_str(format!("{cell:<width$}").as_str());
            if index + 1 < widths.len() {
                line.push_str("  ");
            }
        }
        line.trim_end().to_string()
    }

    pub fn render(&self) -> Vec<String> {
        let widths = self.column_widths();
        let mut lines = Vec::new();
        lines.push(Self::format_row(&self.headers, &widths));
        lines.push(
            widths
                .iter()
                .map(|width| "-".repeat(*width))
                .collect::<Vec<String>>()
                .join("  "),
        );
        for row in self.rows.iter() {
            lines.push(Self::format_row(row, &widths));
        }
        lines
    }

    /// Tables always print, so they bypass the verbosity filter by logging
    /// at the printer's current level.
    pub fn show(&self, printer: &mut printer::Printer) {
        let level = printer.verbosity.level;
        for line in self.render() {
            let _ = printer.log(level, line.as_str());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_table() -> Table {
        let mut table = Table::new(vec!["App".into(), "Address".into()]);
        table.add_row(vec![
            "voting".into(),
            "0x5b1869d9a4c187f2eaa108f3062412ecf0526b24".into(),
        ]);
        table.add_row(vec!["finance".into(), "0x1234".into()]);
        table
    }

    #[test]
    fn test_columns_align_to_longest_cell() {
        let table = sample_table();
        let lines = table.render();
        assert_eq!(lines.len(), 4);
        // Header row pads the first column to the width of "finance".
        assert!(lines[0].starts_with("App    "));
        assert!(lines[2].starts_with("voting   0x5b1869"));
    }

    #[test]
    fn test_short_rows_render_empty_cells() {
        let mut table = Table::new(vec!["Name".into(), "Value".into()]);
        table.add_row(vec!["only".into()]);
        let lines = table.render();
        assert_eq!(lines[2], "only");
    }

    #[test]
    fn test_empty_table_reports_empty() {
        let table = Table::new(vec!["Name".into()]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_label_prefix() {
        assert_eq!(format_with_label("ipfs", "daemon is ready"), "[ipfs] daemon is ready");
    }
}
