use std::io::{self, Write};
use latencylib::buffer::BufferKind;
use latencylib::runner::SweepRow;

const COLUMN_WIDTH: usize = 16;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OutputMode {
    /// Right aligned, fixed width columns
    Table,
    Csv,
    /// All rows as one pretty printed array, written when the sweep ends
    Json,
}

/// Writes sweep rows as they arrive
pub struct Reporter<W: Write> {
    out: W,
    mode: OutputMode,
    kinds: Vec<BufferKind>,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, mode: OutputMode, kinds: Vec<BufferKind>) -> Self {
        Self { out, mode, kinds }
    }

    pub fn header(&mut self) -> io::Result<()> {
        match self.mode {
            OutputMode::Table => {
                let mut cols = vec!["bytes".to_string(), "size".to_string()];
                cols.extend(self.kinds.iter().map(|k| format!("{k} ns/access")));
                let cols: Vec<String> = cols.iter().map(|c| format!("{c:>COLUMN_WIDTH$}")).collect();
                writeln!(self.out, "{}", cols.join(" "))
            }
            OutputMode::Csv => {
                let mut cols = vec!["bytes".to_string(), "human".to_string()];
                cols.extend(self.kinds.iter().map(|k| format!("ns_per_access_{k}")));
                writeln!(self.out, "{}", cols.join(","))
            }
            OutputMode::Json => Ok(()),
        }
    }

    /// Writes one row, flushing so rows show up while the sweep is still running
    pub fn row(&mut self, row: &SweepRow) -> io::Result<()> {
        let latencies = self.kinds.iter().map(|k| row.latency(*k).unwrap_or(f64::NAN));
        match self.mode {
            OutputMode::Table => {
                let mut cols = vec![
                    format!("{:>COLUMN_WIDTH$}", row.size_bytes),
                    format!("{:>COLUMN_WIDTH$}", human_bytes(row.size_bytes)),
                ];
                cols.extend(latencies.map(|ns| {
                    if ns.is_nan() {
                        format!("{:>COLUMN_WIDTH$}", "nan")
                    } else {
                        format!("{ns:>COLUMN_WIDTH$.2}")
                    }
                }));
                writeln!(self.out, "{}", cols.join(" "))?;
            }
            OutputMode::Csv => {
                let mut cols = vec![row.size_bytes.to_string(), human_bytes(row.size_bytes)];
                cols.extend(latencies.map(|ns| if ns.is_nan() { "nan".to_string() } else { format!("{ns:.3}") }));
                writeln!(self.out, "{}", cols.join(","))?;
            }
            OutputMode::Json => return Ok(()),
        }
        self.out.flush()
    }

    /// Writes anything held back until the end of the sweep
    pub fn finish(&mut self, rows: &[SweepRow]) -> io::Result<()> {
        if self.mode == OutputMode::Json {
            serde_json::to_writer_pretty(&mut self.out, rows)?;
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Formats a byte count with one decimal place, in steps of 1024, so 1536 becomes "1.5 KB"
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use latencylib::runner::AggregatedResult;
    use super::*;

    fn row(size_bytes: u64, contiguous: f64, indirect: f64) -> SweepRow {
        SweepRow {
            size_bytes,
            results: vec![
                AggregatedResult { size_bytes, kind: BufferKind::Contiguous, ns_per_access: contiguous },
                AggregatedResult { size_bytes, kind: BufferKind::Indirect, ns_per_access: indirect },
            ],
        }
    }

    fn render(mode: OutputMode, kinds: Vec<BufferKind>, rows: &[SweepRow]) -> String {
        let mut reporter = Reporter::new(Vec::new(), mode, kinds);
        reporter.header().unwrap();
        for r in rows {
            reporter.row(r).unwrap();
        }
        reporter.finish(rows).unwrap();
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn human_sizes() {
        assert_eq!(human_bytes(0), "0.0 B");
        assert_eq!(human_bytes(1023), "1023.0 B");
        assert_eq!(human_bytes(1024), "1.0 KB");
        assert_eq!(human_bytes(1536), "1.5 KB");
        assert_eq!(human_bytes(16 * 1024), "16.0 KB");
        assert_eq!(human_bytes(512 * 1024 * 1024), "512.0 MB");
        assert_eq!(human_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
        // No unit past GB
        assert_eq!(human_bytes(2048 * 1024 * 1024 * 1024), "2048.0 GB");
    }

    #[test]
    fn csv_rows() {
        let out = render(OutputMode::Csv, BufferKind::ALL.to_vec(), &[row(16384, 1.23456, f64::NAN)]);
        assert_eq!(out, "bytes,human,ns_per_access_contiguous,ns_per_access_indirect\n16384,16.0 KB,1.235,nan\n");
    }

    #[test]
    fn csv_only_enabled_columns() {
        let out = render(OutputMode::Csv, vec![BufferKind::Indirect], &[row(1024, 1.0, 2.0)]);
        assert_eq!(out, "bytes,human,ns_per_access_indirect\n1024,1.0 KB,2.000\n");
    }

    #[test]
    fn table_columns_are_right_aligned() {
        let out = render(OutputMode::Table, BufferKind::ALL.to_vec(), &[row(1024, 0.5, f64::NAN)]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            format!("{:>16} {:>16} {:>16} {:>16}", "bytes", "size", "contiguous ns/access", "indirect ns/access")
        );
        assert_eq!(lines[1], format!("{:>16} {:>16} {:>16} {:>16}", 1024, "1.0 KB", "0.50", "nan"));
    }

    #[test]
    fn json_is_written_at_the_end() {
        let out = render(OutputMode::Json, BufferKind::ALL.to_vec(), &[row(2048, 1.5, 3.0)]);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["size_bytes"], 2048);
        assert_eq!(value[0]["results"][1]["kind"], "indirect");
        assert_eq!(value[0]["results"][0]["ns_per_access"], 1.5);
    }
}
