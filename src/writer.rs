use anyhow::{Context, Result};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use crate::types::RaceAggregate;

pub const CSV_HEADER: &str = "race_id,pred_count,actual_count,mean_deltaT,std_deltaT,median_deltaT";

/// Quote a field only when it would otherwise break the row.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn write_rows<W: Write>(out: &mut W, rows: &[RaceAggregate]) -> std::io::Result<()> {
    writeln!(out, "{CSV_HEADER}")?;
    for r in rows {
        writeln!(
            out,
            "{},{},{},{},{},{}",
            csv_field(&r.race_id),
            r.predicted_stops,
            r.actual_stops,
            r.mean_delta_t,
            r.std_delta_t,
            r.median_delta_t
        )?;
    }
    Ok(())
}

/// Write the per-race table, creating the parent directory if needed.
pub fn write_csv(path: &Path, rows: &[RaceAggregate]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let f = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(f);
    write_rows(&mut out, rows).with_context(|| format!("failed to write {}", path.display()))?;
    out.flush()?;
    tracing::info!("wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str) -> RaceAggregate {
        RaceAggregate {
            race_id: id.into(),
            predicted_stops: 1,
            actual_stops: 2,
            mean_delta_t: 22.0,
            std_delta_t: 0.0,
            median_delta_t: 22.0,
        }
    }

    #[test]
    fn header_and_rows() {
        let mut buf = Vec::new();
        write_rows(&mut buf, &[row("monza"), row("spa, belgium")]).unwrap();
        let txt = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = txt.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "monza,1,2,22,0,22");
        assert_eq!(lines[2], "\"spa, belgium\",1,2,22,0,22");
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results/nested/deltaT.csv");
        write_csv(&path, &[row("monza")]).unwrap();
        let txt = fs::read_to_string(&path).unwrap();
        assert!(txt.starts_with(CSV_HEADER));
    }
}
