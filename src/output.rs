use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{GrainError, Result};
use crate::models::GeoPoint;

pub const CSV_HEADER: &str = "Longitude,Latitude";

/// Default output file when none is given
pub const DEFAULT_OUTPUT: &str = "coordinate_list.csv";

/// Reject output paths that do not end in `.csv`
pub fn validate_output_path(path: &Path) -> Result<()> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(GrainError::input(format!(
            "output filename must be of .csv format, got {}",
            path.display()
        )));
    }
    Ok(())
}

/// Write points as CSV rows under a `Longitude,Latitude` header
pub fn write_csv<W: Write>(writer: W, points: &[GeoPoint]) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    writeln!(writer, "{CSV_HEADER}")?;
    for p in points {
        writeln!(writer, "{},{}", p.x, p.y)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_csv_file<P: AsRef<Path>>(path: P, points: &[GeoPoint]) -> Result<()> {
    write_csv(File::create(path.as_ref())?, points)
}
