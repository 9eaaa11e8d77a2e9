use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Write equally long columns to a CSV file with one header row.
pub fn write_columns<P: AsRef<Path>>(path: P, headers: &[&str], columns: &[&[f64]]) -> io::Result<()> {
    if headers.len() != columns.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Headers count ({}) doesn't match data columns ({})",
                headers.len(),
                columns.len()
            ),
        ));
    }
    let n_rows = columns.first().map_or(0, |col| col.len());
    if let Some(bad) = columns.iter().find(|col| col.len() != n_rows) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("column lengths differ ({} vs {n_rows})", bad.len()),
        ));
    }

    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "{}", headers.join(","))?;
    for i in 0..n_rows {
        let row: Vec<String> = columns.iter().map(|col| format!("{:.15e}", col[i])).collect();
        writeln!(file, "{}", row.join(","))?;
    }
    file.flush()
}

/// Time series: a `t` column followed by one column per named series.
pub fn write_time_series<P: AsRef<Path>>(
    path: P,
    times: &[f64],
    series: &[(String, Vec<f64>)],
) -> io::Result<()> {
    let mut headers = vec!["t"];
    headers.extend(series.iter().map(|(name, _)| name.as_str()));
    let mut columns = vec![times];
    columns.extend(series.iter().map(|(_, values)| values.as_slice()));
    write_columns(path, &headers, &columns)
}
