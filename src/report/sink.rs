use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, Result};

/// Destination for aggregate values. Writes are absolute: callers read the
/// current values first and send the new totals, never increments.
#[async_trait]
pub trait ReportingSink: Send + Sync {
    /// Current value of every requested cell. Cells never written read as 0.
    async fn read_cells(&self, cells: &[String]) -> Result<HashMap<String, f64>>;

    /// Overwrite the given cells in one batch.
    async fn write_cells(&self, updates: &[(String, f64)]) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CellRecord {
    cell: String,
    value: String,
}

/// Sheet mirror kept as a `cell,value` CSV file.
pub struct CsvSheetSink {
    path: PathBuf,
}

impl CsvSheetSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut cells = BTreeMap::new();
        for record in reader.deserialize::<CellRecord>() {
            let record = record?;
            cells.insert(record.cell, record.value);
        }
        Ok(cells)
    }
}

/// Accepts sheet formatting such as `$1,250` or `-$83`.
pub fn parse_cell_value(raw: &str) -> Result<f64> {
    let cleaned: String = raw.chars().filter(|c| !matches!(c, '$' | ',' | ' ')).collect();
    if cleaned.is_empty() {
        return Ok(0.0);
    }
    cleaned
        .parse::<f64>()
        .map_err(|_| AppError::Sink(format!("unreadable cell value: {raw}")))
}

#[async_trait]
impl ReportingSink for CsvSheetSink {
    async fn read_cells(&self, cells: &[String]) -> Result<HashMap<String, f64>> {
        let stored = self.load()?;
        let mut values = HashMap::with_capacity(cells.len());
        for cell in cells {
            let value = match stored.get(cell) {
                Some(raw) => parse_cell_value(raw)?,
                None => 0.0,
            };
            values.insert(cell.clone(), value);
        }
        Ok(values)
    }

    async fn write_cells(&self, updates: &[(String, f64)]) -> Result<()> {
        let mut cells = self.load()?;
        for (cell, value) in updates {
            cells.insert(cell.clone(), value.to_string());
        }
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let mut writer = csv::Writer::from_path(&self.path)?;
        for (cell, value) in cells {
            writer.serialize(CellRecord { cell, value })?;
        }
        writer.flush()?;
        debug!(cells = updates.len(), path = %self.path.display(), "Sheet mirror written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_values_parse() {
        assert_eq!(parse_cell_value("$1,250").unwrap(), 1250.0);
        assert_eq!(parse_cell_value("-$83").unwrap(), -83.0);
        assert_eq!(parse_cell_value("").unwrap(), 0.0);
        assert!(parse_cell_value("n/a").is_err());
    }

    #[tokio::test]
    async fn writes_are_absolute_and_keep_other_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.csv");
        std::fs::write(&path, "cell,value\nB2,\"$1,000\"\nZ9,7\n").unwrap();
        let sink = CsvSheetSink::new(path);

        let before = sink.read_cells(&["B2".to_string(), "C2".to_string()]).await.unwrap();
        assert_eq!(before["B2"], 1000.0);
        assert_eq!(before["C2"], 0.0);

        sink.write_cells(&[("B2".to_string(), 1050.0), ("C2".to_string(), 3.0)]).await.unwrap();
        let after = sink
            .read_cells(&["B2".to_string(), "C2".to_string(), "Z9".to_string()])
            .await
            .unwrap();
        assert_eq!(after["B2"], 1050.0);
        assert_eq!(after["C2"], 3.0);
        assert_eq!(after["Z9"], 7.0);
    }
}
