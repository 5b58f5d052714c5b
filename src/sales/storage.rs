use super::types::{SalesLog, SALES_LOG_VERSION};
use crate::service::ServiceKind;
use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Default sales log path (~/.config/trinity-oracle/sales_log.json)
pub fn get_sales_log_path() -> PathBuf {
    crate::config::get_config_dir().join("sales_log.json")
}

/// Load the sales log from a JSON file
///
/// A missing file is an empty log. A file with an unsupported version is an error.
pub fn load_sales_log(path: &Path) -> Result<SalesLog> {
    if !path.exists() {
        return Ok(SalesLog::new());
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open sales log at {}", path.display()))?;

    let log: SalesLog = serde_json::from_reader(file)
        .with_context(|| format!("Failed to parse sales log at {}", path.display()))?;

    if log.version != SALES_LOG_VERSION {
        anyhow::bail!("Unsupported sales log version: {}", log.version);
    }

    Ok(log)
}

/// Save the sales log atomically as pretty JSON, creating parent directories.
pub fn save_sales_log(path: &Path, log: &SalesLog) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create sales log directory {}", parent.display())
        })?;
    }

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    serde_json::to_writer_pretty(&mut file, log).context("Failed to serialize sales log")?;

    file.commit().context("Failed to save sales log")?;

    Ok(())
}

/// A sales log bound to its file. Every recorded sale is persisted immediately.
#[derive(Debug)]
pub struct SalesLedger {
    path: PathBuf,
    log: SalesLog,
}

impl SalesLedger {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let log = load_sales_log(&path)?;
        Ok(Self { path, log })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self) -> &SalesLog {
        &self.log
    }

    pub fn record(
        &mut self,
        job_id: &str,
        service: ServiceKind,
        buyer: &str,
        revenue: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        self.log
            .record_sale(job_id, service, buyer, revenue, timestamp);
        save_sales_log(&self.path, &self.log)?;
        tracing::info!(
            job_id,
            service = %service,
            revenue,
            total = self.log.total_revenue_usdc,
            "Sale recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 20, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_load_missing_file_returns_empty() {
        let dir = TempDir::new().unwrap();
        let log = load_sales_log(&dir.path().join("missing.json")).unwrap();
        assert_eq!(log, SalesLog::new());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/sales_log.json");

        let mut log = SalesLog::new();
        log.record_sale("42", ServiceKind::DeepLuck, "0xabc", 0.5, ts());
        save_sales_log(&path, &log).unwrap();

        let loaded = load_sales_log(&path).unwrap();
        assert_eq!(loaded, log);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sales_log.json");
        std::fs::write(
            &path,
            r#"{"version": 2, "total_sales": 0, "total_revenue_usdc": 0.0, "sales": []}"#,
        )
        .unwrap();

        let err = load_sales_log(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported sales log version: 2"));
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sales_log.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_sales_log(&path).is_err());
    }

    #[test]
    fn test_ledger_persists_each_sale() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sales_log.json");

        let mut ledger = SalesLedger::open(&path).unwrap();
        ledger
            .record("1", ServiceKind::DailyLuck, "0xabc", 0.01, ts())
            .unwrap();
        ledger
            .record("2", ServiceKind::DeepLuck, "0xABC", 0.5, ts())
            .unwrap();

        let reopened = SalesLedger::open(&path).unwrap();
        assert_eq!(reopened.log().total_sales, 2);
        assert_eq!(reopened.log().total_revenue_usdc, 0.51);
        assert_eq!(reopened.log().purchase_count("0xAbc"), 2);
    }

    #[test]
    fn test_load_log_with_integer_job_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sales_log.json");
        std::fs::write(
            &path,
            r#"{"total_sales": 1, "total_revenue_usdc": 0.5, "sales": [{"job_id": 1234, "service": "deepLuck", "buyer": "0xabc", "revenue": 0.5, "timestamp": "2026-02-18T10:00:00Z"}]}"#,
        )
        .unwrap();

        let mut ledger = SalesLedger::open(&path).unwrap();
        assert_eq!(ledger.log().sales[0].job_id, "1234");

        ledger
            .record("1300", ServiceKind::DailyLuck, "0xdef", 0.01, ts())
            .unwrap();
        let reopened = load_sales_log(&path).unwrap();
        assert_eq!(reopened.total_sales, 2);
        assert_eq!(reopened.sales[0].job_id, "1234");
        assert_eq!(reopened.total_revenue_usdc, 0.51);
    }
}
