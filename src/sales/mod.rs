pub mod storage;
pub mod types;

pub use storage::{get_sales_log_path, load_sales_log, save_sales_log, SalesLedger};
pub use types::{SaleRecord, SalesLog, SALES_LOG_VERSION};
