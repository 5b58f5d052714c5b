pub mod formatter;

pub use formatter::{
    format_daily_summary, format_hourly_table, format_reading_detail, format_report, format_sales_summary, score_bar,
    should_use_colors,
};
