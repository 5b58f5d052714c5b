use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::service::ServiceKind;

pub const SALES_LOG_VERSION: u32 = 1;

fn current_version() -> u32 {
    SALES_LOG_VERSION
}

fn round_to_4dp(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesLog {
    // Logs written before versioning carry no tag and are treated as version 1
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub total_sales: u64,
    #[serde(default)]
    pub total_revenue_usdc: f64,
    #[serde(default)]
    pub sales: Vec<SaleRecord>,
}

/// Marketplace job ids are integers; logs may hold them as numbers or strings.
fn job_id_from_number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum JobId {
        Number(u64),
        Text(String),
    }

    Ok(match JobId::deserialize(deserializer)? {
        JobId::Number(id) => id.to_string(),
        JobId::Text(id) => id,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    #[serde(deserialize_with = "job_id_from_number_or_string")]
    pub job_id: String,
    pub service: ServiceKind,
    pub buyer: String,
    pub revenue: f64,
    pub timestamp: DateTime<Utc>,
}

impl Default for SalesLog {
    fn default() -> Self {
        Self::new()
    }
}

impl SalesLog {
    pub fn new() -> Self {
        Self {
            version: SALES_LOG_VERSION,
            total_sales: 0,
            total_revenue_usdc: 0.0,
            sales: Vec::new(),
        }
    }

    /// Append a completed sale and update the running totals.
    pub fn record_sale(
        &mut self,
        job_id: impl Into<String>,
        service: ServiceKind,
        buyer: impl Into<String>,
        revenue: f64,
        timestamp: DateTime<Utc>,
    ) {
        self.total_sales += 1;
        self.total_revenue_usdc = round_to_4dp(self.total_revenue_usdc + revenue);
        self.sales.push(SaleRecord {
            job_id: job_id.into(),
            service,
            buyer: buyer.into(),
            revenue,
            timestamp,
        });
    }

    /// How many times a wallet has bought from us. Addresses compare case-insensitively.
    pub fn purchase_count(&self, buyer: &str) -> usize {
        self.sales
            .iter()
            .filter(|s| s.buyer.eq_ignore_ascii_case(buyer))
            .count()
    }

    pub fn last_sale(&self) -> Option<&SaleRecord> {
        self.sales.last()
    }

    pub fn revenue_by_service(&self) -> HashMap<ServiceKind, f64> {
        let mut totals = HashMap::new();
        for sale in &self.sales {
            *totals.entry(sale.service).or_insert(0.0) += sale.revenue;
        }
        for total in totals.values_mut() {
            *total = round_to_4dp(*total);
        }
        totals
    }
}
