#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use sheet_intent::address::{CellAddress, RangeAddress};
use sheet_intent::document::MemoryDocument;
use sheet_intent::errors::PortError;
use sheet_intent::port::{Cell, DocumentPort, Matrix, PortResult};
use sheet_intent::protocol::{Action, ActionOp, CreatePivotTablePayload, WriteCellPayload};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub fn cell(s: &str) -> CellAddress {
    CellAddress::parse(s).expect("cell address")
}

pub fn range(s: &str) -> RangeAddress {
    RangeAddress::parse(s).expect("range address")
}

pub fn write_cell(address: &str, value: Value) -> Action {
    Action::new(ActionOp::WriteCell(WriteCellPayload {
        address: cell(address),
        value,
        format: None,
    }))
}

pub fn memory(rows: Matrix) -> Arc<MemoryDocument> {
    Arc::new(MemoryDocument::with_rows(&rows).expect("seed rows"))
}

/// Memory document with engineered write failures, optional latency and
/// optional pivot support. Every grid read is recorded.
pub struct FlakyDocument {
    pub inner: MemoryDocument,
    failing: HashSet<CellAddress>,
    delay: Option<Duration>,
    supports_pivots: bool,
    pub pivots: Mutex<Vec<CreatePivotTablePayload>>,
    pub reads: Mutex<Vec<RangeAddress>>,
}

impl FlakyDocument {
    pub fn new() -> Self {
        Self {
            inner: MemoryDocument::new(),
            failing: HashSet::new(),
            delay: None,
            supports_pivots: false,
            pivots: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(mut self, addresses: &[&str]) -> Self {
        self.failing = addresses.iter().map(|a| cell(a)).collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_pivots(mut self) -> Self {
        self.supports_pivots = true;
        self
    }
}

#[async_trait]
impl DocumentPort for FlakyDocument {
    async fn read_grid(&self, range: &RangeAddress) -> PortResult<Matrix> {
        self.reads.lock().push(*range);
        self.inner.read_grid(range).await
    }

    async fn write_cell(&self, address: &CellAddress, value: &Cell) -> PortResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(address) {
            return Err(PortError::host(format!("cell {address} is locked")));
        }
        self.inner.write_cell(address, value).await
    }

    async fn write_range(&self, range: &RangeAddress, values: &Matrix) -> PortResult<()> {
        self.inner.write_range(range, values).await
    }

    async fn selection(&self) -> PortResult<RangeAddress> {
        self.inner.selection().await
    }

    async fn worksheet_name(&self) -> PortResult<String> {
        self.inner.worksheet_name().await
    }

    async fn create_pivot_table(&self, pivot: &CreatePivotTablePayload) -> PortResult<()> {
        if !self.supports_pivots {
            return Err(PortError::unsupported("pivot tables"));
        }
        self.pivots.lock().push(pivot.clone());
        Ok(())
    }

    async fn save_hint(&self) -> PortResult<()> {
        self.inner.save_hint().await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}
