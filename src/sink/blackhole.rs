// SPDX-License-Identifier: Apache-2.0

use crate::error::Result;
use crate::sink::RecordSink;
use crate::source::SourceRecord;

/// Accepts and discards every record
#[derive(Debug, Default)]
pub struct BlackholeSink {
    accepted: u64,
}

impl BlackholeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }
}

impl RecordSink for BlackholeSink {
    fn deliver(&mut self, records: &[SourceRecord]) -> Result<()> {
        self.accepted += records.len() as u64;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "blackhole"
    }
}
