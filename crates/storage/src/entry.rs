// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL entry structure with checksum verification
//!
//! One entry holds one committed transaction, so replay can never observe
//! half of a batch.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use stepwise_core::{StorageError, Transaction};

/// A single entry in the write-ahead log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Monotonically increasing sequence number
    pub sequence: u64,
    /// Microseconds since Unix epoch
    pub timestamp_micros: u64,
    pub machine_id: String,
    pub transaction: Transaction,
    /// CRC32 of the serialized transaction
    pub checksum: u32,
}

impl WalEntry {
    pub fn new(
        sequence: u64,
        machine_id: &str,
        transaction: Transaction,
    ) -> Result<Self, StorageError> {
        let timestamp_micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self::new_with_timestamp(sequence, timestamp_micros, machine_id, transaction)
    }

    pub fn new_with_timestamp(
        sequence: u64,
        timestamp_micros: u64,
        machine_id: &str,
        transaction: Transaction,
    ) -> Result<Self, StorageError> {
        let checksum = Self::calculate_checksum(&transaction)?;
        Ok(Self {
            sequence,
            timestamp_micros,
            machine_id: machine_id.to_string(),
            transaction,
            checksum,
        })
    }

    fn calculate_checksum(transaction: &Transaction) -> Result<u32, StorageError> {
        let json = serde_json::to_vec(transaction)?;
        Ok(crc32fast::hash(&json))
    }

    /// Verify the checksum matches the transaction
    pub fn verify(&self) -> bool {
        Self::calculate_checksum(&self.transaction)
            .map(|sum| sum == self.checksum)
            .unwrap_or(false)
    }

    /// Serialize to one line of JSON, newline included
    pub fn to_line(&self) -> Result<String, StorageError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn from_line(line: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(line.trim_end())?)
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
