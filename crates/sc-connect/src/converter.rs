//! Conversion between stored records and framework connection values.

use sc_common::ConnectionData;

use crate::entity::ConnectionRecord;

/// Maps between the stored record and the framework's connection value.
pub trait ConnectionConverter: Send + Sync {
    fn to_record(&self, user_id: &str, data: &ConnectionData, rank: i32) -> ConnectionRecord;

    fn to_data(&self, record: &ConnectionRecord) -> ConnectionData;
}

/// Copies fields verbatim. Tokens are stored as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordConverter;

impl ConnectionConverter for RecordConverter {
    fn to_record(&self, user_id: &str, data: &ConnectionData, rank: i32) -> ConnectionRecord {
        ConnectionRecord::from_data(user_id, data, rank)
    }

    fn to_data(&self, record: &ConnectionRecord) -> ConnectionData {
        record.to_data()
    }
}
