use rounds_core::{PendingUpdate, PickupSchedule};

use crate::StorageError;

pub fn encode_schedule(schedule: &PickupSchedule) -> Result<Vec<u8>, StorageError> {
    Ok(serde_json::to_vec(schedule)?)
}

pub fn decode_schedule(bytes: &[u8]) -> Result<PickupSchedule, StorageError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn encode_pending(update: &PendingUpdate) -> Result<Vec<u8>, StorageError> {
    Ok(serde_json::to_vec(update)?)
}

pub fn decode_pending(bytes: &[u8]) -> Result<PendingUpdate, StorageError> {
    Ok(serde_json::from_slice(bytes)?)
}
