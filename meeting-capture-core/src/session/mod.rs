pub mod acquirer;
pub mod cleanup;
pub mod compatibility;
pub mod device_catalog;
pub mod mixing;
pub mod recording;
pub mod slot;
pub mod ticker;
