pub mod audio_models;
pub mod capability;
pub mod config;
pub mod error;
pub mod media;
pub mod notice;
pub mod recording_result;
pub mod state;
