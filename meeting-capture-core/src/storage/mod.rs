pub mod file_handoff;
pub mod metadata;
