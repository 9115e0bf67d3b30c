pub mod audio_graph;
pub mod ring_buffer;
pub mod sample_format;
