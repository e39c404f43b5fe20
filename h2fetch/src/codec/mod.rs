pub(crate) mod write_buffer;
