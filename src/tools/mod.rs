pub mod bit_stream;
pub mod static_huff;
pub mod sliding_window;
