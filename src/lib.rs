mod tools;
pub mod lz77;

type DYNERR = Box<dyn std::error::Error>;

/// Errors that abort a compression or expansion run
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("input unavailable")]
    InputUnavailable,
    #[error("file too large")]
    FileTooLarge,
    #[error("corrupt header")]
    CorruptHeader,
    #[error("code too long for header")]
    CodeTooLong,
    #[error("unknown code in stream")]
    UnknownCode,
    #[error("invalid back reference")]
    InvalidBackReference
}

/// Options controlling compression
pub struct Options {
    /// starting position in the input file
    pub in_offset: u64,
    /// starting position in the output file
    pub out_offset: u64,
    /// return error if file is larger
    pub max_file_size: u64,
    /// if set, write symbol probabilities to this path during compression
    pub csv: Option<std::path::PathBuf>
}

pub const STD_OPTIONS: Options = Options {
    in_offset: 0,
    out_offset: 0,
    max_file_size: u32::MAX as u64/4,
    csv: None
};
