//! binlog event taxonomy and the per-event decoders
pub mod col;
pub mod error;
pub mod event;
pub mod util;

pub use crate::error::{Error, Result};

/// 4-byte little-endian magic at offset 0 of every binlog file
pub const BINLOG_MAGIC: u32 = 0x6e6962fe;

/// offset of the type code inside the common event header
pub const EVENT_TYPE_OFFSET: usize = 4;

/// fixed size of the v4 common event header
pub const LOG_EVENT_HEADER_LEN: usize = 19;

/// offset of the total event size inside the common header
pub const EVENT_LEN_OFFSET: usize = 9;

/// offset of the next-event position inside the common header
pub const LOG_POS_OFFSET: usize = 13;

/// width of the server version field of a format description event
pub const ST_SERVER_VER_LEN: usize = 50;

/// rotate events cap the next file name at this size, NUL included
pub const ROTATE_MAX_FULL_NAME_SIZE: usize = 512;

/// the only binlog format written by maintained server lines
pub const BINLOG_VERSION: u16 = 4;

/// server version assumed before the first format description arrives
pub const DEFAULT_SERVER_VERSION: &str = "8.0.41";

/// servers from 5.6.1 on append a CRC32 to every event
pub const CHECKSUM_VERSION_VALUE: u64 = 0x05_06_01;
