//! Cinder Carbon - Carbon plaintext transport
//!
//! - `CarbonTransport` - Shared TCP/UDP connection with reconnect interval
//! - `FrameCompressor` / `FrameDecompressor` - LZ4 frame codec
//!
//! Lines are produced by `cinder-paths`; this crate only batches and ships
//! them.

pub mod error;
pub mod frame;
pub mod transport;

pub use error::{Result, TransportError};
pub use frame::{FrameCompressor, FrameDecompressor, FrameError, compress, decompress};
pub use transport::{
    CarbonTransport, TransportConfig, TransportKind, TransportMetrics, TransportMetricsSnapshot,
    UDP_MAX_BYTES, prepare,
};
