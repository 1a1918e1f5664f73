//! LZ4 frame compression
//!
//! Standard LZ4 frames (magic `0x184D2204`):
//!
//! ```text
//! [magic][frame descriptor][block]*[end mark][content checksum?]
//! ```
//!
//! The descriptor records the block size, block mode and which checksums
//! follow, so a decoder accepts any conformant frame whatever preferences
//! produced it. Compression level and the decompression-speed hint have no
//! counterpart in the frame format and do not change the output.

use cinder_config::{Lz4BlockSize, Lz4Preferences};
use lz4_flex::frame::{BlockMode, BlockSize, FrameDecoder, FrameEncoder, FrameInfo};
use std::io::{self, Read, Write};
use thiserror::Error;

/// Frame codec errors
#[derive(Debug, Error)]
pub enum FrameError {
    /// Malformed or unsupported frame, or checksum mismatch
    #[error("lz4 frame error: {0}")]
    Lz4(#[from] lz4_flex::frame::Error),

    /// The underlying reader or writer failed
    #[error("lz4 frame I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Frame descriptor for a set of preferences
pub fn frame_info(prefs: &Lz4Preferences) -> FrameInfo {
    let block_size = match prefs.block_size {
        Lz4BlockSize::Max64Kb => BlockSize::Max64KB,
        Lz4BlockSize::Max256Kb => BlockSize::Max256KB,
        Lz4BlockSize::Max1Mb => BlockSize::Max1MB,
        Lz4BlockSize::Max4Mb => BlockSize::Max4MB,
    };
    let block_mode = if prefs.block_independent {
        BlockMode::Independent
    } else {
        BlockMode::Linked
    };

    FrameInfo::new()
        .block_size(block_size)
        .block_mode(block_mode)
        .block_checksums(prefs.block_checksum)
        .content_checksum(prefs.content_checksum)
}

/// Streaming frame compressor over any writer
///
/// The frame is only complete after [`FrameCompressor::finish`].
pub struct FrameCompressor<W: Write> {
    encoder: FrameEncoder<W>,
    auto_flush: bool,
}

impl<W: Write> FrameCompressor<W> {
    /// Start a frame on `writer`
    pub fn new(writer: W, prefs: &Lz4Preferences) -> Self {
        Self {
            encoder: FrameEncoder::with_frame_info(frame_info(prefs), writer),
            auto_flush: prefs.auto_flush,
        }
    }

    /// Write the end mark and checksum, returning the writer
    pub fn finish(self) -> Result<W, FrameError> {
        Ok(self.encoder.finish()?)
    }
}

impl<W: Write> Write for FrameCompressor<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.encoder.write(buf)?;
        if self.auto_flush {
            self.encoder.flush()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

/// Streaming frame decompressor over any reader
///
/// Short reads from the source are retried; `read` returns 0 only after the
/// end mark (and content checksum) of the last frame.
pub struct FrameDecompressor<R: Read> {
    decoder: FrameDecoder<R>,
}

impl<R: Read> FrameDecompressor<R> {
    /// Decode frames from `reader`
    pub fn new(reader: R) -> Self {
        Self {
            decoder: FrameDecoder::new(reader),
        }
    }
}

impl<R: Read> Read for FrameDecompressor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}

/// Compress a whole buffer into one frame
pub fn compress(data: &[u8], prefs: &Lz4Preferences) -> Result<Vec<u8>, FrameError> {
    let mut compressor = FrameCompressor::new(Vec::with_capacity(data.len() / 2 + 64), prefs);
    compressor.write_all(data)?;
    compressor.finish()
}

/// Decompress every frame in a buffer
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut out = Vec::with_capacity(data.len() * 2);
    FrameDecompressor::new(data).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
