//! Pluggable payload codecs

use super::asset::CompressionType;
use super::error::CodecError;
use flate2::Compression;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use std::fmt;
use std::io::Read;
use std::sync::Arc;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Compressor and bounded decompressor for one compression tag
///
/// Implement this to plug a different compressor into [`Codecs`].
pub trait Codec: fmt::Debug + Send + Sync {
    /// Compress `data`
    fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>>;

    /// Decompress `data`, which must expand to exactly `expected_size` bytes
    fn decompress(&self, data: &[u8], expected_size: usize) -> CodecResult<Vec<u8>>;
}

/// Smallest up-front reservation when decoding
const MIN_RESERVE: usize = 4096;

/// Read at most one byte past `expected_size` and require an exact fit
///
/// The declared size comes from the file, so the initial reservation is
/// bounded by the input length and the buffer grows only as data arrives.
fn read_bounded(reader: impl Read, input_len: usize, expected_size: usize) -> CodecResult<Vec<u8>> {
    let reserve = expected_size.min(input_len.saturating_mul(4).max(MIN_RESERVE));
    let mut output = Vec::with_capacity(reserve);
    reader
        .take(expected_size as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|e| CodecError::Decompression(e.to_string()))?;

    if output.len() == expected_size {
        Ok(output)
    } else {
        Err(CodecError::DecompressedSizeMismatch {
            expected: expected_size,
            actual: output.len(),
        })
    }
}

/// Identity codec for stored assets
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredCodec;

impl Codec for StoredCodec {
    fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> CodecResult<Vec<u8>> {
        if data.len() != expected_size {
            return Err(CodecError::DecompressedSizeMismatch {
                expected: expected_size,
                actual: data.len(),
            });
        }
        Ok(data.to_vec())
    }
}

/// zlib codec
#[derive(Debug, Clone, Copy)]
pub struct ZlibCodec {
    level: u32,
}

impl ZlibCodec {
    /// Best compression
    pub const DEFAULT_LEVEL: u32 = 9;

    /// Create a codec compressing at `level` (0-9)
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }

    /// Compression level
    pub const fn level(&self) -> u32 {
        self.level
    }
}

impl Default for ZlibCodec {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LEVEL)
    }
}

impl Codec for ZlibCodec {
    fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(data, Compression::new(self.level));
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| CodecError::Compression(format!("zlib: {e}")))?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> CodecResult<Vec<u8>> {
        read_bounded(ZlibDecoder::new(data), data.len(), expected_size)
    }
}

/// Zstandard codec
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    /// Default compression level
    pub const DEFAULT_LEVEL: i32 = 17;

    /// Create a codec compressing at `level`
    pub fn new(level: i32) -> Self {
        let range = zstd::compression_level_range();
        Self {
            level: level.clamp(*range.start(), *range.end()),
        }
    }

    /// Compression level
    pub const fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LEVEL)
    }
}

impl Codec for ZstdCodec {
    fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
        zstd::encode_all(data, self.level).map_err(|e| CodecError::Compression(format!("zstd: {e}")))
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> CodecResult<Vec<u8>> {
        let decoder = zstd::stream::read::Decoder::new(data)
            .map_err(|e| CodecError::Decompression(format!("zstd: {e}")))?;
        read_bounded(decoder, data.len(), expected_size)
    }
}

/// Codec set selected by compression tag
///
/// Starts with [`StoredCodec`], [`ZlibCodec`] and [`ZstdCodec`]; any tag can
/// be bound to another [`Codec`] with [`Codecs::with_codec`].
#[derive(Debug, Clone)]
pub struct Codecs {
    stored: Arc<dyn Codec>,
    zlib: Arc<dyn Codec>,
    zstd: Arc<dyn Codec>,
}

impl Default for Codecs {
    fn default() -> Self {
        Self {
            stored: Arc::new(StoredCodec),
            zlib: Arc::new(ZlibCodec::default()),
            zstd: Arc::new(ZstdCodec::default()),
        }
    }
}

impl Codecs {
    /// Default codecs: zlib level 9, zstd level 17
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the zlib codec with one at `level`
    pub fn with_zlib_level(self, level: u32) -> Self {
        self.with_codec(CompressionType::Zlib, ZlibCodec::new(level))
    }

    /// Replace the zstd codec with one at `level`
    pub fn with_zstd_level(self, level: i32) -> Self {
        self.with_codec(CompressionType::Zstd, ZstdCodec::new(level))
    }

    /// Use `codec` for every asset tagged `compression`
    pub fn with_codec(self, compression: CompressionType, codec: impl Codec + 'static) -> Self {
        self.with_shared_codec(compression, Arc::new(codec))
    }

    /// Like [`Self::with_codec`] for a codec that is already shared
    pub fn with_shared_codec(mut self, compression: CompressionType, codec: Arc<dyn Codec>) -> Self {
        *self.slot_mut(compression) = codec;
        self
    }

    fn slot_mut(&mut self, compression: CompressionType) -> &mut Arc<dyn Codec> {
        match compression {
            CompressionType::None => &mut self.stored,
            CompressionType::Zlib => &mut self.zlib,
            CompressionType::Zstd => &mut self.zstd,
        }
    }

    /// Codec for `compression`
    pub fn get(&self, compression: CompressionType) -> &dyn Codec {
        match compression {
            CompressionType::None => self.stored.as_ref(),
            CompressionType::Zlib => self.zlib.as_ref(),
            CompressionType::Zstd => self.zstd.as_ref(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    const TEXT: &[u8] = b"world world world world world world world world world world";

    #[test]
    fn test_codecs_restore_input() {
        let codecs = Codecs::new();
        for compression in [
            CompressionType::None,
            CompressionType::Zlib,
            CompressionType::Zstd,
        ] {
            let codec = codecs.get(compression);
            let packed = codec.compress(TEXT).expect("compress");
            let unpacked = codec.decompress(&packed, TEXT.len()).expect("decompress");
            assert_eq!(unpacked, TEXT, "{compression}");
        }
    }

    #[test]
    fn test_repetitive_input_shrinks() {
        let codecs = Codecs::new();
        let zlib = codecs.get(CompressionType::Zlib).compress(TEXT).expect("zlib");
        let zstd = codecs.get(CompressionType::Zstd).compress(TEXT).expect("zstd");
        assert!(zlib.len() < TEXT.len());
        assert!(zstd.len() < TEXT.len());
    }

    #[test]
    fn test_wrong_expected_size_fails() {
        let codecs = Codecs::new();
        for compression in [
            CompressionType::None,
            CompressionType::Zlib,
            CompressionType::Zstd,
        ] {
            let codec = codecs.get(compression);
            let packed = codec.compress(TEXT).expect("compress");
            assert!(matches!(
                codec.decompress(&packed, TEXT.len() - 1),
                Err(CodecError::DecompressedSizeMismatch { .. })
            ));
            assert!(matches!(
                codec.decompress(&packed, TEXT.len() + 1),
                Err(CodecError::DecompressedSizeMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_garbage_input_fails() {
        let codecs = Codecs::new();
        assert!(codecs.get(CompressionType::Zlib).decompress(b"not zlib", 4).is_err());
        assert!(codecs.get(CompressionType::Zstd).decompress(b"not zstd", 4).is_err());
    }

    #[test]
    fn test_empty_payload() {
        let codecs = Codecs::new();
        for compression in [CompressionType::Zlib, CompressionType::Zstd] {
            let codec = codecs.get(compression);
            let packed = codec.compress(&[]).expect("compress");
            assert!(codec.decompress(&packed, 0).expect("decompress").is_empty());
        }
    }

    #[test]
    fn test_declared_size_does_not_drive_allocation() {
        let codecs = Codecs::new();
        for compression in [CompressionType::Zlib, CompressionType::Zstd] {
            let codec = codecs.get(compression);
            let packed = codec.compress(TEXT).expect("compress");
            assert!(matches!(
                codec.decompress(&packed, u32::MAX as usize),
                Err(CodecError::DecompressedSizeMismatch { actual, .. }) if actual == TEXT.len()
            ));
        }
    }

    /// Reverses the input; stands in for a caller-supplied compressor
    #[derive(Debug)]
    struct ReverseCodec;

    impl Codec for ReverseCodec {
        fn compress(&self, data: &[u8]) -> CodecResult<Vec<u8>> {
            Ok(data.iter().rev().copied().collect())
        }

        fn decompress(&self, data: &[u8], _expected_size: usize) -> CodecResult<Vec<u8>> {
            Ok(data.iter().rev().copied().collect())
        }
    }

    #[test]
    fn test_with_codec_replaces_one_tag() {
        let codecs = Codecs::new().with_codec(CompressionType::Zlib, ReverseCodec);

        assert_eq!(
            codecs.get(CompressionType::Zlib).compress(b"abc").expect("compress"),
            b"cba"
        );
        let zstd = codecs.get(CompressionType::Zstd).compress(TEXT).expect("zstd");
        assert_ne!(zstd, TEXT);

        let relevelled = codecs.with_zstd_level(3);
        assert_eq!(
            relevelled.get(CompressionType::Zlib).compress(b"abc").expect("compress"),
            b"cba"
        );
    }

    #[test]
    fn test_levels_are_clamped() {
        assert_eq!(ZlibCodec::new(42).level(), 9);
        assert_eq!(ZstdCodec::default().level(), 17);
        assert!(ZstdCodec::new(1000).level() <= 22);
    }
}
