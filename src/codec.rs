use std::io;

/// Compression applied to every batch before it is written to disk. The
/// encoded bytes are sent as the request body unchanged.
pub trait Codec: Send + Sync {
    fn encode(&self, data: &[u8]) -> io::Result<Vec<u8>>;

    /// Value for the `Content-Encoding` header of a delivery
    fn content_encoding(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self::new(zstd::DEFAULT_COMPRESSION_LEVEL)
    }
}

impl Codec for ZstdCodec {
    fn encode(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        zstd::stream::encode_all(data, self.level)
    }

    fn content_encoding(&self) -> &'static str {
        "zstd"
    }
}
