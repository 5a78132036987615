//! Key and value codecs.
//!
//! The segment format is generic over its key and value domains through two
//! capabilities: keys are totally ordered and serialize to a *fixed* width
//! (so header and index entries have a known layout), values serialize to a
//! variable-length byte blob with a known size function (so value offsets
//! can be assigned in a single pass before any value bytes are written).

use std::io;

/// A key that can live in a segment header and sparse index.
///
/// `decode` may assume its input slice is exactly [`WIDTH`](Self::WIDTH)
/// bytes; readers always hand it a full-width slice.
pub trait KeyCodec: Ord + Copy + Send + Sync + 'static {
    /// Fixed encoded width in bytes.
    const WIDTH: usize;

    /// Appends the little-endian fixed-width encoding to `buf`.
    fn encode_into(&self, buf: &mut Vec<u8>);

    fn decode(buf: &[u8]) -> Self;

    /// The fixed-width byte representation, also fed to the bloom filter.
    fn encoded(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::WIDTH);
        self.encode_into(&mut buf);
        buf
    }
}

macro_rules! int_key_codec {
    ($($t:ty),*) => {
        $(
            impl KeyCodec for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();

                fn encode_into(&self, buf: &mut Vec<u8>) {
                    buf.extend_from_slice(&self.to_le_bytes());
                }

                fn decode(buf: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(buf);
                    <$t>::from_le_bytes(raw)
                }
            }
        )*
    };
}

int_key_codec!(u64, u32, i64, i32);

/// A value that can be stored in a segment's value region.
pub trait ValueCodec: Clone + Send + Sync + 'static {
    /// Byte length of the encoding, without reserializing.
    fn encoded_len(&self) -> u64;

    /// Appends the encoding to `buf`.
    fn encode_into(&self, buf: &mut Vec<u8>);

    /// Decodes a value from exactly the bytes `encode_into` produced.
    fn decode(buf: &[u8]) -> io::Result<Self>;
}

impl ValueCodec for String {
    fn encoded_len(&self) -> u64 {
        self.len() as u64
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }

    fn decode(buf: &[u8]) -> io::Result<Self> {
        String::from_utf8(buf.to_vec())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl ValueCodec for Vec<u8> {
    fn encoded_len(&self) -> u64 {
        self.len() as u64
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self);
    }

    fn decode(buf: &[u8]) -> io::Result<Self> {
        Ok(buf.to_vec())
    }
}
