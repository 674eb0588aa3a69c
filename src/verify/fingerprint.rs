use image::{DynamicImage, GenericImageView};
use image_hasher::{BitOrder, HashAlg, HasherConfig};
use serde::{Serialize, Serializer};
use std::fmt;

/// Grid width/height in bits. 8x8 gives a 64-bit hash.
const HASH_SIZE: u32 = 8;

/// 64-bit difference hash (dHash) of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Parses the 16-char hex form produced by `Display`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 16 {
            return None;
        }
        u64::from_str_radix(hex, 16).ok().map(Self)
    }

    /// Hamming distance: number of differing bits.
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Computes the dHash of `img`: compare each pixel of a 9x8 downsample with
/// its right-hand neighbour and pack the 64 results row by row, first
/// comparison in the most significant bit.
///
/// Returns `None` when no hash can be produced. This is never fatal.
pub fn generate_fingerprint(img: &DynamicImage) -> Option<Fingerprint> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        log::warn!("Cannot fingerprint an empty {}x{} image", w, h);
        return None;
    }

    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::Gradient)
        .hash_size(HASH_SIZE, HASH_SIZE)
        .bit_order(BitOrder::MsbFirst)
        .to_hasher();
    let hash = hasher.hash_image(img);

    let bytes: [u8; 8] = match hash.as_bytes().try_into() {
        Ok(bytes) => bytes,
        Err(_) => {
            log::warn!(
                "Unexpected dHash width: {} bytes, expected 8",
                hash.as_bytes().len()
            );
            return None;
        }
    };

    Some(Fingerprint(u64::from_be_bytes(bytes)))
}
