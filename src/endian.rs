//! Byte-order handling for container payloads.
//!
//! A container establishes its byte order once, through a block named
//! [`MAGIC_BLOCK_NAME`] that holds a single `i32` equal to [`MAGIC_NUMBER`].
//! Every typed read after that uses the same order. Writers always emit the
//! native order of the host.

use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};

/// Name of the sentinel block carrying the magic number.
pub const MAGIC_BLOCK_NAME: &str = "byteorder magic number";
/// Value of the sentinel block when read in the correct byte order.
pub const MAGIC_NUMBER: i32 = 362436;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    #[inline]
    pub fn native() -> Self {
        if cfg!(target_endian = "little") { Endian::Little } else { Endian::Big }
    }

    #[inline]
    pub fn swapped(self) -> Self {
        match self {
            Endian::Little => Endian::Big,
            Endian::Big    => Endian::Little,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Endian::Little => "little-endian",
            Endian::Big    => "big-endian",
        }
    }
}

/// Resolve the byte order of a magic-number payload.
///
/// Returns `None` when the payload matches [`MAGIC_NUMBER`] in neither order,
/// which means the file is not a valid container.
pub fn detect(payload: &[u8]) -> Option<Endian> {
    if payload.len() < 4 {
        return None;
    }
    let native = Endian::native();
    [native, native.swapped()]
        .into_iter()
        .find(|&order| i32::decode_one(&payload[..4], order) == MAGIC_NUMBER)
}

/// Fixed-size numeric type that can live in a container block.
pub trait Element: Copy + Default + PartialEq + std::fmt::Debug + 'static {
    /// Size of one element in bytes.
    const SIZE: usize;
    /// Type name for diagnostics.
    const TYPE_NAME: &'static str;

    /// Decode `out.len()` elements from `bytes` in the given order.
    fn decode_into(bytes: &[u8], order: Endian, out: &mut [Self]);

    /// Append the native-order encoding of `values` to `out`.
    fn encode_native(values: &[Self], out: &mut Vec<u8>);

    fn decode_one(bytes: &[u8], order: Endian) -> Self {
        let mut v = [Self::default()];
        Self::decode_into(&bytes[..Self::SIZE], order, &mut v);
        v[0]
    }
}

impl Element for i32 {
    const SIZE: usize = 4;
    const TYPE_NAME: &'static str = "i32";

    fn decode_into(bytes: &[u8], order: Endian, out: &mut [Self]) {
        match order {
            Endian::Little => LittleEndian::read_i32_into(bytes, out),
            Endian::Big    => BigEndian::read_i32_into(bytes, out),
        }
    }

    fn encode_native(values: &[Self], out: &mut Vec<u8>) {
        let start = out.len();
        out.resize(start + values.len() * Self::SIZE, 0);
        NativeEndian::write_i32_into(values, &mut out[start..]);
    }
}

impl Element for f64 {
    const SIZE: usize = 8;
    const TYPE_NAME: &'static str = "f64";

    fn decode_into(bytes: &[u8], order: Endian, out: &mut [Self]) {
        match order {
            Endian::Little => LittleEndian::read_f64_into(bytes, out),
            Endian::Big    => BigEndian::read_f64_into(bytes, out),
        }
    }

    fn encode_native(values: &[Self], out: &mut Vec<u8>) {
        let start = out.len();
        out.resize(start + values.len() * Self::SIZE, 0);
        NativeEndian::write_f64_into(values, &mut out[start..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_native_and_swapped_magic() {
        let native = MAGIC_NUMBER.to_ne_bytes();
        assert_eq!(detect(&native), Some(Endian::native()));

        let swapped = MAGIC_NUMBER.swap_bytes().to_ne_bytes();
        assert_eq!(detect(&swapped), Some(Endian::native().swapped()));

        assert_eq!(detect(&7i32.to_ne_bytes()), None);
        assert_eq!(detect(&[1, 2]), None);
    }

    #[test]
    fn f64_decodes_in_both_orders() {
        let v = 1.5e-3f64;
        assert_eq!(f64::decode_one(&v.to_le_bytes(), Endian::Little), v);
        assert_eq!(f64::decode_one(&v.to_be_bytes(), Endian::Big), v);
    }
}
