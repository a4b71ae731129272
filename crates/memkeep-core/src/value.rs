//! Values that can live in an arena block.
//!
//! A [`BlockValue`] has a fixed encoded width and a little-endian byte
//! layout. Handles size their blocks from [`BlockValue::SIZE`] and move
//! values in and out through `encode_into` / `decode_from`.

use memkeep_common::BlockId;

/// A fixed-width value stored in an arena block.
///
/// # Example
///
/// ```rust
/// use memkeep_core::BlockValue;
///
/// let mut buf = [0u8; 4];
/// 0x1234_5678u32.encode_into(&mut buf);
/// assert_eq!(buf, [0x78, 0x56, 0x34, 0x12]);
/// assert_eq!(u32::decode_from(&buf), 0x1234_5678);
/// ```
pub trait BlockValue: Sized {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Writes the value into `buf`, which is exactly `SIZE` bytes long.
    fn encode_into(&self, buf: &mut [u8]);

    /// Reads a value from `buf`, which is exactly `SIZE` bytes long.
    fn decode_from(buf: &[u8]) -> Self;
}

macro_rules! impl_block_value_le {
    ($($ty:ty),* $(,)?) => {
        $(
            impl BlockValue for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn encode_into(&self, buf: &mut [u8]) {
                    buf.copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode_from(buf: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(buf);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_block_value_le!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

impl BlockValue for bool {
    const SIZE: usize = 1;

    #[inline]
    fn encode_into(&self, buf: &mut [u8]) {
        buf[0] = u8::from(*self);
    }

    #[inline]
    fn decode_from(buf: &[u8]) -> Self {
        buf[0] != 0
    }
}

impl<const N: usize> BlockValue for [u8; N] {
    const SIZE: usize = N;

    #[inline]
    fn encode_into(&self, buf: &mut [u8]) {
        buf.copy_from_slice(self);
    }

    #[inline]
    fn decode_from(buf: &[u8]) -> Self {
        let mut out = [0u8; N];
        out.copy_from_slice(buf);
        out
    }
}

impl BlockValue for BlockId {
    const SIZE: usize = 8;

    #[inline]
    fn encode_into(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_le_bytes());
    }

    #[inline]
    fn decode_from(buf: &[u8]) -> Self {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(buf);
        BlockId::from_le_bytes(raw)
    }
}
