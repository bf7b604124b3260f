//! Casts from slices of plain numeric types to slices of bytes, native endian.
//!
//! These are used by the encoder to hand raw tag payloads to the writer without an intermediate
//! copy. All casts reinterpret an existing slice in place and never allocate.

macro_rules! cast_as_ne_bytes {
    ($name:ident, $from:ty) => {
        pub fn $name(slice: &[$from]) -> &[u8] {
            let len = std::mem::size_of_val(slice);
            // Safety: `$from` has no padding and no invalid bit patterns, so viewing it as bytes
            // is always sound. The resulting slice borrows for as long as `slice` is borrowed.
            unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, len) }
        }
    };
}

cast_as_ne_bytes!(i8_as_ne_bytes, i8);
cast_as_ne_bytes!(u16_as_ne_bytes, u16);
cast_as_ne_bytes!(i16_as_ne_bytes, i16);
cast_as_ne_bytes!(u32_as_ne_bytes, u32);
cast_as_ne_bytes!(i32_as_ne_bytes, i32);
cast_as_ne_bytes!(u64_as_ne_bytes, u64);
cast_as_ne_bytes!(i64_as_ne_bytes, i64);
cast_as_ne_bytes!(f32_as_ne_bytes, f32);
cast_as_ne_bytes!(f64_as_ne_bytes, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_native_layout() {
        let values: [u32; 3] = [1, 2, 0xFFFF_FFFF];
        let bytes = u32_as_ne_bytes(&values);
        assert_eq!(bytes.len(), 12);
        let back = u32::from_ne_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(back, 1);
    }
}
