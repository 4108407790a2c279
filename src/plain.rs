// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Plain-old-data bound for anything copied byte-for-byte through the kernel.

/// A fixed-layout value that can be moved between processes by byte copy.
///
/// # Safety
/// Implementors must be `#[repr(C)]` (or a primitive/array of primitives),
/// contain no pointers, references or other indirection, and accept every
/// byte pattern produced by copying a valid value of the type (padding
/// included). The all-zero pattern must also be a valid value, since
/// shared memory starts zero-filled.
pub unsafe trait Plain: Copy + 'static {}

macro_rules! impl_plain {
    ($($t:ty),* $(,)?) => {
        $(unsafe impl Plain for $t {})*
    };
}

impl_plain!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64);

unsafe impl<T: Plain, const N: usize> Plain for [T; N] {}

/// Copy `src` into `dst`, truncating to leave room for a NUL terminator and
/// zero-filling the remainder.
pub fn copy_str_to_array<const N: usize>(src: &str, dst: &mut [u8; N]) {
    dst.fill(0);
    if N == 0 {
        return;
    }
    let bytes = src.as_bytes();
    let len = bytes.len().min(N - 1);
    dst[..len].copy_from_slice(&bytes[..len]);
}

/// Read a NUL-padded byte array back as text, replacing invalid UTF-8.
pub fn str_from_array(src: &[u8]) -> std::borrow::Cow<'_, str> {
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_str_truncates_and_pads() {
        let mut buf = [0xffu8; 8];
        copy_str_to_array("hello world", &mut buf);
        assert_eq!(&buf, b"hello w\0");
        assert_eq!(str_from_array(&buf), "hello w");

        copy_str_to_array("hi", &mut buf);
        assert_eq!(&buf, b"hi\0\0\0\0\0\0");
        assert_eq!(str_from_array(&buf), "hi");
    }

    #[test]
    fn str_from_unterminated_array() {
        assert_eq!(str_from_array(b"abc"), "abc");
    }
}
