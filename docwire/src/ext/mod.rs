use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::bson::DecodeError;

/// Integer signess in the wire protocol is awful.
pub trait UsizeExt {
    /// Length is `usize` in rust, while the protocol want `i32`,
    /// this will panic when overflow instead of wrapping.
    fn to_i32(self) -> i32;
    /// Length is `usize` in rust, while postgres sometime want `u32`,
    /// this will panic when overflow instead of wrapping.
    fn to_u32(self) -> u32;
}

/// Nul string operation.
pub trait StrExt {
    /// String length plus nul (1).
    fn nul_string_len(&self) -> usize;
}

/// Nul string operation in [`BufMut`]
pub trait BufMutExt {
    /// Write string and nul termination.
    fn put_nul_string(&mut self, string: &str);
}

/// Checked little endian reads.
///
/// [`Buf::get_i32_le`] and friends panic on short input, a decoder of untrusted
/// bytes must report it instead.
pub trait BytesExt {
    /// Ensure at least `n` bytes remaining.
    fn require(&self, n: usize) -> Result<(), DecodeError>;

    fn try_u8(&mut self) -> Result<u8, DecodeError>;

    fn try_i32_le(&mut self) -> Result<i32, DecodeError>;

    fn try_u32_le(&mut self) -> Result<u32, DecodeError>;

    fn try_i64_le(&mut self) -> Result<i64, DecodeError>;

    fn try_f64_le(&mut self) -> Result<f64, DecodeError>;

    /// Big endian, for the relational backend protocol.
    fn try_u16(&mut self) -> Result<u16, DecodeError>;

    fn try_i32(&mut self) -> Result<i32, DecodeError>;

    fn try_u32(&mut self) -> Result<u32, DecodeError>;

    /// Split exactly `n` bytes off the front.
    fn try_split(&mut self, n: usize) -> Result<Bytes, DecodeError>;

    /// Try to read nul terminated string.
    fn try_nul_string(&mut self) -> Result<String, DecodeError>;
}

/// Helper trait to [`Display`][std::fmt::Display] bytes.
pub trait FmtExt {
    /// Lossy [`Display`][std::fmt::Display] bytes.
    fn lossy(&self) -> LossyFmt<'_>;
}

/// Lossy [`Display`][std::fmt::Display] implementation for bytes.
pub struct LossyFmt<'a>(pub &'a [u8]);

impl UsizeExt for usize {
    fn to_i32(self) -> i32 {
        self.try_into().expect("message size too large for protocol")
    }

    fn to_u32(self) -> u32 {
        self.try_into().expect("message size too large for protocol")
    }
}

impl StrExt for str {
    fn nul_string_len(&self) -> usize {
        self.len() + 1/* nul */
    }
}

impl<B: BufMut> BufMutExt for B {
    fn put_nul_string(&mut self, string: &str) {
        self.put(string.as_bytes());
        self.put_u8(b'\0');
    }
}

macro_rules! try_get {
    ($name:ident, $ty:ty, $get:ident) => {
        fn $name(&mut self) -> Result<$ty, DecodeError> {
            self.require(size_of::<$ty>())?;
            Ok(self.$get())
        }
    };
}

impl BytesExt for Bytes {
    fn require(&self, n: usize) -> Result<(), DecodeError> {
        match self.remaining() >= n {
            true => Ok(()),
            false => Err(DecodeError::UnexpectedEof { needed: n, available: self.remaining() }),
        }
    }

    try_get!(try_u8, u8, get_u8);
    try_get!(try_i32_le, i32, get_i32_le);
    try_get!(try_u32_le, u32, get_u32_le);
    try_get!(try_i64_le, i64, get_i64_le);
    try_get!(try_f64_le, f64, get_f64_le);
    try_get!(try_u16, u16, get_u16);
    try_get!(try_i32, i32, get_i32);
    try_get!(try_u32, u32, get_u32);

    fn try_split(&mut self, n: usize) -> Result<Bytes, DecodeError> {
        self.require(n)?;
        Ok(self.split_to(n))
    }

    fn try_nul_string(&mut self) -> Result<String, DecodeError> {
        let Some(end) = self.iter().position(|e| matches!(e, b'\0')) else {
            return Err(DecodeError::MissingNul);
        };
        let me = self.split_to(end);
        Buf::advance(self, 1); // nul
        String::from_utf8(me.into()).map_err(|e| DecodeError::Utf8(e.utf8_error()))
    }
}

impl BytesExt for BytesMut {
    fn require(&self, n: usize) -> Result<(), DecodeError> {
        match self.remaining() >= n {
            true => Ok(()),
            false => Err(DecodeError::UnexpectedEof { needed: n, available: self.remaining() }),
        }
    }

    try_get!(try_u8, u8, get_u8);
    try_get!(try_i32_le, i32, get_i32_le);
    try_get!(try_u32_le, u32, get_u32_le);
    try_get!(try_i64_le, i64, get_i64_le);
    try_get!(try_f64_le, f64, get_f64_le);
    try_get!(try_u16, u16, get_u16);
    try_get!(try_i32, i32, get_i32);
    try_get!(try_u32, u32, get_u32);

    fn try_split(&mut self, n: usize) -> Result<Bytes, DecodeError> {
        self.require(n)?;
        Ok(self.split_to(n).freeze())
    }

    fn try_nul_string(&mut self) -> Result<String, DecodeError> {
        let Some(end) = self.iter().position(|e| matches!(e, b'\0')) else {
            return Err(DecodeError::MissingNul);
        };
        let me = self.split_to(end);
        Buf::advance(self, 1); // nul
        String::from_utf8(me.to_vec()).map_err(|e| DecodeError::Utf8(e.utf8_error()))
    }
}

impl FmtExt for [u8] {
    fn lossy(&self) -> LossyFmt<'_> {
        LossyFmt(self)
    }
}

impl std::fmt::Display for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in self.0 {
            if b.is_ascii_graphic() || b.is_ascii_whitespace() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:x}")?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b\"{self}\"")
    }
}
