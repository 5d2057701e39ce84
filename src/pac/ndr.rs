//! Little-endian NDR reading for PAC buffers.
//!
//! Alignment is relative to the start of the buffer the cursor was created
//! over, which is how the type-serialization v1 stream in a PAC buffer is
//! laid out.

use widestring::U16String;

use crate::error::PacFormatError;

/// Version byte of the NDR type-serialization common header.
const SERIALIZATION_VERSION: u8 = 1;
/// Little-endian integers, ASCII characters, IEEE floats.
const LITTLE_ENDIAN_DREP: u8 = 0x10;
/// Common header (8) + private header (8) + top-level referent (4).
pub(crate) const SERIALIZATION_HEADER_LEN: usize = 20;

#[derive(Clone, Debug)]
pub(crate) struct NdrCursor<'a> {
    inner: &'a [u8],
    pos: usize,
}

impl<'a> NdrCursor<'a> {
    pub(crate) const fn new(bytes: &'a [u8]) -> Self {
        Self { inner: bytes, pos: 0 }
    }

    pub(crate) const fn pos(&self) -> usize {
        self.pos
    }

    const fn remaining(&self) -> usize {
        self.inner.len().saturating_sub(self.pos)
    }

    fn truncated(&self, needed: usize) -> PacFormatError {
        PacFormatError::Truncated {
            offset: self.pos,
            needed,
            available: self.remaining(),
        }
    }

    /// Moves to the next multiple of `alignment`.
    pub(crate) fn align(&mut self, alignment: usize) -> Result<(), PacFormatError> {
        let aligned = self.pos.next_multiple_of(alignment);
        let padding = aligned - self.pos;
        if padding > self.remaining() {
            return Err(self.truncated(padding));
        }
        self.pos = aligned;
        Ok(())
    }

    pub(crate) fn read_slice(&mut self, n: usize) -> Result<&'a [u8], PacFormatError> {
        let bytes = self
            .inner
            .get(self.pos..)
            .and_then(|rest| rest.get(..n))
            .ok_or_else(|| self.truncated(n))?;
        self.pos += n;
        Ok(bytes)
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), PacFormatError> {
        self.read_slice(n).map(|_| ())
    }

    pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N], PacFormatError> {
        let bytes = self.read_slice(N)?;
        bytes.try_into().map_err(|_| self.truncated(N))
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, PacFormatError> {
        self.read_array::<1>().map(|[byte]| byte)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, PacFormatError> {
        self.align(2)?;
        self.read_array().map(u16::from_le_bytes)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, PacFormatError> {
        self.align(4)?;
        self.read_array().map(u32::from_le_bytes)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, PacFormatError> {
        self.align(8)?;
        self.read_array().map(u64::from_le_bytes)
    }

    /// `FILETIME` is two 32-bit halves, so it only needs 4-byte alignment.
    pub(crate) fn read_filetime(&mut self) -> Result<u64, PacFormatError> {
        let low = self.read_u32()?;
        let high = self.read_u32()?;
        Ok((u64::from(high) << 32) | u64::from(low))
    }

    /// Reads `count` elements of `element_len` bytes, checking the total
    /// against the bytes actually present before anything is allocated.
    pub(crate) fn read_elements(
        &mut self,
        count: u32,
        element_len: usize,
    ) -> Result<&'a [u8], PacFormatError> {
        let total = usize::try_from(count)
            .ok()
            .and_then(|count| count.checked_mul(element_len))
            .ok_or_else(|| self.truncated(usize::MAX))?;
        self.read_slice(total)
    }

    /// Checks the type-serialization v1 header and skips the top-level
    /// referent.
    pub(crate) fn read_serialization_header(&mut self) -> Result<(), PacFormatError> {
        let version = self.read_u8()?;
        let drep = self.read_u8()?;
        if version != SERIALIZATION_VERSION || drep != LITTLE_ENDIAN_DREP {
            return Err(PacFormatError::UnsupportedNdrHeader { version, drep });
        }
        // Common header length and filler, private header, referent id.
        self.skip(SERIALIZATION_HEADER_LEN - 2)
    }
}

/// Fixed part of an `RPC_UNICODE_STRING`; the characters are deferred.
#[derive(Clone, Copy, Debug)]
pub(crate) struct UnicodeStringHeader {
    pointer: u32,
}

impl UnicodeStringHeader {
    pub(crate) fn read(ndr: &mut NdrCursor<'_>) -> Result<Self, PacFormatError> {
        // Length and MaximumLength are in bytes; the deferred conformant
        // varying array carries the authoritative character count.
        let _length = ndr.read_u16()?;
        let _maximum_length = ndr.read_u16()?;
        let pointer = ndr.read_u32()?;
        Ok(Self { pointer })
    }

    pub(crate) fn read_deferred(self, ndr: &mut NdrCursor<'_>) -> Result<String, PacFormatError> {
        if self.pointer == 0 {
            return Ok(String::new());
        }
        let _max_count = ndr.read_u32()?;
        let _offset = ndr.read_u32()?;
        let actual_count = ndr.read_u32()?;
        let units = ndr
            .read_elements(actual_count, size_of::<u16>())?
            .chunks_exact(size_of::<u16>())
            .filter_map(|pair| pair.try_into().ok())
            .map(u16::from_le_bytes)
            .collect::<Vec<_>>();
        Ok(U16String::from_vec(units).to_string_lossy())
    }
}

/// Reads a conformant `RPC_SID` and returns its bytes in the binary SID
/// layout, as found on the wire.
///
/// The count byte inside the SID is not checked against the conformant
/// count; that is left to the SID decoder.
pub(crate) fn read_rpc_sid<'a>(ndr: &mut NdrCursor<'a>) -> Result<&'a [u8], PacFormatError> {
    let count = ndr.read_u32()?;
    if count > u32::from(u8::MAX) {
        return Err(PacFormatError::OversizedSid(count));
    }
    ndr.align(4)?;
    // 8 header bytes plus 4 per sub-authority, counted in 4-byte units.
    ndr.read_elements(count + 2, size_of::<u32>())
}
