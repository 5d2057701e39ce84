//! Definite-length BER framing.
//!
//! Long-form lengths may use more octets than needed, as BER allows.
//! Indefinite lengths and multi-byte tags are rejected.

use crate::error::BerError;

pub(crate) const BIT_STRING: u8 = 0x03;
pub(crate) const OCTET_STRING: u8 = 0x04;
pub(crate) const OBJECT_IDENTIFIER: u8 = 0x06;
pub(crate) const SEQUENCE: u8 = 0x30;
/// `[APPLICATION 0]`, constructed.
pub(crate) const APPLICATION_0: u8 = 0x60;

const CONTEXT_CONSTRUCTED: u8 = 0xa0;
const TAG_MASK: u8 = 0x1f;
const LONG_FORM: u8 = 0x80;

/// Identifier octet of a constructed `[number]` context-specific tag.
pub(crate) const fn context_tag(number: u8) -> u8 {
    CONTEXT_CONSTRUCTED | (number & TAG_MASK)
}

/// One tag-length-value element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Tlv<'a> {
    pub(crate) tag: u8,
    /// Offset of the contents in the token.
    pub(crate) offset: usize,
    pub(crate) contents: &'a [u8],
}

pub(crate) struct BerReader<'a> {
    input: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> BerReader<'a> {
    pub(crate) const fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            base: 0,
        }
    }

    /// A reader over the contents of `tlv`, keeping offsets token-relative.
    pub(crate) const fn nested(tlv: Tlv<'a>) -> Self {
        Self {
            input: tlv.contents,
            pos: 0,
            base: tlv.offset,
        }
    }

    const fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub(crate) fn peek_tag(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn read_u8(&mut self) -> Option<u8> {
        let byte = self.input.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    pub(crate) fn read_tlv(&mut self) -> Result<Tlv<'a>, BerError> {
        let start = self.offset();
        let truncated = BerError::Truncated { offset: start };

        let tag = self.read_u8().ok_or(truncated)?;
        if tag & TAG_MASK == TAG_MASK {
            return Err(BerError::HighTagNumber { offset: start });
        }

        let first = self.read_u8().ok_or(truncated)?;
        let length = if first & LONG_FORM == 0 {
            usize::from(first)
        } else {
            let count = first & !LONG_FORM;
            if count == 0 {
                return Err(BerError::IndefiniteLength { offset: start });
            }
            let mut length = 0_usize;
            for _ in 0..count {
                let byte = self.read_u8().ok_or(truncated)?;
                length = length
                    .checked_mul(0x100)
                    .and_then(|length| length.checked_add(usize::from(byte)))
                    .ok_or(BerError::LengthOverflow { offset: start })?;
            }
            length
        };

        let offset = self.offset();
        let end = self.pos.checked_add(length).ok_or(truncated)?;
        let contents = self.input.get(self.pos..end).ok_or(truncated)?;
        self.pos = end;
        Ok(Tlv {
            tag,
            offset,
            contents,
        })
    }

    pub(crate) fn read_expected(&mut self, expected: u8) -> Result<Tlv<'a>, BerError> {
        let offset = self.offset();
        let tlv = self.read_tlv()?;
        if tlv.tag == expected {
            Ok(tlv)
        } else {
            Err(BerError::UnexpectedTag {
                offset,
                expected,
                actual: tlv.tag,
            })
        }
    }

    /// Reads `[number] EXPLICIT` around a single `inner` element.
    pub(crate) fn read_explicit(&mut self, number: u8, inner: u8) -> Result<Tlv<'a>, BerError> {
        let outer = self.read_expected(context_tag(number))?;
        let mut reader = Self::nested(outer);
        let tlv = reader.read_expected(inner)?;
        reader.finish()?;
        Ok(tlv)
    }

    pub(crate) fn read_optional_explicit(
        &mut self,
        number: u8,
        inner: u8,
    ) -> Result<Option<Tlv<'a>>, BerError> {
        if self.peek_tag() == Some(context_tag(number)) {
            self.read_explicit(number, inner).map(Some)
        } else {
            Ok(None)
        }
    }

    pub(crate) const fn finish(&self) -> Result<(), BerError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(BerError::TrailingData {
                offset: self.offset(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::short(&[0x04, 0x02, 0xaa, 0xbb])]
    #[case::long_one_octet(&[0x04, 0x81, 0x02, 0xaa, 0xbb])]
    #[case::long_padded(&[0x04, 0x84, 0x00, 0x00, 0x00, 0x02, 0xaa, 0xbb])]
    fn length_forms(#[case] bytes: &[u8]) {
        let mut reader = BerReader::new(bytes);
        let tlv = reader.read_expected(OCTET_STRING).unwrap();
        assert_eq!(tlv.contents, [0xaa, 0xbb]);
        assert_eq!(tlv.offset, bytes.len() - 2);
        reader.finish().unwrap();
    }

    #[test]
    fn long_contents() {
        let mut bytes = vec![0x04, 0x82, 0x01, 0x2c];
        bytes.extend([0x5a; 300]);
        let tlv = BerReader::new(&bytes).read_tlv().unwrap();
        assert_eq!(tlv.contents.len(), 300);
    }

    #[rstest]
    #[case::empty(&[], BerError::Truncated { offset: 0 })]
    #[case::no_length(&[0x30], BerError::Truncated { offset: 0 })]
    #[case::short_contents(&[0x30, 0x03, 0x00], BerError::Truncated { offset: 0 })]
    #[case::short_length(&[0x30, 0x82, 0x01], BerError::Truncated { offset: 0 })]
    #[case::indefinite(&[0x30, 0x80, 0x00, 0x00], BerError::IndefiniteLength { offset: 0 })]
    #[case::high_tag(&[0x7f, 0x81, 0x01, 0x00], BerError::HighTagNumber { offset: 0 })]
    #[case::oversized(
        &[0x30, 0x89, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        BerError::LengthOverflow { offset: 0 }
    )]
    fn rejects(#[case] bytes: &[u8], #[case] expected: BerError) {
        assert_eq!(BerReader::new(bytes).read_tlv(), Err(expected));
    }

    #[test]
    fn nested_offsets_are_token_relative() {
        let bytes = [0xa2, 0x05, 0x04, 0x03, 0x01, 0x02, 0x03, 0x00];
        let mut reader = BerReader::new(&bytes);
        let tlv = reader.read_explicit(2, OCTET_STRING).unwrap();
        assert_eq!(tlv.offset, 4);
        assert_eq!(tlv.contents, [1, 2, 3]);
        assert_eq!(reader.finish(), Err(BerError::TrailingData { offset: 7 }));
    }

    #[test]
    fn explicit_wrapper_must_hold_one_element() {
        let bytes = [0xa0, 0x04, 0x04, 0x00, 0x04, 0x00];
        assert_eq!(
            BerReader::new(&bytes).read_explicit(0, OCTET_STRING),
            Err(BerError::TrailingData { offset: 4 })
        );
    }

    #[test]
    fn optional_field() {
        let bytes = [0xa3, 0x02, 0x04, 0x00];
        let mut reader = BerReader::new(&bytes);
        assert_eq!(reader.read_optional_explicit(2, OCTET_STRING), Ok(None));
        assert!(reader.read_optional_explicit(3, OCTET_STRING).unwrap().is_some());
        assert!(reader.is_empty());
    }

    #[test]
    fn unexpected_tag() {
        assert_eq!(
            BerReader::new(&[0x02, 0x01, 0x00]).read_expected(SEQUENCE),
            Err(BerError::UnexpectedTag {
                offset: 0,
                expected: SEQUENCE,
                actual: 0x02
            })
        );
    }
}
