use crate::error_handling::types::ArchiveError;

/// Append-only byte sink writing fixed-width little-endian fields.
#[derive(Debug, Default)]
pub struct LeWriter {
    buf: Vec<u8>,
}

impl LeWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Current offset as a 32-bit ZIP field.
    pub fn offset(&self) -> Result<u32, ArchiveError> {
        u32::try_from(self.buf.len()).map_err(|_| ArchiveError::ArchiveTooLarge)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
