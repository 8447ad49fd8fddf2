//! See [`Buffer`].

use crate::{error::BufferError, header::SendOption, seq::ReliableId, varint};

type Result<T> = std::result::Result<T, BufferError>;

/// A growable byte buffer with independent read and write cursors, used to
/// build and parse both whole datagrams and the nested messages inside them.
///
/// A buffer constructed with a [`SendOption`] prewrites the wire header (the
/// option tag, plus two reserved bytes for a [`ReliableId`] if the option
/// carries one); [`Buffer::length`] hides that header from callers, so
/// `length` always reports only the application-visible payload size.
///
/// Calling [`Buffer::read_message`] carves out a **view**: a buffer that owns
/// a copy of the nested message's bytes, has no send-option header of its
/// own, and rejects every write method. Views may themselves contain further
/// nested messages.
#[derive(Debug, Clone)]
pub struct Buffer {
    data: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
    send_option: Option<SendOption>,
    message_starts: Vec<usize>,
    view_tag: Option<u8>,
}

impl Buffer {
    /// Creates an empty buffer with no send-option header, reserving
    /// `capacity` bytes up front.
    #[must_use]
    pub fn empty(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            read_pos: 0,
            write_pos: 0,
            send_option: None,
            message_starts: Vec::new(),
            view_tag: None,
        }
    }

    /// Creates a buffer prewritten with `option`'s wire header, ready for the
    /// caller to append payload bytes.
    #[must_use]
    pub fn with_send_option(option: SendOption, capacity: usize) -> Self {
        let mut buf = Self::empty(capacity);
        buf.apply_send_option(option);
        buf
    }

    /// Wraps already-encoded datagram bytes (as received from the socket)
    /// for reading. The first byte is left in place; callers typically
    /// `read_u8` it themselves to dispatch on the send option.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            read_pos: 0,
            write_pos: bytes.len(),
            send_option: None,
            message_starts: Vec::new(),
            view_tag: None,
        }
    }

    fn apply_send_option(&mut self, option: SendOption) {
        self.data.clear();
        self.read_pos = 0;
        self.write_pos = 0;
        self.send_option = Some(option);
        self.view_tag = None;
        self.message_starts.clear();
        self.write_u8(option.tag())
            .expect("fresh buffer always has room for its own header");
        if option.carries_reliable_id() {
            self.write_u16_be(0)
                .expect("fresh buffer always has room for its own header");
        }
    }

    fn view(tag: u8, data: Vec<u8>) -> Self {
        let write_pos = data.len();
        Self {
            data,
            read_pos: 0,
            write_pos,
            send_option: None,
            message_starts: Vec::new(),
            view_tag: Some(tag),
        }
    }

    /// Resets this buffer for reuse with a new send option, as happens when
    /// a pooled buffer is rented out again. Clears all cursors and pending
    /// nested-message state.
    pub fn reset(&mut self, option: SendOption) {
        self.apply_send_option(option);
    }

    fn header_len(&self) -> usize {
        match self.send_option {
            Some(opt) if opt.carries_reliable_id() => 3,
            Some(_) => 1,
            None => 0,
        }
    }

    /// Whether this buffer is a read-only view produced by
    /// [`Buffer::read_message`].
    #[must_use]
    pub fn is_view(&self) -> bool {
        self.view_tag.is_some()
    }

    /// The tag this buffer was framed with, if it is a [`read_message`]
    /// view.
    ///
    /// [`read_message`]: Buffer::read_message
    #[must_use]
    pub fn message_tag(&self) -> Option<u8> {
        self.view_tag
    }

    /// The send option this buffer was constructed with, if any.
    #[must_use]
    pub fn send_option(&self) -> Option<SendOption> {
        self.send_option
    }

    /// Number of payload bytes written so far, excluding the send-option
    /// header.
    #[must_use]
    pub fn length(&self) -> usize {
        self.write_pos - self.header_len()
    }

    /// The full encoded bytes, header included, ready to hand to a socket.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.write_pos]
    }

    /// Stamps a [`ReliableId`] into the two reserved header bytes.
    ///
    /// Only valid for buffers constructed with a send option that
    /// [`SendOption::carries_reliable_id`].
    pub fn set_reliable_id(&mut self, id: ReliableId) -> Result<()> {
        match self.send_option {
            Some(opt) if opt.carries_reliable_id() => {
                let [hi, lo] = id.0.to_be_bytes();
                self.data[1] = hi;
                self.data[2] = lo;
                Ok(())
            }
            _ => Err(BufferError::ViewIsReadOnly),
        }
    }

    // --- write cursor -----------------------------------------------------

    fn ensure_capacity(&mut self, additional: usize) -> Result<()> {
        if self.is_view() {
            return Err(BufferError::ViewIsReadOnly);
        }
        let needed = self.write_pos + additional;
        if needed > self.data.len() {
            let mut new_len = self.data.len().max(1);
            while new_len < needed {
                new_len = new_len + new_len / 2 + 1;
            }
            self.data.resize(new_len, 0);
        }
        Ok(())
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_capacity(bytes.len())?;
        self.data[self.write_pos..self.write_pos + bytes.len()].copy_from_slice(bytes);
        self.write_pos += bytes.len();
        Ok(())
    }

    /// Writes a single byte.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.push_bytes(&[value])
    }

    /// Writes a `u16`, little-endian.
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.push_bytes(&value.to_le_bytes())
    }

    /// Writes a `u16`, big-endian. Used for [`ReliableId`] and nested-message
    /// tags that the wire format fixes as big-endian.
    pub fn write_u16_be(&mut self, value: u16) -> Result<()> {
        self.push_bytes(&value.to_be_bytes())
    }

    /// Writes a `u32`, little-endian.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.push_bytes(&value.to_le_bytes())
    }

    /// Writes a `u64`, little-endian.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.push_bytes(&value.to_le_bytes())
    }

    /// Writes an `f32`, little-endian (IEEE-754).
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.push_bytes(&value.to_le_bytes())
    }

    /// Writes a `bool` as a single `0x00`/`0x01` byte.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    /// Writes `value` as a packed (variable-length) integer.
    pub fn write_packed_i32(&mut self, value: i32) -> Result<()> {
        let (bytes, len) = varint::encode(value);
        self.push_bytes(&bytes[..len])
    }

    /// Writes raw bytes with no length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.push_bytes(bytes)
    }

    /// Writes a UTF-8 string, preceded by its byte length as a packed
    /// unsigned integer.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        #[allow(clippy::cast_possible_wrap)]
        self.write_packed_i32(value.len() as i32)?;
        self.push_bytes(value.as_bytes())
    }

    /// Reserves a nested message header (2-byte length, 1-byte tag) and
    /// pushes its offset so [`Buffer::end_message`] or
    /// [`Buffer::cancel_message`] can later resolve it.
    pub fn start_message(&mut self, tag: u8) -> Result<()> {
        if self.is_view() {
            return Err(BufferError::ViewIsReadOnly);
        }
        let offset = self.write_pos;
        self.write_u16(0)?;
        self.write_u8(tag)?;
        self.message_starts.push(offset);
        Ok(())
    }

    /// Backfills the length field reserved by the matching
    /// [`Buffer::start_message`].
    pub fn end_message(&mut self) -> Result<()> {
        let offset = self
            .message_starts
            .pop()
            .ok_or(BufferError::NoOpenMessage)?;
        let len = self.write_pos - offset - 3;
        let len = u16::try_from(len).map_err(|_| BufferError::VarintTooLarge)?;
        self.data[offset..offset + 2].copy_from_slice(&len.to_le_bytes());
        Ok(())
    }

    /// Discards everything written since the matching
    /// [`Buffer::start_message`], restoring [`Buffer::length`] to what it was
    /// beforehand.
    pub fn cancel_message(&mut self) -> Result<()> {
        let offset = self
            .message_starts
            .pop()
            .ok_or(BufferError::NoOpenMessage)?;
        self.write_pos = offset;
        Ok(())
    }

    // --- read cursor --------------------------------------------------

    fn pull_bytes(&mut self, len: usize) -> Result<&[u8]> {
        if self.read_pos + len > self.write_pos {
            return Err(BufferError::BufferTooShort);
        }
        let slice = &self.data[self.read_pos..self.read_pos + len];
        self.read_pos += len;
        Ok(slice)
    }

    /// Bytes remaining to be read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.pull_bytes(1)?[0])
    }

    /// Reads a `u16`, little-endian.
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.pull_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a `u16`, big-endian.
    pub fn read_u16_be(&mut self) -> Result<u16> {
        let bytes = self.pull_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a `u32`, little-endian.
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.pull_bytes(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Reads a `u64`, little-endian.
    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.pull_bytes(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Reads an `f32`, little-endian (IEEE-754).
    pub fn read_f32(&mut self) -> Result<f32> {
        let bytes = self.pull_bytes(4)?;
        Ok(f32::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// Reads a `bool`: `0x00` is false, any other byte is true.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads a packed (variable-length) integer.
    pub fn read_packed_i32(&mut self, signed: bool) -> Result<i32> {
        let remaining = self.write_pos - self.read_pos;
        let slice = &self.data[self.read_pos..self.read_pos + remaining];
        let (value, consumed) = varint::decode(slice, signed)?;
        self.read_pos += consumed;
        Ok(value)
    }

    /// Reads `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        Ok(self.pull_bytes(len)?.to_vec())
    }

    /// Reads all remaining bytes without consuming a length prefix.
    pub fn read_remaining(&mut self) -> Vec<u8> {
        let slice = &self.data[self.read_pos..self.write_pos];
        let out = slice.to_vec();
        self.read_pos = self.write_pos;
        out
    }

    /// Reads a packed-length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_packed_i32(false)?;
        let len = usize::try_from(len).map_err(|_| BufferError::VarintTooLarge)?;
        let bytes = self.pull_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| BufferError::InvalidUtf8)
    }

    /// Reads a nested message frame: a 2-byte little-endian length, a 1-byte
    /// tag, then that many payload bytes, returned as a read-only view
    /// buffer.
    pub fn read_message(&mut self) -> Result<Buffer> {
        let len = self.read_u16()? as usize;
        let tag = self.read_u8()?;
        let bytes = self.pull_bytes(len)?.to_vec();
        Ok(Buffer::view(tag, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_message_byte_exact() {
        let mut buf = Buffer::empty(16);
        buf.start_message(1).unwrap();
        buf.write_u32(65534).unwrap();
        buf.end_message().unwrap();

        assert_eq!(buf.as_bytes(), &[0x04, 0x00, 0x01, 0xFE, 0xFF, 0x00, 0x00]);
        assert_eq!(buf.length(), 7);
    }

    #[test]
    fn cancel_restores_length() {
        let mut buf = Buffer::empty(32);
        buf.start_message(1).unwrap();
        buf.write_u32(32).unwrap();
        buf.end_message().unwrap();
        assert_eq!(buf.length(), 7);

        buf.start_message(2).unwrap();
        buf.write_u32(2).unwrap();
        buf.cancel_message().unwrap();
        assert_eq!(buf.length(), 7);
    }

    #[test]
    fn round_trip_nested_message() {
        let mut buf = Buffer::empty(32);
        buf.start_message(9).unwrap();
        buf.write_string("hello").unwrap();
        buf.end_message().unwrap();

        buf.read_pos = 0;
        let mut view = buf.read_message().unwrap();
        assert_eq!(view.message_tag(), Some(9));
        assert_eq!(view.read_string().unwrap(), "hello");
        assert!(view.is_view());
        assert_eq!(view.write_u8(1), Err(BufferError::ViewIsReadOnly));
    }

    #[test]
    fn send_option_header_hidden_from_length() {
        let mut buf = Buffer::with_send_option(SendOption::Reliable, 16);
        assert_eq!(buf.length(), 0);
        buf.write_u8(42).unwrap();
        assert_eq!(buf.length(), 1);
        assert_eq!(buf.as_bytes().len(), 4);
    }

    #[test]
    fn reliable_id_stamped_into_header() {
        let mut buf = Buffer::with_send_option(SendOption::Reliable, 8);
        buf.set_reliable_id(ReliableId(0x0102)).unwrap();
        assert_eq!(buf.as_bytes(), &[1, 0x01, 0x02]);
    }

    #[test]
    fn resize_grows_to_fit() {
        let mut buf = Buffer::empty(0);
        for i in 0..100u8 {
            buf.write_u8(i).unwrap();
        }
        assert_eq!(buf.length(), 100);
    }
}
