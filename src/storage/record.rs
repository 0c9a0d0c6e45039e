//! Collection frame format
//!
//! A committed batch is stored as exactly one frame:
//!
//! ```text
//! +------------------+
//! | Frame Length     | (u32 LE, includes itself and the checksum)
//! +------------------+
//! | Batch ID         | (length-prefixed string)
//! +------------------+
//! | Committed At     | (i64 LE, unix millis)
//! +------------------+
//! | Document Count   | (u32 LE)
//! +------------------+
//! | Document ID      | (length-prefixed string)  } repeated
//! | Document Body    | (length-prefixed bytes)   } per document
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! Checksum covers all bytes except the checksum itself. One frame per batch
//! is what makes a bulk insert all-or-nothing on disk.

use std::io::{self, Read};

/// Length + batch id prefix + committed_at + count + checksum.
pub const MIN_FRAME_SIZE: usize = 4 + 4 + 8 + 4 + 4;

/// One document as persisted inside a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    /// Primary key, unique within the collection
    pub document_id: String,
    /// JSON document body
    pub body: Vec<u8>,
}

impl StoredDocument {
    pub fn new(document_id: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            document_id: document_id.into(),
            body,
        }
    }
}

/// A committed batch: the unit of atomicity in a collection file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRecord {
    /// Unique id of the batch
    pub batch_id: String,
    /// Commit time (unix millis)
    pub committed_at_ms: i64,
    /// Documents in request row order
    pub documents: Vec<StoredDocument>,
}

impl BatchRecord {
    pub fn new(
        batch_id: impl Into<String>,
        committed_at_ms: i64,
        documents: Vec<StoredDocument>,
    ) -> Self {
        Self {
            batch_id: batch_id.into(),
            committed_at_ms,
            documents,
        }
    }

    fn serialize_body(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();

        write_bytes(&mut buf, self.batch_id.as_bytes())?;
        buf.extend_from_slice(&self.committed_at_ms.to_le_bytes());
        buf.extend_from_slice(&len_u32(self.documents.len())?.to_le_bytes());

        for doc in &self.documents {
            write_bytes(&mut buf, doc.document_id.as_bytes())?;
            write_bytes(&mut buf, &doc.body)?;
        }

        Ok(buf)
    }

    /// Serialize the complete frame to bytes.
    ///
    /// Fails only if the frame would not fit the u32 length prefix.
    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        let body = self.serialize_body()?;
        let frame_length = len_u32(4 + body.len() + 4)?;

        let mut frame = Vec::with_capacity(frame_length as usize);
        frame.extend_from_slice(&frame_length.to_le_bytes());
        frame.extend_from_slice(&body);

        let checksum = super::checksum::compute_checksum(&frame);
        frame.extend_from_slice(&checksum.to_le_bytes());

        Ok(frame)
    }

    /// Deserialize a frame from bytes, verifying the checksum.
    ///
    /// Returns the frame and the number of bytes consumed. A short buffer is
    /// reported as `UnexpectedEof`; anything else malformed as `InvalidData`.
    pub fn deserialize(data: &[u8]) -> io::Result<(Self, usize)> {
        if data.len() < MIN_FRAME_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Frame too short",
            ));
        }

        let frame_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

        if frame_length < MIN_FRAME_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid frame length: {}", frame_length),
            ));
        }

        if data.len() < frame_length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Frame truncated: expected {} bytes, got {}",
                    frame_length,
                    data.len()
                ),
            ));
        }

        let checksum_offset = frame_length - 4;
        let stored_checksum = u32::from_le_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);

        if !super::checksum::verify_checksum(&data[0..checksum_offset], stored_checksum) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Checksum mismatch: computed {:08x}, stored {:08x}",
                    super::checksum::compute_checksum(&data[0..checksum_offset]),
                    stored_checksum
                ),
            ));
        }

        let mut cursor = io::Cursor::new(&data[4..checksum_offset]);

        let batch_id = read_string(&mut cursor)?;

        let mut ts_buf = [0u8; 8];
        cursor.read_exact(&mut ts_buf)?;
        let committed_at_ms = i64::from_le_bytes(ts_buf);

        let count = read_u32(&mut cursor)? as usize;
        let mut documents = Vec::with_capacity(count.min(checksum_offset));
        for _ in 0..count {
            let document_id = read_string(&mut cursor)?;
            let body = read_bytes(&mut cursor)?;
            documents.push(StoredDocument { document_id, body });
        }

        if cursor.position() as usize != checksum_offset - 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Trailing bytes after last document",
            ));
        }

        Ok((
            Self {
                batch_id,
                committed_at_ms,
                documents,
            },
            frame_length,
        ))
    }
}

fn len_u32(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Length {} exceeds frame limit", len),
        )
    })
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> io::Result<()> {
    buf.extend_from_slice(&len_u32(bytes.len())?.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    Ok(u32::from_le_bytes(len_buf))
}

fn read_bytes<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let len = read_u32(reader)? as usize;
    let mut buf = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Length prefix exceeds frame body",
        ));
    }
    Ok(buf)
}

fn read_string<R: Read>(reader: &mut R) -> io::Result<String> {
    let buf = read_bytes(reader)?;
    String::from_utf8(buf)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("Invalid UTF-8: {}", e)))
}
