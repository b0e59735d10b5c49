//! Chunked file delivery with integrity verification.
//!
//! A transfer is `DataDownloadStart`, then `FileChunk`s, then
//! `FileTransferComplete`. The receiver may refuse at the start with a
//! negative [`FileAcceptDeny`]. Lengths are validated before any buffer is
//! allocated, and the accumulated bytes must match the declared MD5 digest
//! before a file is handed out.

use std::collections::{HashMap, HashSet};

use md5::{Digest, Md5};

use crate::codec::WireRecord;
use crate::error::{ProtocolError, Result, narrow_u8};
use crate::message::ProtocolLimits;
use crate::wire;
use crate::world::ServerMap;

/// Lowercase hex MD5 digest of `bytes`.
pub fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

/// What the receiver does with a finished file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FileType {
    /// Plain resource asset.
    Normal = 0,
    /// Map definition.
    Map = 1,
    /// Client-side script source.
    Script = 2,
}

impl FileType {
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Map),
            2 => Ok(Self::Script),
            other => Err(ProtocolError::malformed(format!("unknown file type {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Announces a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDownloadStart {
    /// Transfer id, unique among in-flight transfers.
    pub id: i32,
    pub file_type: FileType,
    pub file_name: String,
    /// Resource that owns the file.
    pub resource_parent: String,
    /// Exact byte length of the file.
    pub length: i32,
    /// Hex MD5 digest of the file.
    pub md5_hash: String,
}

/// A slice of an in-flight file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunk {
    pub id: i32,
    pub data: Vec<u8>,
}

/// End of stream for a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTransferComplete {
    pub id: i32,
}

/// Receiver's answer to a [`DataDownloadStart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAcceptDeny {
    pub id: i32,
    pub accepted: bool,
}

impl WireRecord for DataDownloadStart {
    type Wire = wire::DataDownloadStart;

    fn to_wire(&self) -> wire::DataDownloadStart {
        wire::DataDownloadStart {
            id: self.id,
            file_type: self.file_type as u32,
            file_name: self.file_name.clone(),
            resource_parent: self.resource_parent.clone(),
            length: self.length,
            md5_hash: self.md5_hash.clone(),
        }
    }

    fn from_wire(w: wire::DataDownloadStart) -> Result<Self> {
        Ok(Self {
            id: w.id,
            file_type: FileType::from_tag(narrow_u8(w.file_type, "download.file_type")?)?,
            file_name: w.file_name,
            resource_parent: w.resource_parent,
            length: w.length,
            md5_hash: w.md5_hash,
        })
    }
}

impl WireRecord for FileChunk {
    type Wire = wire::FileChunk;

    fn to_wire(&self) -> wire::FileChunk {
        wire::FileChunk {
            id: self.id,
            data: self.data.clone(),
        }
    }

    fn from_wire(w: wire::FileChunk) -> Result<Self> {
        Ok(Self { id: w.id, data: w.data })
    }
}

impl WireRecord for FileTransferComplete {
    type Wire = wire::FileTransferComplete;

    fn to_wire(&self) -> wire::FileTransferComplete {
        wire::FileTransferComplete { id: self.id }
    }

    fn from_wire(w: wire::FileTransferComplete) -> Result<Self> {
        Ok(Self { id: w.id })
    }
}

impl WireRecord for FileAcceptDeny {
    type Wire = wire::FileAcceptDeny;

    fn to_wire(&self) -> wire::FileAcceptDeny {
        wire::FileAcceptDeny {
            id: self.id,
            accepted: self.accepted,
        }
    }

    fn from_wire(w: wire::FileAcceptDeny) -> Result<Self> {
        Ok(Self {
            id: w.id,
            accepted: w.accepted,
        })
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// A verified file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedFile {
    pub id: i32,
    pub file_type: FileType,
    pub file_name: String,
    pub resource_parent: String,
    pub md5_hash: String,
    pub data: Vec<u8>,
}

impl CompletedFile {
    /// Decode a map download as a world snapshot.
    pub fn server_map(&self) -> Result<ServerMap> {
        if self.file_type != FileType::Map {
            return Err(ProtocolError::malformed(format!(
                "{} is a {:?} file, not a map",
                self.file_name, self.file_type
            )));
        }
        ServerMap::decode(&self.data)
    }
}

#[derive(Debug)]
struct PendingTransfer {
    start: DataDownloadStart,
    expected_len: usize,
    buffer: Vec<u8>,
}

/// Receiving side of every in-flight transfer on one connection.
///
/// Each transfer's buffer is owned here and dropped on completion,
/// rejection, or failure. A failure in one transfer never touches another.
/// Buffers grow only as chunks arrive, and the number of transfers in
/// flight is capped, so declared lengths alone never reserve memory.
#[derive(Debug)]
pub struct FileTransferReceiver {
    max_file_length: usize,
    max_concurrent: usize,
    pending: HashMap<i32, PendingTransfer>,
    known_hashes: HashSet<String>,
}

impl FileTransferReceiver {
    /// A receiver with the default concurrency cap.
    pub fn new(max_file_length: usize) -> Self {
        Self {
            max_file_length,
            max_concurrent: ProtocolLimits::default().max_concurrent_transfers,
            pending: HashMap::new(),
            known_hashes: HashSet::new(),
        }
    }

    /// A receiver enforcing the file limits in `limits`.
    pub fn from_limits(limits: &ProtocolLimits) -> Self {
        Self::new(limits.max_file_length).with_max_concurrent(limits.max_concurrent_transfers)
    }

    /// Cap the number of transfers in flight at once.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Record a digest the receiver already holds; matching starts are denied.
    pub fn mark_known(&mut self, md5_hash: &str) {
        self.known_hashes.insert(md5_hash.to_ascii_lowercase());
    }

    pub fn is_pending(&self, id: i32) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop a transfer without completing it.
    pub fn cancel(&mut self, id: i32) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Handle a start record and produce the reply to send.
    pub fn on_start(&mut self, start: DataDownloadStart) -> Result<FileAcceptDeny> {
        let allowed = i64::try_from(self.max_file_length).unwrap_or(i64::MAX);
        let expected_len = usize::try_from(start.length)
            .ok()
            .filter(|len| *len <= self.max_file_length)
            .ok_or(ProtocolError::LengthViolation {
                field: "download.length",
                actual: i64::from(start.length),
                allowed,
            })?;
        if self.pending.contains_key(&start.id) {
            return Err(ProtocolError::malformed(format!(
                "transfer {} is already in flight",
                start.id
            )));
        }

        let id = start.id;
        if self.known_hashes.contains(&start.md5_hash.to_ascii_lowercase()) {
            tracing::debug!(id, file = %start.file_name, "denying transfer of already cached file");
            return Ok(FileAcceptDeny { id, accepted: false });
        }
        if self.pending.len() >= self.max_concurrent {
            return Err(ProtocolError::LengthViolation {
                field: "download.concurrent",
                actual: self.pending.len() as i64 + 1,
                allowed: self.max_concurrent as i64,
            });
        }

        tracing::debug!(id, file = %start.file_name, length = expected_len, "accepting transfer");
        self.pending.insert(
            id,
            PendingTransfer {
                start,
                expected_len,
                buffer: Vec::new(),
            },
        );
        Ok(FileAcceptDeny { id, accepted: true })
    }

    /// Append a chunk. Overflowing the declared length discards the transfer.
    pub fn on_chunk(&mut self, chunk: FileChunk) -> Result<()> {
        let transfer = self
            .pending
            .get_mut(&chunk.id)
            .ok_or_else(|| ProtocolError::malformed(format!("chunk for unknown transfer {}", chunk.id)))?;

        let total = transfer.buffer.len() + chunk.data.len();
        if total > transfer.expected_len {
            let allowed = transfer.expected_len as i64;
            self.pending.remove(&chunk.id);
            tracing::warn!(id = chunk.id, total, allowed, "transfer overflowed its declared length");
            return Err(ProtocolError::LengthViolation {
                field: "download.chunk",
                actual: total as i64,
                allowed,
            });
        }
        transfer.buffer.extend_from_slice(&chunk.data);
        Ok(())
    }

    /// Finish a transfer, verifying its length and digest.
    pub fn on_complete(&mut self, complete: FileTransferComplete) -> Result<CompletedFile> {
        let PendingTransfer {
            start,
            expected_len,
            buffer,
        } = self
            .pending
            .remove(&complete.id)
            .ok_or_else(|| ProtocolError::malformed(format!("completion for unknown transfer {}", complete.id)))?;

        if buffer.len() != expected_len {
            return Err(ProtocolError::LengthViolation {
                field: "download.complete",
                actual: buffer.len() as i64,
                allowed: expected_len as i64,
            });
        }

        let actual = md5_hex(&buffer);
        if !actual.eq_ignore_ascii_case(&start.md5_hash) {
            tracing::warn!(id = start.id, file = %start.file_name, "transfer failed integrity check");
            return Err(ProtocolError::HashMismatch {
                id: start.id,
                expected: start.md5_hash,
                actual,
            });
        }

        tracing::info!(id = start.id, file = %start.file_name, bytes = buffer.len(), "transfer complete");
        self.known_hashes.insert(actual.clone());
        Ok(CompletedFile {
            id: start.id,
            file_type: start.file_type,
            file_name: start.file_name,
            resource_parent: start.resource_parent,
            md5_hash: actual,
            data: buffer,
        })
    }
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Sending side of one transfer.
#[derive(Debug, Clone)]
pub struct FileUpload {
    start: DataDownloadStart,
    data: Vec<u8>,
    chunk_size: usize,
}

impl FileUpload {
    /// Prepare `data` for sending in chunks of at most `chunk_size` bytes.
    pub fn new(
        id: i32,
        file_type: FileType,
        file_name: impl Into<String>,
        resource_parent: impl Into<String>,
        data: Vec<u8>,
        chunk_size: usize,
    ) -> Result<Self> {
        let length = i32::try_from(data.len()).map_err(|_| ProtocolError::LengthViolation {
            field: "upload.length",
            actual: data.len() as i64,
            allowed: i64::from(i32::MAX),
        })?;
        let start = DataDownloadStart {
            id,
            file_type,
            file_name: file_name.into(),
            resource_parent: resource_parent.into(),
            length,
            md5_hash: md5_hex(&data),
        };
        Ok(Self {
            start,
            data,
            chunk_size: chunk_size.max(1),
        })
    }

    /// The start record to send first.
    pub fn start(&self) -> &DataDownloadStart {
        &self.start
    }

    /// Whether to stream after the receiver's reply.
    pub fn on_reply(&self, reply: &FileAcceptDeny) -> Result<bool> {
        if reply.id != self.start.id {
            return Err(ProtocolError::malformed(format!(
                "reply for transfer {} routed to upload {}",
                reply.id, self.start.id
            )));
        }
        if !reply.accepted {
            tracing::debug!(id = self.start.id, file = %self.start.file_name, "receiver declined transfer");
        }
        Ok(reply.accepted)
    }

    /// Chunk records in order.
    pub fn chunks(&self) -> impl Iterator<Item = FileChunk> + '_ {
        self.data.chunks(self.chunk_size).map(|slice| FileChunk {
            id: self.start.id,
            data: slice.to_vec(),
        })
    }

    /// The record that ends the stream.
    pub fn complete(&self) -> FileTransferComplete {
        FileTransferComplete { id: self.start.id }
    }
}

// ---------------------------------------------------------------------------
// Client-side scripts
// ---------------------------------------------------------------------------

/// Source of one client-side script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientsideScript {
    pub resource_parent: String,
    pub script: String,
}

/// Every client-side script a resource set ships.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptCollection {
    pub clientside_scripts: Vec<ClientsideScript>,
}

impl ScriptCollection {
    /// Gather the script files among `files`.
    pub fn from_completed<'a>(files: impl IntoIterator<Item = &'a CompletedFile>) -> Self {
        let clientside_scripts = files
            .into_iter()
            .filter(|f| f.file_type == FileType::Script)
            .map(|f| ClientsideScript {
                resource_parent: f.resource_parent.clone(),
                script: String::from_utf8_lossy(&f.data).into_owned(),
            })
            .collect();
        Self { clientside_scripts }
    }
}

impl WireRecord for ScriptCollection {
    type Wire = wire::ScriptCollection;

    fn to_wire(&self) -> wire::ScriptCollection {
        wire::ScriptCollection {
            clientside_scripts: self
                .clientside_scripts
                .iter()
                .map(|s| wire::ClientsideScript {
                    resource_parent: s.resource_parent.clone(),
                    script: s.script.clone(),
                })
                .collect(),
        }
    }

    fn from_wire(w: wire::ScriptCollection) -> Result<Self> {
        Ok(Self {
            clientside_scripts: w
                .clientside_scripts
                .into_iter()
                .map(|s| ClientsideScript {
                    resource_parent: s.resource_parent,
                    script: s.script,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    fn start_for(id: i32, data: &[u8]) -> DataDownloadStart {
        DataDownloadStart {
            id,
            file_type: FileType::Normal,
            file_name: "vehicles.xml".into(),
            resource_parent: "freeroam".into(),
            length: data.len() as i32,
            md5_hash: md5_hex(data),
        }
    }

    #[test]
    fn test_md5_hex_known_vector() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_1024_byte_transfer_is_accepted() {
        let data = payload(1024);
        let mut rx = FileTransferReceiver::new(1 << 20);
        assert!(rx.on_start(start_for(1, &data)).unwrap().accepted);
        for part in data.chunks(300) {
            rx.on_chunk(FileChunk { id: 1, data: part.to_vec() }).unwrap();
        }
        let file = rx.on_complete(FileTransferComplete { id: 1 }).unwrap();
        assert_eq!(file.data, data);
        assert!(!rx.is_pending(1));
    }

    #[test]
    fn test_1024_bytes_with_wrong_hash_is_rejected() {
        let data = payload(1024);
        let mut start = start_for(2, &data);
        start.md5_hash = md5_hex(b"something else");
        let mut rx = FileTransferReceiver::new(1 << 20);
        rx.on_start(start).unwrap();
        rx.on_chunk(FileChunk { id: 2, data }).unwrap();
        let err = rx.on_complete(FileTransferComplete { id: 2 }).unwrap_err();
        assert!(matches!(err, ProtocolError::HashMismatch { id: 2, .. }));
        assert_eq!(rx.pending_count(), 0);
    }

    #[test]
    fn test_uppercase_digest_matches() {
        let data = payload(64);
        let mut start = start_for(3, &data);
        start.md5_hash = start.md5_hash.to_ascii_uppercase();
        let mut rx = FileTransferReceiver::new(1024);
        rx.on_start(start).unwrap();
        rx.on_chunk(FileChunk { id: 3, data }).unwrap();
        assert!(rx.on_complete(FileTransferComplete { id: 3 }).is_ok());
    }

    #[test]
    fn test_declared_length_over_limit_is_rejected_before_allocation() {
        let mut rx = FileTransferReceiver::new(512);
        let mut start = start_for(4, &payload(16));
        start.length = 513;
        assert_eq!(
            rx.on_start(start.clone()),
            Err(ProtocolError::LengthViolation {
                field: "download.length",
                actual: 513,
                allowed: 512,
            })
        );
        start.length = -1;
        assert!(matches!(rx.on_start(start), Err(ProtocolError::LengthViolation { .. })));
        assert_eq!(rx.pending_count(), 0);
    }

    #[test]
    fn test_concurrent_transfers_are_capped() {
        let limits = ProtocolLimits {
            max_concurrent_transfers: 4,
            ..Default::default()
        };
        let mut rx = FileTransferReceiver::from_limits(&limits);
        let data = payload(16);
        for id in 0..4 {
            let mut start = start_for(id, &data);
            start.length = limits.max_file_length as i32;
            assert!(rx.on_start(start).unwrap().accepted);
        }

        let mut extra = start_for(4, &data);
        extra.length = limits.max_file_length as i32;
        assert_eq!(
            rx.on_start(extra.clone()),
            Err(ProtocolError::LengthViolation {
                field: "download.concurrent",
                actual: 5,
                allowed: 4,
            })
        );
        assert_eq!(rx.pending_count(), 4);

        // Finishing or cancelling one frees a slot.
        assert!(rx.cancel(0));
        assert!(rx.on_start(extra).unwrap().accepted);
    }

    #[test]
    fn test_declared_length_reserves_nothing() {
        let mut rx = FileTransferReceiver::new(64 * 1024 * 1024);
        let mut start = start_for(9, &payload(4));
        start.length = 64 * 1024 * 1024;
        rx.on_start(start).unwrap();
        assert_eq!(rx.pending[&9].buffer.capacity(), 0);
    }

    #[test]
    fn test_known_hash_denial_does_not_need_a_slot() {
        let data = payload(16);
        let mut rx = FileTransferReceiver::new(1024).with_max_concurrent(1);
        rx.on_start(start_for(1, &payload(8))).unwrap();
        rx.mark_known(&md5_hex(&data));
        assert!(!rx.on_start(start_for(2, &data)).unwrap().accepted);
    }

    #[test]
    fn test_overflowing_chunk_discards_transfer() {
        let data = payload(10);
        let mut rx = FileTransferReceiver::new(1024);
        rx.on_start(start_for(5, &data)).unwrap();
        rx.on_chunk(FileChunk { id: 5, data: payload(8) }).unwrap();
        let err = rx.on_chunk(FileChunk { id: 5, data: payload(8) }).unwrap_err();
        assert!(matches!(err, ProtocolError::LengthViolation { actual: 16, allowed: 10, .. }));
        assert!(!rx.is_pending(5));
    }

    #[test]
    fn test_short_transfer_fails_on_complete() {
        let data = payload(10);
        let mut rx = FileTransferReceiver::new(1024);
        rx.on_start(start_for(6, &data)).unwrap();
        rx.on_chunk(FileChunk { id: 6, data: data[..4].to_vec() }).unwrap();
        assert!(matches!(
            rx.on_complete(FileTransferComplete { id: 6 }),
            Err(ProtocolError::LengthViolation { actual: 4, allowed: 10, .. })
        ));
    }

    #[test]
    fn test_duplicate_id_and_unknown_id() {
        let data = payload(10);
        let mut rx = FileTransferReceiver::new(1024);
        rx.on_start(start_for(7, &data)).unwrap();
        assert!(rx.on_start(start_for(7, &data)).unwrap_err().is_malformed());
        assert!(rx.on_chunk(FileChunk { id: 8, data: vec![1] }).unwrap_err().is_malformed());
        assert!(rx.on_complete(FileTransferComplete { id: 8 }).unwrap_err().is_malformed());
        // The failures above left transfer 7 intact.
        rx.on_chunk(FileChunk { id: 7, data }).unwrap();
        assert!(rx.on_complete(FileTransferComplete { id: 7 }).is_ok());
    }

    #[test]
    fn test_known_hash_is_denied() {
        let data = payload(32);
        let mut rx = FileTransferReceiver::new(1024);
        rx.mark_known(&md5_hex(&data).to_ascii_uppercase());
        let reply = rx.on_start(start_for(9, &data)).unwrap();
        assert_eq!(reply, FileAcceptDeny { id: 9, accepted: false });
        assert!(!rx.is_pending(9));
    }

    #[test]
    fn test_upload_streams_into_receiver() {
        let data = payload(1000);
        let upload = FileUpload::new(11, FileType::Script, "client.js", "race", data.clone(), 256).unwrap();
        let mut rx = FileTransferReceiver::new(4096);

        let reply = rx.on_start(upload.start().clone()).unwrap();
        assert!(upload.on_reply(&reply).unwrap());
        let chunks: Vec<_> = upload.chunks().collect();
        assert_eq!(chunks.len(), 4);
        for chunk in chunks {
            rx.on_chunk(chunk).unwrap();
        }
        let file = rx.on_complete(upload.complete()).unwrap();
        assert_eq!(file.data, data);

        // A second offer of the same content is declined.
        let again = FileUpload::new(12, FileType::Script, "client.js", "race", data, 256).unwrap();
        let reply = rx.on_start(again.start().clone()).unwrap();
        assert!(!again.on_reply(&reply).unwrap());
    }

    #[test]
    fn test_reply_for_other_transfer_is_malformed() {
        let upload = FileUpload::new(1, FileType::Normal, "a", "b", vec![1, 2, 3], 2).unwrap();
        let reply = FileAcceptDeny { id: 2, accepted: true };
        assert!(upload.on_reply(&reply).unwrap_err().is_malformed());
    }

    #[test]
    fn test_script_collection_from_completed() {
        let files = [
            CompletedFile {
                id: 1,
                file_type: FileType::Script,
                file_name: "main.js".into(),
                resource_parent: "race".into(),
                md5_hash: String::new(),
                data: b"API.log('hi');".to_vec(),
            },
            CompletedFile {
                id: 2,
                file_type: FileType::Map,
                file_name: "track.xml".into(),
                resource_parent: "race".into(),
                md5_hash: String::new(),
                data: b"<map/>".to_vec(),
            },
        ];
        let collection = ScriptCollection::from_completed(&files);
        assert_eq!(collection.clientside_scripts.len(), 1);
        assert_eq!(collection.clientside_scripts[0].script, "API.log('hi');");
        assert_eq!(ScriptCollection::decode(&collection.encode()).unwrap(), collection);
    }

    #[test]
    fn test_map_download_decodes_snapshot() {
        use crate::entity::{EntityProperties, EntityType};
        use crate::handle::NetHandle;

        let mut map = ServerMap::new();
        map.insert(NetHandle(4), EntityProperties::new(EntityType::Marker));
        let upload = FileUpload::new(20, FileType::Map, "map", "freeroam", map.encode(), 64).unwrap();

        let mut rx = FileTransferReceiver::new(4096);
        rx.on_start(upload.start().clone()).unwrap();
        for chunk in upload.chunks() {
            rx.on_chunk(chunk).unwrap();
        }
        let file = rx.on_complete(upload.complete()).unwrap();
        assert_eq!(file.server_map().unwrap(), map);

        let script = CompletedFile {
            file_type: FileType::Script,
            ..file
        };
        assert!(script.server_map().unwrap_err().is_malformed());
    }

    #[test]
    fn test_unknown_file_type_is_malformed() {
        use prost::Message;
        let bytes = wire::DataDownloadStart {
            file_type: 9,
            ..Default::default()
        }
        .encode_to_vec();
        assert!(DataDownloadStart::decode(&bytes).unwrap_err().is_malformed());
    }
}
