//! FIFF tag headers and a seeking payload reader.
//!
//! Every tag starts with a 16-byte big-endian header:
//!
//! ```text
//!   kind: i32 │ type: u32 │ size: i32 │ next: i32 │ <size bytes of payload>
//! ```
//!
//! `next == 0` → the next tag follows the payload, `next > 0` → absolute
//! offset of the next tag, `next == -1` → end of chain.
use std::io::{Read, Seek, SeekFrom};
use anyhow::{bail, Context, Result};

use super::constants::*;

/// Tag header; the payload stays on disk until one of the
/// [`TagReader`] accessors is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHeader {
    pub kind:  i32,
    pub ftype: u32,
    pub size:  i32,
    pub next:  i32,
    /// Byte offset of the header.
    pub pos:   u64,
}

impl TagHeader {
    #[inline]
    pub fn data_pos(&self) -> u64 {
        self.pos + 16
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        self.size.max(0) as usize
    }

    /// Offset of the following header, `None` at the end of the chain.
    pub fn next_pos(&self) -> Option<u64> {
        match self.next {
            FIFFV_NEXT_SEQ => Some(self.data_pos() + self.payload_len() as u64),
            n if n > 0 => Some(n as u64),
            _ => None,
        }
    }

    fn from_be(raw: &[u8; 16], pos: u64) -> Self {
        let word = |i: usize| [raw[i], raw[i + 1], raw[i + 2], raw[i + 3]];
        TagHeader {
            kind:  i32::from_be_bytes(word(0)),
            ftype: u32::from_be_bytes(word(4)),
            size:  i32::from_be_bytes(word(8)),
            next:  i32::from_be_bytes(word(12)),
            pos,
        }
    }
}

/// Random-access reader over a FIF byte stream.
pub struct TagReader<R> {
    inner: R,
}

impl<R: Read + Seek> TagReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read the header stored at byte offset `pos`.
    pub fn header_at(&mut self, pos: u64) -> Result<TagHeader> {
        self.inner
            .seek(SeekFrom::Start(pos))
            .with_context(|| format!("seek to tag header @ {pos:#x}"))?;
        let mut raw = [0u8; 16];
        self.inner
            .read_exact(&mut raw)
            .with_context(|| format!("read tag header @ {pos:#x}"))?;
        Ok(TagHeader::from_be(&raw, pos))
    }

    pub fn int(&mut self, tag: &TagHeader) -> Result<i32> {
        let mut b = [0u8; 4];
        self.payload_into(tag, &mut b)?;
        Ok(i32::from_be_bytes(b))
    }

    pub fn float(&mut self, tag: &TagHeader) -> Result<f32> {
        let mut b = [0u8; 4];
        self.payload_into(tag, &mut b)?;
        Ok(f32::from_be_bytes(b))
    }

    /// Latin-1 payload, decoded byte by byte.
    pub fn string(&mut self, tag: &TagHeader) -> Result<String> {
        Ok(self.bytes(tag)?.iter().map(|&b| b as char).collect())
    }

    pub fn bytes(&mut self, tag: &TagHeader) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; tag.payload_len()];
        self.payload_into(tag, &mut buf)?;
        Ok(buf)
    }

    /// Position the stream at the first payload byte of `tag`.
    pub fn seek_payload(&mut self, tag: &TagHeader) -> Result<&mut R> {
        self.inner
            .seek(SeekFrom::Start(tag.data_pos()))
            .with_context(|| format!("seek to payload of tag {} @ {:#x}", tag.kind, tag.data_pos()))?;
        Ok(&mut self.inner)
    }

    fn payload_into(&mut self, tag: &TagHeader, buf: &mut [u8]) -> Result<()> {
        if buf.len() > tag.payload_len() {
            bail!("tag {} @ {:#x}: payload has {} bytes, need {}",
                tag.kind, tag.pos, tag.payload_len(), buf.len());
        }
        self.seek_payload(tag)?
            .read_exact(buf)
            .with_context(|| format!("read payload of tag {} @ {:#x}", tag.kind, tag.pos))
    }

    /// All tag headers of the file, in file order.
    ///
    /// Uses the directory embedded behind `FIFF_DIR_POINTER` when the file
    /// has one and falls back to walking the `next` chain otherwise.
    pub fn directory(&mut self) -> Result<Vec<TagHeader>> {
        match self.embedded_directory()? {
            Some(dir) => Ok(dir),
            None => self.scan_chain(),
        }
    }

    fn embedded_directory(&mut self) -> Result<Option<Vec<TagHeader>>> {
        let id = self.header_at(0)?;
        if id.kind != FIFF_FILE_ID {
            bail!("not a FIF file: first tag kind is {} (expected FIFF_FILE_ID)", id.kind);
        }
        let Some(next) = id.next_pos() else { return Ok(None) };
        let ptr = self.header_at(next)?;
        if ptr.kind != FIFF_DIR_POINTER {
            return Ok(None);
        }
        let dir_pos = self.int(&ptr)?;
        if dir_pos <= 0 {
            return Ok(None);
        }
        let dir_tag = self.header_at(dir_pos as u64)?;
        if dir_tag.ftype != FIFFT_DIR_ENTRY_STRUCT {
            return Ok(None);
        }

        // Entries share the header layout; the last word is the tag position.
        let raw = self.bytes(&dir_tag)?;
        let entries = raw
            .chunks_exact(16)
            .map(|c| {
                let mut h = [0u8; 16];
                h.copy_from_slice(c);
                let mut tag = TagHeader::from_be(&h, 0);
                tag.pos = tag.next as u32 as u64;
                tag.next = FIFFV_NEXT_NONE;
                tag
            })
            .collect();
        Ok(Some(entries))
    }

    fn scan_chain(&mut self) -> Result<Vec<TagHeader>> {
        let mut out = Vec::new();
        let mut pos = Some(0u64);
        while let Some(p) = pos {
            let tag = self.header_at(p)?;
            pos = tag.next_pos();
            out.push(tag);
        }
        Ok(out)
    }
}
