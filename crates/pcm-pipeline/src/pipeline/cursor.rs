//! Read facade over the current block.
//!
//! Every read mode consumes from the same cursor, so mixing them is allowed:
//! a sample read after a partial byte read resumes at the next whole element.

use std::io;
use std::iter::FusedIterator;

use super::Pipeline;
use crate::error::Result;

/// Bytes per output element (`f32`, little-endian).
pub const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

impl Pipeline {
    /// Next output sample, `None` at end of stream.
    pub fn next_sample(&mut self) -> Result<Option<f32>> {
        self.align_to_element();
        if !self.ensure_ready()? {
            return Ok(None);
        }
        let value = self.current[self.position];
        self.position += 1;
        Ok(Some(value))
    }

    /// Next byte of the little-endian `f32` stream, `None` at end of stream.
    pub fn next_byte(&mut self) -> Result<Option<u8>> {
        if !self.ensure_ready()? {
            return Ok(None);
        }
        let byte = self.current[self.position].to_le_bytes()[self.byte_offset];
        self.byte_offset += 1;
        if self.byte_offset == SAMPLE_BYTES {
            self.byte_offset = 0;
            self.position += 1;
        }
        Ok(Some(byte))
    }

    /// Up to `max_elements` unread samples of the current block (at least one).
    pub fn next_buffer(&mut self, max_elements: usize) -> Result<Option<&[f32]>> {
        self.align_to_element();
        if !self.ensure_ready()? {
            return Ok(None);
        }
        let start = self.position;
        let end = self.current.len().min(start + max_elements.max(1));
        self.position = end;
        Ok(Some(&self.current[start..end]))
    }

    /// Whatever is left of the current block, pulling a new one when it is consumed.
    pub fn next_block(&mut self) -> Result<Option<&[f32]>> {
        self.align_to_element();
        if !self.ensure_ready()? {
            return Ok(None);
        }
        let start = self.position;
        self.position = self.current.len();
        Ok(Some(&self.current[start..]))
    }

    /// Append up to `max_bytes` bytes of the current block to `out`.
    ///
    /// Returns the number appended; `0` means end of stream (or `max_bytes == 0`).
    pub fn next_bytes(&mut self, max_bytes: usize, out: &mut Vec<u8>) -> Result<usize> {
        if max_bytes == 0 || !self.ensure_ready()? {
            return Ok(0);
        }
        let start = out.len();
        out.resize(start + self.unread_bytes().min(max_bytes), 0);
        let written = self.drain_bytes_into(&mut out[start..]);
        out.truncate(start + written);
        Ok(written)
    }

    /// Iterate samples until end of stream. Stops silently on error; check
    /// [`Pipeline::error`] afterwards.
    pub fn samples(&mut self) -> Samples<'_> {
        Samples { pipeline: self }
    }

    /// Iterate bytes until end of stream. Stops silently on error; check
    /// [`Pipeline::error`] afterwards.
    pub fn le_bytes(&mut self) -> Bytes<'_> {
        Bytes { pipeline: self }
    }

    fn ensure_ready(&mut self) -> Result<bool> {
        while self.position >= self.current.len() {
            if !self.advance()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Skip the rest of a partially byte-read element.
    fn align_to_element(&mut self) {
        if self.byte_offset > 0 {
            self.byte_offset = 0;
            self.position += 1;
        }
    }

    fn unread_bytes(&self) -> usize {
        (self.current.len() - self.position) * SAMPLE_BYTES - self.byte_offset
    }

    fn drain_bytes_into(&mut self, dst: &mut [u8]) -> usize {
        let mut written = 0;
        while written < dst.len() && self.position < self.current.len() {
            let bytes = self.current[self.position].to_le_bytes();
            let take = (SAMPLE_BYTES - self.byte_offset).min(dst.len() - written);
            dst[written..written + take]
                .copy_from_slice(&bytes[self.byte_offset..self.byte_offset + take]);
            written += take;
            self.byte_offset += take;
            if self.byte_offset == SAMPLE_BYTES {
                self.byte_offset = 0;
                self.position += 1;
            }
        }
        written
    }
}

impl io::Read for Pipeline {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || !self.ensure_ready().map_err(io::Error::other)? {
            return Ok(0);
        }
        Ok(self.drain_bytes_into(buf))
    }
}

pub struct Samples<'a> {
    pipeline: &'a mut Pipeline,
}

impl Iterator for Samples<'_> {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        self.pipeline.next_sample().ok().flatten()
    }
}

impl FusedIterator for Samples<'_> {}

pub struct Bytes<'a> {
    pipeline: &'a mut Pipeline,
}

impl Iterator for Bytes<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        self.pipeline.next_byte().ok().flatten()
    }
}

impl FusedIterator for Bytes<'_> {}
