//! Short-lived reading cursor over a frozen [`Image`].
//!
//! The image itself is immutable; all streaming state (position, width of
//! the last access) lives here. Readers create one cursor per dump pass and
//! pass it down by `&mut`.

use crate::error::{Error, Result};

use super::{Image, WORD};

pub struct Cursor<'a> {
    image: &'a Image,
    pos: u64,
    last: u64,
}

impl<'a> Cursor<'a> {
    pub fn new(image: &'a Image) -> Self {
        Cursor {
            image,
            pos: 0,
            last: 0,
        }
    }

    /// Current VA.
    pub fn cur(&self) -> u64 {
        self.pos
    }

    /// VA at which the last successful read started.
    pub fn last(&self) -> u64 {
        self.last
    }

    pub fn seek(&mut self, va: u64) {
        self.pos = va;
    }

    pub fn skip(&mut self, delta: i64) {
        self.pos = self.pos.wrapping_add_signed(delta);
    }

    /// Position the cursor at the start of the named section. Returns false
    /// (cursor unchanged) when the section does not exist.
    pub fn move_to_section(&mut self, name: &str) -> bool {
        match self.image.section(name) {
            Some(s) => {
                self.pos = s.address;
                true
            }
            None => false,
        }
    }

    /// Read one signed pointer-wide word, advancing the cursor.
    pub fn read_word(&mut self) -> Result<i64> {
        let value = self
            .image
            .read_u64_at(self.pos)
            .ok_or(Error::UnmappedAddress(self.pos))?;
        self.last = self.pos;
        self.pos += WORD as u64;
        Ok(value as i64)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self
            .image
            .read_u32_at(self.pos)
            .ok_or(Error::UnmappedAddress(self.pos))?;
        self.last = self.pos;
        self.pos += 4;
        Ok(value)
    }
}
