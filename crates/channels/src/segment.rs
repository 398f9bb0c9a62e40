//! Split oversized replies into labelled parts.
//!
//! Lengths are counted in `char`s and cuts land on `char` boundaries only, so
//! a multi-byte UTF-8 sequence is never split. Every part body has the same
//! capacity (`limit - suffix_len(total)`), which makes the split a pure
//! function of `(text, limit)`: the part count is
//! `ceil(len / (limit - suffix_len(total)))`.

use crate::{Error, Result};

/// Default per-message limit of the outbound transport.
pub const DEFAULT_CHUNK_LIMIT: usize = 1500;

/// One part of a split reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based position.
    pub index: usize,
    pub total: usize,
    /// Slice of the original text carried by this part.
    pub body: String,
}

impl Chunk {
    /// Wire text: the body plus the part suffix when there is more than one part.
    #[must_use]
    pub fn render(&self) -> String {
        if self.total > 1 {
            format!("{}{}", self.body, part_suffix(self.index, self.total))
        } else {
            self.body.clone()
        }
    }
}

#[must_use]
pub fn part_suffix(index: usize, total: usize) -> String {
    format!("\n(Part {index}/{total})")
}

/// Length of the widest suffix for `total` parts.
#[must_use]
pub fn suffix_len(total: usize) -> usize {
    part_suffix(total, total).chars().count()
}

fn digits(n: usize) -> usize {
    n.to_string().len()
}

/// Number of parts for a text of `len` chars, or `LimitTooSmall`.
///
/// Widening the suffix can only raise the count, so this iterates until the
/// digit width of the count stops changing.
fn part_count(len: usize, limit: usize) -> Result<usize> {
    if len <= limit {
        return Ok(1);
    }
    let mut total = 2;
    loop {
        let suffix = suffix_len(total);
        if limit <= suffix {
            return Err(Error::LimitTooSmall {
                limit,
                needed: suffix + 1,
            });
        }
        let capacity = limit - suffix;
        let count = len.div_ceil(capacity);
        if digits(count) <= digits(total) {
            return Ok(count);
        }
        total = count;
    }
}

/// Split `text` into parts of at most `limit` chars each, suffix included.
pub fn split_chunks(text: &str, limit: usize) -> Result<Vec<Chunk>> {
    let len = text.chars().count();
    let total = part_count(len, limit)?;
    if total == 1 {
        return Ok(vec![Chunk {
            index: 1,
            total: 1,
            body: text.to_string(),
        }]);
    }

    let capacity = limit - suffix_len(total);
    let mut chunks = Vec::with_capacity(total);
    let mut start = 0;
    let mut taken = 0;
    for (pos, (byte_idx, _)) in text.char_indices().enumerate() {
        if pos > 0 && pos % capacity == 0 {
            chunks.push(Chunk {
                index: chunks.len() + 1,
                total,
                body: text[start..byte_idx].to_string(),
            });
            start = byte_idx;
        }
        taken = pos + 1;
    }
    if taken > 0 {
        chunks.push(Chunk {
            index: chunks.len() + 1,
            total,
            body: text[start..].to_string(),
        });
    }
    Ok(chunks)
}

/// Rendered parts of `text`, in delivery order.
pub fn split(text: &str, limit: usize) -> Result<Vec<String>> {
    Ok(split_chunks(text, limit)?
        .iter()
        .map(Chunk::render)
        .collect())
}
