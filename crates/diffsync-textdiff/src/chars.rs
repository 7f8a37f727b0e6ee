//! Character-level diff with common prefix/suffix trimming.

use crate::patch::{Op, Patch, PatchError};
use crate::DiffEngine;

/// Byte length of the longest common prefix, cut at a char boundary.
pub fn common_prefix(a: &str, b: &str) -> usize {
    let mut len = 0usize;
    let mut ia = a.chars();
    let mut ib = b.chars();
    loop {
        match (ia.next(), ib.next()) {
            (Some(ca), Some(cb)) if ca == cb => len += ca.len_utf8(),
            _ => break,
        }
    }
    len
}

/// Byte length of the longest common suffix, cut at a char boundary.
pub fn common_suffix(a: &str, b: &str) -> usize {
    let mut len = 0usize;
    let mut ia = a.chars().rev();
    let mut ib = b.chars().rev();
    loop {
        match (ia.next(), ib.next()) {
            (Some(ca), Some(cb)) if ca == cb => len += ca.len_utf8(),
            _ => break,
        }
    }
    len
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CharDiff;

impl CharDiff {
    pub fn new() -> Self {
        Self
    }
}

impl DiffEngine for CharDiff {
    type Patch = Patch;

    fn diff(&self, src: &str, dst: &str) -> Patch {
        if src == dst {
            return Patch::identity();
        }
        let prefix = common_prefix(src, dst);
        let src_rest = &src[prefix..];
        let dst_rest = &dst[prefix..];
        let suffix = common_suffix(src_rest, dst_rest);
        let src_mid = &src_rest[..src_rest.len() - suffix];
        let dst_mid = &dst_rest[..dst_rest.len() - suffix];

        let mut ops = Vec::with_capacity(4);
        if prefix > 0 {
            ops.push((Op::Retain, src[..prefix].to_string()));
        }
        if !src_mid.is_empty() {
            ops.push((Op::Delete, src_mid.to_string()));
        }
        if !dst_mid.is_empty() {
            ops.push((Op::Insert, dst_mid.to_string()));
        }
        if suffix > 0 {
            ops.push((Op::Retain, src[src.len() - suffix..].to_string()));
        }
        Patch::new(ops)
    }

    /// Forward-scan application. Retain/Delete segments that no longer
    /// match at the cursor are searched for further ahead: intervening
    /// target text (concurrent edits) is kept, and segments that cannot
    /// be located at all are dropped rather than failing the whole patch.
    fn apply(&self, patch: &Patch, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut pos = 0usize;
        for (op, s) in patch.ops() {
            match op {
                Op::Insert => out.push_str(s),
                Op::Retain | Op::Delete => {
                    let found = if text[pos..].starts_with(s.as_str()) {
                        Some(pos)
                    } else {
                        text[pos..].find(s.as_str()).map(|rel| pos + rel)
                    };
                    let Some(at) = found else {
                        continue;
                    };
                    out.push_str(&text[pos..at]);
                    if *op == Op::Retain {
                        out.push_str(s);
                    }
                    pos = at + s.len();
                }
            }
        }
        out.push_str(&text[pos..]);
        out
    }

    fn serialize(&self, patch: &Patch) -> String {
        patch.to_wire()
    }

    fn parse(&self, raw: &str) -> Result<Patch, PatchError> {
        Patch::from_wire(raw)
    }

    fn is_identity(&self, patch: &Patch) -> bool {
        patch.is_identity()
    }
}
