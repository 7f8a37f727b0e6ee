//! Patch representation and wire format.
//!
//! A patch is an ordered op list over the source text: retained context,
//! deletions, insertions. The wire format is a JSON array of
//! `[op, text]` pairs with op one of `"="`, `"-"`, `"+"`.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("invalid patch payload")]
    Invalid,
    #[error("unknown patch op: {0}")]
    UnknownOp(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Retain,
    Delete,
    Insert,
}

impl Op {
    pub fn symbol(self) -> &'static str {
        match self {
            Op::Retain => "=",
            Op::Delete => "-",
            Op::Insert => "+",
        }
    }

    fn from_symbol(sym: &str) -> Result<Self, PatchError> {
        match sym {
            "=" => Ok(Op::Retain),
            "-" => Ok(Op::Delete),
            "+" => Ok(Op::Insert),
            other => Err(PatchError::UnknownOp(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    ops: Vec<(Op, String)>,
}

impl Patch {
    pub fn new(ops: Vec<(Op, String)>) -> Self {
        Self { ops: normalize(ops) }
    }

    pub fn identity() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[(Op, String)] {
        &self.ops
    }

    /// A patch with no insert or delete ops leaves every text unchanged.
    pub fn is_identity(&self) -> bool {
        self.ops.iter().all(|(op, _)| *op == Op::Retain)
    }

    /// Reconstructs the source text the patch was computed against.
    pub fn source(&self) -> String {
        self.ops
            .iter()
            .filter(|(op, _)| *op != Op::Insert)
            .map(|(_, s)| s.as_str())
            .collect()
    }

    /// Reconstructs the target text the patch produces from its source.
    pub fn target(&self) -> String {
        self.ops
            .iter()
            .filter(|(op, _)| *op != Op::Delete)
            .map(|(_, s)| s.as_str())
            .collect()
    }

    pub fn to_wire(&self) -> String {
        let arr: Vec<Value> = self
            .ops
            .iter()
            .map(|(op, s)| Value::Array(vec![op.symbol().into(), s.as_str().into()]))
            .collect();
        Value::Array(arr).to_string()
    }

    pub fn from_wire(raw: &str) -> Result<Self, PatchError> {
        let value: Value = serde_json::from_str(raw).map_err(|_| PatchError::Invalid)?;
        let items = value.as_array().ok_or(PatchError::Invalid)?;
        let mut ops = Vec::with_capacity(items.len());
        for item in items {
            let pair = item.as_array().ok_or(PatchError::Invalid)?;
            if pair.len() != 2 {
                return Err(PatchError::Invalid);
            }
            let sym = pair[0].as_str().ok_or(PatchError::Invalid)?;
            let text = pair[1].as_str().ok_or(PatchError::Invalid)?;
            ops.push((Op::from_symbol(sym)?, text.to_string()));
        }
        Ok(Self::new(ops))
    }
}

/// Drops empty segments and merges adjacent ops of the same kind.
fn normalize(ops: Vec<(Op, String)>) -> Vec<(Op, String)> {
    let mut out: Vec<(Op, String)> = Vec::with_capacity(ops.len());
    for (op, s) in ops {
        if s.is_empty() {
            continue;
        }
        if let Some((last_op, last_s)) = out.last_mut() {
            if *last_op == op {
                last_s.push_str(&s);
                continue;
            }
        }
        out.push((op, s));
    }
    out
}
