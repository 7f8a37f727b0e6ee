//! Diff/patch capability consumed by the synchronization engine.
//!
//! The engine boundary is the [`DiffEngine`] trait: produce a patch
//! between two text states, apply a patch to a text, and move patches
//! across the wire as strings. [`CharDiff`] is the built-in
//! character-level implementation.

pub mod chars;
pub mod patch;

pub use chars::CharDiff;
pub use patch::{Op, Patch, PatchError};

pub trait DiffEngine {
    type Patch;

    /// Patch transforming `src` into `dst`. Equal inputs yield an
    /// identity patch.
    fn diff(&self, src: &str, dst: &str) -> Self::Patch;

    /// Applies `patch` to `text`, best-effort when `text` has drifted
    /// from the patch's source state.
    fn apply(&self, patch: &Self::Patch, text: &str) -> String;

    fn serialize(&self, patch: &Self::Patch) -> String;

    fn parse(&self, raw: &str) -> Result<Self::Patch, PatchError>;

    /// True when applying the patch changes nothing.
    fn is_identity(&self, patch: &Self::Patch) -> bool;
}
