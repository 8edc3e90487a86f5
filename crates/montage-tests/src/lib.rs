//! Integration test crate for Montage.
//!
//! Holds cross-crate tests: timeline edits flowing into the compositor and
//! the export pipeline, plus property tests over the editing invariants.

#[cfg(test)]
mod timeline;

#[cfg(test)]
mod render;

#[cfg(test)]
mod export;

#[cfg(test)]
mod properties;
