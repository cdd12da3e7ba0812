//! Pipeline stages for manifest-driven page acquisition.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and site adapters can reuse or replace individual steps.
//!
//! ## Data Flow
//!
//! ```text
//! resolve ──▶ manifest ──▶ flatten ──▶ descriptor ──▶ reconstruct
//! (entry URL)  (IIIF JSON)  (info.json  (normalise +   (dezoomify-rs)
//!                            endpoints)  persist)
//! ```
//!
//! 1. [`resolve`]    : derive the resource identifier from the entry URL,
//!    scraping the entry page only when the URL itself does not carry it
//! 2. [`manifest`]   : fetch and decode the IIIF presentation manifest
//! 3. [`flatten`]    : walk sequences → canvases → images into an ordered
//!    list of per-page descriptor endpoints
//! 4. [`descriptor`] : strip capability flags the reconstruction tool must
//!    not use, and write the result next to the page image
//! 5. [`reconstruct`]: hand the descriptor to the external deep-zoom tool;
//!    the only stage that spawns a process

pub mod descriptor;
pub mod flatten;
pub mod manifest;
pub mod reconstruct;
pub mod resolve;
