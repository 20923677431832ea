//! Output surfaces for the published snapshot.
//!
//! # Submodules
//!
//! - [`json`]: Writes and reads the snapshot file (the handoff format)
//! - [`html`]: Renders the snapshot as a single HTML page

pub mod html;
pub mod json;
