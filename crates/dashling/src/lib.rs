//! # MPEG-DASH manifest resolution
//!
//! dashling turns a Media Presentation Description (MPD), the XML manifest
//! describing a DASH presentation as Periods, AdaptationSets and
//! Representations, into concrete, time-addressable segment sequences, and
//! keeps them correct while the manifest evolves (live refreshes, lazily
//! resolved xlink sub-trees).
//!
//! The intended flow:
//!
//! 1. Fetch the manifest bytes yourself and hand them to
//!    [`DashSession::parse`] together with the URL they came from (that URL
//!    anchors relative BaseURL/xlink resolution).
//! 2. Resolve `onLoad` external references with
//!    [`DashSession::resolve_external`], passing a [`ManifestFetch`]
//!    implementation ([`HttpFetch`] is the reqwest-backed default).
//! 3. Enumerate adaptation sets, pick a Representation (see
//!    [`select::select_by_max_constraints`]) and call
//!    [`DashSession::setup_streaming`].
//! 4. Drive playback with the per-stream queries: `next_header`,
//!    `next_fragment`, `advance_segment`, `seek_to_time`.
//! 5. For live presentations, periodically re-fetch the manifest and call
//!    [`DashSession::refresh`]; stream cursors survive by presentation
//!    time.
//!
//! Media bytes never travel through this crate: fragment descriptors carry
//! URIs and byte ranges for a downstream downloader.

pub mod addressing;
pub mod builder;
pub mod clock;
pub mod error;
pub mod inherit;
pub mod model;
pub mod navigator;
pub mod scalar;
pub mod select;
pub mod session;
pub mod template;
pub mod timeline;
pub mod xlink;
pub mod xml;

mod url;

pub use builder::BuilderOptions;
pub use error::{DashlingError, DashlingResult};
pub use navigator::{Advance, SeekResult, SegmentCursor, Snap};
pub use select::SelectionConstraints;
pub use session::{ActiveStream, DashSession, FragmentInfo, HeaderInfo};
pub use xlink::{HttpFetch, ManifestFetch};
