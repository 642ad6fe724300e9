//! `tp-fixture`: helpers for end-to-end tests that drive a GUI fixture
//! window through a tool server.
//!
//! The fixture window writes its state to a JSON file; [`SnapshotFile`]
//! polls that file. Geometry, color and screenshot helpers compare what the
//! server reports against the known window layout.

pub mod color;
pub mod error;
pub mod geometry;
pub mod screenshot;
pub mod snapshot;
pub mod wait;

pub use color::Rgb;
pub use error::{FixtureError, Result};
pub use geometry::{Landmark, Point, Rect};
pub use screenshot::Screenshot;
pub use snapshot::{SnapshotFile, WindowSnapshot};
pub use wait::wait_for_condition;
