//! Host board interface and the channel clone engine.
//!
//! The cloner needs surprisingly little from a PCB editor: enumerate items,
//! hit-test them against a rectangle, duplicate, move, rotate, flip, and
//! read/write net codes. [`Board`] captures exactly that surface as an
//! object-safe trait, so the engine can drive the real application's object
//! model through a thin wrapper at run time and [`MemBoard`] in tests.
//!
//! Coordinates are board-internal nanometres (y grows downwards), angles
//! are tenths of a degree; see [`units`] for conversions.

pub mod clone;
pub mod mem;
pub mod netmap;
pub mod units;

pub use clone::{
    clone_channels, find_marker_zones, replicate_refs, ChannelReport, CloneParams, CloneReport,
    GridSpec, Mirror, Placement,
};
pub use mem::MemBoard;
pub use netmap::NetMap;

use serde::Serialize;
use thiserror::Error;

/// Errors raised by the clone engine.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("no marker zone on layer {0:?}")]
    NoMarkerZone(Layer),

    #[error("anchor reference {0} is not inside the source area")]
    UnknownAnchor(String),
}

/// A point in board-internal units (nanometres).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Pt {
    pub x: i64,
    pub y: i64,
}

impl Pt {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// An axis-aligned rectangle: origin plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Rect {
    pub origin: Pt,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub const fn new(origin: Pt, width: i64, height: i64) -> Self {
        Self { origin, width, height }
    }

    pub fn from_corners(a: Pt, b: Pt) -> Self {
        let origin = Pt::new(a.x.min(b.x), a.y.min(b.y));
        Self::new(origin, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    pub fn end(&self) -> Pt {
        Pt::new(self.origin.x + self.width, self.origin.y + self.height)
    }

    pub fn contains(&self, p: Pt) -> bool {
        let end = self.end();
        p.x >= self.origin.x && p.x <= end.x && p.y >= self.origin.y && p.y <= end.y
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        let (ae, be) = (self.end(), other.end());
        self.origin.x <= be.x && other.origin.x <= ae.x && self.origin.y <= be.y && other.origin.y <= ae.y
    }

    /// Bounding box of this rectangle rotated about `center`.
    pub fn rotated_bbox(&self, center: Pt, decideg: f64) -> Rect {
        let end = self.end();
        let corners = [
            self.origin,
            Pt::new(end.x, self.origin.y),
            end,
            Pt::new(self.origin.x, end.y),
        ]
        .map(|c| rotate_point(c, center, decideg));
        let min = Pt::new(
            corners.iter().map(|c| c.x).min().unwrap(),
            corners.iter().map(|c| c.y).min().unwrap(),
        );
        let max = Pt::new(
            corners.iter().map(|c| c.x).max().unwrap(),
            corners.iter().map(|c| c.y).max().unwrap(),
        );
        Rect::from_corners(min, max)
    }
}

/// Rotate `p` about `center` by tenths of a degree (positive is
/// counter-clockwise on screen, the board's y axis growing downwards).
pub fn rotate_point(p: Pt, center: Pt, decideg: f64) -> Pt {
    let rad = (decideg / 10.0).to_radians();
    let (sin, cos) = rad.sin_cos();
    let dx = (p.x - center.x) as f64;
    let dy = (p.y - center.y) as f64;
    Pt::new(
        center.x + (dx * cos + dy * sin).round() as i64,
        center.y + (-dx * sin + dy * cos).round() as i64,
    )
}

/// Normalize an angle in decidegrees to the half-open range (-1800, +1800].
pub fn normalize_angle(mut decideg: f64) -> f64 {
    while decideg <= -1800.0 {
        decideg += 3600.0;
    }
    while decideg > 1800.0 {
        decideg -= 3600.0;
    }
    decideg
}

/// Board layers the engine cares about; everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Layer {
    FCu,
    BCu,
    FSilk,
    BSilk,
    EdgeCuts,
    /// User comments, the default marker layer for clone regions.
    CmtsUser,
    DwgsUser,
    Other(u8),
}

impl Layer {
    pub fn is_copper(&self) -> bool {
        matches!(self, Layer::FCu | Layer::BCu)
    }

    /// The same-position layer on the opposite board side.
    pub fn flipped(&self) -> Layer {
        match self {
            Layer::FCu => Layer::BCu,
            Layer::BCu => Layer::FCu,
            Layer::FSilk => Layer::BSilk,
            Layer::BSilk => Layer::FSilk,
            other => *other,
        }
    }
}

/// One pad of a footprint, in the footprint's stable pad order.
#[derive(Debug, Clone, Serialize)]
pub struct PadInfo {
    pub name: String,
    pub net_code: i32,
    pub net_name: String,
}

/// Opaque handle to a board item.
pub type ItemId = usize;

/// The host-editor surface the clone engine drives.
///
/// `duplicate` both clones the item and registers the clone with the board;
/// `remove` unregisters. Footprint-only operations (`orientation`, `pads`,
/// reference text) may panic for other item kinds; the engine only calls
/// them on footprints.
pub trait Board {
    fn footprints(&self) -> Vec<ItemId>;
    fn find_footprint(&self, reference: &str) -> Option<ItemId>;
    fn tracks(&self) -> Vec<ItemId>;
    fn zones(&self) -> Vec<ItemId>;
    fn drawings(&self) -> Vec<ItemId>;

    fn bounding_box(&self, item: ItemId) -> Rect;
    fn hit_test(&self, item: ItemId, rect: &Rect) -> bool;
    fn duplicate(&mut self, item: ItemId) -> ItemId;
    fn remove(&mut self, item: ItemId);

    fn reference(&self, footprint: ItemId) -> String;
    fn position(&self, item: ItemId) -> Pt;
    fn set_position(&mut self, item: ItemId, pos: Pt);
    fn orientation(&self, footprint: ItemId) -> f64;
    fn set_orientation(&mut self, footprint: ItemId, decideg: f64);
    fn layer(&self, item: ItemId) -> Layer;
    fn is_on_copper(&self, item: ItemId) -> bool;
    fn flip(&mut self, item: ItemId, about: Pt);
    fn move_by(&mut self, item: ItemId, delta: Pt);
    fn rotate(&mut self, item: ItemId, center: Pt, decideg: f64);

    fn net_code(&self, item: ItemId) -> i32;
    fn set_net_code(&mut self, item: ItemId, net_code: i32);
    fn net_name(&self, net_code: i32) -> String;
    fn pads(&self, footprint: ItemId) -> Vec<PadInfo>;

    fn track_ends(&self, track: ItemId) -> (Pt, Pt);
    fn set_track_ends(&mut self, track: ItemId, start: Pt, end: Pt);
    fn zone_corners(&self, zone: ItemId) -> Vec<Pt>;
    fn set_zone_corner(&mut self, zone: ItemId, index: usize, corner: Pt);

    fn reference_text_position(&self, footprint: ItemId) -> Pt;
    fn set_reference_text_position(&mut self, footprint: ItemId, pos: Pt);
    fn reference_text_orientation(&self, footprint: ItemId) -> f64;
    fn set_reference_text_orientation(&mut self, footprint: ItemId, decideg: f64);
}
