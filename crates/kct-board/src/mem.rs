//! In-memory [`Board`] implementation.
//!
//! A deliberately small model: footprints are rectangles with ordered pads,
//! tracks are segments, zones are corner polygons, drawings are boxes. It
//! exists so the clone engine can be exercised without a host editor; the
//! native build wraps the application's object model instead.

use std::collections::HashMap;

use crate::{rotate_point, Board, ItemId, Layer, PadInfo, Pt, Rect};

#[derive(Debug, Clone)]
struct PadData {
    name: String,
    net_code: i32,
}

#[derive(Debug, Clone)]
struct FootprintData {
    reference: String,
    pos: Pt,
    orientation: f64,
    layer: Layer,
    width: i64,
    height: i64,
    pads: Vec<PadData>,
    /// Reference text, kept relative to `pos` like the host editor does.
    text_offset: Pt,
    text_orientation: f64,
}

#[derive(Debug, Clone)]
struct TrackData {
    start: Pt,
    end: Pt,
    net_code: i32,
    layer: Layer,
}

#[derive(Debug, Clone)]
struct ZoneData {
    corners: Vec<Pt>,
    net_code: i32,
    layer: Layer,
}

#[derive(Debug, Clone)]
struct DrawingData {
    bbox: Rect,
    layer: Layer,
}

#[derive(Debug, Clone)]
enum Item {
    Footprint(FootprintData),
    Track(TrackData),
    Zone(ZoneData),
    Drawing(DrawingData),
}

/// A stand-in board backed by plain vectors.
#[derive(Debug, Default)]
pub struct MemBoard {
    items: Vec<Option<Item>>,
    nets: HashMap<i32, String>,
}

impl MemBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_net(&mut self, net_code: i32, name: &str) {
        self.nets.insert(net_code, name.to_string());
    }

    pub fn add_footprint(
        &mut self,
        reference: &str,
        pos: Pt,
        orientation: f64,
        layer: Layer,
        pads: &[(&str, i32)],
    ) -> ItemId {
        self.push(Item::Footprint(FootprintData {
            reference: reference.to_string(),
            pos,
            orientation,
            layer,
            width: 1_000_000,
            height: 1_000_000,
            pads: pads
                .iter()
                .map(|(name, net_code)| PadData { name: name.to_string(), net_code: *net_code })
                .collect(),
            text_offset: Pt::new(0, -1_000_000),
            text_orientation: 0.0,
        }))
    }

    pub fn add_track(&mut self, start: Pt, end: Pt, net_code: i32, layer: Layer) -> ItemId {
        self.push(Item::Track(TrackData { start, end, net_code, layer }))
    }

    pub fn add_zone(&mut self, corners: &[Pt], net_code: i32, layer: Layer) -> ItemId {
        self.push(Item::Zone(ZoneData { corners: corners.to_vec(), net_code, layer }))
    }

    pub fn add_drawing(&mut self, bbox: Rect, layer: Layer) -> ItemId {
        self.push(Item::Drawing(DrawingData { bbox, layer }))
    }

    /// Number of live items, any kind.
    pub fn len(&self) -> usize {
        self.items.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, item: Item) -> ItemId {
        self.items.push(Some(item));
        self.items.len() - 1
    }

    fn item(&self, id: ItemId) -> &Item {
        self.items[id].as_ref().expect("item was removed")
    }

    fn item_mut(&mut self, id: ItemId) -> &mut Item {
        self.items[id].as_mut().expect("item was removed")
    }

    fn footprint(&self, id: ItemId) -> &FootprintData {
        match self.item(id) {
            Item::Footprint(fp) => fp,
            other => panic!("item {id} is not a footprint: {other:?}"),
        }
    }

    fn footprint_mut(&mut self, id: ItemId) -> &mut FootprintData {
        match self.item_mut(id) {
            Item::Footprint(fp) => fp,
            other => panic!("item {id} is not a footprint: {other:?}"),
        }
    }

    fn ids_of(&self, filter: impl Fn(&Item) -> bool) -> Vec<ItemId> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().filter(|item| filter(item)).map(|_| id))
            .collect()
    }
}

impl Board for MemBoard {
    fn footprints(&self) -> Vec<ItemId> {
        self.ids_of(|item| matches!(item, Item::Footprint(_)))
    }

    fn find_footprint(&self, reference: &str) -> Option<ItemId> {
        self.items.iter().enumerate().find_map(|(id, slot)| match slot {
            Some(Item::Footprint(fp)) if fp.reference == reference => Some(id),
            _ => None,
        })
    }

    fn tracks(&self) -> Vec<ItemId> {
        self.ids_of(|item| matches!(item, Item::Track(_)))
    }

    fn zones(&self) -> Vec<ItemId> {
        self.ids_of(|item| matches!(item, Item::Zone(_)))
    }

    fn drawings(&self) -> Vec<ItemId> {
        self.ids_of(|item| matches!(item, Item::Drawing(_)))
    }

    fn bounding_box(&self, item: ItemId) -> Rect {
        match self.item(item) {
            Item::Footprint(fp) => Rect::new(
                Pt::new(fp.pos.x - fp.width / 2, fp.pos.y - fp.height / 2),
                fp.width,
                fp.height,
            ),
            Item::Track(track) => Rect::from_corners(track.start, track.end),
            Item::Zone(zone) => {
                let min = Pt::new(
                    zone.corners.iter().map(|c| c.x).min().unwrap_or(0),
                    zone.corners.iter().map(|c| c.y).min().unwrap_or(0),
                );
                let max = Pt::new(
                    zone.corners.iter().map(|c| c.x).max().unwrap_or(0),
                    zone.corners.iter().map(|c| c.y).max().unwrap_or(0),
                );
                Rect::from_corners(min, max)
            }
            Item::Drawing(drawing) => drawing.bbox,
        }
    }

    fn hit_test(&self, item: ItemId, rect: &Rect) -> bool {
        rect.intersects(&self.bounding_box(item))
    }

    fn duplicate(&mut self, item: ItemId) -> ItemId {
        let clone = self.item(item).clone();
        self.push(clone)
    }

    fn remove(&mut self, item: ItemId) {
        self.items[item] = None;
    }

    fn reference(&self, footprint: ItemId) -> String {
        self.footprint(footprint).reference.clone()
    }

    fn position(&self, item: ItemId) -> Pt {
        match self.item(item) {
            Item::Footprint(fp) => fp.pos,
            Item::Track(track) => track.start,
            Item::Zone(zone) => zone.corners.first().copied().unwrap_or_default(),
            Item::Drawing(drawing) => drawing.bbox.origin,
        }
    }

    fn set_position(&mut self, item: ItemId, pos: Pt) {
        let delta = pos - self.position(item);
        self.move_by(item, delta);
    }

    fn orientation(&self, footprint: ItemId) -> f64 {
        self.footprint(footprint).orientation
    }

    fn set_orientation(&mut self, footprint: ItemId, decideg: f64) {
        self.footprint_mut(footprint).orientation = decideg;
    }

    fn layer(&self, item: ItemId) -> Layer {
        match self.item(item) {
            Item::Footprint(fp) => fp.layer,
            Item::Track(track) => track.layer,
            Item::Zone(zone) => zone.layer,
            Item::Drawing(drawing) => drawing.layer,
        }
    }

    fn is_on_copper(&self, item: ItemId) -> bool {
        self.layer(item).is_copper()
    }

    fn flip(&mut self, item: ItemId, about: Pt) {
        match self.item_mut(item) {
            Item::Footprint(fp) => {
                fp.pos.y = 2 * about.y - fp.pos.y;
                fp.layer = fp.layer.flipped();
                fp.orientation = -fp.orientation;
            }
            Item::Track(track) => {
                track.start.y = 2 * about.y - track.start.y;
                track.end.y = 2 * about.y - track.end.y;
                track.layer = track.layer.flipped();
            }
            Item::Zone(zone) => {
                for corner in &mut zone.corners {
                    corner.y = 2 * about.y - corner.y;
                }
                zone.layer = zone.layer.flipped();
            }
            Item::Drawing(drawing) => {
                let end_y = 2 * about.y - drawing.bbox.origin.y;
                drawing.bbox.origin.y = end_y - drawing.bbox.height;
                drawing.layer = drawing.layer.flipped();
            }
        }
    }

    fn move_by(&mut self, item: ItemId, delta: Pt) {
        match self.item_mut(item) {
            Item::Footprint(fp) => fp.pos = fp.pos + delta,
            Item::Track(track) => {
                track.start = track.start + delta;
                track.end = track.end + delta;
            }
            Item::Zone(zone) => {
                for corner in &mut zone.corners {
                    *corner = *corner + delta;
                }
            }
            Item::Drawing(drawing) => drawing.bbox.origin = drawing.bbox.origin + delta,
        }
    }

    fn rotate(&mut self, item: ItemId, center: Pt, decideg: f64) {
        match self.item_mut(item) {
            Item::Footprint(fp) => {
                fp.pos = rotate_point(fp.pos, center, decideg);
                fp.orientation += decideg;
            }
            Item::Track(track) => {
                track.start = rotate_point(track.start, center, decideg);
                track.end = rotate_point(track.end, center, decideg);
            }
            Item::Zone(zone) => {
                for corner in &mut zone.corners {
                    *corner = rotate_point(*corner, center, decideg);
                }
            }
            Item::Drawing(drawing) => {
                drawing.bbox.origin = rotate_point(drawing.bbox.origin, center, decideg);
            }
        }
    }

    fn net_code(&self, item: ItemId) -> i32 {
        match self.item(item) {
            Item::Track(track) => track.net_code,
            Item::Zone(zone) => zone.net_code,
            _ => 0,
        }
    }

    fn set_net_code(&mut self, item: ItemId, net_code: i32) {
        match self.item_mut(item) {
            Item::Track(track) => track.net_code = net_code,
            Item::Zone(zone) => zone.net_code = net_code,
            _ => {}
        }
    }

    fn net_name(&self, net_code: i32) -> String {
        self.nets.get(&net_code).cloned().unwrap_or_default()
    }

    fn pads(&self, footprint: ItemId) -> Vec<PadInfo> {
        self.footprint(footprint)
            .pads
            .iter()
            .map(|pad| PadInfo {
                name: pad.name.clone(),
                net_code: pad.net_code,
                net_name: self.net_name(pad.net_code),
            })
            .collect()
    }

    fn track_ends(&self, track: ItemId) -> (Pt, Pt) {
        match self.item(track) {
            Item::Track(t) => (t.start, t.end),
            other => panic!("item {track} is not a track: {other:?}"),
        }
    }

    fn set_track_ends(&mut self, track: ItemId, start: Pt, end: Pt) {
        match self.item_mut(track) {
            Item::Track(t) => {
                t.start = start;
                t.end = end;
            }
            other => panic!("item {track} is not a track: {other:?}"),
        }
    }

    fn zone_corners(&self, zone: ItemId) -> Vec<Pt> {
        match self.item(zone) {
            Item::Zone(z) => z.corners.clone(),
            other => panic!("item {zone} is not a zone: {other:?}"),
        }
    }

    fn set_zone_corner(&mut self, zone: ItemId, index: usize, corner: Pt) {
        match self.item_mut(zone) {
            Item::Zone(z) => z.corners[index] = corner,
            other => panic!("item {zone} is not a zone: {other:?}"),
        }
    }

    fn reference_text_position(&self, footprint: ItemId) -> Pt {
        let fp = self.footprint(footprint);
        fp.pos + fp.text_offset
    }

    fn set_reference_text_position(&mut self, footprint: ItemId, pos: Pt) {
        let anchor = self.footprint(footprint).pos;
        self.footprint_mut(footprint).text_offset = pos - anchor;
    }

    fn reference_text_orientation(&self, footprint: ItemId) -> f64 {
        self.footprint(footprint).text_orientation
    }

    fn set_reference_text_orientation(&mut self, footprint: ItemId, decideg: f64) {
        self.footprint_mut(footprint).text_orientation = decideg;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_and_removal() {
        let mut board = MemBoard::new();
        let fp = board.add_footprint("U1", Pt::new(0, 0), 0.0, Layer::FCu, &[("1", 1)]);
        let track = board.add_track(Pt::new(0, 0), Pt::new(10, 0), 1, Layer::FCu);
        assert_eq!(board.footprints(), vec![fp]);
        assert_eq!(board.tracks(), vec![track]);
        assert_eq!(board.find_footprint("U1"), Some(fp));
        assert_eq!(board.find_footprint("U2"), None);

        let copy = board.duplicate(track);
        assert_eq!(board.tracks(), vec![track, copy]);
        board.remove(track);
        assert_eq!(board.tracks(), vec![copy]);
    }

    #[test]
    fn test_footprint_bbox_and_hit() {
        let mut board = MemBoard::new();
        let fp = board.add_footprint("U1", Pt::new(5_000_000, 5_000_000), 0.0, Layer::FCu, &[]);
        let area = Rect::new(Pt::new(0, 0), 10_000_000, 10_000_000);
        assert!(board.hit_test(fp, &area));
        let far = Rect::new(Pt::new(20_000_000, 0), 1_000_000, 1_000_000);
        assert!(!board.hit_test(fp, &far));
    }

    #[test]
    fn test_flip_swaps_layer() {
        let mut board = MemBoard::new();
        let fp = board.add_footprint("U1", Pt::new(0, 100), 450.0, Layer::FCu, &[]);
        board.flip(fp, Pt::new(0, 0));
        assert_eq!(board.layer(fp), Layer::BCu);
        assert_eq!(board.position(fp), Pt::new(0, -100));
        assert_eq!(board.orientation(fp), -450.0);
    }

    #[test]
    fn test_set_position_translates_any_item() {
        let mut board = MemBoard::new();
        let zone = board.add_zone(
            &[Pt::new(0, 0), Pt::new(10, 0), Pt::new(10, 10)],
            1,
            Layer::FCu,
        );
        board.set_position(zone, Pt::new(5, 5));
        assert_eq!(
            board.zone_corners(zone),
            vec![Pt::new(5, 5), Pt::new(15, 5), Pt::new(15, 15)]
        );
    }

    #[test]
    fn test_reference_text_tracks_footprint() {
        let mut board = MemBoard::new();
        let fp = board.add_footprint("U1", Pt::new(100, 100), 0.0, Layer::FCu, &[]);
        board.set_reference_text_position(fp, Pt::new(150, 80));
        board.move_by(fp, Pt::new(10, 0));
        assert_eq!(board.reference_text_position(fp), Pt::new(160, 80));
    }
}
