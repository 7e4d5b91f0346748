//! Geometry-preserving clone of a board region onto equivalent channels.

use std::collections::{BTreeMap, HashMap};

use crate::netmap::NetMap;
use crate::{normalize_angle, Board, BoardError, ItemId, Layer, Pt, Rect};

/// How clones are mirrored relative to the source region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mirror {
    #[default]
    None,
    /// Mirror across the source region's vertical midline.
    Vertical,
    /// Mirror across the source region's horizontal midline.
    Horizontal,
    /// Both, i.e. a 180° point reflection.
    Diagonal,
}

/// Row-major placement grid for channels cloned without an anchor.
#[derive(Debug, Clone)]
pub struct GridSpec {
    /// Where the first clone's region origin lands.
    pub start: Pt,
    /// Clones per row.
    pub xdim: usize,
    pub dx: i64,
    pub dy: i64,
}

/// How each channel's offset and rotation are determined.
#[derive(Debug, Clone)]
pub enum Placement {
    /// Derive offset and rotation from this source reference and its
    /// equivalent in each channel.
    Anchor(String),
    /// March across a fixed grid, no rotation.
    Grid(GridSpec),
}

#[derive(Debug, Clone)]
pub struct CloneParams {
    pub placement: Placement,
    pub mirror: Mirror,
    /// Remove existing tracks/zones/drawings inside each target region
    /// before cloning.
    pub cleanup: bool,
    /// Unset for a cleanup-only run.
    pub clone_items: bool,
}

/// Per-channel outcome.
#[derive(Debug, Default, Clone)]
pub struct ChannelReport {
    pub path: String,
    pub footprints: usize,
    pub tracks: usize,
    pub zones: usize,
    pub drawings: usize,
    pub removed: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
pub struct CloneReport {
    pub source_rect: Rect,
    pub source_refs: Vec<String>,
    pub channels: Vec<ChannelReport>,
}

/// Zones on the marker layer are candidate clone-source regions.
pub fn find_marker_zones(board: &dyn Board, layer: Layer) -> Vec<ItemId> {
    board
        .zones()
        .into_iter()
        .filter(|&zone| board.layer(zone) == layer)
        .collect()
}

/// Clone everything inside `src_zone`'s bounding box onto each channel.
///
/// `channels` pairs an AR path (for reporting) with the seed-reference →
/// equivalent-reference map produced by the channel resolver.
pub fn clone_channels(
    board: &mut dyn Board,
    src_zone: ItemId,
    channels: &[(String, HashMap<String, String>)],
    params: &CloneParams,
) -> Result<CloneReport, BoardError> {
    let src_rect = board.bounding_box(src_zone);
    let src_end = src_rect.end();

    // Footprints inside the source region, keyed by reference for
    // deterministic cloning order.
    let mut src_modules: BTreeMap<String, ItemId> = BTreeMap::new();
    for footprint in board.footprints() {
        if board.hit_test(footprint, &src_rect) {
            src_modules.insert(board.reference(footprint), footprint);
        }
    }
    log::info!(
        "{} footprint(s) in the clone region: {}",
        src_modules.len(),
        src_modules.keys().cloned().collect::<Vec<_>>().join(", ")
    );

    // Split every other item class into "inside the region" (to clone) and
    // "outside" (cleanup candidates).
    let mut src_tracks = Vec::new();
    let mut other_tracks = Vec::new();
    for track in board.tracks() {
        if board.hit_test(track, &src_rect) {
            src_tracks.push(track);
        } else {
            other_tracks.push(track);
        }
    }
    let mut src_zones = Vec::new();
    let mut other_zones = Vec::new();
    for zone in board.zones() {
        if zone == src_zone {
            continue;
        }
        if board.hit_test(zone, &src_rect) {
            src_zones.push(zone);
        } else {
            other_zones.push(zone);
        }
    }
    let mut src_drawings = Vec::new();
    let mut other_drawings = Vec::new();
    for drawing in board.drawings() {
        if board.hit_test(drawing, &src_rect) {
            src_drawings.push(drawing);
        } else {
            other_drawings.push(drawing);
        }
    }

    let anchor = match &params.placement {
        Placement::Anchor(reference) => {
            let module = src_modules
                .get(reference)
                .copied()
                .ok_or_else(|| BoardError::UnknownAnchor(reference.clone()))?;
            Some((reference.clone(), module))
        }
        Placement::Grid(_) => None,
    };

    let mut report = CloneReport {
        source_rect: src_rect,
        source_refs: src_modules.keys().cloned().collect(),
        channels: Vec::new(),
    };

    let mut x_count = 0usize;
    let mut cur = Pt::default();
    if let Placement::Grid(grid) = &params.placement {
        cur = Pt::new(
            grid.start.x - src_rect.origin.x,
            grid.start.y - grid.dy - src_rect.origin.y,
        );
    }

    for (path, ref_map) in channels {
        let mut channel = ChannelReport { path: path.clone(), ..ChannelReport::default() };
        log::info!("cloning channel {path}");

        let (offset, rotation, rot_origin) = match &anchor {
            Some((anchor_ref, anchor_module)) => {
                let Some(clone_ref) = ref_map.get(anchor_ref) else {
                    channel
                        .warnings
                        .push(format!("no equivalent of origin reference {anchor_ref}"));
                    report.channels.push(channel);
                    continue;
                };
                let Some(clone_module) = board.find_footprint(clone_ref) else {
                    channel
                        .warnings
                        .push(format!("cannot find footprint with reference {clone_ref}"));
                    report.channels.push(channel);
                    continue;
                };
                let rotation = normalize_angle(
                    (board.orientation(clone_module) - board.orientation(*anchor_module)).round(),
                );
                let rot_origin = board.position(clone_module);
                (rot_origin - board.position(*anchor_module), rotation, rot_origin)
            }
            None => {
                let Placement::Grid(grid) = &params.placement else {
                    unreachable!()
                };
                if x_count == 0 {
                    cur.x = grid.start.x - src_rect.origin.x;
                    cur.y += grid.dy;
                } else {
                    cur.x += grid.dx;
                }
                (cur, 0.0, src_rect.origin)
            }
        };

        if params.cleanup {
            let mut clone_rect =
                Rect::new(src_rect.origin + offset, src_rect.width, src_rect.height);
            if rotation != 0.0 {
                clone_rect = clone_rect.rotated_bbox(rot_origin, rotation);
            }
            for pool in [&mut other_tracks, &mut other_zones, &mut other_drawings] {
                pool.retain(|&item| {
                    if board.hit_test(item, &clone_rect) {
                        board.remove(item);
                        channel.removed += 1;
                        false
                    } else {
                        true
                    }
                });
            }
        }

        if params.clone_items {
            let mut pairs: Vec<(ItemId, ItemId)> = Vec::new();
            for (reference, &module) in &src_modules {
                let Some(clone_ref) = ref_map.get(reference) else {
                    channel
                        .warnings
                        .push(format!("{reference} has no equivalent, skipped"));
                    continue;
                };
                let Some(clone_module) = board.find_footprint(clone_ref) else {
                    channel
                        .warnings
                        .push(format!("cannot find footprint with reference {clone_ref}"));
                    continue;
                };

                let src_pos = board.position(module);
                if board.layer(clone_module) != board.layer(module) {
                    board.flip(clone_module, src_pos);
                }
                match params.mirror {
                    Mirror::None => {
                        board.set_position(clone_module, offset + src_pos);
                        board.set_orientation(clone_module, board.orientation(module));
                        if rotation != 0.0 {
                            board.rotate(clone_module, rot_origin, rotation);
                        }
                    }
                    Mirror::Vertical => {
                        board.set_position(
                            clone_module,
                            Pt::new(
                                offset.x + src_rect.origin.x + src_end.x - src_pos.x,
                                offset.y + src_pos.y,
                            ),
                        );
                        board.set_orientation(clone_module, board.orientation(module) + 1800.0);
                    }
                    Mirror::Horizontal => {
                        board.set_position(
                            clone_module,
                            Pt::new(
                                offset.x + src_pos.x,
                                offset.y + src_rect.origin.y + src_end.y - src_pos.y,
                            ),
                        );
                        board.set_orientation(clone_module, board.orientation(module));
                    }
                    Mirror::Diagonal => {
                        board.set_position(
                            clone_module,
                            Pt::new(
                                offset.x + src_rect.origin.x + src_end.x - src_pos.x,
                                offset.y + src_rect.origin.y + src_end.y - src_pos.y,
                            ),
                        );
                        board.set_orientation(clone_module, board.orientation(module) + 1800.0);
                    }
                }
                pairs.push((module, clone_module));
                channel.footprints += 1;
            }

            let mut nets = NetMap::new(pairs);

            for &track in &src_tracks {
                let net_code = board.net_code(track);
                let net_name = board.net_name(net_code);
                let Some(clone_net) = nets.equivalent(&*board, net_code, &net_name) else {
                    channel
                        .warnings
                        .push(format!("no equivalent net for {net_name}, track skipped"));
                    continue;
                };
                let clone_track = board.duplicate(track);
                board.set_net_code(clone_track, clone_net);
                transform_track(board, clone_track, offset, rotation, rot_origin, &src_rect, params.mirror);
                channel.tracks += 1;
            }

            for &drawing in &src_drawings {
                let clone_drawing = board.duplicate(drawing);
                board.move_by(clone_drawing, offset);
                channel.drawings += 1;
            }

            for &zone in &src_zones {
                let clone_zone = if board.is_on_copper(zone) {
                    let net_code = board.net_code(zone);
                    let net_name = board.net_name(net_code);
                    let Some(clone_net) = nets.equivalent(&*board, net_code, &net_name) else {
                        channel
                            .warnings
                            .push(format!("no equivalent net for {net_name}, zone skipped"));
                        continue;
                    };
                    let clone_zone = board.duplicate(zone);
                    board.set_net_code(clone_zone, clone_net);
                    clone_zone
                } else {
                    board.duplicate(zone)
                };
                transform_zone(board, clone_zone, offset, rotation, rot_origin, &src_rect, params.mirror);
                channel.zones += 1;
            }
        }

        x_count += 1;
        if let Placement::Grid(grid) = &params.placement {
            if x_count >= grid.xdim.max(1) {
                x_count = 0;
            }
        }
        report.channels.push(channel);
    }
    Ok(report)
}

fn transform_track(
    board: &mut dyn Board,
    track: ItemId,
    offset: Pt,
    rotation: f64,
    rot_origin: Pt,
    src_rect: &Rect,
    mirror: Mirror,
) {
    let (start, end) = board.track_ends(track);
    let src_end = src_rect.end();
    let x_sum = src_rect.origin.x + src_end.x;
    let y_sum = src_rect.origin.y + src_end.y;
    match mirror {
        Mirror::None => {
            board.move_by(track, offset);
            if rotation != 0.0 {
                board.rotate(track, rot_origin, rotation);
            }
        }
        Mirror::Vertical => board.set_track_ends(
            track,
            Pt::new(offset.x + x_sum - start.x, offset.y + start.y),
            Pt::new(offset.x + x_sum - end.x, offset.y + end.y),
        ),
        Mirror::Horizontal => board.set_track_ends(
            track,
            Pt::new(offset.x + start.x, offset.y + y_sum - start.y),
            Pt::new(offset.x + end.x, offset.y + y_sum - end.y),
        ),
        Mirror::Diagonal => board.set_track_ends(
            track,
            Pt::new(offset.x + x_sum - start.x, offset.y + y_sum - start.y),
            Pt::new(offset.x + x_sum - end.x, offset.y + y_sum - end.y),
        ),
    }
}

fn transform_zone(
    board: &mut dyn Board,
    zone: ItemId,
    offset: Pt,
    rotation: f64,
    rot_origin: Pt,
    src_rect: &Rect,
    mirror: Mirror,
) {
    let src_end = src_rect.end();
    let x_adj = offset.x + src_rect.origin.x + src_end.x;
    let y_adj = offset.y + src_rect.origin.y + src_end.y;
    match mirror {
        Mirror::None => {
            board.move_by(zone, offset);
            if rotation != 0.0 {
                board.rotate(zone, rot_origin, rotation);
            }
        }
        Mirror::Vertical => {
            for (index, corner) in board.zone_corners(zone).into_iter().enumerate() {
                board.set_zone_corner(zone, index, Pt::new(x_adj - corner.x, offset.y + corner.y));
            }
        }
        Mirror::Horizontal => {
            for (index, corner) in board.zone_corners(zone).into_iter().enumerate() {
                board.set_zone_corner(zone, index, Pt::new(offset.x + corner.x, y_adj - corner.y));
            }
        }
        Mirror::Diagonal => {
            for (index, corner) in board.zone_corners(zone).into_iter().enumerate() {
                board.set_zone_corner(zone, index, Pt::new(x_adj - corner.x, y_adj - corner.y));
            }
        }
    }
}

/// Copy the silkscreen reference-text placement from each source footprint
/// to its equivalent in every channel, keeping the text's offset relative
/// to the footprint.
pub fn replicate_refs(
    board: &mut dyn Board,
    src_zone: ItemId,
    channels: &[(String, HashMap<String, String>)],
) -> CloneReport {
    let src_rect = board.bounding_box(src_zone);
    let mut src_modules: BTreeMap<String, ItemId> = BTreeMap::new();
    for footprint in board.footprints() {
        if board.hit_test(footprint, &src_rect) {
            src_modules.insert(board.reference(footprint), footprint);
        }
    }

    let mut report = CloneReport {
        source_rect: src_rect,
        source_refs: src_modules.keys().cloned().collect(),
        channels: Vec::new(),
    };

    for (path, ref_map) in channels {
        let mut channel = ChannelReport { path: path.clone(), ..ChannelReport::default() };
        for (reference, &module) in &src_modules {
            let Some(clone_ref) = ref_map.get(reference) else {
                channel
                    .warnings
                    .push(format!("{reference} has no equivalent, skipped"));
                continue;
            };
            let Some(clone_module) = board.find_footprint(clone_ref) else {
                channel
                    .warnings
                    .push(format!("cannot find footprint with reference {clone_ref}"));
                continue;
            };

            // Align orientations while copying so the text offset transfers
            // into the equivalent footprint's frame.
            let saved = board.orientation(clone_module);
            board.set_orientation(clone_module, board.orientation(module));
            let text_pos = board.reference_text_position(module) - board.position(module)
                + board.position(clone_module);
            board.set_reference_text_position(clone_module, text_pos);
            board.set_reference_text_orientation(
                clone_module,
                board.reference_text_orientation(module),
            );
            board.set_orientation(clone_module, saved);
            channel.footprints += 1;
        }
        report.channels.push(channel);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemBoard;
    use crate::units::from_mm;

    fn mm(v: f64) -> i64 {
        from_mm(v)
    }

    /// A board with one source cell (U1/R1, net 1 track) and one target
    /// channel (U101/R101, nets 11). The marker zone spans the source cell.
    fn setup() -> (MemBoard, ItemId, Vec<(String, HashMap<String, String>)>) {
        let mut board = MemBoard::new();
        board.add_net(1, "OUT");
        board.add_net(11, "OUT_B");

        board.add_footprint("U1", Pt::new(mm(10.0), mm(10.0)), 0.0, Layer::FCu, &[("1", 1)]);
        board.add_footprint("R1", Pt::new(mm(14.0), mm(12.0)), 900.0, Layer::FCu, &[("1", 1)]);
        // Target channel parts parked outside the source region.
        board.add_footprint("U101", Pt::new(mm(50.0), mm(50.0)), 0.0, Layer::FCu, &[("1", 11)]);
        board.add_footprint("R101", Pt::new(mm(60.0), mm(50.0)), 0.0, Layer::FCu, &[("1", 11)]);

        board.add_track(Pt::new(mm(10.0), mm(10.0)), Pt::new(mm(14.0), mm(12.0)), 1, Layer::FCu);

        let marker = board.add_zone(
            &[Pt::new(mm(8.0), mm(8.0)), Pt::new(mm(16.0), mm(8.0)), Pt::new(mm(16.0), mm(14.0)), Pt::new(mm(8.0), mm(14.0))],
            0,
            Layer::CmtsUser,
        );

        let map: HashMap<String, String> = [("U1", "U101"), ("R1", "R101")]
            .into_iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        (board, marker, vec![("CH2".to_string(), map)])
    }

    fn grid_params(start: Pt) -> CloneParams {
        CloneParams {
            placement: Placement::Grid(GridSpec { start, xdim: 1, dx: 0, dy: mm(20.0) }),
            mirror: Mirror::None,
            cleanup: false,
            clone_items: true,
        }
    }

    #[test]
    fn test_marker_zone_discovery() {
        let (board, marker, _) = setup();
        assert_eq!(find_marker_zones(&board, Layer::CmtsUser), vec![marker]);
        assert!(find_marker_zones(&board, Layer::DwgsUser).is_empty());
    }

    #[test]
    fn test_grid_clone_moves_equivalents_by_offset() {
        let (mut board, marker, channels) = setup();
        // Region origin is (8, 8); land the clone at (8, 28): offset (0, 20).
        let report =
            clone_channels(&mut board, marker, &channels, &grid_params(Pt::new(mm(8.0), mm(28.0))))
                .unwrap();

        assert_eq!(report.source_refs, vec!["R1", "U1"]);
        let channel = &report.channels[0];
        assert_eq!(channel.footprints, 2);
        assert_eq!(channel.tracks, 1);
        assert!(channel.warnings.is_empty(), "{:?}", channel.warnings);

        let u101 = board.find_footprint("U101").unwrap();
        assert_eq!(board.position(u101), Pt::new(mm(10.0), mm(30.0)));
        assert_eq!(board.orientation(u101), 0.0);
        let r101 = board.find_footprint("R101").unwrap();
        assert_eq!(board.position(r101), Pt::new(mm(14.0), mm(32.0)));
        assert_eq!(board.orientation(r101), 900.0);

        // The cloned track follows and carries the equivalent net.
        let tracks = board.tracks();
        assert_eq!(tracks.len(), 2);
        let clone_track = tracks[1];
        assert_eq!(board.net_code(clone_track), 11);
        assert_eq!(
            board.track_ends(clone_track),
            (Pt::new(mm(10.0), mm(30.0)), Pt::new(mm(14.0), mm(32.0)))
        );
    }

    #[test]
    fn test_anchor_clone_rotates_about_target() {
        let (mut board, marker, channels) = setup();
        // Rotate the target anchor a quarter turn.
        let u101 = board.find_footprint("U101").unwrap();
        board.set_orientation(u101, 900.0);

        let params = CloneParams {
            placement: Placement::Anchor("U1".to_string()),
            mirror: Mirror::None,
            cleanup: false,
            clone_items: true,
        };
        clone_channels(&mut board, marker, &channels, &params).unwrap();

        // Anchor stays put (offset maps U1 onto U101, rotation about U101).
        assert_eq!(board.position(u101), Pt::new(mm(50.0), mm(50.0)));
        // R1 is at U1 + (4, 2); rotated 90° ccw about the anchor that lands
        // at U101 + (2, -4).
        let r101 = board.find_footprint("R101").unwrap();
        assert_eq!(board.position(r101), Pt::new(mm(52.0), mm(46.0)));
        assert_eq!(board.orientation(r101), 900.0 + 900.0);
    }

    #[test]
    fn test_vertical_mirror_reflects_x_and_flips_orientation() {
        let (mut board, marker, channels) = setup();
        let params = CloneParams {
            mirror: Mirror::Vertical,
            ..grid_params(Pt::new(mm(8.0), mm(28.0)))
        };
        clone_channels(&mut board, marker, &channels, &params).unwrap();

        // x reflects about the region midline (8+16 = 24), y just offsets.
        let u101 = board.find_footprint("U101").unwrap();
        assert_eq!(board.position(u101), Pt::new(mm(14.0), mm(30.0)));
        assert_eq!(board.orientation(u101), 1800.0);
        let r101 = board.find_footprint("R101").unwrap();
        assert_eq!(board.position(r101), Pt::new(mm(10.0), mm(32.0)));
        assert_eq!(board.orientation(r101), 900.0 + 1800.0);

        let tracks = board.tracks();
        let clone_track = tracks[1];
        assert_eq!(
            board.track_ends(clone_track),
            (Pt::new(mm(14.0), mm(30.0)), Pt::new(mm(10.0), mm(32.0)))
        );
    }

    #[test]
    fn test_diagonal_mirror_is_point_reflection() {
        let (mut board, marker, channels) = setup();
        let params = CloneParams {
            mirror: Mirror::Diagonal,
            ..grid_params(Pt::new(mm(8.0), mm(28.0)))
        };
        clone_channels(&mut board, marker, &channels, &params).unwrap();

        // x reflects about 24, y about (8+14) + offset 20.
        let u101 = board.find_footprint("U101").unwrap();
        assert_eq!(board.position(u101), Pt::new(mm(14.0), mm(32.0)));
        assert_eq!(board.orientation(u101), 1800.0);
    }

    #[test]
    fn test_cleanup_removes_items_in_target_region() {
        let (mut board, marker, channels) = setup();
        // Junk track sitting where the clone will land.
        let junk =
            board.add_track(Pt::new(mm(9.0), mm(29.0)), Pt::new(mm(10.0), mm(29.0)), 1, Layer::FCu);
        let params = CloneParams {
            cleanup: true,
            ..grid_params(Pt::new(mm(8.0), mm(28.0)))
        };
        let report = clone_channels(&mut board, marker, &channels, &params).unwrap();
        assert_eq!(report.channels[0].removed, 1);
        assert!(!board.tracks().contains(&junk));
    }

    #[test]
    fn test_unknown_anchor_is_an_error() {
        let (mut board, marker, channels) = setup();
        let params = CloneParams {
            placement: Placement::Anchor("U9".to_string()),
            mirror: Mirror::None,
            cleanup: false,
            clone_items: true,
        };
        assert!(matches!(
            clone_channels(&mut board, marker, &channels, &params),
            Err(BoardError::UnknownAnchor(r)) if r == "U9"
        ));
    }

    #[test]
    fn test_missing_equivalent_footprint_warns_and_skips() {
        let (mut board, marker, mut channels) = setup();
        channels[0].1.remove("R1");
        let report =
            clone_channels(&mut board, marker, &channels, &grid_params(Pt::new(mm(8.0), mm(28.0))))
                .unwrap();
        let channel = &report.channels[0];
        assert_eq!(channel.footprints, 1);
        assert!(channel.warnings.iter().any(|w| w.contains("R1")));
    }

    #[test]
    fn test_replicate_refs_copies_text_placement() {
        let (mut board, marker, channels) = setup();
        let u1 = board.find_footprint("U1").unwrap();
        let u101 = board.find_footprint("U101").unwrap();
        board.set_reference_text_position(u1, Pt::new(mm(11.0), mm(9.0)));
        board.set_reference_text_orientation(u1, 900.0);

        let report = replicate_refs(&mut board, marker, &channels);
        assert_eq!(report.channels[0].footprints, 2);
        // Text offset relative to the footprint is preserved: U1 text is at
        // U1 + (1, -1), so U101 text lands at U101 + (1, -1).
        assert_eq!(
            board.reference_text_position(u101),
            Pt::new(mm(51.0), mm(49.0))
        );
        assert_eq!(board.reference_text_orientation(u101), 900.0);
    }
}
