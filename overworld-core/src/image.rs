//! Base image access: raw bytes plus the fixed layouts the vanilla biomes
//! copy from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalogue::locations_for;
use crate::region::RegionKind;
use crate::terrain::{Pos, Terrain, TerrainGrid};
use crate::{RandomiserError, Result};

const NO_POSITION: u8 = 0xFF;

/// A region's fixed grid and the cell of each catalogue entry, indexed in
/// catalogue order. Anchored entries have no cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VanillaLayout {
    pub grid: TerrainGrid,
    pub positions: Vec<Option<Pos>>,
}

pub trait BaseImage {
    fn bytes(&self) -> &[u8];
    fn vanilla_layout(&self, kind: RegionKind) -> Result<VanillaLayout>;
}

/// Layouts held in memory.
#[derive(Clone, Debug, Default)]
pub struct GridImage {
    bytes: Vec<u8>,
    layouts: BTreeMap<RegionKind, VanillaLayout>,
}

impl GridImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            layouts: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, kind: RegionKind, layout: VanillaLayout) {
        self.layouts.insert(kind, layout);
    }

    /// Open fields ringed by water with every location on a sparse lattice,
    /// for dry runs without a real image.
    pub fn synthetic() -> Self {
        let mut image = GridImage::new(b"synthetic overworld".to_vec());
        for kind in RegionKind::ALL {
            image.insert(kind, synthetic_layout(kind));
        }
        image
    }
}

fn synthetic_layout(kind: RegionKind) -> VanillaLayout {
    let params = kind.params();
    let mut grid = TerrainGrid::new(params.rows, params.cols, Terrain::Grass);
    grid.draw_border(Terrain::Water);

    let step = 4;
    let (rows, cols) = (params.rows, params.cols);
    let mut cells = (1..)
        .map(move |row| row * step)
        .take_while(move |y| *y < rows - 2)
        .flat_map(move |y| {
            (1..)
                .map(move |col| col * step)
                .take_while(move |x| *x < cols - 2)
                .map(move |x| Pos::new(x, y))
        });

    let mut positions = Vec::new();
    for spec in locations_for(kind) {
        if spec.anchor.is_some() {
            positions.push(None);
            continue;
        }
        let pos = cells.next();
        if let Some(pos) = pos {
            grid.set(pos, spec.terrain);
        }
        positions.push(pos);
    }
    VanillaLayout { grid, positions }
}

impl BaseImage for GridImage {
    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn vanilla_layout(&self, kind: RegionKind) -> Result<VanillaLayout> {
        self.layouts
            .get(&kind)
            .cloned()
            .ok_or_else(|| RandomiserError::Image(format!("no layout for {}", kind.name())))
    }
}

/// Where one region's tables live in the image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionTables {
    pub region: RegionKind,
    /// Run-length rows: low nibble terrain, high nibble run length minus one.
    pub map_offset: usize,
    /// One y byte then one x byte per catalogue entry; 0xFF means no cell.
    pub location_offset: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomLayout {
    pub regions: Vec<RegionTables>,
}

/// A byte image decoded through a [`RomLayout`].
#[derive(Clone, Debug)]
pub struct RomImage {
    bytes: Vec<u8>,
    layout: RomLayout,
}

impl RomImage {
    pub fn new(bytes: Vec<u8>, layout: RomLayout) -> Self {
        Self { bytes, layout }
    }

    fn tables(&self, kind: RegionKind) -> Result<&RegionTables> {
        self.layout
            .regions
            .iter()
            .find(|t| t.region == kind)
            .ok_or_else(|| RandomiserError::Image(format!("layout has no tables for {}", kind.name())))
    }

    fn byte(&self, offset: usize) -> Result<u8> {
        self.bytes
            .get(offset)
            .copied()
            .ok_or_else(|| RandomiserError::Image(format!("offset {offset:#x} is past the end of the image")))
    }

    fn decode_map(&self, kind: RegionKind, offset: usize) -> Result<TerrainGrid> {
        let params = kind.params();
        let mut cells = Vec::with_capacity(params.rows * params.cols);
        let mut cursor = offset;
        for row in 0..params.rows {
            let mut filled = 0;
            while filled < params.cols {
                let b = self.byte(cursor)?;
                cursor += 1;
                let terrain = Terrain::from_nibble(b & 0x0F).ok_or_else(|| {
                    RandomiserError::Image(format!("bad terrain nibble {:#x} at {:#x}", b & 0x0F, cursor - 1))
                })?;
                let run = (b >> 4) as usize + 1;
                if filled + run > params.cols {
                    return Err(RandomiserError::Image(format!(
                        "{} row {row} overruns {} columns",
                        kind.name(),
                        params.cols
                    )));
                }
                cells.extend(std::iter::repeat(terrain).take(run));
                filled += run;
            }
        }
        TerrainGrid::from_cells(params.rows, params.cols, cells)
            .ok_or_else(|| RandomiserError::Image(format!("{} map has the wrong size", kind.name())))
    }
}

impl BaseImage for RomImage {
    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn vanilla_layout(&self, kind: RegionKind) -> Result<VanillaLayout> {
        let tables = self.tables(kind)?;
        let grid = self.decode_map(kind, tables.map_offset)?;
        let mut positions = Vec::new();
        for idx in 0..locations_for(kind).len() {
            let y = self.byte(tables.location_offset + idx * 2)?;
            let x = self.byte(tables.location_offset + idx * 2 + 1)?;
            if y == NO_POSITION || x == NO_POSITION {
                positions.push(None);
                continue;
            }
            let (x, y) = (x as usize, y as usize);
            if x >= grid.cols() || y >= grid.rows() {
                return Err(RandomiserError::Image(format!(
                    "{} entry {idx} at ({x},{y}) is off the map",
                    kind.name()
                )));
            }
            positions.push(Some(Pos::new(x, y)));
        }
        Ok(VanillaLayout { grid, positions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(layout: &VanillaLayout) -> (Vec<u8>, Vec<u8>) {
        let mut map = Vec::new();
        for row in layout.grid.cells().chunks(layout.grid.cols()) {
            let mut i = 0;
            while i < row.len() {
                let mut run = 1;
                while i + run < row.len() && row[i + run] == row[i] && run < 16 {
                    run += 1;
                }
                map.push(((run as u8 - 1) << 4) | row[i].nibble().unwrap());
                i += run;
            }
        }
        let mut locs = Vec::new();
        for pos in &layout.positions {
            match pos {
                Some(p) => locs.extend([p.y as u8, p.x as u8]),
                None => locs.extend([NO_POSITION, NO_POSITION]),
            }
        }
        (map, locs)
    }

    #[test]
    fn synthetic_layout_covers_every_unanchored_entry() {
        let image = GridImage::synthetic();
        for kind in RegionKind::ALL {
            let layout = image.vanilla_layout(kind).unwrap();
            for (spec, pos) in locations_for(kind).iter().zip(&layout.positions) {
                assert_eq!(pos.is_none(), spec.anchor.is_some(), "{}", spec.name);
                if let Some(pos) = pos {
                    assert_eq!(layout.grid.get(*pos), spec.terrain);
                }
            }
        }
    }

    #[test]
    fn rom_tables_decode_to_the_same_layout() {
        let synthetic = GridImage::synthetic();
        let expected = synthetic.vanilla_layout(RegionKind::MazeIsland).unwrap();
        let (map, locs) = encode(&expected);
        let mut bytes = vec![0u8; 16];
        let map_offset = bytes.len();
        bytes.extend(&map);
        let location_offset = bytes.len();
        bytes.extend(&locs);
        let image = RomImage::new(
            bytes,
            RomLayout {
                regions: vec![RegionTables {
                    region: RegionKind::MazeIsland,
                    map_offset,
                    location_offset,
                }],
            },
        );
        assert_eq!(image.vanilla_layout(RegionKind::MazeIsland).unwrap(), expected);
        assert!(matches!(
            image.vanilla_layout(RegionKind::West),
            Err(RandomiserError::Image(_))
        ));
    }

    #[test]
    fn truncated_map_is_an_image_error() {
        let image = RomImage::new(
            vec![0x01; 8],
            RomLayout {
                regions: vec![RegionTables {
                    region: RegionKind::West,
                    map_offset: 0,
                    location_offset: 0,
                }],
            },
        );
        assert!(matches!(
            image.vanilla_layout(RegionKind::West),
            Err(RandomiserError::Image(_))
        ));
    }
}
