//! Terrain synthesis for one region.
//!
//! Fixed-layout biomes copy the grid out of the base image. Procedural
//! biomes draw a frame, carve landmark structures, place the foreground
//! locations and grow random terrain into the gaps. Landmarks that sit inside
//! grown mountains are carved after that, and any isolated landmass is then
//! bridged back onto the largest one.

use log::debug;
use rand::{rngs::StdRng, Rng};
use std::collections::{BTreeMap, VecDeque};

use crate::location::{ConnectorKind, Landmark, LocationId, Town};
use crate::region::{Region, RegionBehavior, TerraformContext};
use crate::settings::{Biome, Properties};
use crate::shuffle::fisher_yates;
use crate::terrain::{Direction, Pos, Terrain};
use crate::{Attempt, Conflict, RandomiserError, Result};

const PLACEMENT_TRIES: usize = 2000;
const COAST_TRIES: usize = 200;
const CLEARING_TRIES: usize = 1000;
const OCEAN_DEPTH: usize = 3;

const WALKABLE: [Terrain; 5] = [
    Terrain::Grass,
    Terrain::Desert,
    Terrain::Forest,
    Terrain::Swamp,
    Terrain::Grave,
];

/// Runs one terraform attempt from a clean slate.
pub(crate) fn run<B: RegionBehavior + ?Sized>(
    behavior: &B,
    region: &mut Region,
    ctx: &mut TerraformContext<'_>,
) -> Result<Attempt<()>> {
    region.rebuild();
    if region.biome.is_vanilla() {
        return terraform_vanilla(region, ctx);
    }
    let mut t = Terraformer {
        region,
        props: ctx.props,
        rng: &mut *ctx.rng,
        coasts: Vec::new(),
    };
    Ok(t.procedural(behavior))
}

fn terraform_vanilla(region: &mut Region, ctx: &mut TerraformContext<'_>) -> Result<Attempt<()>> {
    let layout = ctx.image.vanilla_layout(region.kind)?;
    if layout.grid.rows() != region.grid.rows() || layout.grid.cols() != region.grid.cols() {
        return Err(RandomiserError::Image(format!(
            "{} layout is {}x{}, expected {}x{}",
            region.kind.name(),
            layout.grid.rows(),
            layout.grid.cols(),
            region.grid.rows(),
            region.grid.cols()
        )));
    }
    region.grid = layout.grid;
    for id in region.ids().collect::<Vec<_>>() {
        let loc = region.location(id);
        if !loc.occupies_cell() {
            continue;
        }
        let pos = layout
            .positions
            .get(id.0)
            .copied()
            .flatten()
            .ok_or_else(|| {
                RandomiserError::Config(format!("vanilla layout has no position for {}", loc.name))
            })?;
        region.location_mut(id).pos = Some(pos);
    }

    if region.biome == Biome::VanillaShuffle {
        shuffle_vanilla_positions(region, ctx.props, ctx.rng);
    }
    Ok(check_placement(region))
}

/// Permutes the cells of every freely movable location, keeping the grid.
fn shuffle_vanilla_positions(region: &mut Region, props: &Properties, rng: &mut StdRng) {
    let movable: Vec<LocationId> = region
        .ids()
        .filter(|id| {
            let loc = region.location(*id);
            loc.occupies_cell()
                && loc.can_shuffle
                && loc.pair.is_none()
                && loc.connector.is_none()
                && !loc.is_great_palace()
                && !(props.hidden_kasuto && loc.town == Some(Town::NewKasuto) && !props.shuffle_hidden)
                && !(props.hidden_palace && loc.landmark == Some(Landmark::Palace6) && !props.shuffle_hidden)
        })
        .collect();
    let mut cells: Vec<Pos> = movable
        .iter()
        .filter_map(|id| region.location(*id).pos)
        .collect();
    fisher_yates(&mut cells, rng);

    for (id, pos) in movable.into_iter().zip(cells) {
        if props.vanilla_shuffle_uses_actual_terrain {
            let terrain = region.location(id).terrain;
            region.grid.set(pos, terrain);
        } else {
            let under = region.grid.get(pos);
            region.location_mut(id).terrain = under;
        }
        region.location_mut(id).pos = Some(pos);
    }
    debug!("{}: shuffled vanilla location cells", region.kind.name());
}

/// Every cell-owning location is placed and no two share a cell.
pub(crate) fn check_placement(region: &Region) -> Attempt<()> {
    let mut owners: BTreeMap<Pos, LocationId> = BTreeMap::new();
    for id in region.ids() {
        let loc = region.location(id);
        if !loc.occupies_cell() {
            continue;
        }
        let Some(pos) = loc.pos else {
            return Attempt::Conflict(Conflict::Placement(loc.name));
        };
        if owners.insert(pos, id).is_some() {
            return Attempt::Conflict(Conflict::SharedCell { x: pos.x, y: pos.y });
        }
    }
    Attempt::Success(())
}

/// Hides the sixth palace behind the flute and New Kasuto behind the hammer,
/// optionally trading their cells with another eligible location first.
pub(crate) fn place_hidden_features(
    region: &mut Region,
    props: &Properties,
    rng: &mut StdRng,
) -> Attempt<()> {
    let procedural = !region.biome.is_vanilla();
    let palace = region.find(Landmark::Palace6);
    let kasuto = region.find_town(Town::NewKasuto);

    if let (true, Some(palace)) = (props.hidden_palace, palace) {
        if props.shuffle_hidden {
            let exclude = [Some(palace), kasuto.filter(|_| props.hidden_kasuto)];
            let hosts = hidden_hosts(region, &exclude, procedural);
            if hosts.is_empty() {
                return Attempt::Conflict(Conflict::HiddenHost("hidden palace"));
            }
            let host = hosts[rng.gen_range(0..hosts.len())];
            swap_positions(region, palace, host);
        }
        region.location_mut(palace).needs.flute = true;
        region.hidden_palace = Some(palace);
        region.call_spot = region
            .location(palace)
            .pos
            .map(|p| Pos::new(p.x, p.y.saturating_sub(2)));
    }

    if let (true, Some(kasuto)) = (props.hidden_kasuto, kasuto) {
        if props.shuffle_hidden {
            let exclude = [Some(kasuto), region.hidden_palace];
            let hosts = hidden_hosts(region, &exclude, procedural);
            if hosts.is_empty() {
                return Attempt::Conflict(Conflict::HiddenHost("hidden Kasuto"));
            }
            let host = hosts[rng.gen_range(0..hosts.len())];
            swap_positions(region, kasuto, host);
        }
        let loc = region.location_mut(kasuto);
        loc.terrain = Terrain::Forest;
        loc.needs.hammer = true;
        if let Some(pos) = loc.pos {
            region.grid.set(pos, Terrain::Forest);
        }
        region.hidden_kasuto = Some(kasuto);
    }

    check_placement(region)
}

fn hidden_hosts(region: &Region, exclude: &[Option<LocationId>], procedural: bool) -> Vec<LocationId> {
    region
        .ids()
        .filter(|id| !exclude.contains(&Some(*id)))
        .filter(|id| {
            let loc = region.location(*id);
            let on_lava = loc
                .pos
                .map(|p| region.grid.get(p) == Terrain::Lava)
                .unwrap_or(false);
            loc.occupies_cell()
                && loc.pos.is_some()
                && loc.can_shuffle
                && loc.connector.is_none()
                && loc.pair.is_none()
                && loc.palace.is_none()
                && !(procedural && (on_lava || loc.terrain == Terrain::Lava))
        })
        .collect()
}

fn swap_positions(region: &mut Region, a: LocationId, b: LocationId) {
    let pa = region.location(a).pos;
    let pb = region.location(b).pos;
    region.location_mut(a).pos = pb;
    region.location_mut(b).pos = pa;
    for id in [a, b] {
        let loc = region.location(id);
        if let Some(pos) = loc.pos {
            let terrain = loc.terrain;
            region.grid.set(pos, terrain);
        }
    }
}

/// Mutable drawing state of one procedural attempt.
pub struct Terraformer<'a> {
    pub region: &'a mut Region,
    pub props: &'a Properties,
    pub rng: &'a mut StdRng,
    coasts: Vec<(ConnectorKind, Direction)>,
}

impl<'a> Terraformer<'a> {
    fn procedural<B: RegionBehavior + ?Sized>(&mut self, behavior: &B) -> Attempt<()> {
        self.draw_frame();
        self.draw_oceans();
        behavior
            .shape_landmarks(self)
            .and_then(|_| self.place_locations())
            .and_then(|_| {
                self.place_random_terrain();
                self.grow_terrain();
                self.place_coastal_connectors()
            })
            .and_then(|_| behavior.shape_grown_landmarks(self))
            .and_then(|_| {
                self.connect_islands();
                check_placement(self.region)
            })
    }

    fn rows(&self) -> usize {
        self.region.grid.rows()
    }

    fn cols(&self) -> usize {
        self.region.grid.cols()
    }

    /// Volcano and canyon maps sink the great palace into an existing
    /// mountain mass, which only exists once the terrain has grown.
    pub fn volcano_in_mountains(&self) -> bool {
        matches!(self.region.biome, Biome::Volcano | Biome::Canyon)
    }

    fn random_walkable(&mut self) -> Terrain {
        WALKABLE[self.rng.gen_range(0..WALKABLE.len())]
    }

    fn draw_frame(&mut self) {
        match self.region.biome {
            Biome::Islands => {
                self.region.grid.draw_border(Terrain::Water);
                for _ in 0..self.rng.gen_range(1..=2) {
                    let horizontal = self.rng.gen_bool(0.5);
                    self.draw_walk(horizontal, Terrain::Water, 0);
                }
            }
            Biome::Mountainous => {
                self.region.grid.draw_border(Terrain::Mountain);
                for _ in 0..self.rng.gen_range(2..=3) {
                    let horizontal = self.rng.gen_bool(0.5);
                    self.draw_walk(horizontal, Terrain::Mountain, 12);
                }
            }
            Biome::Canyon | Biome::DryCanyon => self.draw_canyon(),
            Biome::Volcano => {
                self.region.grid.draw_border(Terrain::Mountain);
                let (rows, cols) = (self.rows(), self.cols());
                self.fill_ellipse(Pos::new(cols / 2, rows / 2), cols / 5, rows / 5, Terrain::Mountain);
            }
            Biome::Caldera => {
                self.region.grid.draw_border(Terrain::Mountain);
                self.draw_caldera_ring();
            }
            _ => {
                self.region.grid.draw_border(Terrain::Water);
                self.draw_walk(true, Terrain::Mountain, 10);
                self.draw_walk(false, Terrain::Water, 0);
            }
        }
    }

    /// Draws a drifting line across the region. Returns the cross-axis
    /// offset used at each step. `gap_chance` of N leaves roughly one cell
    /// in N open; zero draws a solid line.
    fn draw_walk(&mut self, horizontal: bool, terrain: Terrain, gap_chance: u32) -> Vec<usize> {
        let (len, width) = if horizontal {
            (self.cols(), self.rows())
        } else {
            (self.rows(), self.cols())
        };
        let mut cross = self.rng.gen_range(4..width - 4);
        let mut offsets = Vec::with_capacity(len);
        for along in 1..len - 1 {
            let drift: isize = self.rng.gen_range(-1..=1);
            cross = (cross as isize + drift).clamp(2, width as isize - 3) as usize;
            offsets.push(cross);
            if gap_chance > 0 && self.rng.gen_range(0..gap_chance) == 0 {
                continue;
            }
            let pos = if horizontal {
                Pos::new(along, cross)
            } else {
                Pos::new(cross, along)
            };
            self.region.grid.set(pos, terrain);
        }
        offsets
    }

    fn draw_canyon(&mut self) {
        self.region.grid.draw_border(Terrain::Mountain);
        let horizontal = self.rng.gen_bool(0.5);
        let river = if self.region.biome == Biome::DryCanyon {
            Terrain::Desert
        } else {
            Terrain::Water
        };
        let offsets = self.draw_walk(horizontal, river, 0);
        let half_width = self.rng.gen_range(4..=6);
        // The great palace's region needs walls thick enough to hold the
        // volcano footprint.
        let thickness = if self.region.biome == Biome::Canyon
            && self.region.find(Landmark::GreatPalace).is_some()
        {
            self.rng.gen_range(12..=14)
        } else {
            1
        };
        for (step, cross) in offsets.into_iter().enumerate() {
            let along = step as isize + 1;
            for sign in [-1isize, 1] {
                for depth in 0..thickness {
                    let wall = cross as isize + sign * (half_width + depth) as isize;
                    if wall < 0 {
                        break;
                    }
                    // Only the inner face has gaps.
                    if depth == 0 && self.rng.gen_range(0..10) == 0 {
                        continue;
                    }
                    let (x, y) = if horizontal { (along, wall) } else { (wall, along) };
                    if self.region.grid.contains(x, y) {
                        self.region.grid.fill_empty(Pos::new(x as usize, y as usize), Terrain::Mountain);
                    }
                }
            }
        }
    }

    fn fill_ellipse(&mut self, center: Pos, rx: usize, ry: usize, terrain: Terrain) {
        let (rx, ry) = (rx.max(1) as f64, ry.max(1) as f64);
        for pos in self.region.grid.positions().collect::<Vec<_>>() {
            let dx = (pos.x as f64 - center.x as f64) / rx;
            let dy = (pos.y as f64 - center.y as f64) / ry;
            if dx * dx + dy * dy <= 1.0 {
                self.region.grid.fill_empty(pos, terrain);
            }
        }
    }

    fn draw_caldera_ring(&mut self) {
        let (rows, cols) = (self.rows(), self.cols());
        let center = Pos::new(cols / 2, rows / 2);
        let (rx, ry) = ((cols / 4) as f64, (rows / 4) as f64);
        let gaps = [self.rng.gen_range(0.0..std::f64::consts::TAU), self.rng.gen_range(0.0..std::f64::consts::TAU)];
        for pos in self.region.grid.positions().collect::<Vec<_>>() {
            let dx = (pos.x as f64 - center.x as f64) / rx;
            let dy = (pos.y as f64 - center.y as f64) / ry;
            let r = (dx * dx + dy * dy).sqrt();
            if !(0.85..=1.15).contains(&r) {
                continue;
            }
            let angle = dy.atan2(dx).rem_euclid(std::f64::consts::TAU);
            if gaps.iter().any(|g| (angle - g).abs() < 0.15) {
                continue;
            }
            self.region.grid.fill_empty(pos, Terrain::Mountain);
        }
    }

    fn edge_cell(&self, dir: Direction, along: usize, depth: usize) -> Pos {
        let (rows, cols) = (self.rows(), self.cols());
        match dir {
            Direction::North => Pos::new(along, depth),
            Direction::South => Pos::new(along, rows - 1 - depth),
            Direction::West => Pos::new(depth, along),
            Direction::East => Pos::new(cols - 1 - depth, along),
        }
    }

    /// Floods one side of the map for each coastal connector in use.
    fn draw_oceans(&mut self) {
        let coastal: Vec<ConnectorKind> = self
            .region
            .active_connectors()
            .filter(|k| k.is_coastal())
            .collect();
        if coastal.is_empty() {
            return;
        }
        let mut sides = Direction::ALL.to_vec();
        fisher_yates(&mut sides, self.rng);
        for (kind, dir) in coastal.into_iter().zip(sides) {
            let along_len = if dir.is_horizontal() { self.rows() } else { self.cols() };
            for along in 0..along_len {
                for depth in 0..OCEAN_DEPTH {
                    let pos = self.edge_cell(dir, along, depth);
                    self.region.grid.set(pos, Terrain::Water);
                }
            }
            self.coasts.push((kind, dir));
        }
    }

    /// The great palace footprint and its lava approach.
    pub fn make_volcano(&mut self) -> Attempt<()> {
        let Some(great) = self.region.find(Landmark::GreatPalace) else {
            return Attempt::Success(());
        };
        let (rows, cols) = (self.rows(), self.cols());
        let in_mountains = self.volcano_in_mountains();

        let center = if in_mountains {
            let candidates: Vec<Pos> = (6..rows - 6)
                .flat_map(|y| (6..cols - 6).map(move |x| Pos::new(x, y)))
                .filter(|c| self.is_solid_mountain(*c, 4))
                .collect();
            if candidates.is_empty() {
                return Attempt::Conflict(Conflict::Placement("Great Palace"));
            }
            candidates[self.rng.gen_range(0..candidates.len())]
        } else {
            Pos::new(self.rng.gen_range(6..cols - 6), self.rng.gen_range(6..rows - 6))
        };

        for dy in -4isize..=4 {
            for dx in -4isize..=4 {
                if let Some(p) = self.region.grid.offset(center, dx, dy) {
                    let ring = dx.abs().max(dy.abs());
                    let terrain = if ring == 4 { Terrain::Mountain } else { Terrain::Lava };
                    self.region.grid.set(p, terrain);
                }
            }
        }
        self.region.grid.set(center, Terrain::Palace);
        {
            let gp = self.region.location_mut(great);
            gp.pos = Some(center);
            gp.can_shuffle = false;
        }

        self.draw_corridor(center, in_mountains)
    }

    /// Every cell within `radius` of `center` is bare mountain.
    fn is_solid_mountain(&self, center: Pos, radius: isize) -> bool {
        (-radius..=radius).all(|dy| {
            (-radius..=radius).all(|dx| {
                self.region
                    .grid
                    .offset(center, dx, dy)
                    .map(|p| {
                        self.region.grid.get(p) == Terrain::Mountain
                            && self.region.location_at(p).is_none()
                    })
                    .unwrap_or(false)
            })
        })
    }

    /// Grows the lava approach outward from the footprint ring, jittering
    /// sideways and optionally jumping a stretch through a cave pair.
    fn draw_corridor(&mut self, center: Pos, in_mountains: bool) -> Attempt<()> {
        let dir = Direction::ALL[self.rng.gen_range(0..4)];
        let (step_x, step_y): (isize, isize) = match dir {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
            Direction::East => (1, 0),
        };
        let (side_x, side_y) = (step_y.abs(), step_x.abs());
        let length = if in_mountains { 40 } else { self.rng.gen_range(5..=15) };
        let valley = (
            self.region.find(Landmark::ValleyCave1),
            self.region.find(Landmark::ValleyCave2),
        );
        let mut caves_placed = false;

        let Some(mut cur) = self.region.grid.offset(center, 4 * step_x, 4 * step_y) else {
            return Attempt::Success(());
        };
        let mut step = 0;
        while step < length {
            if self.region.grid.is_border(cur) {
                break;
            }
            if let Some(owner) = self.region.location_at(cur) {
                let loc = self.region.location(owner);
                if !loc.can_shuffle && !loc.is_great_palace() {
                    return Attempt::Conflict(Conflict::Corridor(loc.name));
                }
                break;
            }
            if in_mountains && step > 0 && self.region.grid.get(cur) != Terrain::Mountain {
                break;
            }
            self.region.grid.set(cur, Terrain::Lava);
            for sign in [-1isize, 1] {
                if let Some(wall) = self.region.grid.offset(cur, sign * side_x, sign * side_y) {
                    self.region.grid.fill_empty(wall, Terrain::Mountain);
                }
            }

            if let (false, (Some(first), Some(second))) = (caves_placed, valley) {
                let unplaced = self.region.location(first).pos.is_none()
                    && self.region.location(second).pos.is_none();
                if unplaced && step >= 2 && self.rng.gen_range(0..4) == 0 {
                    let jump = self.rng.gen_range(4..=7) as isize;
                    let exit = self.region.grid.offset(cur, jump * step_x, jump * step_y);
                    if let Some(exit) = exit.filter(|p| !self.region.grid.is_border(*p)) {
                        if self.region.location_at(exit).is_none() {
                            self.region.grid.set(cur, Terrain::Cave);
                            self.region.grid.set(exit, Terrain::Cave);
                            for (id, pos) in [(first, cur), (second, exit)] {
                                let loc = self.region.location_mut(id);
                                loc.pos = Some(pos);
                                loc.can_shuffle = false;
                            }
                            caves_placed = true;
                            step += jump as usize;
                            match self.region.grid.offset(exit, step_x, step_y) {
                                Some(next) => cur = next,
                                None => break,
                            }
                            continue;
                        }
                    }
                }
            }

            let adjust: isize = self.rng.gen_range(-1..=1);
            if adjust != 0 {
                if let Some(lateral) = self.region.grid.offset(cur, adjust * side_x, adjust * side_y) {
                    if !self.region.grid.is_border(lateral) {
                        match self.region.location_at(lateral) {
                            None => {
                                self.region.grid.set(lateral, Terrain::Lava);
                                cur = lateral;
                            }
                            Some(owner) if !self.region.location(owner).can_shuffle => {
                                return Attempt::Conflict(Conflict::Corridor(self.region.location(owner).name));
                            }
                            Some(_) => {}
                        }
                    }
                }
            }
            match self.region.grid.offset(cur, step_x, step_y) {
                Some(next) => cur = next,
                None => break,
            }
            step += 1;
        }
        Attempt::Success(())
    }

    /// Clears a 7x7 pad for the hidden palace and its flute spot.
    pub fn draw_hidden_palace(&mut self) -> Attempt<()> {
        let Some(palace) = self.region.find(Landmark::Palace6) else {
            return Attempt::Success(());
        };
        let (rows, cols) = (self.rows(), self.cols());
        let mut corner = None;
        for _ in 0..CLEARING_TRIES {
            let x = self.rng.gen_range(2..cols - 9);
            let y = self.rng.gen_range(2..rows - 9);
            let clear = (0..7).all(|dy| {
                (0..7).all(|dx| self.region.grid.get(Pos::new(x + dx, y + dy)) == Terrain::None)
            });
            if clear {
                corner = Some(Pos::new(x, y));
                break;
            }
        }
        let Some(corner) = corner else {
            return Attempt::Conflict(Conflict::HiddenPalaceSpace);
        };

        let floor = loop {
            let t = self.random_walkable();
            if t != Terrain::Forest {
                break t;
            }
        };
        for dy in 0..7 {
            for dx in 0..7 {
                self.region.grid.set(Pos::new(corner.x + dx, corner.y + dy), floor);
            }
        }
        let call = Pos::new(corner.x + 3, corner.y + 2);
        let spot = Pos::new(corner.x + 3, corner.y + 4);
        let mut rocks = 0;
        while rocks < 3 {
            let p = Pos::new(corner.x + self.rng.gen_range(0..7), corner.y + self.rng.gen_range(0..7));
            if p != call && p != spot && self.region.grid.get(p) != Terrain::Mountain {
                self.region.grid.set(p, Terrain::Mountain);
                rocks += 1;
            }
        }
        self.region.grid.set(spot, Terrain::Palace);
        let loc = self.region.location_mut(palace);
        loc.pos = Some(spot);
        loc.can_shuffle = false;
        self.region.call_spot = Some(call);
        Attempt::Success(())
    }

    fn place_locations(&mut self) -> Attempt<()> {
        let (rows, cols) = (self.rows(), self.cols());
        for idx in 0..self.region.locations.len() {
            let loc = &self.region.locations[idx];
            if !loc.occupies_cell()
                || loc.pos.is_some()
                || loc.is_great_palace()
                || loc.connector.map(|k| k.is_coastal()).unwrap_or(false)
            {
                continue;
            }
            let (name, terrain) = (loc.name, loc.terrain);

            let mut placed = None;
            for _ in 0..PLACEMENT_TRIES {
                let pos = Pos::new(self.rng.gen_range(2..cols - 2), self.rng.gen_range(2..rows - 2));
                let grid = &self.region.grid;
                if grid.get(pos) == Terrain::None
                    && grid.neighbors8(pos).all(|n| grid.get(n) == Terrain::None)
                {
                    placed = Some(pos);
                    break;
                }
            }
            let Some(pos) = placed else {
                return Attempt::Conflict(Conflict::Placement(name));
            };

            self.region.grid.set(pos, terrain);
            self.region.locations[idx].pos = Some(pos);
            if terrain == Terrain::Cave {
                for n in self.region.grid.neighbors4(pos).collect::<Vec<_>>() {
                    self.region.grid.set(n, Terrain::Mountain);
                }
            }
            if terrain.is_entrance() {
                let sides: Vec<Pos> = self.region.grid.neighbors4(pos).collect();
                let opening = sides[self.rng.gen_range(0..sides.len())];
                let floor = self.random_walkable();
                self.region.grid.set(opening, floor);
            }
        }
        Attempt::Success(())
    }

    fn random_terrains(&self) -> Vec<Terrain> {
        let mut choices = WALKABLE.to_vec();
        choices.push(Terrain::Mountain);
        match self.region.biome {
            Biome::DryCanyon => {}
            Biome::Volcano => choices.push(Terrain::Lava),
            Biome::Islands => choices.extend([Terrain::Water, Terrain::Water, Terrain::Water]),
            _ => choices.push(Terrain::Water),
        }
        choices.extend_from_slice(self.region.kind.params().extra_random_terrain);
        if self.props.can_walk_on_water_with_boots && self.region.biome != Biome::DryCanyon {
            choices.push(Terrain::WalkableWater);
        }
        choices
    }

    fn place_random_terrain(&mut self) {
        let choices = self.random_terrains();
        let (rows, cols) = (self.rows(), self.cols());
        for _ in 0..(rows * cols) / 25 {
            let pos = Pos::new(self.rng.gen_range(0..cols), self.rng.gen_range(0..rows));
            let terrain = choices[self.rng.gen_range(0..choices.len())];
            self.region.grid.fill_empty(pos, terrain);
        }
    }

    /// Breadth-first growth of every seeded terrain into the unfilled cells.
    fn grow_terrain(&mut self) {
        let growable = self.random_terrains();
        let mut sources: Vec<Pos> = self
            .region
            .grid
            .positions()
            .filter(|p| growable.contains(&self.region.grid.get(*p)))
            .filter(|p| self.region.location_at(*p).is_none())
            .collect();
        fisher_yates(&mut sources, self.rng);

        let mut queue: VecDeque<Pos> = sources.into();
        while let Some(pos) = queue.pop_front() {
            let terrain = self.region.grid.get(pos);
            for next in self.region.grid.neighbors4(pos).collect::<Vec<_>>() {
                if self.region.grid.get(next) == Terrain::None {
                    self.region.grid.set(next, terrain);
                    queue.push_back(next);
                }
            }
        }
        for pos in self.region.grid.positions().collect::<Vec<_>>() {
            self.region.grid.fill_empty(pos, Terrain::Grass);
        }
    }

    /// Puts each raft/bridge connector on the first dry cell inland from its
    /// ocean.
    fn place_coastal_connectors(&mut self) -> Attempt<()> {
        for (kind, dir) in self.coasts.clone() {
            let Some(id) = self.region.connector(kind) else {
                continue;
            };
            let (along_len, depth_len) = if dir.is_horizontal() {
                (self.rows(), self.cols())
            } else {
                (self.cols(), self.rows())
            };
            let mut placed = None;
            for _ in 0..COAST_TRIES {
                let along = self.rng.gen_range(2..along_len - 2);
                for depth in 0..depth_len / 2 {
                    let pos = self.edge_cell(dir, along, depth);
                    let terrain = self.region.grid.get(pos);
                    if terrain == Terrain::Water {
                        continue;
                    }
                    if depth > 0
                        && terrain.is_connective()
                        && terrain != Terrain::Lava
                        && self.region.location_at(pos).is_none()
                    {
                        placed = Some(pos);
                    }
                    break;
                }
                if placed.is_some() {
                    break;
                }
            }
            let Some(pos) = placed else {
                return Attempt::Conflict(Conflict::Coastline(kind));
            };
            self.region.grid.set(pos, kind.terrain());
            self.region.location_mut(id).pos = Some(pos);
        }
        Attempt::Success(())
    }

    fn island_budget(&self) -> usize {
        match self.region.biome {
            Biome::Islands => 100,
            Biome::Mountainous => 20,
            Biome::Canyon | Biome::DryCanyon => 15,
            Biome::Volcano | Biome::Caldera => 10,
            _ => 25,
        }
    }

    /// Labels four-connected landmasses; returns a label per cell and the
    /// size of each landmass.
    fn label_components(&self) -> (Vec<Option<usize>>, Vec<usize>) {
        let grid = &self.region.grid;
        let mut labels = vec![None; grid.cells().len()];
        let mut sizes = Vec::new();
        for start in 0..labels.len() {
            if labels[start].is_some() || !grid.cells()[start].is_connective() {
                continue;
            }
            let label = sizes.len();
            let mut size = 0;
            let mut queue = VecDeque::from([grid.pos_of(start)]);
            labels[start] = Some(label);
            while let Some(pos) = queue.pop_front() {
                size += 1;
                for next in grid.neighbors4(pos) {
                    let idx = grid.index(next);
                    if labels[idx].is_none() && grid.get(next).is_connective() {
                        labels[idx] = Some(label);
                        queue.push_back(next);
                    }
                }
            }
            sizes.push(size);
        }
        (labels, sizes)
    }

    /// Carves bridges and passes until one landmass remains or the biome's
    /// budget runs out.
    fn connect_islands(&mut self) {
        let mut budget = self.island_budget();
        while budget > 0 {
            let (labels, sizes) = self.label_components();
            if sizes.len() <= 1 {
                break;
            }
            let main = sizes
                .iter()
                .enumerate()
                .fold(0, |best, (idx, size)| if *size > sizes[best] { idx } else { best });
            let Some(island) = (0..sizes.len()).find(|label| *label != main) else {
                break;
            };

            let grid = &self.region.grid;
            let island_cells: Vec<Pos> = (0..labels.len())
                .filter(|idx| labels[*idx] == Some(island))
                .map(|idx| grid.pos_of(idx))
                .collect();
            let from = island_cells[self.rng.gen_range(0..island_cells.len())];
            let target = (0..labels.len())
                .filter(|idx| labels[*idx] == Some(main))
                .map(|idx| grid.pos_of(idx))
                .min_by_key(|p| p.manhattan(from));
            let Some(target) = target else {
                break;
            };
            let horizontal_first = self.rng.gen_bool(0.5);
            self.carve(from, target, horizontal_first);
            budget -= 1;
        }
    }

    fn carve(&mut self, from: Pos, to: Pos, horizontal_first: bool) {
        let mut path = Vec::new();
        let corner = if horizontal_first {
            Pos::new(to.x, from.y)
        } else {
            Pos::new(from.x, to.y)
        };
        for (a, b) in [(from, corner), (corner, to)] {
            let xs: Vec<usize> = if a.x <= b.x { (a.x..=b.x).collect() } else { (b.x..=a.x).rev().collect() };
            let ys: Vec<usize> = if a.y <= b.y { (a.y..=b.y).collect() } else { (b.y..=a.y).rev().collect() };
            for x in &xs {
                for y in &ys {
                    path.push(Pos::new(*x, *y));
                }
            }
        }
        for pos in path {
            if self.region.location_at(pos).is_some() {
                continue;
            }
            match self.region.grid.get(pos) {
                Terrain::Water => self.region.grid.set(pos, Terrain::Bridge),
                Terrain::Mountain | Terrain::None => self.region.grid.set(pos, Terrain::Road),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::GridImage;
    use crate::region::RegionKind;
    use crate::settings::GenerationOptions;
    use crate::terrain::TerrainGrid;
    use rand::SeedableRng;

    fn props_with(options: GenerationOptions) -> Properties {
        let mut rng = StdRng::seed_from_u64(0);
        options.resolve(&mut rng).unwrap()
    }

    fn terraform(kind: RegionKind, biome: Biome, props: &Properties, seed: u64) -> (Region, Attempt<()>) {
        let image = GridImage::synthetic();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut region = Region::new(kind, biome);
        for connector in ConnectorKind::ALL {
            region.activate_connector(connector);
        }
        let mut ctx = TerraformContext {
            props,
            image: &image,
            rng: &mut rng,
        };
        let outcome = kind.behavior().terraform(&mut region, &mut ctx).unwrap();
        (region, outcome)
    }

    #[test]
    fn vanilla_layout_places_every_location() {
        let props = props_with(GenerationOptions::default());
        let (region, outcome) = terraform(RegionKind::West, Biome::Vanilla, &props, 1);
        assert!(outcome.is_success());
        assert!(region
            .locations
            .iter()
            .filter(|l| l.occupies_cell())
            .all(|l| l.pos.is_some()));
    }

    #[test]
    fn vanilla_shuffle_moves_cells_but_keeps_fixed_ones() {
        let props = props_with(GenerationOptions::default());
        let (plain, _) = terraform(RegionKind::West, Biome::Vanilla, &props, 3);
        let (shuffled, outcome) = terraform(RegionKind::West, Biome::VanillaShuffle, &props, 3);
        assert!(outcome.is_success());
        let start = plain.find(Landmark::Start).unwrap();
        assert_eq!(plain.location(start).pos, shuffled.location(start).pos);
        let moved = plain
            .locations
            .iter()
            .zip(&shuffled.locations)
            .filter(|(a, b)| a.pos != b.pos)
            .count();
        assert!(moved > 0);
    }

    #[test]
    fn procedural_regions_fill_every_cell() {
        let props = props_with(GenerationOptions::default());
        for (kind, biome) in [
            (RegionKind::West, Biome::VanillaLike),
            (RegionKind::West, Biome::Islands),
            (RegionKind::DeathMountain, Biome::Mountainous),
            (RegionKind::East, Biome::Volcano),
            (RegionKind::East, Biome::DryCanyon),
            (RegionKind::East, Biome::Canyon),
            (RegionKind::West, Biome::Caldera),
            (RegionKind::DeathMountain, Biome::Canyon),
            (RegionKind::MazeIsland, Biome::VanillaLike),
        ] {
            let mut seed = 0;
            let region = loop {
                let (region, outcome) = terraform(kind, biome, &props, seed);
                if outcome.is_success() {
                    break region;
                }
                seed += 1;
                assert!(seed < 200, "{kind:?} {biome:?} never succeeded");
            };
            assert_eq!(region.grid.count(Terrain::None), 0);
            let mut cells = std::collections::BTreeSet::new();
            for loc in region.locations.iter().filter(|l| l.occupies_cell()) {
                let pos = loc.pos.expect("placed");
                assert!(cells.insert(pos), "{} shares a cell", loc.name);
            }
        }
    }

    #[test]
    fn great_palace_sits_in_lava() {
        let props = props_with(GenerationOptions::default());
        let mut seed = 0;
        let region = loop {
            let (region, outcome) = terraform(RegionKind::East, Biome::VanillaLike, &props, seed);
            if outcome.is_success() {
                break region;
            }
            seed += 1;
        };
        let gp = region.location(region.find(Landmark::GreatPalace).unwrap());
        let pos = gp.pos.unwrap();
        assert_eq!(region.grid.get(pos), Terrain::Palace);
        assert!(region
            .grid
            .neighbors4(pos)
            .any(|n| region.grid.get(n) == Terrain::Lava));
    }

    #[test]
    fn hidden_features_gate_their_locations() {
        let props = props_with(GenerationOptions {
            hidden_palace: true,
            hidden_kasuto: true,
            ..GenerationOptions::default()
        });
        let (region, outcome) = terraform(RegionKind::East, Biome::Vanilla, &props, 5);
        assert!(outcome.is_success());
        let palace = region.location(region.hidden_palace.unwrap());
        assert!(palace.needs.flute);
        let kasuto = region.location(region.hidden_kasuto.unwrap());
        assert!(kasuto.needs.hammer);
        assert_eq!(kasuto.terrain, Terrain::Forest);
        assert_eq!(region.grid.get(kasuto.pos.unwrap()), Terrain::Forest);
        assert!(region.call_spot.is_some());
    }

    #[test]
    fn shuffled_hidden_palace_avoids_connectors_and_pairs() {
        let props = props_with(GenerationOptions {
            hidden_palace: true,
            hidden_kasuto: true,
            shuffle_hidden: true,
            ..GenerationOptions::default()
        });
        let plain_props = props_with(GenerationOptions::default());
        let (plain, _) = terraform(RegionKind::East, Biome::Vanilla, &plain_props, 0);
        let palace_cell = plain.location(plain.find(Landmark::Palace6).unwrap()).pos.unwrap();
        for seed in 0..10 {
            let (region, outcome) = terraform(RegionKind::East, Biome::Vanilla, &props, seed);
            assert!(outcome.is_success());
            let host = region.location_at(palace_cell).unwrap();
            let loc = region.location(host);
            assert!(loc.connector.is_none() && loc.pair.is_none());
            assert_ne!(region.hidden_palace, region.hidden_kasuto);
        }
    }

    #[test]
    fn east_canyon_sinks_the_volcano_into_its_walls() {
        let props = props_with(GenerationOptions::default());
        let mut built = 0;
        for seed in 0..30 {
            let (region, outcome) = terraform(RegionKind::East, Biome::Canyon, &props, seed);
            if !outcome.is_success() {
                continue;
            }
            built += 1;
            let gp = region.location(region.find(Landmark::GreatPalace).unwrap());
            let pos = gp.pos.unwrap();
            assert_eq!(region.grid.get(pos), Terrain::Palace);
            assert!(region.grid.neighbors4(pos).all(|n| region.grid.get(n) == Terrain::Lava));
        }
        assert!(built > 15, "only {built} of 30 East canyons built");
    }

    #[test]
    fn corridor_into_a_fixed_location_aborts_the_attempt() {
        let props = props_with(GenerationOptions::default());
        let mut rng = StdRng::seed_from_u64(4);
        let mut region = Region::new(RegionKind::East, Biome::Canyon);
        region.grid = TerrainGrid::new(region.grid.rows(), region.grid.cols(), Terrain::Mountain);
        let center = Pos::new(30, 30);
        // A fixed connector on every side the corridor could leave by.
        for (kind, (dx, dy)) in ConnectorKind::ALL.into_iter().zip([(4, 0), (-4, 0), (0, 4), (0, -4)]) {
            let id = region.activate_connector(kind).unwrap();
            region.location_mut(id).pos = region.grid.offset(center, dx, dy);
        }
        let mut t = Terraformer {
            region: &mut region,
            props: &props,
            rng: &mut rng,
            coasts: Vec::new(),
        };
        assert!(matches!(
            t.draw_corridor(center, true),
            Attempt::Conflict(Conflict::Corridor(_))
        ));
    }

    #[test]
    fn hidden_hosts_avoid_lava_only_on_procedural_maps() {
        let props = props_with(GenerationOptions::default());
        let (mut region, outcome) = terraform(RegionKind::East, Biome::Vanilla, &props, 0);
        assert!(outcome.is_success());
        let palace = region.find(Landmark::Palace6);
        let hosts = hidden_hosts(&region, &[palace], false);
        assert!(hosts.iter().all(|id| {
            let loc = region.location(*id);
            loc.connector.is_none() && loc.pair.is_none() && loc.palace.is_none()
        }));

        let host = hosts[0];
        let pos = region.location(host).pos.unwrap();
        region.grid.set(pos, Terrain::Lava);
        assert!(hidden_hosts(&region, &[palace], false).contains(&host));
        assert!(!hidden_hosts(&region, &[palace], true).contains(&host));
    }

    #[test]
    fn procedural_hidden_features_trade_cells_with_hosts() {
        let props = props_with(GenerationOptions {
            hidden_palace: true,
            hidden_kasuto: true,
            shuffle_hidden: true,
            ..GenerationOptions::default()
        });
        let mut built = 0;
        for seed in 0..40 {
            let (region, outcome) = terraform(RegionKind::East, Biome::VanillaLike, &props, seed);
            if !outcome.is_success() {
                continue;
            }
            built += 1;
            let palace = region.hidden_palace.unwrap();
            let kasuto = region.hidden_kasuto.unwrap();
            assert_ne!(palace, kasuto);
            assert!(region.location(palace).needs.flute);
            let kasuto_cell = region.location(kasuto).pos.unwrap();
            assert_eq!(region.grid.get(kasuto_cell), Terrain::Forest);
            let call = region.call_spot.unwrap();
            let palace_cell = region.location(palace).pos.unwrap();
            assert_eq!(call, Pos::new(palace_cell.x, palace_cell.y.saturating_sub(2)));
        }
        assert!(built > 0);
    }
}
