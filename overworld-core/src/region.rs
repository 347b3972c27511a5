use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::catalogue::locations_for;
use crate::image::BaseImage;
use crate::location::{ConnectorKind, Landmark, Location, LocationId, Town};
use crate::requirements::{Requirement, RequirementSet};
use crate::settings::{Biome, Properties};
use crate::terraform::{self, Terraformer};
use crate::terrain::{Movement, Pos, Terrain, TerrainGrid};
use crate::{Attempt, Result};
use rand::rngs::StdRng;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum RegionKind {
    West,
    DeathMountain,
    East,
    MazeIsland,
}

impl RegionKind {
    /// Generation order.
    pub const ALL: [RegionKind; 4] = [
        RegionKind::West,
        RegionKind::DeathMountain,
        RegionKind::East,
        RegionKind::MazeIsland,
    ];

    pub fn index(self) -> usize {
        match self {
            RegionKind::West => 0,
            RegionKind::DeathMountain => 1,
            RegionKind::East => 2,
            RegionKind::MazeIsland => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RegionKind::West => "Western Hyrule",
            RegionKind::DeathMountain => "Death Mountain",
            RegionKind::East => "East Hyrule",
            RegionKind::MazeIsland => "Maze Island",
        }
    }

    pub fn progress_label(self) -> &'static str {
        match self {
            RegionKind::West => "Generating Western Hyrule",
            RegionKind::DeathMountain => "Generating Death Mountain",
            RegionKind::East => "Generating East Hyrule",
            RegionKind::MazeIsland => "Generating Maze Island",
        }
    }

    pub fn behavior(self) -> &'static dyn RegionBehavior {
        match self {
            RegionKind::West => &WestBehavior,
            RegionKind::DeathMountain => &DeathMountainBehavior,
            RegionKind::East => &EastBehavior,
            RegionKind::MazeIsland => &MazeIslandBehavior,
        }
    }

    pub fn params(self) -> RegionParams {
        self.behavior().params()
    }
}

/// Fixed per-kind parameters.
#[derive(Clone, Copy, Debug)]
pub struct RegionParams {
    pub rows: usize,
    pub cols: usize,
    pub allowed_biomes: &'static [Biome],
    /// Terrain drawn more often than the biome default.
    pub extra_random_terrain: &'static [Terrain],
    pub has_start: bool,
}

/// Shared inputs of one terraform attempt.
pub struct TerraformContext<'a> {
    pub props: &'a Properties,
    pub image: &'a dyn BaseImage,
    pub rng: &'a mut StdRng,
}

/// Per-kind customization points. Everything has a shared default except
/// the parameter table.
pub trait RegionBehavior: Sync {
    fn params(&self) -> RegionParams;

    fn terraform(&self, region: &mut Region, ctx: &mut TerraformContext<'_>) -> Result<Attempt<()>> {
        terraform::run(self, region, ctx)
    }

    /// Structures drawn after the frame and before the foreground locations.
    fn shape_landmarks(&self, _t: &mut Terraformer<'_>) -> Attempt<()> {
        Attempt::Success(())
    }

    /// Structures carved into the grown terrain, before islands are joined.
    fn shape_grown_landmarks(&self, _t: &mut Terraformer<'_>) -> Attempt<()> {
        Attempt::Success(())
    }

    fn update_reachability(&self, region: &mut Region, movement: Movement, held: &RequirementSet) {
        region.flood(movement);
        region.mark_locations(movement, held);
    }

    fn special_post_checks(&self, region: &mut Region, _held: &RequirementSet) {
        region.follow_anchors();
    }
}

struct WestBehavior;
struct DeathMountainBehavior;
struct EastBehavior;
struct MazeIslandBehavior;

impl RegionBehavior for WestBehavior {
    fn params(&self) -> RegionParams {
        RegionParams {
            rows: 75,
            cols: 64,
            allowed_biomes: &[
                Biome::Vanilla,
                Biome::VanillaShuffle,
                Biome::VanillaLike,
                Biome::Islands,
                Biome::Canyon,
                Biome::DryCanyon,
                Biome::Mountainous,
                Biome::Caldera,
            ],
            extra_random_terrain: &[],
            has_start: true,
        }
    }
}

impl RegionBehavior for DeathMountainBehavior {
    fn params(&self) -> RegionParams {
        RegionParams {
            rows: 45,
            cols: 64,
            allowed_biomes: &[
                Biome::Vanilla,
                Biome::VanillaShuffle,
                Biome::VanillaLike,
                Biome::Canyon,
                Biome::Mountainous,
                Biome::Caldera,
            ],
            extra_random_terrain: &[Terrain::Mountain, Terrain::Road],
            has_start: false,
        }
    }
}

impl RegionBehavior for EastBehavior {
    fn params(&self) -> RegionParams {
        RegionParams {
            rows: 75,
            cols: 64,
            allowed_biomes: &[
                Biome::Vanilla,
                Biome::VanillaShuffle,
                Biome::VanillaLike,
                Biome::Islands,
                Biome::Canyon,
                Biome::DryCanyon,
                Biome::Volcano,
                Biome::Mountainous,
            ],
            extra_random_terrain: &[Terrain::Desert],
            has_start: false,
        }
    }

    fn terraform(&self, region: &mut Region, ctx: &mut TerraformContext<'_>) -> Result<Attempt<()>> {
        if let Attempt::Conflict(conflict) = terraform::run(self, region, ctx)? {
            return Ok(Attempt::Conflict(conflict));
        }
        Ok(terraform::place_hidden_features(region, ctx.props, ctx.rng))
    }

    fn shape_landmarks(&self, t: &mut Terraformer<'_>) -> Attempt<()> {
        if !t.volcano_in_mountains() {
            if let Attempt::Conflict(conflict) = t.make_volcano() {
                return Attempt::Conflict(conflict);
            }
        }
        if t.props.hidden_palace {
            return t.draw_hidden_palace();
        }
        Attempt::Success(())
    }

    fn shape_grown_landmarks(&self, t: &mut Terraformer<'_>) -> Attempt<()> {
        if t.volcano_in_mountains() {
            return t.make_volcano();
        }
        Attempt::Success(())
    }

    /// The spell tower hangs off New Kasuto but its door only opens to the
    /// Spell spell.
    fn special_post_checks(&self, region: &mut Region, held: &RequirementSet) {
        let Some(tower) = region.find(Landmark::SpellTower) else {
            region.follow_anchors();
            return;
        };
        let was_reachable = region.location(tower).reachable;
        region.follow_anchors();
        if !was_reachable && !held.contains(&Requirement::Spell) {
            region.location_mut(tower).reachable = false;
        }
    }
}

impl RegionBehavior for MazeIslandBehavior {
    fn params(&self) -> RegionParams {
        RegionParams {
            rows: 30,
            cols: 40,
            allowed_biomes: &[Biome::Vanilla, Biome::VanillaShuffle, Biome::VanillaLike],
            extra_random_terrain: &[Terrain::Swamp],
            has_start: false,
        }
    }
}

/// One continent: terrain grid, locations and the solver's visitation state.
#[derive(Clone, Debug)]
pub struct Region {
    pub kind: RegionKind,
    pub biome: Biome,
    pub grid: TerrainGrid,
    pub locations: Vec<Location>,
    pub all_reached: bool,
    pub fully_generated: bool,
    pub hidden_palace: Option<LocationId>,
    pub hidden_kasuto: Option<LocationId>,
    pub call_spot: Option<Pos>,
    visited: Vec<bool>,
    seeded: Vec<bool>,
}

impl Region {
    pub fn new(kind: RegionKind, biome: Biome) -> Self {
        let params = kind.params();
        let mut region = Self {
            kind,
            biome,
            grid: TerrainGrid::new(params.rows, params.cols, Terrain::None),
            locations: Vec::new(),
            all_reached: false,
            fully_generated: false,
            hidden_palace: None,
            hidden_kasuto: None,
            call_spot: None,
            visited: vec![false; params.rows * params.cols],
            seeded: vec![false; params.rows * params.cols],
        };
        region.load_catalogue();
        region
    }

    fn load_catalogue(&mut self) {
        let specs = locations_for(self.kind);
        self.locations = specs.iter().map(Location::from_spec).collect();
        let lookup = |name: &str| specs.iter().position(|s| s.name == name).map(LocationId);
        for (idx, spec) in specs.iter().enumerate() {
            self.locations[idx].pair = spec.pair.and_then(lookup);
            self.locations[idx].anchor = spec.anchor.and_then(lookup);
        }
    }

    /// Throws away terrain and placement, keeping which connectors are live.
    pub fn rebuild(&mut self) {
        let live: Vec<ConnectorKind> = self.active_connectors().collect();
        let params = self.kind.params();
        self.grid = TerrainGrid::new(params.rows, params.cols, Terrain::None);
        self.load_catalogue();
        for kind in live {
            self.activate_connector(kind);
        }
        self.hidden_palace = None;
        self.hidden_kasuto = None;
        self.call_spot = None;
        self.all_reached = false;
        self.fully_generated = false;
        self.reset_reachability();
    }

    /// Puts catalogue rewards and palace numbers back, keeping placement.
    pub fn reset_rewards(&mut self) {
        for (loc, spec) in self.locations.iter_mut().zip(locations_for(self.kind)) {
            loc.collectable = loc.vanilla;
            loc.palace = spec.palace;
        }
    }

    pub fn location(&self, id: LocationId) -> &Location {
        &self.locations[id.0]
    }

    pub fn location_mut(&mut self, id: LocationId) -> &mut Location {
        &mut self.locations[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = LocationId> {
        (0..self.locations.len()).map(LocationId)
    }

    pub fn find(&self, landmark: Landmark) -> Option<LocationId> {
        self.locations
            .iter()
            .position(|l| l.landmark == Some(landmark))
            .map(LocationId)
    }

    pub fn find_town(&self, town: Town) -> Option<LocationId> {
        self.locations
            .iter()
            .position(|l| l.town == Some(town))
            .map(LocationId)
    }

    pub fn location_at(&self, pos: Pos) -> Option<LocationId> {
        self.locations
            .iter()
            .position(|l| l.occupies_cell() && l.pos == Some(pos))
            .map(LocationId)
    }

    pub fn connector(&self, kind: ConnectorKind) -> Option<LocationId> {
        self.locations
            .iter()
            .position(|l| l.connector == Some(kind))
            .map(LocationId)
    }

    pub fn activate_connector(&mut self, kind: ConnectorKind) -> Option<LocationId> {
        let id = self.connector(kind)?;
        self.locations[id.0].active = true;
        Some(id)
    }

    pub fn active_connectors(&self) -> impl Iterator<Item = ConnectorKind> + '_ {
        self.locations
            .iter()
            .filter(|l| l.active)
            .filter_map(|l| l.connector)
    }

    pub fn has_connections(&self) -> bool {
        self.active_connectors().next().is_some()
    }

    pub fn reset_reachability(&mut self) {
        self.visited.iter_mut().for_each(|v| *v = false);
        self.seeded.iter_mut().for_each(|v| *v = false);
        for loc in &mut self.locations {
            loc.reachable = false;
            loc.collected = false;
        }
    }

    /// Marks a cell visited and lets it spread even when it is an entrance.
    pub fn seed(&mut self, pos: Pos) -> bool {
        let idx = self.grid.index(pos);
        let fresh = !self.seeded[idx];
        self.visited[idx] = true;
        self.seeded[idx] = true;
        fresh
    }

    pub fn is_visited(&self, pos: Pos) -> bool {
        self.visited[self.grid.index(pos)]
    }

    pub fn seed_start(&mut self) {
        if let Some(id) = self.find(Landmark::Start) {
            if let Some(pos) = self.locations[id.0].pos {
                self.seed(pos);
                self.locations[id.0].reachable = true;
            }
        }
    }

    /// Grows the visited set across passable terrain. Entrance cells are
    /// entered but not walked through unless seeded.
    pub fn flood(&mut self, movement: Movement) {
        let mut queue: VecDeque<Pos> = VecDeque::new();
        for idx in 0..self.visited.len() {
            if !self.visited[idx] {
                continue;
            }
            let pos = self.grid.pos_of(idx);
            if self.seeded[idx] || !self.grid.get(pos).is_entrance() {
                queue.push_back(pos);
            }
        }

        while let Some(pos) = queue.pop_front() {
            for next in self.grid.neighbors4(pos) {
                let idx = self.grid.index(next);
                if self.visited[idx] {
                    continue;
                }
                let terrain = self.grid.get(next);
                if !terrain.passable_with(movement) {
                    continue;
                }
                self.visited[idx] = true;
                if !terrain.is_entrance() {
                    queue.push_back(next);
                }
            }
        }
    }

    /// Flags locations on visited cells and carries reachability through
    /// paired caves, re-flooding from any newly seeded partner.
    pub fn mark_locations(&mut self, movement: Movement, held: &RequirementSet) {
        loop {
            let mut seeded_new = false;
            for idx in 0..self.locations.len() {
                let loc = &self.locations[idx];
                if !loc.occupies_cell() {
                    continue;
                }
                let Some(pos) = loc.pos else { continue };
                if !self.is_visited(pos)
                    || !loc.passes_movement(movement.boots, movement.hammer, movement.flute)
                {
                    continue;
                }
                let partner = loc.pair;
                let crossable = (!loc.needs.fairy || held.contains(&Requirement::Fairy))
                    && (!loc.needs.jump
                        || held.contains(&Requirement::Jump)
                        || held.contains(&Requirement::Fairy));
                self.locations[idx].reachable = true;

                if let (Some(partner), true) = (partner, crossable) {
                    self.locations[partner.0].reachable = true;
                    if let Some(partner_pos) = self.locations[partner.0].pos {
                        seeded_new |= self.seed(partner_pos);
                    }
                }
            }
            if !seeded_new {
                break;
            }
            self.flood(movement);
        }
    }

    /// Anchored locations share the reachability of their anchor.
    pub fn follow_anchors(&mut self) {
        for idx in 0..self.locations.len() {
            if let Some(anchor) = self.locations[idx].anchor {
                if self.locations[anchor.0].reachable {
                    self.locations[idx].reachable = true;
                }
            }
        }
    }

    pub fn reachable_count(&self) -> usize {
        self.locations.iter().filter(|l| l.active && l.reachable).count()
    }

    pub fn update_all_reached(&mut self) {
        self.all_reached = self
            .locations
            .iter()
            .filter(|l| l.occupies_cell())
            .all(|l| l.reachable);
    }

    /// Locations that must be reachable for certification. The sixth palace
    /// and New Kasuto only count while they are hidden features.
    pub fn required_locations(
        &self,
        hidden_palace: bool,
        hidden_kasuto: bool,
    ) -> impl Iterator<Item = &Location> {
        self.locations.iter().filter(move |l| {
            l.active
                && l.required
                && !l.is_ignored()
                && (hidden_palace || l.landmark != Some(Landmark::Palace6))
                && (hidden_kasuto || l.town != Some(Town::NewKasuto))
        })
    }
}
