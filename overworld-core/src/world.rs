use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::items::Collectable;
use crate::location::{ConnectorKind, Landmark, LocRef, Location, Town};
use crate::region::{Region, RegionKind};
use crate::settings::{Biome, Properties};
use crate::terrain::{Pos, Terrain};

/// Two connector locations in different regions joined by one link.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConnectionPair {
    pub kind: ConnectorKind,
    pub a: LocRef,
    pub b: LocRef,
}

/// All four regions plus the links between them.
#[derive(Clone, Debug)]
pub struct World {
    pub regions: Vec<Region>,
    pub connections: Vec<ConnectionPair>,
}

impl World {
    pub fn new(props: &Properties) -> Self {
        Self {
            regions: RegionKind::ALL
                .iter()
                .map(|kind| Region::new(*kind, props.biome(*kind)))
                .collect(),
            connections: Vec::new(),
        }
    }

    pub fn region(&self, kind: RegionKind) -> &Region {
        &self.regions[kind.index()]
    }

    pub fn region_mut(&mut self, kind: RegionKind) -> &mut Region {
        &mut self.regions[kind.index()]
    }

    pub fn location(&self, at: LocRef) -> &Location {
        self.region(at.region).location(at.id)
    }

    pub fn location_mut(&mut self, at: LocRef) -> &mut Location {
        self.region_mut(at.region).location_mut(at.id)
    }

    pub fn find(&self, landmark: Landmark) -> Option<LocRef> {
        self.regions
            .iter()
            .find_map(|r| r.find(landmark).map(|id| LocRef::new(r.kind, id)))
    }

    pub fn find_town(&self, town: Town) -> Option<LocRef> {
        self.regions
            .iter()
            .find_map(|r| r.find_town(town).map(|id| LocRef::new(r.kind, id)))
    }

    /// The entrance currently carrying the given palace number.
    pub fn palace(&self, number: u8) -> Option<LocRef> {
        self.regions.iter().find_map(|r| {
            r.ids()
                .find(|id| r.location(*id).palace == Some(number))
                .map(|id| LocRef::new(r.kind, id))
        })
    }

    /// Activates the connector slot on both sides and records the pair.
    pub fn connect(&mut self, kind: ConnectorKind, a: RegionKind, b: RegionKind) -> Option<ConnectionPair> {
        let id_a = self.region_mut(a).activate_connector(kind)?;
        let id_b = self.region_mut(b).activate_connector(kind)?;
        let pair = ConnectionPair {
            kind,
            a: LocRef::new(a, id_a),
            b: LocRef::new(b, id_b),
        };
        self.connections.push(pair);
        Some(pair)
    }

    pub fn reset_reachability(&mut self) {
        for region in &mut self.regions {
            region.reset_reachability();
        }
    }

    /// Restores every location's catalogue reward and palace number, so a
    /// palace swap always starts from the same numbering whether or not a
    /// region was re-terraformed in between.
    pub fn reset_collectables(&mut self) {
        for region in &mut self.regions {
            region.reset_rewards();
        }
    }

    /// Carries reachability across every live link. The raft needs the Raft.
    pub fn propagate_connectors(&mut self, has_raft: bool) -> bool {
        let mut changed = false;
        for pair in self.connections.clone() {
            if pair.kind == ConnectorKind::Raft && !has_raft {
                continue;
            }
            if !self.location(pair.a).reachable && !self.location(pair.b).reachable {
                continue;
            }
            for end in [pair.a, pair.b] {
                let region = self.region_mut(end.region);
                region.location_mut(end.id).reachable = true;
                if let Some(pos) = region.location(end.id).pos {
                    changed |= region.seed(pos);
                }
            }
        }
        changed
    }

    pub fn reachable_count(&self) -> usize {
        self.regions.iter().map(|r| r.reachable_count()).sum()
    }

    pub fn collected_count(&self) -> usize {
        self.regions
            .iter()
            .flat_map(|r| r.locations.iter())
            .filter(|l| l.collected)
            .count()
    }

    pub fn update_all_reached(&mut self) {
        for region in &mut self.regions {
            region.update_all_reached();
        }
    }

    /// Snapshot handed to the commit collaborator.
    pub fn to_model(&self, seed: &str) -> WorldModel {
        let regions = self
            .regions
            .iter()
            .map(|r| RegionModel {
                kind: r.kind,
                biome: r.biome,
                rows: r.grid.rows(),
                cols: r.grid.cols(),
                terrain: r.grid.to_nibbles(),
                locations: r
                    .locations
                    .iter()
                    .filter(|l| l.active)
                    .map(|l| LocationModel {
                        name: l.name.to_string(),
                        pos: l.pos,
                        anchor: l.anchor.map(|a| r.location(a).name.to_string()),
                        terrain: l.terrain,
                        collectable: l.collectable,
                        palace: l.palace,
                    })
                    .collect(),
                hidden_palace: r.hidden_palace.map(|id| r.location(id).name.to_string()),
                hidden_kasuto: r.hidden_kasuto.map(|id| r.location(id).name.to_string()),
                call_spot: r.call_spot,
            })
            .collect();

        let connections = self
            .connections
            .iter()
            .map(|pair| ConnectionModel {
                kind: pair.kind,
                from_region: pair.a.region,
                from: self.location(pair.a).name.to_string(),
                to_region: pair.b.region,
                to: self.location(pair.b).name.to_string(),
            })
            .collect();

        let palaces = (1..=7u8)
            .filter_map(|number| {
                self.palace(number).map(|at| PalaceEntrance {
                    palace: number,
                    region: at.region,
                    location: self.location(at).name.to_string(),
                })
            })
            .collect();

        WorldModel {
            seed: seed.to_string(),
            regions,
            connections,
            palaces,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldModel {
    pub seed: String,
    pub regions: Vec<RegionModel>,
    pub connections: Vec<ConnectionModel>,
    pub palaces: Vec<PalaceEntrance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionModel {
    pub kind: RegionKind,
    pub biome: Biome,
    pub rows: usize,
    pub cols: usize,
    /// Row-major terrain nibbles.
    pub terrain: Vec<u8>,
    pub locations: Vec<LocationModel>,
    pub hidden_palace: Option<String>,
    pub hidden_kasuto: Option<String>,
    pub call_spot: Option<Pos>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationModel {
    pub name: String,
    pub pos: Option<Pos>,
    pub anchor: Option<String>,
    pub terrain: Terrain,
    pub collectable: Option<Collectable>,
    pub palace: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionModel {
    pub kind: ConnectorKind,
    pub from_region: RegionKind,
    pub from: String,
    pub to_region: RegionKind,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PalaceEntrance {
    pub palace: u8,
    pub region: RegionKind,
    pub location: String,
}

impl WorldModel {
    /// Human-readable summary of where everything ended up.
    pub fn spoiler(&self) -> String {
        let mut log = String::new();
        let _ = writeln!(log, "seed: {}", self.seed);
        log.push_str("connectors:\n");
        for c in &self.connections {
            let _ = writeln!(
                log,
                "  {:?}: {} ({}) <-> {} ({})",
                c.kind,
                c.from,
                c.from_region.name(),
                c.to,
                c.to_region.name()
            );
        }
        log.push_str("palaces:\n");
        for p in &self.palaces {
            let _ = writeln!(log, "  palace {}: {} ({})", p.palace, p.location, p.region.name());
        }
        for region in &self.regions {
            let _ = writeln!(log, "{} [{:?}]", region.kind.name(), region.biome);
            if let Some(hidden) = &region.hidden_palace {
                let _ = writeln!(log, "  hidden palace: {hidden} (call spot {:?})", region.call_spot);
            }
            if let Some(hidden) = &region.hidden_kasuto {
                let _ = writeln!(log, "  hidden town: {hidden}");
            }
            for loc in &region.locations {
                let item = loc.collectable.map(|c| c.name()).unwrap_or("-");
                match (&loc.pos, &loc.anchor) {
                    (_, Some(anchor)) => {
                        let _ = writeln!(log, "  {:<24} @ {:<12} {}", loc.name, anchor, item);
                    }
                    (Some(pos), None) => {
                        let _ = writeln!(log, "  {:<24} @ ({:>2},{:>2})     {}", loc.name, pos.x, pos.y, item);
                    }
                    (None, None) => {
                        let _ = writeln!(log, "  {:<24} @ unplaced     {}", loc.name, item);
                    }
                }
            }
            for row in region.terrain.chunks(region.cols.max(1)) {
                log.push_str("  ");
                for nibble in row {
                    let glyph = match Terrain::from_nibble(*nibble) {
                        Some(Terrain::Water) => '~',
                        Some(Terrain::Mountain) => '^',
                        Some(t) if t.is_entrance() => '@',
                        Some(Terrain::Lava) => 'x',
                        Some(Terrain::Road) | Some(Terrain::Bridge) => '#',
                        _ => '.',
                    };
                    log.push(glyph);
                }
                log.push('\n');
            }
        }
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GenerationOptions;
    use rand::{rngs::StdRng, SeedableRng};

    fn vanilla_world() -> World {
        let mut rng = StdRng::seed_from_u64(0);
        let props = GenerationOptions::default().resolve(&mut rng).unwrap();
        World::new(&props)
    }

    #[test]
    fn connect_activates_both_ends() {
        let mut world = vanilla_world();
        let pair = world
            .connect(ConnectorKind::Bridge, RegionKind::East, RegionKind::MazeIsland)
            .unwrap();
        assert!(world.location(pair.a).active);
        assert!(world.location(pair.b).active);
        assert_eq!(world.connections.len(), 1);
    }

    #[test]
    fn raft_link_waits_for_the_raft() {
        let mut world = vanilla_world();
        let pair = world
            .connect(ConnectorKind::Raft, RegionKind::West, RegionKind::East)
            .unwrap();
        world.location_mut(pair.a).reachable = true;
        world.propagate_connectors(false);
        assert!(!world.location(pair.b).reachable);
        world.propagate_connectors(true);
        assert!(world.location(pair.b).reachable);
    }

    #[test]
    fn palace_lookup_follows_numbers() {
        let world = vanilla_world();
        let four = world.palace(4).unwrap();
        assert_eq!(four.region, RegionKind::MazeIsland);
        assert_eq!(world.find(Landmark::GreatPalace), world.palace(7));
    }

    #[test]
    fn model_lists_only_live_locations() {
        let mut world = vanilla_world();
        world.connect(ConnectorKind::Cave1, RegionKind::West, RegionKind::DeathMountain);
        let model = world.to_model("A");
        let west = &model.regions[0];
        assert!(west.locations.iter().any(|l| l.name == "West Cave Link 1"));
        assert!(!west.locations.iter().any(|l| l.name == "West Raft Dock"));
        assert_eq!(model.palaces.len(), 7);
        assert!(model.spoiler().contains("Cave1"));
    }
}
