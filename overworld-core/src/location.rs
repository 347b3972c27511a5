use serde::{Deserialize, Serialize};

use crate::catalogue::LocationSpec;
use crate::items::Collectable;
use crate::region::RegionKind;
use crate::terrain::{Pos, Terrain};

/// Index of a location inside its region's list.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct LocationId(pub usize);

/// A location addressed across the whole world.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct LocRef {
    pub region: RegionKind,
    pub id: LocationId,
}

impl LocRef {
    pub fn new(region: RegionKind, id: LocationId) -> Self {
        Self { region, id }
    }
}

/// The four cross-region links.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum ConnectorKind {
    Raft,
    Bridge,
    Cave1,
    Cave2,
}

impl ConnectorKind {
    pub const ALL: [ConnectorKind; 4] = [
        ConnectorKind::Cave1,
        ConnectorKind::Cave2,
        ConnectorKind::Raft,
        ConnectorKind::Bridge,
    ];

    /// Terrain of the connector cell on the map.
    pub fn terrain(self) -> Terrain {
        match self {
            ConnectorKind::Raft => Terrain::Road,
            ConnectorKind::Bridge => Terrain::Bridge,
            ConnectorKind::Cave1 | ConnectorKind::Cave2 => Terrain::Cave,
        }
    }

    pub fn is_coastal(self) -> bool {
        matches!(self, ConnectorKind::Raft | ConnectorKind::Bridge)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Town {
    Rauru,
    Ruto,
    SariaNorth,
    SariaSouth,
    Mido,
    MidoChurch,
    Nabooru,
    Darunia,
    DaruniaRoof,
    NewKasuto,
    OldKasuto,
}

/// Named slots that generation or shuffling addresses directly.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Landmark {
    Start,
    Palace1,
    Palace2,
    Palace3,
    Palace4,
    Palace5,
    Palace6,
    GreatPalace,
    GrassTile,
    HeartCave,
    MagicCave,
    MedicineCave,
    TrophyCave,
    WestPbagCave,
    Bagu,
    MirrorTable,
    HammerCave,
    SpectacleRock,
    WaterTile,
    DesertTile,
    Fountain,
    SpellTower,
    KasutoBasement,
    EastPbagCave1,
    EastPbagCave2,
    ValleyCave1,
    ValleyCave2,
    ChildDrop,
    MagicDrop,
}

/// Movement gates on a location. `fairy` and `jump` apply to crossing into
/// the paired location rather than to the location itself.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Needs {
    pub flute: bool,
    pub hammer: bool,
    pub boots: bool,
    pub fairy: bool,
    pub jump: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub name: &'static str,
    pub landmark: Option<Landmark>,
    pub town: Option<Town>,
    pub palace: Option<u8>,
    pub connector: Option<ConnectorKind>,
    pub terrain: Terrain,
    pub pos: Option<Pos>,
    pub collectable: Option<Collectable>,
    pub vanilla: Option<Collectable>,
    pub needs: Needs,
    pub pair: Option<LocationId>,
    pub anchor: Option<LocationId>,
    pub required: bool,
    pub can_shuffle: bool,
    /// Connector slots stay inactive unless assigned to a pair.
    pub active: bool,
    pub reachable: bool,
    pub collected: bool,
}

impl Location {
    /// Pair and anchor links are resolved by the owning region.
    pub fn from_spec(spec: &LocationSpec) -> Self {
        Self {
            name: spec.name,
            landmark: spec.landmark,
            town: spec.town,
            palace: spec.palace,
            connector: spec.connector,
            terrain: spec.terrain,
            pos: None,
            collectable: spec.vanilla,
            vanilla: spec.vanilla,
            needs: spec.needs,
            pair: None,
            anchor: None,
            required: spec.required,
            can_shuffle: spec.can_shuffle,
            active: spec.connector.is_none(),
            reachable: false,
            collected: false,
        }
    }

    /// Anchored locations share their anchor's cell and never own one.
    pub fn occupies_cell(&self) -> bool {
        self.active && self.anchor.is_none()
    }

    pub fn is_great_palace(&self) -> bool {
        self.palace == Some(7)
    }

    /// The solver skips the sentinel entirely.
    pub fn is_ignored(&self) -> bool {
        self.collectable == Some(Collectable::DoNotUse)
    }

    pub fn passes_movement(&self, boots: bool, hammer: bool, flute: bool) -> bool {
        (!self.needs.boots || boots) && (!self.needs.hammer || hammer) && (!self.needs.flute || flute)
    }
}
