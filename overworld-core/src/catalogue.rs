//! Built-in location tables for the four regions.
//!
//! Each entry describes one slot of the vanilla world. Pair and anchor links
//! are by name and resolved when a region is built.

use crate::items::Collectable;
use crate::location::{ConnectorKind, Landmark, Needs, Town};
use crate::region::RegionKind;
use crate::terrain::Terrain;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LocationSpec {
    pub name: &'static str,
    pub terrain: Terrain,
    pub landmark: Option<Landmark>,
    pub town: Option<Town>,
    pub palace: Option<u8>,
    pub connector: Option<ConnectorKind>,
    pub vanilla: Option<Collectable>,
    pub needs: Needs,
    pub pair: Option<&'static str>,
    pub anchor: Option<&'static str>,
    pub required: bool,
    pub can_shuffle: bool,
}

pub const fn spot(name: &'static str, terrain: Terrain) -> LocationSpec {
    LocationSpec {
        name,
        terrain,
        landmark: None,
        town: None,
        palace: None,
        connector: None,
        vanilla: None,
        needs: Needs {
            flute: false,
            hammer: false,
            boots: false,
            fairy: false,
            jump: false,
        },
        pair: None,
        anchor: None,
        required: true,
        can_shuffle: true,
    }
}

impl LocationSpec {
    pub const fn holds(mut self, item: Collectable) -> Self {
        self.vanilla = Some(item);
        self
    }

    pub const fn landmark(mut self, landmark: Landmark) -> Self {
        self.landmark = Some(landmark);
        self
    }

    pub const fn town(mut self, town: Town) -> Self {
        self.town = Some(town);
        self
    }

    pub const fn palace(mut self, number: u8) -> Self {
        self.palace = Some(number);
        self
    }

    pub const fn connector(mut self, kind: ConnectorKind) -> Self {
        self.connector = Some(kind);
        self.can_shuffle = false;
        self
    }

    pub const fn paired(mut self, partner: &'static str) -> Self {
        self.pair = Some(partner);
        self
    }

    pub const fn anchored(mut self, anchor: &'static str) -> Self {
        self.anchor = Some(anchor);
        self.can_shuffle = false;
        self
    }

    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub const fn fixed(mut self) -> Self {
        self.can_shuffle = false;
        self
    }

    pub const fn needs_boots(mut self) -> Self {
        self.needs.boots = true;
        self
    }

    pub const fn needs_hammer(mut self) -> Self {
        self.needs.hammer = true;
        self
    }

    pub const fn needs_jump(mut self) -> Self {
        self.needs.jump = true;
        self
    }

    pub const fn needs_fairy(mut self) -> Self {
        self.needs.fairy = true;
        self
    }
}

const WEST: &[LocationSpec] = &[
    spot("North Castle", Terrain::Palace)
        .landmark(Landmark::Start)
        .fixed(),
    spot("Parapa Palace", Terrain::Palace)
        .palace(1)
        .landmark(Landmark::Palace1)
        .holds(Collectable::Candle),
    spot("Midoro Palace", Terrain::Palace)
        .palace(2)
        .landmark(Landmark::Palace2)
        .holds(Collectable::Glove),
    spot("Island Palace", Terrain::Palace)
        .palace(3)
        .landmark(Landmark::Palace3)
        .holds(Collectable::Raft),
    spot("Grass Tile", Terrain::Grass)
        .landmark(Landmark::GrassTile)
        .holds(Collectable::HeartContainer),
    spot("Heart Container Cave", Terrain::Cave)
        .landmark(Landmark::HeartCave)
        .holds(Collectable::HeartContainer),
    spot("Magic Container Cave", Terrain::Cave)
        .landmark(Landmark::MagicCave)
        .holds(Collectable::MagicContainer),
    spot("Medicine Cave", Terrain::Cave)
        .landmark(Landmark::MedicineCave)
        .holds(Collectable::Medicine),
    spot("Trophy Cave", Terrain::Cave)
        .landmark(Landmark::TrophyCave)
        .holds(Collectable::Trophy),
    spot("West P-Bag Cave", Terrain::Cave)
        .landmark(Landmark::WestPbagCave)
        .holds(Collectable::XlBag),
    spot("Bagu's House", Terrain::Forest)
        .landmark(Landmark::Bagu)
        .holds(Collectable::BagusNote),
    spot("Rauru", Terrain::Town)
        .town(Town::Rauru)
        .holds(Collectable::ShieldSpell),
    spot("Ruto", Terrain::Town)
        .town(Town::Ruto)
        .holds(Collectable::JumpSpell),
    spot("Saria North", Terrain::Town)
        .town(Town::SariaNorth)
        .holds(Collectable::LifeSpell),
    spot("Saria South", Terrain::Town).town(Town::SariaSouth),
    spot("Saria Mirror Table", Terrain::Town)
        .landmark(Landmark::MirrorTable)
        .anchored("Saria North")
        .holds(Collectable::Mirror),
    spot("Mido", Terrain::Town)
        .town(Town::Mido)
        .holds(Collectable::FairySpell),
    spot("Mido Church", Terrain::Town)
        .town(Town::MidoChurch)
        .anchored("Mido")
        .holds(Collectable::Downstab),
    spot("Parapa Cave North", Terrain::Cave).paired("Parapa Cave South"),
    spot("Parapa Cave South", Terrain::Cave).paired("Parapa Cave North"),
    spot("Jump Cave West", Terrain::Cave)
        .paired("Jump Cave East")
        .needs_jump(),
    spot("Jump Cave East", Terrain::Cave).paired("Jump Cave West"),
    spot("Forest Encounter", Terrain::Forest).optional(),
    spot("Swamp Encounter", Terrain::Swamp).optional(),
    spot("Graveyard", Terrain::Grave).optional(),
    spot("West Raft Dock", Terrain::Road).connector(ConnectorKind::Raft),
    spot("West Bridge", Terrain::Bridge).connector(ConnectorKind::Bridge),
    spot("West Cave Link 1", Terrain::Cave).connector(ConnectorKind::Cave1),
    spot("West Cave Link 2", Terrain::Cave).connector(ConnectorKind::Cave2),
];

const DEATH_MOUNTAIN: &[LocationSpec] = &[
    spot("Hammer Cave", Terrain::Cave)
        .landmark(Landmark::HammerCave)
        .holds(Collectable::Hammer),
    spot("Spectacle Rock", Terrain::Cave)
        .landmark(Landmark::SpectacleRock)
        .holds(Collectable::MagicContainer),
    spot("Mountain Cave A1", Terrain::Cave).paired("Mountain Cave A2"),
    spot("Mountain Cave A2", Terrain::Cave).paired("Mountain Cave A1"),
    spot("Mountain Cave B1", Terrain::Cave).paired("Mountain Cave B2"),
    spot("Mountain Cave B2", Terrain::Cave)
        .paired("Mountain Cave B1")
        .needs_jump(),
    spot("Mountain Cave C1", Terrain::Cave).paired("Mountain Cave C2"),
    spot("Mountain Cave C2", Terrain::Cave).paired("Mountain Cave C1"),
    spot("Mountain Encounter", Terrain::Road).optional(),
    spot("Mountain Raft Dock", Terrain::Road).connector(ConnectorKind::Raft),
    spot("Mountain Bridge", Terrain::Bridge).connector(ConnectorKind::Bridge),
    spot("Mountain Cave Link 1", Terrain::Cave).connector(ConnectorKind::Cave1),
    spot("Mountain Cave Link 2", Terrain::Cave).connector(ConnectorKind::Cave2),
];

const EAST: &[LocationSpec] = &[
    spot("Palace on the Sea", Terrain::Palace)
        .palace(5)
        .landmark(Landmark::Palace5)
        .holds(Collectable::Flute),
    spot("Three-Eye Rock Palace", Terrain::Palace)
        .palace(6)
        .landmark(Landmark::Palace6)
        .holds(Collectable::Cross),
    spot("Great Palace", Terrain::Palace)
        .palace(7)
        .landmark(Landmark::GreatPalace)
        .holds(Collectable::DoNotUse)
        .fixed(),
    spot("Water Tile", Terrain::WalkableWater)
        .landmark(Landmark::WaterTile)
        .holds(Collectable::HeartContainer)
        .needs_boots(),
    spot("Desert Tile", Terrain::Desert)
        .landmark(Landmark::DesertTile)
        .holds(Collectable::HeartContainer),
    spot("Nabooru", Terrain::Town)
        .town(Town::Nabooru)
        .holds(Collectable::FireSpell),
    spot("Nabooru Fountain", Terrain::Town)
        .landmark(Landmark::Fountain)
        .anchored("Nabooru")
        .holds(Collectable::Water),
    spot("Darunia", Terrain::Town)
        .town(Town::Darunia)
        .holds(Collectable::ReflectSpell),
    spot("Darunia Roof", Terrain::Town)
        .town(Town::DaruniaRoof)
        .anchored("Darunia")
        .holds(Collectable::Upstab),
    spot("New Kasuto", Terrain::Town)
        .town(Town::NewKasuto)
        .holds(Collectable::SpellSpell),
    spot("Spell Tower", Terrain::Town)
        .landmark(Landmark::SpellTower)
        .anchored("New Kasuto")
        .holds(Collectable::MagicKey),
    spot("Kasuto Basement", Terrain::Town)
        .landmark(Landmark::KasutoBasement)
        .anchored("New Kasuto")
        .holds(Collectable::MagicContainer),
    spot("Old Kasuto", Terrain::Town)
        .town(Town::OldKasuto)
        .holds(Collectable::ThunderSpell),
    spot("East P-Bag Cave 1", Terrain::Cave)
        .landmark(Landmark::EastPbagCave1)
        .holds(Collectable::XlBag),
    spot("East P-Bag Cave 2", Terrain::Cave)
        .landmark(Landmark::EastPbagCave2)
        .holds(Collectable::XlBag),
    spot("Valley Cave 1", Terrain::Cave)
        .landmark(Landmark::ValleyCave1)
        .paired("Valley Cave 2"),
    spot("Valley Cave 2", Terrain::Cave)
        .landmark(Landmark::ValleyCave2)
        .paired("Valley Cave 1"),
    spot("Valley Cave 3", Terrain::Cave)
        .paired("Valley Cave 4")
        .needs_fairy(),
    spot("Valley Cave 4", Terrain::Cave).paired("Valley Cave 3"),
    spot("Desert Encounter", Terrain::Desert).optional(),
    spot("Lava Encounter", Terrain::Lava).optional(),
    spot("East Raft Dock", Terrain::Road).connector(ConnectorKind::Raft),
    spot("East Bridge", Terrain::Bridge).connector(ConnectorKind::Bridge),
    spot("East Cave Link 1", Terrain::Cave).connector(ConnectorKind::Cave1),
    spot("East Cave Link 2", Terrain::Cave).connector(ConnectorKind::Cave2),
];

const MAZE_ISLAND: &[LocationSpec] = &[
    spot("Maze Island Palace", Terrain::Palace)
        .palace(4)
        .landmark(Landmark::Palace4)
        .holds(Collectable::Boots),
    spot("Child Drop", Terrain::Cave)
        .landmark(Landmark::ChildDrop)
        .holds(Collectable::Child),
    spot("Magic Container Drop", Terrain::Cave)
        .landmark(Landmark::MagicDrop)
        .holds(Collectable::MagicContainer),
    spot("Maze Encounter", Terrain::Swamp).optional(),
    spot("Maze Raft Dock", Terrain::Road).connector(ConnectorKind::Raft),
    spot("Maze Bridge", Terrain::Bridge).connector(ConnectorKind::Bridge),
    spot("Maze Cave Link 1", Terrain::Cave).connector(ConnectorKind::Cave1),
    spot("Maze Cave Link 2", Terrain::Cave).connector(ConnectorKind::Cave2),
];

pub fn locations_for(kind: RegionKind) -> &'static [LocationSpec] {
    match kind {
        RegionKind::West => WEST,
        RegionKind::DeathMountain => DEATH_MOUNTAIN,
        RegionKind::East => EAST,
        RegionKind::MazeIsland => MAZE_ISLAND,
    }
}

/// Palace entrances in pool order.
pub const PALACE_SLOTS: [Landmark; 7] = [
    Landmark::Palace1,
    Landmark::Palace2,
    Landmark::Palace3,
    Landmark::Palace4,
    Landmark::Palace5,
    Landmark::Palace6,
    Landmark::GreatPalace,
];

/// Overworld slots in pool order, following the six palace rewards.
pub const OVERWORLD_SLOTS: [Landmark; 13] = [
    Landmark::GrassTile,
    Landmark::HeartCave,
    Landmark::MagicCave,
    Landmark::MedicineCave,
    Landmark::TrophyCave,
    Landmark::WaterTile,
    Landmark::DesertTile,
    Landmark::KasutoBasement,
    Landmark::SpellTower,
    Landmark::SpectacleRock,
    Landmark::HammerCave,
    Landmark::ChildDrop,
    Landmark::MagicDrop,
];

pub const PBAG_SLOTS: [Landmark; 3] = [
    Landmark::WestPbagCave,
    Landmark::EastPbagCave1,
    Landmark::EastPbagCave2,
];

pub const QUEST_SLOTS: [Landmark; 3] = [Landmark::Bagu, Landmark::MirrorTable, Landmark::Fountain];

/// Spell towns in the order of [`crate::items::TOWN_SPELLS`].
pub const SPELL_TOWNS: [Town; 8] = [
    Town::Rauru,
    Town::Ruto,
    Town::SariaNorth,
    Town::Mido,
    Town::Nabooru,
    Town::Darunia,
    Town::NewKasuto,
    Town::OldKasuto,
];

pub const TECH_TOWNS: [Town; 2] = [Town::MidoChurch, Town::DaruniaRoof];
