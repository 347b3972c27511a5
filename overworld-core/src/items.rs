use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};

use crate::requirements::Requirement;

/// Everything a location can hand out.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Collectable {
    Candle,
    Glove,
    Raft,
    Boots,
    Flute,
    Cross,
    Hammer,
    MagicKey,
    HeartContainer,
    MagicContainer,
    Trophy,
    Medicine,
    Child,
    BagusNote,
    Mirror,
    Water,
    ShieldSpell,
    JumpSpell,
    LifeSpell,
    FairySpell,
    FireSpell,
    DashSpell,
    ReflectSpell,
    SpellSpell,
    ThunderSpell,
    Upstab,
    Downstab,
    BlueJar,
    RedJar,
    SmallBag,
    MediumBag,
    LargeBag,
    XlBag,
    OneUp,
    Key,
    /// Sentinel for slots the solver ignores (the great palace).
    DoNotUse,
}

/// Filler drawn when a slot's vanilla content is already owned.
pub const SMALL_ITEMS: [Collectable; 8] = [
    Collectable::BlueJar,
    Collectable::RedJar,
    Collectable::SmallBag,
    Collectable::MediumBag,
    Collectable::LargeBag,
    Collectable::XlBag,
    Collectable::OneUp,
    Collectable::Key,
];

/// The eight starting-item toggles and the pool index that holds each item
/// in the vanilla ordering.
pub const STARTING_ITEM_POOL_INDEX: [(Collectable, usize); 8] = [
    (Collectable::Candle, 0),
    (Collectable::Glove, 1),
    (Collectable::Raft, 2),
    (Collectable::Boots, 3),
    (Collectable::Flute, 4),
    (Collectable::Cross, 5),
    (Collectable::MagicKey, 14),
    (Collectable::Hammer, 16),
];

pub const MEDICINE_POOL_INDEX: usize = 9;
pub const TROPHY_POOL_INDEX: usize = 10;
pub const CHILD_POOL_INDEX: usize = 17;

/// Palace rewards followed by the fixed overworld slots.
pub const BASE_POOL: [Collectable; 19] = [
    Collectable::Candle,
    Collectable::Glove,
    Collectable::Raft,
    Collectable::Boots,
    Collectable::Flute,
    Collectable::Cross,
    Collectable::HeartContainer,
    Collectable::HeartContainer,
    Collectable::MagicContainer,
    Collectable::Medicine,
    Collectable::Trophy,
    Collectable::HeartContainer,
    Collectable::HeartContainer,
    Collectable::MagicContainer,
    Collectable::MagicKey,
    Collectable::MagicContainer,
    Collectable::Hammer,
    Collectable::Child,
    Collectable::MagicContainer,
];

pub const QUEST_ITEMS: [Collectable; 3] = [
    Collectable::BagusNote,
    Collectable::Mirror,
    Collectable::Water,
];

/// Spells in town order: Rauru, Ruto, Saria, Mido, Nabooru, Darunia,
/// New Kasuto, Old Kasuto.
pub const TOWN_SPELLS: [Collectable; 8] = [
    Collectable::ShieldSpell,
    Collectable::JumpSpell,
    Collectable::LifeSpell,
    Collectable::FairySpell,
    Collectable::FireSpell,
    Collectable::ReflectSpell,
    Collectable::SpellSpell,
    Collectable::ThunderSpell,
];

/// Sword techniques in house order: Mido church, Darunia roof.
pub const SWORD_TECHS: [Collectable; 2] = [Collectable::Downstab, Collectable::Upstab];

impl Collectable {
    pub fn is_spell(self) -> bool {
        matches!(
            self,
            Collectable::ShieldSpell
                | Collectable::JumpSpell
                | Collectable::LifeSpell
                | Collectable::FairySpell
                | Collectable::FireSpell
                | Collectable::DashSpell
                | Collectable::ReflectSpell
                | Collectable::SpellSpell
                | Collectable::ThunderSpell
        )
    }

    pub fn is_filler(self) -> bool {
        SMALL_ITEMS.contains(&self)
    }

    /// Majors are the kinds certification insists on; containers are
    /// counted separately and filler never matters.
    pub fn is_major(self) -> bool {
        !self.is_filler()
            && !matches!(
                self,
                Collectable::HeartContainer | Collectable::MagicContainer | Collectable::DoNotUse
            )
    }

    pub fn as_requirement(self) -> Option<Requirement> {
        Some(match self {
            Collectable::Candle => Requirement::Candle,
            Collectable::Glove => Requirement::Glove,
            Collectable::Raft => Requirement::Raft,
            Collectable::Boots => Requirement::Boots,
            Collectable::Flute => Requirement::Flute,
            Collectable::Cross => Requirement::Cross,
            Collectable::Hammer => Requirement::Hammer,
            Collectable::MagicKey => Requirement::MagicKey,
            Collectable::Trophy => Requirement::Trophy,
            Collectable::Medicine => Requirement::Medicine,
            Collectable::Child => Requirement::Child,
            Collectable::BagusNote => Requirement::BagusNote,
            Collectable::Mirror => Requirement::Mirror,
            Collectable::Water => Requirement::Water,
            Collectable::ShieldSpell => Requirement::Shield,
            Collectable::JumpSpell => Requirement::Jump,
            Collectable::LifeSpell => Requirement::Life,
            Collectable::FairySpell => Requirement::Fairy,
            Collectable::FireSpell => Requirement::Fire,
            Collectable::DashSpell => Requirement::Dash,
            Collectable::ReflectSpell => Requirement::Reflect,
            Collectable::SpellSpell => Requirement::Spell,
            Collectable::ThunderSpell => Requirement::Thunder,
            Collectable::Upstab => Requirement::Upstab,
            Collectable::Downstab => Requirement::Downstab,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Collectable::Candle => "Candle",
            Collectable::Glove => "Handy Glove",
            Collectable::Raft => "Raft",
            Collectable::Boots => "Boots",
            Collectable::Flute => "Flute",
            Collectable::Cross => "Cross",
            Collectable::Hammer => "Hammer",
            Collectable::MagicKey => "Magic Key",
            Collectable::HeartContainer => "Heart Container",
            Collectable::MagicContainer => "Magic Container",
            Collectable::Trophy => "Trophy",
            Collectable::Medicine => "Medicine",
            Collectable::Child => "Child",
            Collectable::BagusNote => "Bagu's Note",
            Collectable::Mirror => "Mirror",
            Collectable::Water => "Water of Life",
            Collectable::ShieldSpell => "Shield Spell",
            Collectable::JumpSpell => "Jump Spell",
            Collectable::LifeSpell => "Life Spell",
            Collectable::FairySpell => "Fairy Spell",
            Collectable::FireSpell => "Fire Spell",
            Collectable::DashSpell => "Dash Spell",
            Collectable::ReflectSpell => "Reflect Spell",
            Collectable::SpellSpell => "Spell Spell",
            Collectable::ThunderSpell => "Thunder Spell",
            Collectable::Upstab => "Upward Thrust",
            Collectable::Downstab => "Downward Thrust",
            Collectable::BlueJar => "Blue Jar",
            Collectable::RedJar => "Red Jar",
            Collectable::SmallBag => "50 Point Bag",
            Collectable::MediumBag => "100 Point Bag",
            Collectable::LargeBag => "200 Point Bag",
            Collectable::XlBag => "500 Point Bag",
            Collectable::OneUp => "1-Up Doll",
            Collectable::Key => "Small Key",
            Collectable::DoNotUse => "Do Not Use",
        }
    }
}

pub fn random_small_item(rng: &mut StdRng) -> Collectable {
    SMALL_ITEMS[rng.gen_range(0..SMALL_ITEMS.len())]
}
