use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::items::Collectable;
use crate::location::Town;

/// Logic facts the solver can test for.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Requirement {
    Candle,
    Glove,
    Raft,
    Boots,
    Flute,
    Cross,
    Hammer,
    MagicKey,
    Trophy,
    Medicine,
    Child,
    BagusNote,
    Mirror,
    Water,
    Shield,
    Jump,
    Life,
    Fairy,
    Fire,
    Dash,
    Reflect,
    Spell,
    Thunder,
    Upstab,
    Downstab,
    FiveContainers,
    SixContainers,
    SevenContainers,
    EightContainers,
}

impl Requirement {
    pub fn containers(count: u8) -> Option<Requirement> {
        match count {
            5 => Some(Requirement::FiveContainers),
            6 => Some(Requirement::SixContainers),
            7 => Some(Requirement::SevenContainers),
            8 => Some(Requirement::EightContainers),
            _ => None,
        }
    }
}

pub type RequirementSet = BTreeSet<Requirement>;

/// A gate: every atom of `all`, plus at least one full group of `any`
/// when that list is non-empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Requirements {
    pub all: &'static [Requirement],
    pub any: &'static [&'static [Requirement]],
}

impl Requirements {
    pub const NONE: Requirements = Requirements { all: &[], any: &[] };

    pub const fn all(atoms: &'static [Requirement]) -> Requirements {
        Requirements { all: atoms, any: &[] }
    }

    pub fn satisfied_by(&self, held: &RequirementSet) -> bool {
        self.all.iter().all(|r| held.contains(r))
            && (self.any.is_empty()
                || self
                    .any
                    .iter()
                    .any(|group| group.iter().all(|r| held.contains(r))))
    }
}

/// Entry requirements of each town's reward.
pub fn town_requirements(town: Town) -> Requirements {
    match town {
        Town::Rauru | Town::SariaSouth => Requirements::NONE,
        Town::Ruto => Requirements::all(&[Requirement::Trophy]),
        Town::SariaNorth => Requirements::all(&[Requirement::Mirror]),
        Town::Mido => Requirements::all(&[Requirement::Medicine]),
        Town::MidoChurch => Requirements::all(&[Requirement::Jump]),
        Town::Nabooru => Requirements::all(&[Requirement::Water]),
        Town::Darunia => Requirements::all(&[Requirement::Child]),
        Town::DaruniaRoof => Requirements::all(&[Requirement::Jump]),
        Town::NewKasuto => Requirements::all(&[Requirement::SixContainers]),
        Town::OldKasuto => Requirements::all(&[Requirement::EightContainers]),
    }
}

/// What the player holds during a solve. Reset by the shuffler at the start
/// of every attempt and only grown by the solver afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcquisitionState {
    obtained: BTreeMap<Collectable, bool>,
    pub heart_containers: u8,
    pub magic_containers: u8,
    pub disable_magic_requirements: bool,
}

impl AcquisitionState {
    /// Tracks exactly the given majors, all initially missing.
    pub fn new(
        majors: &[Collectable],
        start_hearts: u8,
        start_magic: u8,
        disable_magic_requirements: bool,
    ) -> Self {
        Self {
            obtained: majors.iter().map(|c| (*c, false)).collect(),
            heart_containers: start_hearts,
            magic_containers: start_magic,
            disable_magic_requirements,
        }
    }

    pub fn has(&self, item: Collectable) -> bool {
        self.obtained.get(&item).copied().unwrap_or(false)
    }

    pub fn is_tracked(&self, item: Collectable) -> bool {
        self.obtained.contains_key(&item)
    }

    /// Records a collected item. Returns true when something changed.
    pub fn collect(&mut self, item: Collectable) -> bool {
        match item {
            Collectable::HeartContainer => {
                self.heart_containers = self.heart_containers.saturating_add(1);
                true
            }
            Collectable::MagicContainer => {
                self.magic_containers = self.magic_containers.saturating_add(1);
                true
            }
            other => match self.obtained.get_mut(&other) {
                Some(flag) if !*flag => {
                    *flag = true;
                    true
                }
                _ => false,
            },
        }
    }

    pub fn mark_obtained(&mut self, item: Collectable) {
        self.obtained.insert(item, true);
    }

    pub fn missing_majors(&self) -> Vec<Collectable> {
        self.obtained
            .iter()
            .filter(|(_, got)| !**got)
            .map(|(item, _)| *item)
            .collect()
    }

    pub fn obtained_majors(&self) -> BTreeSet<Collectable> {
        self.obtained
            .iter()
            .filter(|(_, got)| **got)
            .map(|(item, _)| *item)
            .collect()
    }

    /// The atoms currently satisfied. Container thresholds count the magic
    /// containers held, or are all granted when magic requirements are off.
    pub fn requireables(&self) -> RequirementSet {
        let mut held: RequirementSet = self
            .obtained
            .iter()
            .filter(|(_, got)| **got)
            .filter_map(|(item, _)| item.as_requirement())
            .collect();
        for count in 5..=8u8 {
            if self.disable_magic_requirements || self.magic_containers >= count {
                if let Some(req) = Requirement::containers(count) {
                    held.insert(req);
                }
            }
        }
        held
    }
}
