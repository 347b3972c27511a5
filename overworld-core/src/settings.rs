use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};

use crate::items::Collectable;
use crate::region::RegionKind;
use crate::{RandomiserError, Result};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Biome {
    Vanilla,
    VanillaShuffle,
    VanillaLike,
    Islands,
    Canyon,
    DryCanyon,
    Volcano,
    Mountainous,
    Caldera,
    Random,
}

impl Biome {
    /// Fixed-layout biomes read their grid from the base image.
    pub fn is_vanilla(self) -> bool {
        matches!(self, Biome::Vanilla | Biome::VanillaShuffle)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ContinentConnectionType {
    Normal,
    RbBorderShuffle,
    TransportationShuffle,
    Anything,
}

/// Ceilings of the nested retry loops.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryLimits {
    pub shuffle_attempts: u32,
    pub terrain_rounds: u32,
    pub terraform_attempts: u32,
    pub connector_attempts: u32,
    pub overworld_attempts: u32,
}

impl Default for RetryLimits {
    fn default() -> Self {
        Self {
            shuffle_attempts: 10,
            terrain_rounds: 20,
            terraform_attempts: 500,
            connector_attempts: 50,
            overworld_attempts: 20,
        }
    }
}

/// User-facing options. The default is the unmodified world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub west_biome: Biome,
    pub dm_biome: Biome,
    pub east_biome: Biome,
    pub maze_biome: Biome,
    pub continent_connections: ContinentConnectionType,

    pub shuffle_palace_items: bool,
    pub shuffle_overworld_items: bool,
    pub mix_overworld_and_palace_items: bool,
    pub include_pbag_caves_in_shuffle: bool,
    pub include_quest_items_in_shuffle: bool,
    pub include_spells_in_shuffle: bool,
    pub include_sword_techs_in_shuffle: bool,
    pub shuffle_spell_locations: bool,
    pub swap_up_and_down_stab: bool,
    pub replace_fire_with_dash: bool,

    pub start_candle: bool,
    pub start_glove: bool,
    pub start_raft: bool,
    pub start_boots: bool,
    pub start_flute: bool,
    pub start_cross: bool,
    pub start_hammer: bool,
    pub start_magic_key: bool,
    pub start_with_spell_items: bool,
    pub starting_spells: Vec<Collectable>,

    pub starting_hearts: u8,
    pub max_hearts: u8,
    pub disable_magic_container_requirements: bool,
    pub randomize_kasuto_jars: bool,

    pub hidden_palace: bool,
    pub hidden_kasuto: bool,
    pub shuffle_hidden: bool,
    pub vanilla_shuffle_uses_actual_terrain: bool,
    pub can_walk_on_water_with_boots: bool,

    pub swap_palace_continents: bool,
    pub include_great_palace_in_swap: bool,

    pub retry_limits: RetryLimits,
    /// Replaces the computed collectible pool; its length must still match
    /// the slot count.
    pub pool_override: Option<Vec<Collectable>>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            west_biome: Biome::Vanilla,
            dm_biome: Biome::Vanilla,
            east_biome: Biome::Vanilla,
            maze_biome: Biome::Vanilla,
            continent_connections: ContinentConnectionType::Normal,
            shuffle_palace_items: false,
            shuffle_overworld_items: false,
            mix_overworld_and_palace_items: false,
            include_pbag_caves_in_shuffle: false,
            include_quest_items_in_shuffle: false,
            include_spells_in_shuffle: false,
            include_sword_techs_in_shuffle: false,
            shuffle_spell_locations: false,
            swap_up_and_down_stab: false,
            replace_fire_with_dash: false,
            start_candle: false,
            start_glove: false,
            start_raft: false,
            start_boots: false,
            start_flute: false,
            start_cross: false,
            start_hammer: false,
            start_magic_key: false,
            start_with_spell_items: false,
            starting_spells: Vec::new(),
            starting_hearts: 4,
            max_hearts: 8,
            disable_magic_container_requirements: false,
            randomize_kasuto_jars: false,
            hidden_palace: false,
            hidden_kasuto: false,
            shuffle_hidden: false,
            vanilla_shuffle_uses_actual_terrain: false,
            can_walk_on_water_with_boots: false,
            swap_palace_continents: false,
            include_great_palace_in_swap: false,
            retry_limits: RetryLimits::default(),
            pool_override: None,
        }
    }
}

/// Resolved, read-only configuration the engine runs on.
#[derive(Clone, Debug, PartialEq)]
pub struct Properties {
    pub biomes: [Biome; 4],
    pub continent_connections: ContinentConnectionType,
    pub shuffle_palace_items: bool,
    pub shuffle_overworld_items: bool,
    pub mix_overworld_and_palace_items: bool,
    pub include_pbag_caves_in_shuffle: bool,
    pub include_quest_items_in_shuffle: bool,
    pub include_spells_in_shuffle: bool,
    pub include_sword_techs_in_shuffle: bool,
    pub shuffle_spell_locations: bool,
    pub swap_up_and_down_stab: bool,
    pub replace_fire_with_dash: bool,
    /// Items held from the start, in the order of the starting toggles.
    pub starting_items: Vec<Collectable>,
    pub start_with_spell_items: bool,
    pub starting_spells: Vec<Collectable>,
    pub starting_hearts: u8,
    pub max_hearts: u8,
    pub starting_magic: u8,
    pub max_magic: u8,
    pub disable_magic_container_requirements: bool,
    pub kasuto_jars: u8,
    pub hidden_palace: bool,
    pub hidden_kasuto: bool,
    pub shuffle_hidden: bool,
    pub vanilla_shuffle_uses_actual_terrain: bool,
    pub can_walk_on_water_with_boots: bool,
    pub swap_palace_continents: bool,
    pub include_great_palace_in_swap: bool,
    pub retry_limits: RetryLimits,
    pub pool_override: Option<Vec<Collectable>>,
}

impl Properties {
    pub fn biome(&self, kind: RegionKind) -> Biome {
        self.biomes[kind.index()]
    }

    pub fn starts_with(&self, item: Collectable) -> bool {
        self.starting_items.contains(&item)
    }

    /// Every region keeps its vanilla endpoints.
    pub fn all_vanilla(&self) -> bool {
        self.biomes.iter().all(|b| b.is_vanilla())
    }
}

impl GenerationOptions {
    /// Draws the random choices and validates the stat ranges. Consumes the
    /// seeded stream before any generation work.
    pub fn resolve(&self, rng: &mut StdRng) -> Result<Properties> {
        let requested = [self.west_biome, self.dm_biome, self.east_biome, self.maze_biome];
        let mut biomes = [Biome::Vanilla; 4];
        for kind in RegionKind::ALL {
            biomes[kind.index()] = resolve_biome(kind, requested[kind.index()], rng)?;
        }

        if !(1..=8).contains(&self.starting_hearts) || !(1..=8).contains(&self.max_hearts) {
            return Err(RandomiserError::Config(format!(
                "heart counts must be between 1 and 8 (start {}, max {})",
                self.starting_hearts, self.max_hearts
            )));
        }
        if self.starting_hearts > self.max_hearts {
            return Err(RandomiserError::Config(format!(
                "starting hearts {} exceed maximum hearts {}",
                self.starting_hearts, self.max_hearts
            )));
        }
        if let Some(bad) = self.starting_spells.iter().find(|c| !c.is_spell()) {
            return Err(RandomiserError::Config(format!(
                "{} is not a spell",
                bad.name()
            )));
        }

        let kasuto_jars = if self.randomize_kasuto_jars {
            rng.gen_range(5..=7)
        } else {
            7
        };

        let toggles = [
            (self.start_candle, Collectable::Candle),
            (self.start_glove, Collectable::Glove),
            (self.start_raft, Collectable::Raft),
            (self.start_boots, Collectable::Boots),
            (self.start_flute, Collectable::Flute),
            (self.start_cross, Collectable::Cross),
            (self.start_magic_key, Collectable::MagicKey),
            (self.start_hammer, Collectable::Hammer),
        ];
        let starting_items = toggles
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, item)| *item)
            .collect();

        Ok(Properties {
            biomes,
            continent_connections: self.continent_connections,
            shuffle_palace_items: self.shuffle_palace_items,
            shuffle_overworld_items: self.shuffle_overworld_items,
            mix_overworld_and_palace_items: self.mix_overworld_and_palace_items,
            include_pbag_caves_in_shuffle: self.include_pbag_caves_in_shuffle,
            include_quest_items_in_shuffle: self.include_quest_items_in_shuffle,
            include_spells_in_shuffle: self.include_spells_in_shuffle,
            include_sword_techs_in_shuffle: self.include_sword_techs_in_shuffle,
            shuffle_spell_locations: self.shuffle_spell_locations,
            swap_up_and_down_stab: self.swap_up_and_down_stab,
            replace_fire_with_dash: self.replace_fire_with_dash,
            starting_items,
            start_with_spell_items: self.start_with_spell_items,
            starting_spells: self.starting_spells.clone(),
            starting_hearts: self.starting_hearts,
            max_hearts: self.max_hearts,
            starting_magic: 4,
            max_magic: 8,
            disable_magic_container_requirements: self.disable_magic_container_requirements,
            kasuto_jars,
            hidden_palace: self.hidden_palace,
            hidden_kasuto: self.hidden_kasuto,
            shuffle_hidden: self.shuffle_hidden,
            vanilla_shuffle_uses_actual_terrain: self.vanilla_shuffle_uses_actual_terrain,
            can_walk_on_water_with_boots: self.can_walk_on_water_with_boots,
            swap_palace_continents: self.swap_palace_continents,
            include_great_palace_in_swap: self.include_great_palace_in_swap,
            retry_limits: self.retry_limits,
            pool_override: self.pool_override.clone(),
        })
    }
}

fn resolve_biome(kind: RegionKind, requested: Biome, rng: &mut StdRng) -> Result<Biome> {
    let allowed = kind.params().allowed_biomes;
    if requested == Biome::Random {
        let procedural: Vec<Biome> = allowed.iter().copied().filter(|b| !b.is_vanilla()).collect();
        return Ok(procedural[rng.gen_range(0..procedural.len())]);
    }
    if !allowed.contains(&requested) {
        return Err(RandomiserError::Config(format!(
            "{:?} is not a valid biome for {}",
            requested,
            kind.name()
        )));
    }
    Ok(requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn defaults_resolve_to_vanilla() {
        let mut rng = StdRng::seed_from_u64(1);
        let props = GenerationOptions::default().resolve(&mut rng).unwrap();
        assert!(props.all_vanilla());
        assert_eq!(props.kasuto_jars, 7);
        assert_eq!(props.starting_hearts, 4);
        assert_eq!(props.max_hearts, 8);
        assert!(props.starting_items.is_empty());
    }

    #[test]
    fn random_biome_never_picks_a_fixed_layout() {
        let mut rng = StdRng::seed_from_u64(99);
        let options = GenerationOptions {
            west_biome: Biome::Random,
            maze_biome: Biome::Random,
            ..GenerationOptions::default()
        };
        for _ in 0..20 {
            let props = options.resolve(&mut rng).unwrap();
            assert!(!props.biome(RegionKind::West).is_vanilla());
            assert_eq!(props.biome(RegionKind::MazeIsland), Biome::VanillaLike);
        }
    }

    #[test]
    fn disallowed_biome_is_a_config_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let options = GenerationOptions {
            maze_biome: Biome::Volcano,
            ..GenerationOptions::default()
        };
        assert!(matches!(
            options.resolve(&mut rng),
            Err(RandomiserError::Config(_))
        ));
    }

    #[test]
    fn heart_ranges_are_validated() {
        let mut rng = StdRng::seed_from_u64(1);
        let too_many = GenerationOptions {
            starting_hearts: 6,
            max_hearts: 5,
            ..GenerationOptions::default()
        };
        assert!(too_many.resolve(&mut rng).is_err());
        let zero = GenerationOptions {
            starting_hearts: 0,
            ..GenerationOptions::default()
        };
        assert!(zero.resolve(&mut rng).is_err());
    }

    #[test]
    fn options_deserialize_with_missing_fields() {
        let options: GenerationOptions =
            serde_json::from_str(r#"{ "east_biome": "Volcano", "hidden_palace": true }"#).unwrap();
        assert_eq!(options.east_biome, Biome::Volcano);
        assert!(options.hidden_palace);
        assert_eq!(options.retry_limits, RetryLimits::default());
    }
}
