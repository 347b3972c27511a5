//! Collectible pool construction and placement.

use log::debug;
use rand::{rngs::StdRng, Rng};

use crate::catalogue::{OVERWORLD_SLOTS, PBAG_SLOTS, QUEST_SLOTS, SPELL_TOWNS, TECH_TOWNS};
use crate::items::{
    random_small_item, Collectable, BASE_POOL, CHILD_POOL_INDEX, MEDICINE_POOL_INDEX,
    QUEST_ITEMS, STARTING_ITEM_POOL_INDEX, SWORD_TECHS, TOWN_SPELLS, TROPHY_POOL_INDEX,
};
use crate::location::{LocRef, Town};
use crate::requirements::AcquisitionState;
use crate::settings::Properties;
use crate::world::World;
use crate::{RandomiserError, Result};

/// Pool indices of the four base heart containers.
const HEART_POOL_INDICES: [usize; 4] = [6, 7, 11, 12];
const PALACE_REWARDS: usize = 6;

/// In-place uniform permutation: each position from the back swaps with a
/// random position at or before it.
pub(crate) fn fisher_yates<T>(items: &mut [T], rng: &mut StdRng) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// The collectibles certification insists on.
pub fn majors(props: &Properties) -> Vec<Collectable> {
    let mut majors = vec![
        Collectable::Candle,
        Collectable::Glove,
        Collectable::Raft,
        Collectable::Boots,
        Collectable::Flute,
        Collectable::Cross,
        Collectable::Hammer,
        Collectable::MagicKey,
        Collectable::Trophy,
        Collectable::Medicine,
        Collectable::Child,
        Collectable::BagusNote,
        Collectable::Mirror,
        Collectable::Water,
        Collectable::Upstab,
        Collectable::Downstab,
    ];
    majors.extend(spell_set(props));
    majors
}

fn spell_set(props: &Properties) -> [Collectable; 8] {
    let mut spells = TOWN_SPELLS;
    if props.replace_fire_with_dash {
        spells[4] = Collectable::DashSpell;
    }
    spells
}

fn heart_pool_count(props: &Properties) -> usize {
    props.max_hearts.saturating_sub(props.starting_hearts).min(7) as usize
}

/// Heart containers beyond the base four that need a promoted p-bag cave.
fn promoted_caves(props: &Properties) -> usize {
    if props.include_pbag_caves_in_shuffle {
        0
    } else {
        heart_pool_count(props).saturating_sub(4)
    }
}

/// Pool before heart normalization and start-item collapse.
pub fn base_pool(props: &Properties) -> Vec<Collectable> {
    let mut pool = BASE_POOL.to_vec();
    if props.include_pbag_caves_in_shuffle {
        pool.extend([Collectable::XlBag; 3]);
    }
    if props.include_quest_items_in_shuffle {
        pool.extend(QUEST_ITEMS);
    }
    if props.include_spells_in_shuffle {
        pool.extend(spell_set(props));
    }
    if props.include_sword_techs_in_shuffle {
        pool.extend(SWORD_TECHS);
    }
    pool
}

/// Slots the pool fills, before any p-bag cave promotion.
pub fn slot_count(props: &Properties) -> usize {
    let mut count = PALACE_REWARDS + OVERWORLD_SLOTS.len();
    if props.include_pbag_caves_in_shuffle {
        count += PBAG_SLOTS.len();
    }
    if props.include_quest_items_in_shuffle {
        count += QUEST_SLOTS.len();
    }
    if props.include_spells_in_shuffle {
        count += SPELL_TOWNS.len();
    }
    if props.include_sword_techs_in_shuffle {
        count += TECH_TOWNS.len();
    }
    count
}

/// Pool/slot equality, checked once before any terrain work.
pub fn validate_pool(props: &Properties) -> Result<()> {
    let slots = slot_count(props) + promoted_caves(props);
    let pool = match &props.pool_override {
        Some(pool) => pool.len() + promoted_caves(props),
        None => base_pool(props).len() + promoted_caves(props),
    };
    if pool != slots {
        return Err(RandomiserError::Config(format!(
            "collectible pool has {pool} entries for {slots} slots"
        )));
    }
    Ok(())
}

/// A finished placement.
#[derive(Clone, Debug)]
pub struct Placement {
    pub slots: Vec<LocRef>,
    pub pool: Vec<Collectable>,
    pub acquisition: AcquisitionState,
}

/// One shuffle attempt over a terraformed world: resets rewards, applies
/// the palace, spell and technique rearrangements, builds and collapses
/// the pool, permutes it and writes it into the slots.
pub fn shuffle_items(world: &mut World, props: &Properties, rng: &mut StdRng) -> Result<Placement> {
    world.reset_collectables();
    if props.swap_palace_continents {
        swap_palace_numbers(world, props, rng);
    }
    if let Some(great) = world.palace(7) {
        world.location_mut(great).collectable = Some(Collectable::DoNotUse);
    }
    place_town_rewards(world, props, rng);

    let mut acquisition = AcquisitionState::new(
        &majors(props),
        props.starting_hearts,
        props.starting_magic,
        props.disable_magic_container_requirements,
    );

    let mut slots = slot_list(world, props)?;
    let mut pool = props.pool_override.clone().unwrap_or_else(|| base_pool(props));
    normalize_hearts(world, props, rng, &mut slots, &mut pool);

    if pool.len() != slots.len() {
        return Err(RandomiserError::Config(format!(
            "collectible pool has {} entries for {} slots",
            pool.len(),
            slots.len()
        )));
    }

    collapse_starting_items(world, props, rng, &mut pool, &mut acquisition);

    if props.mix_overworld_and_palace_items {
        fisher_yates(&mut pool, rng);
    } else {
        if props.shuffle_palace_items {
            for i in (1..PALACE_REWARDS).rev() {
                let s = rng.gen_range(0..=i);
                pool.swap(i, s);
            }
        }
        if props.shuffle_overworld_items {
            for i in (PALACE_REWARDS + 1..pool.len()).rev() {
                let s = rng.gen_range(PALACE_REWARDS..=i);
                pool.swap(i, s);
            }
        }
    }

    for (slot, item) in slots.iter().zip(&pool) {
        world.location_mut(*slot).collectable = Some(*item);
    }
    debug!("placed {} collectibles", pool.len());
    Ok(Placement {
        slots,
        pool,
        acquisition,
    })
}

/// Permutes palace numbers over the palace entrances, keeping the great
/// palace in place unless it joins the swap.
fn swap_palace_numbers(world: &mut World, props: &Properties, rng: &mut StdRng) {
    let last = if props.include_great_palace_in_swap { 7 } else { 6 };
    let entrances: Vec<LocRef> = (1..=last).filter_map(|n| world.palace(n)).collect();
    let mut numbers: Vec<u8> = entrances
        .iter()
        .filter_map(|at| world.location(*at).palace)
        .collect();
    fisher_yates(&mut numbers, rng);
    for (at, number) in entrances.into_iter().zip(numbers) {
        world.location_mut(at).palace = Some(number);
    }
}

/// Spells and techniques that stay out of the pool still move around when
/// asked to.
fn place_town_rewards(world: &mut World, props: &Properties, rng: &mut StdRng) {
    if !props.include_spells_in_shuffle {
        let mut spells = spell_set(props).to_vec();
        if props.shuffle_spell_locations {
            fisher_yates(&mut spells, rng);
        }
        for (town, spell) in SPELL_TOWNS.iter().zip(spells) {
            if let Some(at) = world.find_town(*town) {
                world.location_mut(at).collectable = Some(spell);
            }
        }
    }
    if !props.include_sword_techs_in_shuffle && props.swap_up_and_down_stab {
        for (town, tech) in TECH_TOWNS.iter().zip([Collectable::Upstab, Collectable::Downstab]) {
            if let Some(at) = world.find_town(*town) {
                world.location_mut(at).collectable = Some(tech);
            }
        }
    }
}

fn slot_list(world: &World, props: &Properties) -> Result<Vec<LocRef>> {
    let missing = |what: &str| RandomiserError::Config(format!("world has no slot for {what}"));
    let mut slots = Vec::with_capacity(slot_count(props));
    for number in 1..=PALACE_REWARDS as u8 {
        slots.push(world.palace(number).ok_or_else(|| missing("a palace reward"))?);
    }
    let mut landmarks = OVERWORLD_SLOTS.to_vec();
    if props.include_pbag_caves_in_shuffle {
        landmarks.extend(PBAG_SLOTS);
    }
    if props.include_quest_items_in_shuffle {
        landmarks.extend(QUEST_SLOTS);
    }
    for landmark in landmarks {
        slots.push(world.find(landmark).ok_or_else(|| missing("a landmark"))?);
    }
    let mut towns: Vec<Town> = Vec::new();
    if props.include_spells_in_shuffle {
        towns.extend(SPELL_TOWNS);
    }
    if props.include_sword_techs_in_shuffle {
        towns.extend(TECH_TOWNS);
    }
    for town in towns {
        slots.push(world.find_town(town).ok_or_else(|| missing("a town"))?);
    }
    Ok(slots)
}

/// Brings the heart containers in the pool to `max - start`. Below four,
/// random base hearts become filler; above four, p-bag entries or promoted
/// p-bag caves carry the extras.
fn normalize_hearts(
    world: &World,
    props: &Properties,
    rng: &mut StdRng,
    slots: &mut Vec<LocRef>,
    pool: &mut Vec<Collectable>,
) {
    let hearts = heart_pool_count(props);
    if hearts < 4 {
        let mut candidates = HEART_POOL_INDICES.to_vec();
        fisher_yates(&mut candidates, rng);
        for idx in candidates.into_iter().take(4 - hearts) {
            if idx < pool.len() {
                pool[idx] = random_small_item(rng);
            }
        }
    } else if hearts > 4 {
        let extra = hearts - 4;
        let mut caves: Vec<usize> = (0..PBAG_SLOTS.len()).collect();
        fisher_yates(&mut caves, rng);
        if props.include_pbag_caves_in_shuffle {
            let first = BASE_POOL.len();
            for cave in caves.into_iter().take(extra) {
                if first + cave < pool.len() {
                    pool[first + cave] = Collectable::HeartContainer;
                }
            }
        } else {
            for cave in caves.into_iter().take(extra) {
                if let Some(at) = world.find(PBAG_SLOTS[cave]) {
                    slots.push(at);
                    pool.push(Collectable::HeartContainer);
                }
            }
        }
    }
}

/// Marks starting equipment as held and swaps its pool entry for filler.
/// Towns whose spell is already known no longer gate their key item.
fn collapse_starting_items(
    world: &World,
    props: &Properties,
    rng: &mut StdRng,
    pool: &mut [Collectable],
    acquisition: &mut AcquisitionState,
) {
    for (item, idx) in STARTING_ITEM_POOL_INDEX {
        if props.starts_with(item) {
            pool[idx] = random_small_item(rng);
            acquisition.mark_obtained(item);
        }
    }

    for spell in &props.starting_spells {
        acquisition.mark_obtained(*spell);
        if props.include_spells_in_shuffle {
            if let Some(slot) = pool.iter_mut().find(|c| **c == *spell) {
                *slot = random_small_item(rng);
            }
        }
    }

    if props.start_with_spell_items {
        for idx in [MEDICINE_POOL_INDEX, TROPHY_POOL_INDEX, CHILD_POOL_INDEX] {
            pool[idx] = random_small_item(rng);
        }
        for item in [Collectable::Medicine, Collectable::Trophy, Collectable::Child] {
            acquisition.mark_obtained(item);
        }
    }

    if props.include_spells_in_shuffle {
        return;
    }
    let gates = [
        (Town::Ruto, TROPHY_POOL_INDEX, Collectable::Trophy),
        (Town::Mido, MEDICINE_POOL_INDEX, Collectable::Medicine),
        (Town::Darunia, CHILD_POOL_INDEX, Collectable::Child),
    ];
    for (town, idx, key_item) in gates {
        let spell = world.find_town(town).and_then(|at| world.location(at).collectable);
        if let Some(spell) = spell {
            if acquisition.has(spell) && !acquisition.has(key_item) {
                pool[idx] = random_small_item(rng);
                acquisition.mark_obtained(key_item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GenerationOptions;
    use rand::SeedableRng;

    fn setup(options: GenerationOptions) -> (World, Properties) {
        let mut rng = StdRng::seed_from_u64(0);
        let props = options.resolve(&mut rng).unwrap();
        (World::new(&props), props)
    }

    fn count(pool: &[Collectable], item: Collectable) -> usize {
        pool.iter().filter(|c| **c == item).count()
    }

    #[test]
    fn unshuffled_pool_lands_on_vanilla_slots() {
        let (mut world, props) = setup(GenerationOptions::default());
        let mut rng = StdRng::seed_from_u64(1);
        let placement = shuffle_items(&mut world, &props, &mut rng).unwrap();
        assert_eq!(placement.pool, BASE_POOL.to_vec());
        for slot in &placement.slots {
            let loc = world.location(*slot);
            assert_eq!(loc.collectable, loc.vanilla, "{}", loc.name);
        }
    }

    #[test]
    fn pool_matches_slots_for_every_toggle_mix() {
        let toggles = [false, true];
        for pbag in toggles {
            for quest in toggles {
                for spells in toggles {
                    for techs in toggles {
                        let (mut world, props) = setup(GenerationOptions {
                            include_pbag_caves_in_shuffle: pbag,
                            include_quest_items_in_shuffle: quest,
                            include_spells_in_shuffle: spells,
                            include_sword_techs_in_shuffle: techs,
                            mix_overworld_and_palace_items: true,
                            starting_hearts: 1,
                            max_hearts: 8,
                            ..GenerationOptions::default()
                        });
                        validate_pool(&props).unwrap();
                        let mut rng = StdRng::seed_from_u64(2);
                        let placement = shuffle_items(&mut world, &props, &mut rng).unwrap();
                        assert_eq!(placement.pool.len(), placement.slots.len());
                        let unique: std::collections::BTreeSet<_> = placement.slots.iter().collect();
                        assert_eq!(unique.len(), placement.slots.len());
                    }
                }
            }
        }
    }

    #[test]
    fn heart_count_follows_start_and_max() {
        for (start, max) in [(4, 8), (1, 8), (3, 5), (8, 8), (2, 3)] {
            let (mut world, props) = setup(GenerationOptions {
                starting_hearts: start,
                max_hearts: max,
                shuffle_overworld_items: true,
                ..GenerationOptions::default()
            });
            let mut rng = StdRng::seed_from_u64(3);
            let placement = shuffle_items(&mut world, &props, &mut rng).unwrap();
            assert_eq!(
                count(&placement.pool, Collectable::HeartContainer),
                (max - start) as usize,
                "start {start} max {max}"
            );
        }
    }

    #[test]
    fn starting_items_become_filler_and_count_as_held() {
        let (mut world, props) = setup(GenerationOptions {
            start_hammer: true,
            start_candle: true,
            start_with_spell_items: true,
            ..GenerationOptions::default()
        });
        let mut rng = StdRng::seed_from_u64(4);
        let placement = shuffle_items(&mut world, &props, &mut rng).unwrap();
        assert!(placement.pool[0].is_filler());
        assert!(placement.pool[16].is_filler());
        assert_eq!(count(&placement.pool, Collectable::Medicine), 0);
        assert!(placement.acquisition.has(Collectable::Hammer));
        assert!(placement.acquisition.has(Collectable::Child));
        assert!(!placement.acquisition.has(Collectable::Glove));
    }

    #[test]
    fn known_town_spell_releases_its_key_item() {
        let (mut world, props) = setup(GenerationOptions {
            starting_spells: vec![Collectable::JumpSpell],
            ..GenerationOptions::default()
        });
        let mut rng = StdRng::seed_from_u64(5);
        let placement = shuffle_items(&mut world, &props, &mut rng).unwrap();
        assert!(placement.pool[TROPHY_POOL_INDEX].is_filler());
        assert!(placement.acquisition.has(Collectable::Trophy));
        assert_eq!(placement.pool[MEDICINE_POOL_INDEX], Collectable::Medicine);
    }

    #[test]
    fn palace_shuffle_stays_in_the_palace_range() {
        let (mut world, props) = setup(GenerationOptions {
            shuffle_palace_items: true,
            ..GenerationOptions::default()
        });
        let mut rng = StdRng::seed_from_u64(6);
        let placement = shuffle_items(&mut world, &props, &mut rng).unwrap();
        let mut palace_items = placement.pool[..6].to_vec();
        palace_items.sort();
        let mut vanilla = BASE_POOL[..6].to_vec();
        vanilla.sort();
        assert_eq!(palace_items, vanilla);
        assert_eq!(placement.pool[6..], BASE_POOL[6..]);
    }

    #[test]
    fn override_off_by_one_is_rejected() {
        let mut pool = BASE_POOL.to_vec();
        pool.pop();
        let (_, props) = setup(GenerationOptions {
            pool_override: Some(pool),
            ..GenerationOptions::default()
        });
        assert!(matches!(validate_pool(&props), Err(RandomiserError::Config(_))));
    }

    #[test]
    fn palace_swap_moves_numbers_not_rewards_order() {
        let (mut world, props) = setup(GenerationOptions {
            swap_palace_continents: true,
            include_great_palace_in_swap: true,
            ..GenerationOptions::default()
        });
        let mut rng = StdRng::seed_from_u64(8);
        shuffle_items(&mut world, &props, &mut rng).unwrap();
        let great = world.palace(7).unwrap();
        assert_eq!(world.location(great).collectable, Some(Collectable::DoNotUse));
        let one = world.palace(1).unwrap();
        assert_eq!(world.location(one).collectable, Some(Collectable::Candle));
    }

    #[test]
    fn palace_swap_survives_partial_rebuilds() {
        let (mut world, props) = setup(GenerationOptions {
            swap_palace_continents: true,
            ..GenerationOptions::default()
        });
        let mut rng = StdRng::seed_from_u64(10);
        for round in 0..12 {
            shuffle_items(&mut world, &props, &mut rng).unwrap();
            let mut numbers: Vec<u8> = world
                .regions
                .iter()
                .flat_map(|r| r.locations.iter())
                .filter_map(|l| l.palace)
                .collect();
            numbers.sort();
            assert_eq!(numbers, (1..=7).collect::<Vec<_>>(), "round {round}");
            assert_eq!(world.location(world.palace(7).unwrap()).name, "Great Palace");

            // Only some regions are re-terraformed between rounds.
            let kind = crate::region::RegionKind::ALL[round % 4];
            world.region_mut(kind).rebuild();
        }
    }

    #[test]
    fn fisher_yates_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut items: Vec<u32> = (0..50).collect();
        fisher_yates(&mut items, &mut rng);
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_ne!(items, sorted);
    }
}
