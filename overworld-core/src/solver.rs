//! Fixpoint reachability over the whole world.
//!
//! Each round floods every region from what is already reachable, carries
//! reachability over live connectors and then collects whatever the current
//! requirement atoms unlock. Rounds repeat until neither the reachable count
//! nor the collected set moves.

use log::debug;
use std::fmt;

use crate::items::Collectable;
use crate::location::{Landmark, Location};
use crate::requirements::{town_requirements, AcquisitionState, Requirement, RequirementSet};
use crate::settings::Properties;
use crate::terrain::Movement;
use crate::world::World;
use crate::{Attempt, Conflict};

/// Item-accessibility predicate of a palace interior.
pub trait PalaceLogic {
    fn can_clear(&self, palace: u8, held: &RequirementSet) -> bool;
}

/// Interiors as they ship: the third palace cannot be finished without a
/// thrust technique.
#[derive(Clone, Copy, Debug, Default)]
pub struct VanillaPalaces;

impl PalaceLogic for VanillaPalaces {
    fn can_clear(&self, palace: u8, held: &RequirementSet) -> bool {
        match palace {
            3 => held.contains(&Requirement::Downstab) || held.contains(&Requirement::Upstab),
            _ => true,
        }
    }
}

/// Why a solve did not certify.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CertificationFailure {
    MissingMajor(Collectable),
    MagicContainers { have: u8, need: u8 },
    HeartContainers { have: u8, need: u8 },
    Unreached(&'static str),
}

impl CertificationFailure {
    /// Short key for the diagnostics tally.
    pub fn cause(&self) -> &'static str {
        match self {
            CertificationFailure::MissingMajor(_) => "missing major",
            CertificationFailure::MagicContainers { .. } => "magic containers",
            CertificationFailure::HeartContainers { .. } => "heart containers",
            CertificationFailure::Unreached(_) => "unreached location",
        }
    }
}

impl fmt::Display for CertificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificationFailure::MissingMajor(item) => write!(f, "{} never obtained", item.name()),
            CertificationFailure::MagicContainers { have, need } => {
                write!(f, "{have} of {need} magic containers")
            }
            CertificationFailure::HeartContainers { have, need } => {
                write!(f, "{have} of {need} heart containers")
            }
            CertificationFailure::Unreached(name) => write!(f, "{name} unreachable"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundStats {
    pub reachable: usize,
    pub collected: usize,
}

#[derive(Clone, Debug)]
pub struct SolveReport {
    pub rounds: Vec<RoundStats>,
    pub acquisition: AcquisitionState,
    pub verdict: std::result::Result<(), CertificationFailure>,
}

impl SolveReport {
    pub fn certified(&self) -> bool {
        self.verdict.is_ok()
    }

    pub fn attempt(&self) -> Attempt<()> {
        match &self.verdict {
            Ok(()) => Attempt::Success(()),
            Err(failure) => Attempt::Conflict(Conflict::Certification(failure.clone())),
        }
    }
}

pub struct Solver<'a> {
    props: &'a Properties,
    palaces: &'a dyn PalaceLogic,
}

impl<'a> Solver<'a> {
    pub fn new(props: &'a Properties, palaces: &'a dyn PalaceLogic) -> Self {
        Self { props, palaces }
    }

    /// Runs the fixpoint from `initial` and certifies the result. Terrain is
    /// read only; location flags are reset first.
    pub fn solve(&self, world: &mut World, initial: &AcquisitionState) -> SolveReport {
        let mut state = initial.clone();
        world.reset_reachability();
        for region in &mut world.regions {
            region.seed_start();
        }

        let mut rounds = Vec::new();
        loop {
            let before = world.reachable_count();
            let mut collected_any = false;
            // Two passes per round: the second lets items from the first
            // open their gates before the round's change check.
            for _ in 0..2 {
                self.update_reachable(world, &state);
                collected_any |= self.update_item_gets(world, &mut state);
            }
            let after = world.reachable_count();
            rounds.push(RoundStats {
                reachable: after,
                collected: world.collected_count(),
            });
            if after == before && !collected_any {
                break;
            }
        }
        world.update_all_reached();

        let verdict = self.certify(world, &state);
        debug!(
            "solve finished after {} rounds: {}",
            rounds.len(),
            match &verdict {
                Ok(()) => "certified".to_string(),
                Err(failure) => failure.to_string(),
            }
        );
        SolveReport {
            rounds,
            acquisition: state,
            verdict,
        }
    }

    fn update_reachable(&self, world: &mut World, state: &AcquisitionState) {
        let movement = Movement {
            boots: state.has(Collectable::Boots),
            hammer: state.has(Collectable::Hammer),
            flute: state.has(Collectable::Flute),
        };
        let held = state.requireables();
        loop {
            for region in &mut world.regions {
                let behavior = region.kind.behavior();
                behavior.update_reachability(region, movement, &held);
                behavior.special_post_checks(region, &held);
            }
            if !world.propagate_connectors(state.has(Collectable::Raft)) {
                break;
            }
        }
    }

    /// Collects every reachable location whose gate is open. Returns true if
    /// anything new was collected.
    fn update_item_gets(&self, world: &mut World, state: &mut AcquisitionState) -> bool {
        let mut changed = false;
        let mut held = state.requireables();
        for region in &mut world.regions {
            for idx in 0..region.locations.len() {
                let loc = &region.locations[idx];
                if !loc.active || !loc.reachable || loc.collected || loc.is_ignored() {
                    continue;
                }
                if !self.gate_open(loc, state, &held) {
                    continue;
                }
                region.locations[idx].collected = true;
                changed = true;
                if let Some(item) = region.locations[idx].collectable {
                    if state.collect(item) {
                        held = state.requireables();
                    }
                }
            }
        }
        changed
    }

    fn gate_open(&self, loc: &Location, state: &AcquisitionState, held: &RequirementSet) -> bool {
        if let Some(palace) = loc.palace {
            let enter = held.contains(&Requirement::Fairy) || held.contains(&Requirement::MagicKey);
            return enter && self.palaces.can_clear(palace, held);
        }
        if loc.landmark == Some(Landmark::KasutoBasement) {
            return state.disable_magic_requirements || state.magic_containers >= self.props.kasuto_jars;
        }
        match loc.town {
            Some(town) => town_requirements(town).satisfied_by(held),
            None => true,
        }
    }

    fn certify(&self, world: &World, state: &AcquisitionState) -> std::result::Result<(), CertificationFailure> {
        if let Some(item) = state.missing_majors().first() {
            return Err(CertificationFailure::MissingMajor(*item));
        }
        if state.magic_containers < self.props.max_magic {
            return Err(CertificationFailure::MagicContainers {
                have: state.magic_containers,
                need: self.props.max_magic,
            });
        }
        if state.heart_containers < self.props.max_hearts {
            return Err(CertificationFailure::HeartContainers {
                have: state.heart_containers,
                need: self.props.max_hearts,
            });
        }
        for region in &world.regions {
            let mut required = region.required_locations(self.props.hidden_palace, self.props.hidden_kasuto);
            if let Some(loc) = required.find(|l| !l.reachable) {
                return Err(CertificationFailure::Unreached(loc.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::VANILLA_LINKS;
    use crate::image::GridImage;
    use crate::region::{RegionKind, TerraformContext};
    use crate::settings::GenerationOptions;
    use crate::shuffle::shuffle_items;
    use rand::{rngs::StdRng, SeedableRng};

    fn vanilla_world(options: GenerationOptions) -> (World, Properties, StdRng) {
        let mut rng = StdRng::seed_from_u64(11);
        let props = options.resolve(&mut rng).unwrap();
        let mut world = World::new(&props);
        for link in VANILLA_LINKS {
            world.connect(link.kind, link.a, link.b);
        }
        let image = GridImage::synthetic();
        for kind in RegionKind::ALL {
            let mut ctx = TerraformContext {
                props: &props,
                image: &image,
                rng: &mut rng,
            };
            let outcome = kind
                .behavior()
                .terraform(world.region_mut(kind), &mut ctx)
                .unwrap();
            assert!(outcome.is_success());
        }
        (world, props, rng)
    }

    #[test]
    fn vanilla_world_certifies() {
        let (mut world, props, mut rng) = vanilla_world(GenerationOptions::default());
        let placement = shuffle_items(&mut world, &props, &mut rng).unwrap();
        let report = Solver::new(&props, &VanillaPalaces).solve(&mut world, &placement.acquisition);
        assert_eq!(report.verdict, Ok(()));
        assert!(world.regions.iter().all(|r| r.all_reached));
    }

    #[test]
    fn collected_set_never_shrinks() {
        let (mut world, props, mut rng) = vanilla_world(GenerationOptions::default());
        let placement = shuffle_items(&mut world, &props, &mut rng).unwrap();
        let report = Solver::new(&props, &VanillaPalaces).solve(&mut world, &placement.acquisition);
        assert!(report.rounds.len() > 1);
        for pair in report.rounds.windows(2) {
            assert!(pair[1].collected >= pair[0].collected);
            assert!(pair[1].reachable >= pair[0].reachable);
        }
    }

    #[test]
    fn locked_third_palace_fails_certification() {
        struct Sealed;
        impl PalaceLogic for Sealed {
            fn can_clear(&self, palace: u8, _held: &RequirementSet) -> bool {
                palace != 3
            }
        }
        let (mut world, props, mut rng) = vanilla_world(GenerationOptions::default());
        let placement = shuffle_items(&mut world, &props, &mut rng).unwrap();
        let report = Solver::new(&props, &Sealed).solve(&mut world, &placement.acquisition);
        assert_eq!(
            report.verdict,
            Err(CertificationFailure::MissingMajor(Collectable::Raft))
        );
    }

    #[test]
    fn heart_shortfall_is_reported() {
        let (mut world, props, mut rng) = vanilla_world(GenerationOptions::default());
        let placement = shuffle_items(&mut world, &props, &mut rng).unwrap();
        let grass = world.find(Landmark::GrassTile).unwrap();
        world.location_mut(grass).collectable = Some(Collectable::OneUp);
        let report = Solver::new(&props, &VanillaPalaces).solve(&mut world, &placement.acquisition);
        assert_eq!(
            report.verdict,
            Err(CertificationFailure::HeartContainers { have: 7, need: 8 })
        );
    }

    #[test]
    fn replaying_a_solve_gives_the_same_majors() {
        let (mut world, props, mut rng) = vanilla_world(GenerationOptions {
            shuffle_overworld_items: true,
            ..GenerationOptions::default()
        });
        let placement = shuffle_items(&mut world, &props, &mut rng).unwrap();
        let solver = Solver::new(&props, &VanillaPalaces);
        let first = solver.solve(&mut world, &placement.acquisition);
        let second = solver.solve(&mut world, &placement.acquisition);
        assert_eq!(
            first.acquisition.obtained_majors(),
            second.acquisition.obtained_majors()
        );
        assert_eq!(first.verdict, second.verdict);
    }

    #[test]
    fn hidden_features_must_be_reached_only_when_enabled() {
        let (mut world, props, mut rng) = vanilla_world(GenerationOptions::default());
        let placement = shuffle_items(&mut world, &props, &mut rng).unwrap();
        let report = Solver::new(&props, &VanillaPalaces).solve(&mut world, &placement.acquisition);
        assert_eq!(report.verdict, Ok(()));

        let palace = world.find(Landmark::Palace6).unwrap();
        let kasuto = world.find_town(crate::location::Town::NewKasuto).unwrap();
        for (sealed, hidden_palace, hidden_kasuto) in [(palace, true, false), (kasuto, false, true)] {
            world.location_mut(sealed).reachable = false;
            let name = world.location(sealed).name;

            let plain = Solver::new(&props, &VanillaPalaces);
            assert_eq!(plain.certify(&world, &report.acquisition), Ok(()), "{name}");

            let mut hidden = props.clone();
            hidden.hidden_palace = hidden_palace;
            hidden.hidden_kasuto = hidden_kasuto;
            let strict = Solver::new(&hidden, &VanillaPalaces);
            assert_eq!(
                strict.certify(&world, &report.acquisition),
                Err(CertificationFailure::Unreached(name))
            );
            world.location_mut(sealed).reachable = true;
        }
    }

    #[test]
    fn basement_waits_for_the_jar_count() {
        let (mut world, props, mut rng) = vanilla_world(GenerationOptions::default());
        let placement = shuffle_items(&mut world, &props, &mut rng).unwrap();
        let mut state = placement.acquisition.clone();
        state.magic_containers = props.kasuto_jars - 1;
        let solver = Solver::new(&props, &VanillaPalaces);
        let basement = world.find(Landmark::KasutoBasement).unwrap();
        let held = state.requireables();
        assert!(!solver.gate_open(world.location(basement), &state, &held));
        state.magic_containers = props.kasuto_jars;
        assert!(solver.gate_open(world.location(basement), &state, &held));
    }
}
