//! The generate-and-verify loop.
//!
//! Connectors are drawn first, then each region is terraformed, then items
//! are shuffled and solved. A shuffle that fails certification is redrawn
//! on the same terrain; once those run out, regions the solver did not
//! fully reach are terraformed again; once terrain rounds run out, the
//! whole overworld starts over.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::connectors::assign_connectors;
use crate::image::BaseImage;
use crate::patch::PatchApplier;
use crate::region::{RegionKind, TerraformContext};
use crate::seed::seeded_rng;
use crate::settings::{GenerationOptions, Properties};
use crate::shuffle::{shuffle_items, validate_pool};
use crate::solver::{PalaceLogic, Solver, VanillaPalaces};
use crate::world::{World, WorldModel};
use crate::{Attempt, Result};

pub const LABEL_CONNECTORS: &str = "Assigning continent connectors";
pub const LABEL_SHUFFLE: &str = "Shuffling Items and Spells";
pub const LABEL_SOLVE: &str = "Running Seed Completability Checks";
pub const LABEL_FINISH: &str = "Finishing up";

/// Cooperative cancellation flag, polled at phase boundaries.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Attempt counters and timings of one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub overworld_attempts: u32,
    pub connector_attempts: u32,
    pub terrain_rounds: u32,
    pub terraform_attempts: BTreeMap<RegionKind, u32>,
    pub region_millis: BTreeMap<RegionKind, u128>,
    pub shuffle_attempts: u32,
    pub certification_failures: BTreeMap<&'static str, u32>,
}

#[derive(Debug)]
pub enum GenerationOutcome {
    Completed {
        image: Vec<u8>,
        model: WorldModel,
        stats: GenerationStats,
    },
    Cancelled {
        stats: GenerationStats,
    },
    Exhausted {
        stats: GenerationStats,
    },
}

impl GenerationOutcome {
    pub fn stats(&self) -> &GenerationStats {
        match self {
            GenerationOutcome::Completed { stats, .. }
            | GenerationOutcome::Cancelled { stats }
            | GenerationOutcome::Exhausted { stats } => stats,
        }
    }
}

/// How a phase ended, as seen by the enclosing loop.
enum Phase<T> {
    Done(T),
    Retry,
    Cancelled,
}

pub struct Randomizer<'a> {
    seed: String,
    options: &'a GenerationOptions,
    image: &'a dyn BaseImage,
    palaces: &'a dyn PalaceLogic,
    cancel: CancelToken,
    progress: Box<dyn FnMut(&str) + 'a>,
}

impl<'a> Randomizer<'a> {
    pub fn new(seed: &str, options: &'a GenerationOptions, image: &'a dyn BaseImage) -> Self {
        Self {
            seed: seed.to_string(),
            options,
            image,
            palaces: &VanillaPalaces,
            cancel: CancelToken::new(),
            progress: Box::new(|_| {}),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: impl FnMut(&str) + 'a) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn with_palace_logic(mut self, palaces: &'a dyn PalaceLogic) -> Self {
        self.palaces = palaces;
        self
    }

    fn report(&mut self, label: &str) {
        (self.progress)(label);
    }

    /// Runs the whole pipeline. Configuration problems are errors; running
    /// out of retries or being cancelled are outcomes.
    pub fn generate(&mut self, patcher: &mut dyn PatchApplier) -> Result<GenerationOutcome> {
        let mut rng = seeded_rng(&self.seed);
        let props = self.options.resolve(&mut rng)?;
        validate_pool(&props)?;

        let mut stats = GenerationStats::default();
        let limits = props.retry_limits;
        for overworld in 1..=limits.overworld_attempts {
            stats.overworld_attempts = overworld;
            if self.cancel.is_cancelled() {
                return Ok(GenerationOutcome::Cancelled { stats });
            }
            match self.build_overworld(&props, &mut rng, &mut stats)? {
                Phase::Done(world) => return self.commit(world, patcher, stats),
                Phase::Cancelled => return Ok(GenerationOutcome::Cancelled { stats }),
                Phase::Retry => info!("[overworld {overworld}] starting over"),
            }
        }
        warn!(
            "gave up after {} overworld attempts ({} terrain rounds, {} shuffles)",
            stats.overworld_attempts, stats.terrain_rounds, stats.shuffle_attempts
        );
        Ok(GenerationOutcome::Exhausted { stats })
    }

    fn build_overworld(
        &mut self,
        props: &Properties,
        rng: &mut StdRng,
        stats: &mut GenerationStats,
    ) -> Result<Phase<World>> {
        let mut world = World::new(props);
        self.report(LABEL_CONNECTORS);
        let (links, used) = assign_connectors(&mut world, props, rng);
        stats.connector_attempts += used;
        if let Attempt::Conflict(conflict) = links {
            warn!("connector assignment exhausted after {used} draws: {conflict}");
            return Ok(Phase::Retry);
        }

        for round in 1..=props.retry_limits.terrain_rounds {
            stats.terrain_rounds += 1;
            for kind in RegionKind::ALL {
                if world.region(kind).all_reached {
                    debug!("[round {round}] keeping {}", kind.name());
                    continue;
                }
                match self.terraform_region(&mut world, kind, props, rng, stats)? {
                    Phase::Done(()) => {}
                    Phase::Retry => return Ok(Phase::Retry),
                    Phase::Cancelled => return Ok(Phase::Cancelled),
                }
            }

            if self.cancel.is_cancelled() {
                return Ok(Phase::Cancelled);
            }
            match self.shuffle_and_solve(&mut world, props, rng, stats)? {
                Phase::Done(()) => return Ok(Phase::Done(world)),
                Phase::Cancelled => return Ok(Phase::Cancelled),
                Phase::Retry => {
                    let kept: Vec<&str> = world
                        .regions
                        .iter()
                        .filter(|r| r.all_reached)
                        .map(|r| r.kind.name())
                        .collect();
                    debug!("[round {round}] shuffles exhausted; keeping {kept:?}");
                }
            }
        }
        Ok(Phase::Retry)
    }

    fn terraform_region(
        &mut self,
        world: &mut World,
        kind: RegionKind,
        props: &Properties,
        rng: &mut StdRng,
        stats: &mut GenerationStats,
    ) -> Result<Phase<()>> {
        if self.cancel.is_cancelled() {
            return Ok(Phase::Cancelled);
        }
        self.report(kind.progress_label());
        let started = Instant::now();
        let behavior = kind.behavior();
        let mut outcome = Phase::Retry;
        for attempt in 1..=props.retry_limits.terraform_attempts {
            *stats.terraform_attempts.entry(kind).or_default() += 1;
            let mut ctx = TerraformContext {
                props,
                image: self.image,
                rng: &mut *rng,
            };
            match behavior.terraform(world.region_mut(kind), &mut ctx)? {
                Attempt::Success(()) => {
                    world.region_mut(kind).fully_generated = true;
                    debug!("{} terraformed on attempt {attempt}", kind.name());
                    outcome = Phase::Done(());
                    break;
                }
                Attempt::Conflict(conflict) => {
                    debug!("{} attempt {attempt}: {conflict}", kind.name());
                }
            }
        }
        *stats.region_millis.entry(kind).or_default() += started.elapsed().as_millis();

        if self.cancel.is_cancelled() {
            return Ok(Phase::Cancelled);
        }
        if matches!(outcome, Phase::Retry) {
            warn!(
                "{} failed {} terraform attempts",
                kind.name(),
                props.retry_limits.terraform_attempts
            );
        }
        Ok(outcome)
    }

    fn shuffle_and_solve(
        &mut self,
        world: &mut World,
        props: &Properties,
        rng: &mut StdRng,
        stats: &mut GenerationStats,
    ) -> Result<Phase<()>> {
        self.report(LABEL_SHUFFLE);
        let solver = Solver::new(props, self.palaces);
        let mut reported_solve = false;
        for attempt in 1..=props.retry_limits.shuffle_attempts {
            stats.shuffle_attempts += 1;
            let placement = shuffle_items(world, props, rng)?;
            if !reported_solve {
                self.report(LABEL_SOLVE);
                reported_solve = true;
            }
            let report = solver.solve(world, &placement.acquisition);
            match report.attempt() {
                Attempt::Success(()) => {
                    info!(
                        "[shuffle {attempt}] certified in {} rounds",
                        report.rounds.len()
                    );
                    return Ok(Phase::Done(()));
                }
                Attempt::Conflict(conflict) => {
                    if let Err(failure) = &report.verdict {
                        *stats.certification_failures.entry(failure.cause()).or_default() += 1;
                    }
                    debug!("[shuffle {attempt}] {conflict}");
                }
            }
            if self.cancel.is_cancelled() {
                return Ok(Phase::Cancelled);
            }
        }
        Ok(Phase::Retry)
    }

    fn commit(
        &mut self,
        world: World,
        patcher: &mut dyn PatchApplier,
        stats: GenerationStats,
    ) -> Result<GenerationOutcome> {
        if self.cancel.is_cancelled() {
            return Ok(GenerationOutcome::Cancelled { stats });
        }
        self.report(LABEL_FINISH);
        let model = world.to_model(&self.seed);
        let image = patcher.apply_patches(&model, self.image.bytes())?;
        info!(
            "seed {} generated: {} overworld attempt(s), {} shuffle(s)",
            self.seed, stats.overworld_attempts, stats.shuffle_attempts
        );
        Ok(GenerationOutcome::Completed {
            image,
            model,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::GridImage;
    use crate::patch::WorldArchivePatcher;

    #[test]
    fn cancelled_before_start_does_no_work() {
        let image = GridImage::synthetic();
        let options = GenerationOptions::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut labels = Vec::new();
        let outcome = Randomizer::new("A", &options, &image)
            .with_cancel(cancel)
            .with_progress(|label| labels.push(label.to_string()))
            .generate(&mut WorldArchivePatcher)
            .unwrap();
        assert!(matches!(outcome, GenerationOutcome::Cancelled { .. }));
        assert!(labels.is_empty());
    }

    #[test]
    fn vanilla_run_reports_every_phase_in_order() {
        let image = GridImage::synthetic();
        let options = GenerationOptions::default();
        let mut labels = Vec::new();
        let outcome = Randomizer::new("A", &options, &image)
            .with_progress(|label| labels.push(label.to_string()))
            .generate(&mut WorldArchivePatcher)
            .unwrap();
        assert!(matches!(outcome, GenerationOutcome::Completed { .. }));
        assert_eq!(
            labels,
            vec![
                LABEL_CONNECTORS,
                "Generating Western Hyrule",
                "Generating Death Mountain",
                "Generating East Hyrule",
                "Generating Maze Island",
                LABEL_SHUFFLE,
                LABEL_SOLVE,
                LABEL_FINISH,
            ]
        );
    }

    #[test]
    fn zero_budgets_exhaust_immediately() {
        let image = GridImage::synthetic();
        let mut options = GenerationOptions::default();
        options.retry_limits.shuffle_attempts = 0;
        options.retry_limits.overworld_attempts = 2;
        options.retry_limits.terrain_rounds = 1;
        let outcome = Randomizer::new("A", &options, &image)
            .generate(&mut WorldArchivePatcher)
            .unwrap();
        let GenerationOutcome::Exhausted { stats } = outcome else {
            panic!("expected exhaustion");
        };
        assert_eq!(stats.overworld_attempts, 2);
        assert_eq!(stats.terrain_rounds, 2);
        assert_eq!(stats.shuffle_attempts, 0);
    }
}
