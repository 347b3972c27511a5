use overworld_core::connectors::VANILLA_LINKS;
use overworld_core::generator::LABEL_SHUFFLE;
use overworld_core::image::{BaseImage, GridImage};
use overworld_core::items::BASE_POOL;
use overworld_core::patch::{read_archive, PatchApplier, PatchError, WorldArchivePatcher};
use overworld_core::region::RegionKind;
use overworld_core::settings::{Biome, RetryLimits};
use overworld_core::world::WorldModel;
use overworld_core::{
    CancelToken, GenerationOptions, GenerationOutcome, GenerationStats, RandomiserError, Randomizer,
};

#[derive(Default)]
struct RecordingPatcher {
    calls: usize,
}

impl PatchApplier for RecordingPatcher {
    fn apply_patches(&mut self, model: &WorldModel, _base: &[u8]) -> Result<Vec<u8>, PatchError> {
        self.calls += 1;
        Ok(serde_json::to_vec(model)?)
    }
}

fn small_limits() -> RetryLimits {
    RetryLimits {
        shuffle_attempts: 10,
        terrain_rounds: 4,
        terraform_attempts: 200,
        connector_attempts: 50,
        overworld_attempts: 3,
    }
}

/// Everything but elapsed time.
fn counters(stats: &GenerationStats) -> (u32, u32, u32, u32, Vec<(RegionKind, u32)>) {
    (
        stats.overworld_attempts,
        stats.connector_attempts,
        stats.terrain_rounds,
        stats.shuffle_attempts,
        stats.terraform_attempts.iter().map(|(k, v)| (*k, *v)).collect(),
    )
}

fn generate(options: &GenerationOptions, seed: &str) -> GenerationOutcome {
    let image = GridImage::synthetic();
    let outcome = Randomizer::new(seed, options, &image)
        .generate(&mut WorldArchivePatcher)
        .unwrap();
    outcome
}

/// Finds the first seed that completes, then checks a second run writes the
/// same archive byte for byte.
fn assert_reproducible(options: &GenerationOptions, seeds: &[&str]) {
    let (seed, first) = seeds
        .iter()
        .find_map(|seed| match generate(options, seed) {
            outcome @ GenerationOutcome::Completed { .. } => Some((*seed, outcome)),
            _ => None,
        })
        .expect("no seed completed");
    let second = generate(options, seed);
    let (
        GenerationOutcome::Completed { image: a, .. },
        GenerationOutcome::Completed { image: b, .. },
    ) = (&first, &second)
    else {
        panic!("seed {seed} completed once, then {second:?}");
    };
    assert_eq!(a, b, "archives for seed {seed} differ");
    assert_eq!(counters(first.stats()), counters(second.stats()));
}

fn generous_limits() -> RetryLimits {
    RetryLimits {
        shuffle_attempts: 20,
        terrain_rounds: 8,
        overworld_attempts: 8,
        ..small_limits()
    }
}

#[test]
fn same_seed_same_archive_for_vanilla_shuffle() {
    let options = GenerationOptions {
        west_biome: Biome::VanillaShuffle,
        east_biome: Biome::VanillaShuffle,
        shuffle_overworld_items: true,
        shuffle_palace_items: true,
        shuffle_spell_locations: true,
        retry_limits: generous_limits(),
        ..GenerationOptions::default()
    };
    assert_reproducible(&options, &["determinism", "determinism-2", "determinism-3"]);
}

#[test]
fn same_seed_same_archive_for_procedural_regions() {
    let options = GenerationOptions {
        west_biome: Biome::VanillaLike,
        dm_biome: Biome::Mountainous,
        east_biome: Biome::Volcano,
        maze_biome: Biome::VanillaLike,
        retry_limits: generous_limits(),
        ..GenerationOptions::default()
    };
    let seeds: Vec<String> = (0..12).map(|n| format!("procedural-{n}")).collect();
    let seeds: Vec<&str> = seeds.iter().map(String::as_str).collect();
    assert_reproducible(&options, &seeds);
}

#[test]
fn palace_swap_never_becomes_a_configuration_error() {
    let options = GenerationOptions {
        west_biome: Biome::VanillaLike,
        dm_biome: Biome::VanillaLike,
        east_biome: Biome::VanillaLike,
        maze_biome: Biome::VanillaLike,
        swap_palace_continents: true,
        retry_limits: RetryLimits {
            shuffle_attempts: 1,
            ..small_limits()
        },
        ..GenerationOptions::default()
    };
    let image = GridImage::synthetic();
    for n in 0..10 {
        let seed = format!("swap-{n}");
        let outcome = Randomizer::new(&seed, &options, &image).generate(&mut RecordingPatcher::default());
        assert!(outcome.is_ok(), "seed {seed}: {outcome:?}");
    }
}

#[test]
fn canyon_and_caldera_maps_reach_the_item_shuffle() {
    let options = GenerationOptions {
        west_biome: Biome::Caldera,
        dm_biome: Biome::Canyon,
        east_biome: Biome::Canyon,
        maze_biome: Biome::VanillaLike,
        retry_limits: small_limits(),
        ..GenerationOptions::default()
    };
    let image = GridImage::synthetic();
    let mut reached = false;
    for n in 0..5 {
        let mut labels = Vec::new();
        let outcome = Randomizer::new(&format!("canyon-{n}"), &options, &image)
            .with_progress(|label| labels.push(label.to_string()))
            .generate(&mut RecordingPatcher::default())
            .unwrap();
        assert!(!matches!(outcome, GenerationOutcome::Cancelled { .. }));
        reached |= labels.iter().any(|l| l == LABEL_SHUFFLE);
    }
    assert!(reached, "no canyon map got past terraforming");
}

#[test]
fn vanilla_seed_certifies_on_the_first_attempt() {
    let image = GridImage::synthetic();
    let options = GenerationOptions::default();
    let mut patcher = RecordingPatcher::default();
    let outcome = Randomizer::new("A", &options, &image)
        .generate(&mut patcher)
        .unwrap();
    let GenerationOutcome::Completed { model, stats, .. } = outcome else {
        panic!("vanilla generation did not complete");
    };
    assert_eq!(patcher.calls, 1);
    assert_eq!(stats.overworld_attempts, 1);
    assert_eq!(stats.connector_attempts, 1);
    assert_eq!(stats.terrain_rounds, 1);
    assert_eq!(stats.shuffle_attempts, 1);
    assert!(stats.certification_failures.is_empty());

    assert_eq!(model.connections.len(), VANILLA_LINKS.len());
    for (conn, link) in model.connections.iter().zip(VANILLA_LINKS) {
        assert_eq!(conn.kind, link.kind);
        assert_eq!((conn.from_region, conn.to_region), (link.a, link.b));
    }
    let palaces: Vec<u8> = model.palaces.iter().map(|p| p.palace).collect();
    assert_eq!(palaces, vec![1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn pool_mismatch_fails_before_any_terrain() {
    let image = GridImage::synthetic();
    let mut pool = BASE_POOL.to_vec();
    pool.push(BASE_POOL[0]);
    let options = GenerationOptions {
        west_biome: Biome::Random,
        dm_biome: Biome::Random,
        east_biome: Biome::Random,
        maze_biome: Biome::VanillaLike,
        shuffle_palace_items: true,
        shuffle_overworld_items: true,
        mix_overworld_and_palace_items: true,
        pool_override: Some(pool),
        ..GenerationOptions::default()
    };
    let mut labels = Vec::new();
    let mut patcher = RecordingPatcher::default();
    let result = Randomizer::new("B", &options, &image)
        .with_progress(|label| labels.push(label.to_string()))
        .generate(&mut patcher);
    assert!(matches!(result, Err(RandomiserError::Config(_))));
    assert!(labels.is_empty());
    assert_eq!(patcher.calls, 0);
}

#[test]
fn cancelling_mid_terraform_skips_the_commit() {
    let image = GridImage::synthetic();
    let options = GenerationOptions::default();
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let mut labels = Vec::new();
    let mut patcher = RecordingPatcher::default();
    let outcome = Randomizer::new("A", &options, &image)
        .with_cancel(cancel)
        .with_progress(|label| {
            labels.push(label.to_string());
            if label == RegionKind::East.progress_label() {
                trigger.cancel();
            }
        })
        .generate(&mut patcher)
        .unwrap();
    assert!(matches!(outcome, GenerationOutcome::Cancelled { .. }));
    assert_eq!(patcher.calls, 0);
    assert_eq!(labels.last().map(String::as_str), Some("Generating East Hyrule"));
}

#[test]
fn hidden_features_survive_into_the_model() {
    let image = GridImage::synthetic();
    let options = GenerationOptions {
        hidden_palace: true,
        hidden_kasuto: true,
        ..GenerationOptions::default()
    };
    let outcome = Randomizer::new("hidden", &options, &image)
        .generate(&mut WorldArchivePatcher)
        .unwrap();
    let GenerationOutcome::Completed { image: bytes, model, .. } = outcome else {
        panic!("hidden-feature generation did not complete");
    };
    let east = model
        .regions
        .iter()
        .find(|r| r.kind == RegionKind::East)
        .unwrap();
    assert_eq!(east.hidden_palace.as_deref(), Some("Three-Eye Rock Palace"));
    assert_eq!(east.hidden_kasuto.as_deref(), Some("New Kasuto"));
    assert!(east.call_spot.is_some());

    let archive = read_archive(&bytes).unwrap();
    assert_eq!(archive.world, model);
    assert_eq!(archive.base_sha256.len(), 64);
    assert!(!GridImage::synthetic().bytes().is_empty());
}
