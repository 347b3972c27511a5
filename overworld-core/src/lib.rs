use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

pub mod catalogue;
pub mod connectors;
pub mod generator;
pub mod image;
pub mod items;
pub mod location;
pub mod patch;
pub mod region;
pub mod requirements;
pub mod seed;
pub mod settings;
pub mod shuffle;
pub mod solver;
pub mod terraform;
pub mod terrain;
pub mod world;

pub use generator::{CancelToken, GenerationOutcome, GenerationStats, Randomizer};
pub use settings::GenerationOptions;

use image::{BaseImage, GridImage, RomImage, RomLayout};
use location::ConnectorKind;
use patch::{PatchError, WorldArchivePatcher};
use region::RegionKind;
use solver::CertificationFailure;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomiserSettings {
    pub seed: String,
    /// Base image to read vanilla layouts from. Without one the built-in
    /// synthetic layout is used.
    pub input_path: Option<PathBuf>,
    /// JSON [`RomLayout`] describing the tables inside `input_path`.
    pub layout_path: Option<PathBuf>,
    pub output_path: PathBuf,
    pub debug: bool,
    #[serde(default)]
    pub options: GenerationOptions,
}

#[derive(Debug, Error)]
pub enum RandomiserError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("base image error: {0}")]
    Image(String),
    #[error("patch error: {0}")]
    Patch(#[from] PatchError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RandomiserError>;

/// A collision that sends the caller round its retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Conflict {
    #[error("could not place {0}")]
    Placement(&'static str),
    #[error("two locations share cell ({x}, {y})")]
    SharedCell { x: usize, y: usize },
    #[error("corridor runs into {0}")]
    Corridor(&'static str),
    #[error("no room for the hidden palace")]
    HiddenPalaceSpace,
    #[error("no eligible host for the {0}")]
    HiddenHost(&'static str),
    #[error("no free coast for the {0:?} connector")]
    Coastline(ConnectorKind),
    #[error("{} is cut off from the other regions", .0.name())]
    Disconnected(RegionKind),
    #[error("no region pair left for the {0:?} connector")]
    NoConnectorCandidate(ConnectorKind),
    #[error("certification failed: {0}")]
    Certification(CertificationFailure),
}

/// Result of one phase attempt.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Success(T),
    Conflict(Conflict),
}

impl<T> Attempt<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Attempt::Success(_))
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Attempt<U>) -> Attempt<U> {
        match self {
            Attempt::Success(value) => f(value),
            Attempt::Conflict(conflict) => Attempt::Conflict(conflict),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Attempt<U> {
        self.and_then(|value| Attempt::Success(f(value)))
    }
}

fn load_image(settings: &RandomiserSettings) -> Result<Box<dyn BaseImage>> {
    let Some(input) = &settings.input_path else {
        return Ok(Box::new(GridImage::synthetic()));
    };
    if !input.exists() {
        return Err(RandomiserError::Config(format!(
            "Input path does not exist: {}",
            input.display()
        )));
    }
    let layout_path = settings.layout_path.as_ref().ok_or_else(|| {
        RandomiserError::Config("An input image needs a layout file".to_string())
    })?;
    let layout: RomLayout = serde_json::from_str(&fs::read_to_string(layout_path)?)?;
    Ok(Box::new(RomImage::new(fs::read(input)?, layout)))
}

fn file_stem(seed: &str) -> String {
    seed.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

pub fn run(settings: RandomiserSettings) -> Result<GenerationOutcome> {
    let image = load_image(&settings)?;

    // Each seed gets its own folder so runs never overwrite each other.
    let out_root = settings
        .output_path
        .join(format!("Overworld_{}", file_stem(&settings.seed)));
    if !out_root.exists() {
        fs::create_dir_all(&out_root)?;
    }

    let outcome = Randomizer::new(&settings.seed, &settings.options, image.as_ref())
        .with_progress(|label| info!("{label}"))
        .generate(&mut WorldArchivePatcher)?;

    if let GenerationOutcome::Completed { image, model, .. } = &outcome {
        fs::write(out_root.join("overworld.owz"), image)?;
        if settings.debug {
            fs::write(out_root.join("spoiler_log.txt"), model.spoiler())?;
            fs::write(out_root.join("world.json"), serde_json::to_string_pretty(model)?)?;
        }
        info!("Wrote {}", out_root.display());
    }
    Ok(outcome)
}
