//! Reporting and artifact export pipeline.

pub mod artifacts;
pub mod markdown;

pub use artifacts::{load_run, ArtifactManager, ArtifactPaths, RunManifest};
pub use markdown::render_markdown;
