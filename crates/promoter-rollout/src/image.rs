//! Image references: tag rewriting and expected-image naming.
//!
//! The executor rewrites only the tag of the image it finds. The watcher
//! waits for an image string chosen by an [`ImageNaming`] strategy, so a
//! registry layout that differs from the running image can still be
//! verified without a second watcher implementation.

use promoter_core::ImageNamingConfig;

use crate::error::ExecutionError;
use crate::executor::Applied;

/// Replace the tag of `image` with `version`, keeping the prefix verbatim.
///
/// The tag is whatever follows the last `:`; a `:` inside the registry
/// host (`host:5000/repo`) is not a tag separator. Digest references are
/// rejected.
pub fn rewrite_image_tag(image: &str, version: &str) -> Result<String, ExecutionError> {
    let invalid = || ExecutionError::InvalidImageFormat(image.to_string());

    if image.contains('@') {
        return Err(invalid());
    }
    let (prefix, tag) = image.rsplit_once(':').ok_or_else(invalid)?;
    if prefix.is_empty() || tag.is_empty() || tag.contains('/') {
        return Err(invalid());
    }
    Ok(format!("{prefix}:{version}"))
}

/// Computes the image string the convergence watcher must observe.
pub trait ImageNaming: Send + Sync {
    fn expected_image(&self, workload: &str, version: &str, applied: &Applied) -> String;
}

/// Expect exactly the image the executor submitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppliedImage;

impl ImageNaming for AppliedImage {
    fn expected_image(&self, _workload: &str, _version: &str, applied: &Applied) -> String {
        applied.new_image.clone()
    }
}

/// Expect `{registry}/{repository}/{name}:{version}`, with an optional
/// suffix trimmed from the workload name first.
#[derive(Debug, Clone)]
pub struct RegistryImage {
    pub registry: String,
    pub repository: String,
    pub strip_suffix: Option<String>,
}

impl ImageNaming for RegistryImage {
    fn expected_image(&self, workload: &str, version: &str, _applied: &Applied) -> String {
        let mut name = workload;
        if let Some(suffix) = self.strip_suffix.as_deref().filter(|s| !s.is_empty()) {
            // Repeated suffixes collapse, matching `name(-gray-level)*`.
            while let Some(trimmed) = name.strip_suffix(suffix) {
                name = trimmed;
            }
        }
        format!("{}/{}/{}:{}", self.registry, self.repository, name, version)
    }
}

/// Build the naming strategy selected in `promoter.toml`.
pub fn naming_from_config(config: &ImageNamingConfig) -> Box<dyn ImageNaming> {
    match config {
        ImageNamingConfig::Applied => Box::new(AppliedImage),
        ImageNamingConfig::Registry {
            registry,
            repository,
            strip_suffix,
        } => Box::new(RegistryImage {
            registry: registry.clone(),
            repository: repository.clone(),
            strip_suffix: strip_suffix.clone(),
        }),
    }
}
