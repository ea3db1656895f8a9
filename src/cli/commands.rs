//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use crate::compositor::{self, Surface};
use crate::config::Config;
use crate::error::{RelightError, Result};
use crate::jobs::{JobEvent, JobOrchestrator, AUTH_FAILURE_MESSAGE};
use crate::layers::{BaseImage, LayerRegistry, LayerStatus, LayerSummary};
use crate::services::{FsImageLoader, HttpBackend};
use crate::workspace::Workspace;

/// A layer argument: `path[:opacity]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSpec {
    pub path: PathBuf,
    pub opacity: Option<i32>,
}

impl LayerSpec {
    /// Parse `path[:opacity]`; a suffix that isn't a number is part of the path
    pub fn parse(spec: &str) -> Self {
        if let Some((path, opacity)) = spec.rsplit_once(':') {
            if let Ok(opacity) = opacity.trim().parse::<i32>() {
                return Self {
                    path: PathBuf::from(path),
                    opacity: Some(opacity),
                };
            }
        }
        Self {
            path: PathBuf::from(spec),
            opacity: None,
        }
    }
}

/// Options for the `generate` command
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub base: PathBuf,
    pub prompts: String,
    pub api_key: Option<String>,
    pub backend_url: Option<String>,
    pub config: Option<PathBuf>,
    pub align: bool,
    pub opacity: i32,
    /// Read generated images from this directory instead of over HTTP
    pub static_root: Option<PathBuf>,
    pub out: PathBuf,
}

/// Composite local images over a base image.
pub fn composite(base: &Path, layers: &[String], hide_base: bool, out: &Path) -> Result<()> {
    info!("Compositing {} layers over {}", layers.len(), base.display());

    let mut registry = LayerRegistry::new(BaseImage::open(base)?);
    registry.set_base_visible(!hide_base);

    for raw in layers {
        let spec = LayerSpec::parse(raw);
        if !spec.path.exists() {
            return Err(RelightError::FileNotFound {
                path: spec.path.display().to_string(),
            });
        }

        let name = spec
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("layer")
            .to_string();
        let id = registry.create_pending(name);
        let image = image::open(&spec.path)?.to_rgba8();
        registry.attach_image(id, image, spec.path.display().to_string());
        if let Some(opacity) = spec.opacity {
            registry.set_opacity(id, opacity);
        }
    }

    let mut surface = Surface::for_base(registry.base());
    compositor::render(&mut surface, registry.base(), registry.layers());
    surface.save(out)?;

    print_layers(&registry.summaries());
    println!("Composite written: {}", out.display());

    Ok(())
}

/// Resolve configuration from file, environment and flags.
pub fn resolve_config(
    config_path: Option<&Path>,
    backend_url: Option<String>,
    api_key: Option<String>,
) -> Result<Config> {
    let mut config = match config_path {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };

    if let Some(url) = backend_url {
        config.backend_url = url;
    }
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
        config.api_key = Some(key);
    }

    config.validate()?;
    Ok(config)
}

fn require_backend() -> Result<()> {
    if HttpBackend::is_available() {
        Ok(())
    } else {
        Err(RelightError::BackendUnavailable {
            reason: "HTTP backend support not compiled".to_string(),
        })
    }
}

/// Generate layers through the backend, optionally align them, and composite.
///
/// The base image is uploaded first; the stored file name the backend
/// answers with is the reference every generation and alignment uses.
pub async fn generate(options: GenerateOptions) -> Result<()> {
    require_backend()?;

    let config = resolve_config(
        options.config.as_deref(),
        options.backend_url.clone(),
        options.api_key.clone(),
    )?;
    info!("Using backend {}", config.backend_url);

    let backend = Arc::new(HttpBackend::new(&config)?);
    let base = BaseImage::open(&options.base)?;
    let stored = backend.upload_base(&options.base).await?;
    info!("Base uploaded as {}", stored);
    let base = base.with_reference(stored);

    let jobs = match &options.static_root {
        Some(root) => JobOrchestrator::new(
            backend.clone(),
            backend.clone(),
            Arc::new(FsImageLoader::new(root)),
        ),
        None => JobOrchestrator::with_backend(backend),
    };
    let mut workspace = Workspace::new(base, jobs);

    let ids = workspace.submit_generation_batch(&options.prompts, config.credential())?;
    println!("Generating {} layers...", ids.len());

    let mut credentials_rejected = false;
    for event in workspace.drain().await {
        report_event(&event);
        credentials_rejected |= event.requires_credentials();
    }
    if credentials_rejected {
        let err = RelightError::Auth {
            message: AUTH_FAILURE_MESSAGE.to_string(),
        };
        warn!("{}", err.friendly_message());
        for suggestion in err.recovery_suggestions() {
            println!("  - {}", suggestion);
        }
    }

    for id in &ids {
        workspace.registry_mut().set_opacity(*id, options.opacity);
    }

    if options.align {
        let ready: Vec<_> = workspace
            .summaries()
            .into_iter()
            .filter(|s| s.status == LayerStatus::Ready)
            .map(|s| s.id)
            .collect();
        for id in ready {
            workspace.submit_alignment(id)?;
        }
        for event in workspace.drain().await {
            report_event(&event);
        }
    }

    workspace.render().save(&options.out)?;

    print_layers(&workspace.summaries());
    println!("Composite written: {}", options.out.display());

    Ok(())
}

/// Show the backend's generation system prompt, or replace it.
pub async fn system_prompt(
    set: Option<String>,
    backend_url: Option<String>,
    config: Option<&Path>,
) -> Result<()> {
    require_backend()?;

    let config = resolve_config(config, backend_url, None)?;
    let backend = HttpBackend::new(&config)?;

    match set {
        Some(content) => {
            backend.set_system_prompt(&content).await?;
            println!("System prompt updated ({} characters)", content.chars().count());
        }
        None => {
            let content = backend.system_prompt().await?;
            if content.is_empty() {
                println!("No system prompt set.");
            } else {
                println!("{}", content);
            }
        }
    }

    Ok(())
}

fn report_event(event: &JobEvent) {
    match event {
        JobEvent::LayerReady { id } => info!("{} ready", id),
        JobEvent::Aligned { id } => info!("{} aligned", id),
        JobEvent::Discarded { id } => info!("{} discarded", id),
        JobEvent::LayerFailed { id, error }
        | JobEvent::CredentialsRejected { id, error }
        | JobEvent::AlignmentFailed { id, error } => {
            warn!("{} failed [{}]: {}", id, error.error_code(), error)
        }
    }
}

/// Print the layer listing.
pub fn print_layers(summaries: &[LayerSummary]) {
    if summaries.is_empty() {
        println!("No layers added.");
        return;
    }

    println!("Layers (bottom to top):");
    println!("{:-<60}", "");
    for layer in summaries {
        let marker = if layer.active { ">" } else { " " };
        let visibility = if layer.visible { "shown" } else { "hidden" };
        println!(
            "{} {:<10} {:<30} {:<18} {}",
            marker,
            layer.id.to_string(),
            layer.name,
            layer.description,
            visibility
        );
    }
}
