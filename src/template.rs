//! Source generation for the wrapper project
//!
//! Templates are fixed at compile time. The only values that flow into them
//! are file names, and those are checked to be plain path-shaped strings
//! before rendering, so nothing a user supplies can become Go syntax.

use crate::error::{SelfextError, SelfextResult};
use crate::extract::ArchiveFormat;
use minijinja::{context, Environment, UndefinedBehavior};
use std::path::{Component, Path, PathBuf};

const GENERATOR_TEMPLATE: &str = include_str!("../templates/generator.go.j2");

/// Characters that would break out of a Go string literal
const FORBIDDEN_CHARS: &[char] = &['"', '\\', '`'];

/// Templates known to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateId {
    /// Go program that embeds the archive into `wrapper.go`
    Generator,
}

impl TemplateId {
    /// File name the rendered source is written to
    pub fn file_name(&self) -> &'static str {
        match self {
            TemplateId::Generator => "generator.go",
        }
    }

    fn source(&self) -> &'static str {
        match self {
            TemplateId::Generator => GENERATOR_TEMPLATE,
        }
    }
}

/// Values substituted into a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    /// Archive file name, e.g. `data.zip`
    pub archive_file_name: String,
    /// Path referenced by `//go:embed`, relative to the wrapper directory
    pub embed_directive: PathBuf,
    /// Archive file name without its final extension, e.g. `data`
    pub source_base_name: String,
}

impl GenerationParams {
    /// Derive all parameters from the archive's file name and format
    pub fn for_archive(archive_file_name: &str, format: ArchiveFormat) -> Self {
        Self {
            archive_file_name: archive_file_name.to_string(),
            embed_directive: PathBuf::from(format.payload_name()),
            source_base_name: base_name(archive_file_name).to_string(),
        }
    }

    /// Check every value before it goes anywhere near Go source
    pub fn validate(&self) -> SelfextResult<()> {
        check_name("archive_file_name", &self.archive_file_name)?;
        check_name("source_base_name", &self.source_base_name)?;
        check_embed_path(&self.embed_path())
    }

    /// `embed_directive` with forward slashes, as `//go:embed` expects
    fn embed_path(&self) -> String {
        self.embed_directive.to_string_lossy().replace('\\', "/")
    }
}

/// Strip the final extension: `data.tar.gz` -> `data.tar`, `data.zip` -> `data`
pub fn base_name(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(idx) => &file_name[..idx],
    }
}

/// Renders fixed templates with validated parameters
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        // A missing value must fail instead of rendering as an empty string
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    /// Render `template` with `params`
    pub fn render(&self, template: TemplateId, params: &GenerationParams) -> SelfextResult<String> {
        params.validate()?;

        let tmpl = self
            .env
            .template_from_named_str(template.file_name(), template.source())
            .map_err(|e| SelfextError::Render(format!("{}: {}", template.file_name(), e)))?;

        tmpl.render(context! {
            archive_file_name => &params.archive_file_name,
            embed_directive => params.embed_path(),
            source_base_name => &params.source_base_name,
        })
        .map_err(|e| SelfextError::Render(format!("{}: {}", template.file_name(), e)))
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn check_present(param: &str, value: &str) -> SelfextResult<()> {
    if value.is_empty() {
        return Err(SelfextError::Render(format!(
            "missing template parameter '{}'",
            param
        )));
    }
    Ok(())
}

/// Accept a single plain file name that is safe inside a Go string literal
fn check_name(param: &str, value: &str) -> SelfextResult<()> {
    check_present(param, value)?;

    if let Some(c) = value
        .chars()
        .find(|c| c.is_control() || FORBIDDEN_CHARS.contains(c))
    {
        return Err(SelfextError::Render(format!(
            "parameter '{}' contains forbidden character {:?}: {}",
            param, c, value
        )));
    }

    let mut components = Path::new(value).components();
    let single = matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none();
    if !single || value.contains('/') {
        return Err(SelfextError::Render(format!(
            "parameter '{}' is not a plain file name: {}",
            param, value
        )));
    }

    Ok(())
}

/// Accept a relative path whose components `//go:embed` takes literally
fn check_embed_path(value: &str) -> SelfextResult<()> {
    check_present("embed_directive", value)?;

    let valid = value.split('/').all(|part| {
        !part.is_empty()
            && !part.starts_with('.')
            && !part.starts_with('_')
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    });
    if !valid {
        return Err(SelfextError::Render(format!(
            "parameter 'embed_directive' is not a plain relative path: {}",
            value
        )));
    }

    Ok(())
}
