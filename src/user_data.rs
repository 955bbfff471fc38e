//! User-data payload construction.
//!
//! The endpoint asks a [`UserDataBuilder`] for the boot payload of every new
//! instance. [`TemplateUserData`] resolves a template either inline or from a
//! file and substitutes `${Key}` placeholders with endpoint parameters, so
//! per-instance values such as `${VMUUID}` reach the guest's first boot.
//!
//! Only placeholders naming a set parameter are replaced. Anything else,
//! such as a shell `${PATH}`, passes through untouched, and `$${Key}` always
//! renders as the literal `${Key}`.

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

use crate::parameters::EndpointParameters;

const PLACEHOLDER_OPEN: &str = "${";
const PLACEHOLDER_CLOSE: char = '}';
const PLACEHOLDER_ESCAPE: char = '$';

/// Errors raised while resolving or rendering user-data.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum UserDataError {
    /// Raised when both inline and file sources are provided.
    #[error("user-data cannot be provided both inline and via file")]
    BothProvided,
    /// Raised when an inline payload is empty or only whitespace.
    #[error("user-data must not be empty")]
    InlineEmpty,
    /// Raised when a file path is empty or only whitespace.
    #[error("user-data file path must not be empty")]
    FilePathEmpty,
    /// Raised when a file resolves to empty or only whitespace.
    #[error("user-data file must not be empty")]
    FileEmpty,
    /// Raised when reading the file source fails.
    #[error("failed to read user-data file `{path}`: {message}")]
    FileRead {
        /// Expanded path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when a placeholder is opened but never closed.
    #[error("unterminated placeholder in user-data")]
    UnterminatedPlaceholder,
}

/// Produces the boot payload for a new instance.
pub trait UserDataBuilder {
    /// Builds the payload from the endpoint's current parameters.
    ///
    /// # Errors
    ///
    /// Returns [`UserDataError`] when the payload cannot be produced.
    fn build(&self, parameters: &EndpointParameters) -> Result<String, UserDataError>;
}

/// Template based user-data builder.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TemplateUserData {
    template: String,
}

impl TemplateUserData {
    /// Creates a builder from an inline template.
    ///
    /// An empty template yields an empty payload, which providers accept as
    /// "no user-data".
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Resolves the template from either an inline value or a file.
    ///
    /// Inline and file sources are mutually exclusive; when neither is given
    /// the builder renders an empty payload.
    ///
    /// # Errors
    ///
    /// Returns [`UserDataError`] when the inputs are invalid or the file
    /// cannot be read.
    pub fn from_sources(inline: Option<&str>, file: Option<&str>) -> Result<Self, UserDataError> {
        resolve_template(inline, file).map(|template| Self::new(template.unwrap_or_default()))
    }

    /// Returns the unrendered template.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }
}

impl UserDataBuilder for TemplateUserData {
    fn build(&self, parameters: &EndpointParameters) -> Result<String, UserDataError> {
        render(&self.template, parameters)
    }
}

fn render(template: &str, parameters: &EndpointParameters) -> Result<String, UserDataError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some((before, after_open)) = rest.split_once(PLACEHOLDER_OPEN) {
        if let Some(literal) = before.strip_suffix(PLACEHOLDER_ESCAPE) {
            rendered.push_str(literal);
            rendered.push_str(PLACEHOLDER_OPEN);
            rest = after_open;
            continue;
        }
        rendered.push_str(before);
        let (key, after_close) = after_open
            .split_once(PLACEHOLDER_CLOSE)
            .ok_or(UserDataError::UnterminatedPlaceholder)?;
        match parameters.get(key.trim()) {
            Some(value) => rendered.push_str(&value.to_string()),
            None => {
                rendered.push_str(PLACEHOLDER_OPEN);
                rendered.push_str(key);
                rendered.push(PLACEHOLDER_CLOSE);
            }
        }
        rest = after_close;
    }
    rendered.push_str(rest);
    Ok(rendered)
}

fn resolve_template(
    inline: Option<&str>,
    file: Option<&str>,
) -> Result<Option<String>, UserDataError> {
    if inline.is_some() && file.is_some() {
        return Err(UserDataError::BothProvided);
    }

    if let Some(payload) = inline {
        validate_payload(payload)?;
        return Ok(Some(payload.to_owned()));
    }

    let Some(path) = file else {
        return Ok(None);
    };

    if path.trim().is_empty() {
        return Err(UserDataError::FilePathEmpty);
    }

    let expanded = expand_tilde(path);
    let content = read_to_string_ambient(&expanded).map_err(|message| UserDataError::FileRead {
        path: expanded.clone(),
        message,
    })?;

    validate_payload(&content).map_err(|err| match err {
        UserDataError::InlineEmpty => UserDataError::FileEmpty,
        other => other,
    })?;

    Ok(Some(content))
}

fn validate_payload(payload: &str) -> Result<(), UserDataError> {
    if payload.trim().is_empty() {
        return Err(UserDataError::InlineEmpty);
    }
    Ok(())
}

fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let path_buf = Utf8Path::new(path);

    let (dir_path, file_path) = if path_buf.is_absolute() {
        let parent = path_buf
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path_buf}"))?;
        let file_name = path_buf
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path_buf}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path_buf)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path).map_err(|err| err.to_string())
}
