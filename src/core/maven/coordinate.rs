use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::{LauncherError, LauncherResult};

/// A library coordinate as written in version documents.
///
/// Supported formats:
///   `group:artifact:version`
///   `group:artifact:version:classifier`
///   `group:artifact:version[:classifier]@extension`
///
/// The mapping to a relative path is purely textual, so the same coordinate
/// always lands on the same file no matter which document referenced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LibraryCoordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub classifier: Option<String>,
    /// File extension. Defaults to `"jar"`.
    pub extension: String,
}

impl LibraryCoordinate {
    pub fn new(group: &str, artifact: &str, version: &str) -> Self {
        Self {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version: version.to_string(),
            classifier: None,
            extension: "jar".to_string(),
        }
    }

    /// Parse a coordinate string.
    ///
    /// # Examples
    /// ```
    /// use mcl_lib::core::maven::LibraryCoordinate;
    /// let c = LibraryCoordinate::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
    /// assert_eq!(c.group, "net.sf.jopt-simple");
    /// ```
    pub fn parse(raw: &str) -> LauncherResult<Self> {
        let raw = raw.trim();
        let (body, extension) = match raw.rsplit_once('@') {
            Some((body, ext)) if !ext.is_empty() => (body, ext),
            Some(_) => return Err(LauncherError::InvalidCoordinate(raw.to_string())),
            None => (raw, "jar"),
        };

        let parts: Vec<&str> = body.split(':').collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(LauncherError::InvalidCoordinate(raw.to_string()));
        }

        let classifier = match parts.len() {
            3 => None,
            4 => Some(parts[3].to_string()),
            _ => return Err(LauncherError::InvalidCoordinate(raw.to_string())),
        };

        Ok(Self {
            group: parts[0].to_string(),
            artifact: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier,
            extension: extension.to_string(),
        })
    }

    /// Same coordinate with a different classifier (used for native archives).
    pub fn with_classifier(&self, classifier: &str) -> Self {
        let mut clone = self.clone();
        clone.classifier = Some(classifier.to_string());
        clone
    }

    /// `artifact-version[-classifier].extension`
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(c) => format!("{}-{}-{}.{}", self.artifact, self.version, c, self.extension),
            None => format!("{}-{}.{}", self.artifact, self.version, self.extension),
        }
    }

    /// Path relative to the libraries directory, always `/`-separated:
    /// `<group with dots as slashes>/<artifact>/<version>/<file name>`.
    pub fn relative_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            self.file_name()
        )
    }

    /// Full URL for this coordinate under a repository base.
    pub fn url(&self, repo_base: &str) -> String {
        format!(
            "{}/{}",
            repo_base.trim_end_matches('/'),
            self.relative_path()
        )
    }
}

impl fmt::Display for LibraryCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
        if let Some(c) = &self.classifier {
            write!(f, ":{}", c)?;
        }
        if self.extension != "jar" {
            write!(f, "@{}", self.extension)?;
        }
        Ok(())
    }
}
