// ─── Version Record ───
// Typed, explicitly optional view of one version document, and the merged
// result of walking an inheritance chain.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult, ResolutionError};
use crate::core::maven::{LibraryCoordinate, MOJANG_LIBRARIES};

/// A library referenced by a version document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryRef {
    /// Coordinate text exactly as declared.
    pub name: String,
    pub coordinate: Option<LibraryCoordinate>,
    /// Explicit path relative to the libraries directory.
    pub path: Option<String>,
    /// Explicit absolute artifact URL.
    pub url: Option<String>,
    /// Repository base the derived path is appended to.
    pub repository: Option<String>,
    pub sha1: Option<String>,
}

impl LibraryRef {
    pub fn from_coordinate(coordinate: LibraryCoordinate) -> Self {
        Self {
            name: coordinate.to_string(),
            coordinate: Some(coordinate),
            path: None,
            url: None,
            repository: None,
            sha1: None,
        }
    }

    /// Coordinate text if parseable, otherwise the raw declared name.
    pub fn identity(&self) -> String {
        self.coordinate
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| self.name.clone())
    }

    pub fn derived_path(&self) -> Option<String> {
        self.coordinate.as_ref().map(LibraryCoordinate::relative_path)
    }

    /// Path relative to the libraries directory: the declared path when it is
    /// usable, otherwise the one derived from the coordinate.
    pub fn local_path(&self) -> LauncherResult<String> {
        self.path
            .as_deref()
            .map(str::trim)
            .filter(|p| is_safe_relative(p))
            .map(ToString::to_string)
            .or_else(|| self.derived_path())
            .ok_or_else(|| LauncherError::InvalidCoordinate(self.name.clone()))
    }

    /// The declared URL, if it is an absolute http(s) URL.
    pub fn declared_url(&self) -> Option<String> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|u| is_absolute_http_url(u))
            .map(ToString::to_string)
    }

    /// URL rebuilt from the coordinate under the declared repository base, or
    /// the default library repository when the base is absent or unusable.
    pub fn derived_url(&self) -> Option<String> {
        let coordinate = self.coordinate.as_ref()?;
        let base = self
            .repository
            .as_deref()
            .map(str::trim)
            .filter(|b| is_absolute_http_url(b))
            .unwrap_or(MOJANG_LIBRARIES);
        Some(coordinate.url(base))
    }

    /// The URL tried first: declared, else derived.
    pub fn primary_url(&self) -> Option<String> {
        self.declared_url().or_else(|| self.derived_url())
    }
}

fn is_absolute_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && !path.contains(':')
        && path.split('/').all(|segment| segment != "..")
}

fn same_coordinate(a: &LibraryRef, b: &LibraryRef) -> bool {
    match (&a.coordinate, &b.coordinate) {
        (Some(x), Some(y)) => x == y,
        _ => a.name == b.name,
    }
}

/// A library archive unpacked into the per-version natives directory instead
/// of being placed on the classpath.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeRef {
    pub library: LibraryRef,
    /// Entry prefixes skipped on extraction.
    pub exclude: Vec<String>,
}

/// Which client jar to launch, and where to get it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientJarRef {
    /// Version whose `<id>.jar` is used.
    pub version_id: String,
    pub url: Option<String>,
    pub sha1: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIndexRef {
    pub id: String,
    pub url: Option<String>,
    pub sha1: Option<String>,
}

/// Game argument template as a version document declares it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaunchTemplate {
    /// `minecraftArguments`: the whole template, replacing anything inherited.
    Legacy(Vec<String>),
    /// `arguments.game`: tokens appended after the inherited ones.
    Modern(Vec<String>),
}

impl LaunchTemplate {
    pub fn tokens(&self) -> &[String] {
        match self {
            LaunchTemplate::Legacy(tokens) | LaunchTemplate::Modern(tokens) => tokens,
        }
    }

    pub fn into_tokens(self) -> Vec<String> {
        match self {
            LaunchTemplate::Legacy(tokens) | LaunchTemplate::Modern(tokens) => tokens,
        }
    }

    fn overlay_onto(self, inherited: Option<LaunchTemplate>) -> LaunchTemplate {
        match (self, inherited) {
            (LaunchTemplate::Modern(own), Some(inherited)) => {
                let mut tokens = inherited.into_tokens();
                tokens.extend(own);
                LaunchTemplate::Modern(tokens)
            }
            (own, _) => own,
        }
    }
}

/// One version document, with every field that may be absent kept optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: String,
    pub inherits_from: Option<String>,
    pub version_type: Option<String>,
    pub main_class: Option<String>,
    pub launch_arguments: Option<LaunchTemplate>,
    pub asset_index: Option<AssetIndexRef>,
    pub client_jar: Option<ClientJarRef>,
    pub libraries: Vec<LibraryRef>,
    pub natives: Vec<NativeRef>,
}

/// Flattened, launch-ready record. Built per invocation, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstallation {
    pub id: String,
    /// Version ids from leaf to root.
    pub chain: Vec<String>,
    pub version_type: Option<String>,
    pub main_class: String,
    pub launch_arguments: Vec<String>,
    pub asset_index: Option<AssetIndexRef>,
    pub client_jar: ClientJarRef,
    pub libraries: Vec<LibraryRef>,
    pub natives: Vec<NativeRef>,
}

impl VersionRecord {
    /// Apply this (child) record on top of an already merged parent.
    ///
    /// Scalar fields: the child's value wins when present. Libraries and
    /// natives: the child's entries are appended, skipping entries whose
    /// coordinate matches an inherited one exactly. A legacy argument string
    /// replaces the inherited template; a modern list extends it.
    pub fn overlay_onto(self, parent: VersionRecord) -> VersionRecord {
        let asset_index = match (self.asset_index, parent.asset_index) {
            (Some(mut child), Some(inherited)) => {
                if child.url.is_none() && child.id == inherited.id {
                    child.url = inherited.url;
                    child.sha1 = inherited.sha1;
                }
                Some(child)
            }
            (child, inherited) => child.or(inherited),
        };

        let client_jar = match (self.client_jar, parent.client_jar) {
            (Some(mut child), Some(inherited)) => {
                if child.url.is_none() {
                    child.url = inherited.url;
                    child.sha1 = inherited.sha1;
                }
                Some(child)
            }
            (child, inherited) => child.or(inherited),
        };

        let mut libraries = parent.libraries;
        for lib in self.libraries {
            if !libraries.iter().any(|known| same_coordinate(known, &lib)) {
                libraries.push(lib);
            }
        }

        let mut natives = parent.natives;
        for native in self.natives {
            if !natives
                .iter()
                .any(|known| same_coordinate(&known.library, &native.library))
            {
                natives.push(native);
            }
        }

        VersionRecord {
            id: self.id,
            inherits_from: None,
            version_type: self.version_type.or(parent.version_type),
            main_class: self.main_class.or(parent.main_class),
            launch_arguments: match self.launch_arguments {
                Some(own) => Some(own.overlay_onto(parent.launch_arguments)),
                None => parent.launch_arguments,
            },
            asset_index,
            client_jar,
            libraries,
            natives,
        }
    }

    /// Finish a record with no remaining parent into a launch-ready one.
    pub(crate) fn into_resolved(
        self,
        chain: Vec<String>,
    ) -> Result<ResolvedInstallation, ResolutionError> {
        let main_class = self
            .main_class
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| ResolutionError::Malformed {
                id: self.id.clone(),
                reason: "no main class anywhere in the inheritance chain".into(),
            })?;

        // Without an explicit jar, the jar is the one named after the chain root.
        let client_jar = self.client_jar.unwrap_or_else(|| ClientJarRef {
            version_id: chain.last().cloned().unwrap_or_else(|| self.id.clone()),
            url: None,
            sha1: None,
        });

        Ok(ResolvedInstallation {
            id: self.id,
            chain,
            version_type: self.version_type,
            main_class,
            launch_arguments: self
                .launch_arguments
                .map(LaunchTemplate::into_tokens)
                .unwrap_or_default(),
            asset_index: self.asset_index,
            client_jar,
            libraries: self.libraries,
            natives: self.natives,
        })
    }
}
