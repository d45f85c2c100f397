// ─── Version File ───
// Deserializes a version document and evaluates OS rules, producing a
// typed `VersionRecord`.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::core::error::ResolutionError;
use crate::core::maven::LibraryCoordinate;

use super::record::{
    AssetIndexRef, ClientJarRef, LaunchTemplate, LibraryRef, NativeRef, VersionRecord,
};

/// A version document as stored on disk or served by the version index.
///
/// Base documents carry `downloads` and `assetIndex`; modded documents carry
/// `inheritsFrom`, `jar` and libraries with a repository `url` instead.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub inherits_from: Option<String>,
    #[serde(default, rename = "type")]
    pub version_type: Option<String>,
    #[serde(default)]
    pub main_class: Option<String>,
    #[serde(default)]
    pub jar: Option<String>,
    /// Legacy asset index id.
    #[serde(default)]
    pub assets: Option<String>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexInfo>,
    #[serde(default)]
    pub downloads: Option<VersionDownloads>,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    #[serde(default)]
    pub arguments: Option<Arguments>,
    /// Legacy space-separated template (pre-1.13).
    #[serde(default)]
    pub minecraft_arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VersionDownloads {
    #[serde(default)]
    pub client: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetIndexInfo {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<ArgumentValue>,
}

/// Either a bare token or a rule-gated token group.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Plain(String),
    Conditional {
        #[serde(default)]
        rules: Vec<Rule>,
        value: OneOrMany,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

// ─── Library Entry with Rules ───

#[derive(Debug, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    /// Repository base used by loader documents.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
    /// OS name → classifier, possibly containing `${arch}`.
    #[serde(default)]
    pub natives: Option<HashMap<String, String>>,
    #[serde(default)]
    pub extract: Option<ExtractRules>,
}

#[derive(Debug, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default)]
    pub artifact: Option<LibDownloadArtifact>,
    #[serde(default)]
    pub classifiers: Option<HashMap<String, LibDownloadArtifact>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibDownloadArtifact {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

// ─── OS Rule Evaluation ───

#[derive(Debug, Deserialize)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsRule>,
    /// Feature-gated rules never match: no optional features are enabled.
    #[serde(default)]
    pub features: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Deserialize)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
}

impl Rule {
    fn matches_current_platform(&self) -> bool {
        if self.features.as_ref().is_some_and(|f| !f.is_empty()) {
            return false;
        }
        match &self.os {
            None => true,
            Some(os) => {
                let name_ok = os.name.as_deref().map_or(true, |n| n == current_os_name());
                let arch_ok = os.arch.as_deref().map_or(true, |a| a == current_arch_name());
                name_ok && arch_ok
            }
        }
    }
}

/// Rules logic:
/// - No rules → allowed.
/// - Otherwise start disallowed and let every matching rule set the state.
pub fn rules_allow(rules: &[Rule]) -> bool {
    if rules.is_empty() {
        return true;
    }

    let mut allowed = false;
    for rule in rules {
        if rule.matches_current_platform() {
            allowed = rule.action == RuleAction::Allow;
        }
    }
    allowed
}

impl LibraryEntry {
    pub fn is_allowed_for_current_os(&self) -> bool {
        self.rules.as_deref().map_or(true, rules_allow)
    }

    /// Classifier of this library's native archive for the current OS.
    pub fn native_classifier_for_current_os(&self) -> Option<String> {
        let natives = self.natives.as_ref()?;
        let arch = if cfg!(target_pointer_width = "64") {
            "64"
        } else {
            "32"
        };
        natives
            .get(current_os_name())
            .map(|classifier| classifier.replace("${arch}", arch))
    }

    fn base_ref(&self) -> LibraryRef {
        let coordinate = LibraryCoordinate::parse(&self.name).ok();
        LibraryRef {
            name: self.name.clone(),
            coordinate,
            path: None,
            url: None,
            repository: self.url.clone(),
            sha1: None,
        }
    }

    /// The classpath entry, if this library has one.
    fn classpath_ref(&self) -> Option<LibraryRef> {
        let artifact = self.downloads.as_ref().and_then(|d| d.artifact.as_ref());
        let mut lib = self.base_ref();

        match artifact {
            Some(artifact) => {
                lib.path = artifact.path.clone();
                lib.url = artifact.url.clone();
                lib.sha1 = artifact.sha1.clone();
            }
            // Native-only entries (classifiers without a main artifact).
            None if self.natives.is_some() && self.downloads.is_some() => return None,
            None => {}
        }
        Some(lib)
    }

    fn native_ref(&self) -> Option<NativeRef> {
        let classifier = self.native_classifier_for_current_os()?;
        let base = self.base_ref();

        let declared = self
            .downloads
            .as_ref()
            .and_then(|d| d.classifiers.as_ref())
            .and_then(|c| c.get(&classifier));

        let library = LibraryRef {
            name: format!("{}:{}", self.name, classifier),
            coordinate: base.coordinate.map(|c| c.with_classifier(&classifier)),
            path: declared.and_then(|d| d.path.clone()),
            url: declared.and_then(|d| d.url.clone()),
            repository: base.repository,
            sha1: declared.and_then(|d| d.sha1.clone()),
        };

        Some(NativeRef {
            library,
            exclude: self
                .extract
                .as_ref()
                .map(|e| e.exclude.clone())
                .unwrap_or_default(),
        })
    }
}

/// Mojang OS name for the current platform.
pub fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

fn current_arch_name() -> &'static str {
    if cfg!(target_arch = "x86") {
        "x86"
    } else if cfg!(target_arch = "aarch64") {
        "arm64"
    } else {
        "x86_64"
    }
}

impl VersionDocument {
    pub fn parse(id: &str, raw: &[u8]) -> Result<Self, ResolutionError> {
        serde_json::from_slice(raw).map_err(|e| ResolutionError::Malformed {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Convert into a typed record. `fallback_id` names the record when the
    /// document omits its own id.
    pub fn into_record(self, fallback_id: &str) -> Result<VersionRecord, ResolutionError> {
        let id = self
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| fallback_id.to_string());

        let mut libraries = Vec::new();
        let mut natives = Vec::new();
        for entry in &self.libraries {
            if !entry.is_allowed_for_current_os() {
                debug!("Skipping library (OS rule): {}", entry.name);
                continue;
            }

            if let Some(lib) = entry.classpath_ref() {
                if lib.local_path().is_err() {
                    return Err(ResolutionError::Malformed {
                        id,
                        reason: format!("library {:?} has neither a coordinate nor a path", entry.name),
                    });
                }
                libraries.push(lib);
            }
            if let Some(native) = entry.native_ref() {
                natives.push(native);
            }
        }

        let launch_arguments = self.launch_template();

        let asset_index = match (self.asset_index, self.assets) {
            (Some(info), _) => Some(AssetIndexRef {
                id: info.id,
                url: info.url,
                sha1: info.sha1,
            }),
            (None, Some(legacy_id)) if !legacy_id.trim().is_empty() => Some(AssetIndexRef {
                id: legacy_id,
                url: None,
                sha1: None,
            }),
            _ => None,
        };

        let client_download = self.downloads.and_then(|d| d.client);
        let client_jar = match (self.jar.filter(|j| !j.trim().is_empty()), client_download) {
            (Some(jar), download) => Some(ClientJarRef {
                version_id: jar,
                url: download.as_ref().and_then(|d| d.url.clone()),
                sha1: download.and_then(|d| d.sha1),
            }),
            (None, Some(download)) => Some(ClientJarRef {
                version_id: id.clone(),
                url: download.url,
                sha1: download.sha1,
            }),
            (None, None) => None,
        };

        Ok(VersionRecord {
            id,
            inherits_from: self.inherits_from.filter(|p| !p.trim().is_empty()),
            version_type: self.version_type,
            main_class: self.main_class.filter(|m| !m.trim().is_empty()),
            launch_arguments,
            asset_index,
            client_jar,
            libraries,
            natives,
        })
    }

    /// Game argument template, from `arguments.game` or the legacy string.
    fn launch_template(&self) -> Option<LaunchTemplate> {
        if let Some(args) = &self.arguments {
            return Some(LaunchTemplate::Modern(
                args.game.iter().flat_map(argument_tokens).collect(),
            ));
        }
        self.minecraft_arguments.as_ref().map(|s| {
            LaunchTemplate::Legacy(s.split_whitespace().map(ToString::to_string).collect())
        })
    }
}

fn argument_tokens(value: &ArgumentValue) -> Vec<String> {
    match value {
        ArgumentValue::Plain(token) => vec![token.clone()],
        ArgumentValue::Conditional { rules, value } => {
            if !rules_allow(rules) {
                return vec![];
            }
            match value {
                OneOrMany::One(token) => vec![token.clone()],
                OneOrMany::Many(tokens) => tokens.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: serde_json::Value) -> VersionDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn no_rules_means_allowed() {
        assert!(rules_allow(&[]));
    }

    #[test]
    fn disallow_current_os_wins_when_last() {
        let rules: Vec<Rule> = serde_json::from_value(serde_json::json!([
            {"action": "allow"},
            {"action": "disallow", "os": {"name": current_os_name()}}
        ]))
        .unwrap();
        assert!(!rules_allow(&rules));
    }

    #[test]
    fn feature_gated_arguments_are_excluded() {
        let parsed = doc(serde_json::json!({
            "id": "test",
            "mainClass": "net.minecraft.client.main.Main",
            "arguments": {
                "game": [
                    "--username",
                    "${auth_player_name}",
                    {
                        "rules": [{"action": "allow", "features": {"is_demo_user": true}}],
                        "value": "--demo"
                    },
                    {
                        "rules": [{"action": "allow", "os": {"name": current_os_name()}}],
                        "value": ["--os-specific", "yes"]
                    }
                ]
            }
        }));

        let record = parsed.into_record("test").unwrap();
        assert_eq!(
            record.launch_arguments.unwrap(),
            LaunchTemplate::Modern(
                ["--username", "${auth_player_name}", "--os-specific", "yes"]
                    .map(String::from)
                    .to_vec()
            )
        );
    }

    #[test]
    fn legacy_argument_string_is_split() {
        let record = doc(serde_json::json!({
            "id": "1.7.10",
            "mainClass": "net.minecraft.client.main.Main",
            "minecraftArguments": "--username ${auth_player_name}  --session ${auth_session}",
            "assets": "1.7.10"
        }))
        .into_record("1.7.10")
        .unwrap();

        assert_eq!(
            record.launch_arguments.unwrap(),
            LaunchTemplate::Legacy(
                ["--username", "${auth_player_name}", "--session", "${auth_session}"]
                    .map(String::from)
                    .to_vec()
            )
        );
        assert_eq!(record.asset_index.unwrap().id, "1.7.10");
    }

    #[test]
    fn loader_library_keeps_repository_and_reconstructs_path() {
        let record = doc(serde_json::json!({
            "id": "modded-1",
            "inheritsFrom": "vanilla-1",
            "mainClass": "net.fabricmc.loader.launch.knot.KnotClient",
            "libraries": [
                {"name": "net.fabricmc:fabric-loader:0.15.0", "url": "https://maven.fabricmc.net/"}
            ]
        }))
        .into_record("modded-1")
        .unwrap();

        let lib = &record.libraries[0];
        assert_eq!(lib.repository.as_deref(), Some("https://maven.fabricmc.net/"));
        assert_eq!(
            lib.local_path().unwrap(),
            "net/fabricmc/fabric-loader/0.15.0/fabric-loader-0.15.0.jar"
        );
        assert_eq!(record.inherits_from.as_deref(), Some("vanilla-1"));
        assert_eq!(record.client_jar, None);
    }

    #[test]
    fn native_classifiers_become_native_refs() {
        let os = current_os_name();
        let record = doc(serde_json::json!({
            "id": "1.8.9",
            "mainClass": "net.minecraft.client.main.Main",
            "libraries": [{
                "name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4",
                "natives": { os: format!("natives-{}", os) },
                "extract": {"exclude": ["META-INF/"]},
                "downloads": {
                    "classifiers": {
                        format!("natives-{}", os): {
                            "path": format!("org/lwjgl/lwjgl/lwjgl-platform/2.9.4/lwjgl-platform-2.9.4-natives-{}.jar", os),
                            "url": "https://libraries.minecraft.net/native.jar",
                            "sha1": "abc"
                        }
                    }
                }
            }]
        }))
        .into_record("1.8.9")
        .unwrap();

        assert!(record.libraries.is_empty());
        assert_eq!(record.natives.len(), 1);
        let native = &record.natives[0];
        assert_eq!(native.exclude, vec!["META-INF/"]);
        assert_eq!(
            native.library.url.as_deref(),
            Some("https://libraries.minecraft.net/native.jar")
        );
        assert_eq!(
            native.library.coordinate.as_ref().unwrap().classifier.as_deref(),
            Some(format!("natives-{}", os).as_str())
        );
    }

    #[test]
    fn client_download_and_jar_override() {
        let base = doc(serde_json::json!({
            "id": "1.20.4",
            "mainClass": "net.minecraft.client.main.Main",
            "downloads": {"client": {"url": "https://piston/client.jar", "sha1": "ff"}}
        }))
        .into_record("1.20.4")
        .unwrap();
        let jar = base.client_jar.unwrap();
        assert_eq!(jar.version_id, "1.20.4");
        assert_eq!(jar.url.as_deref(), Some("https://piston/client.jar"));

        let modded = doc(serde_json::json!({"id": "forge", "jar": "1.7.10"}))
            .into_record("forge")
            .unwrap();
        assert_eq!(modded.client_jar.unwrap().version_id, "1.7.10");
        assert_eq!(modded.main_class, None);
    }

    #[test]
    fn library_without_coordinate_or_path_is_malformed() {
        let err = doc(serde_json::json!({
            "id": "broken",
            "libraries": [{"name": "not-a-coordinate"}]
        }))
        .into_record("broken")
        .unwrap_err();
        assert!(matches!(err, ResolutionError::Malformed { .. }));
    }
}
