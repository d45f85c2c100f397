// ─── Launch Command ───
// Assembles the runtime invocation for a resolved installation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::LauncherResult;
use crate::core::settings::{GameLayout, RuntimeOptions};
use crate::core::version::ResolvedInstallation;

use super::classpath::{build_classpath, safe_path_str};

const HEAP_DUMP_FLAG: &str =
    "-XX:HeapDumpPath=MojangTricksIntelDriversForPerformance_javaw.exe_minecraft.exe.heapdump";

/// An ordered argument vector plus the process context it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl CommandLine {
    /// Full argv, runtime path first.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.to_string_lossy().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Copy/paste-able rendering for logs.
    pub fn display(&self) -> String {
        self.argv()
            .iter()
            .map(|arg| shell_escape(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.working_dir);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

/// Build the launch command:
/// runtime, extra flags, memory flags, heap-dump path, native path,
/// classpath, main class, substituted template, then the window size.
pub fn build_command(
    resolved: &ResolvedInstallation,
    layout: &GameLayout,
    options: &RuntimeOptions,
) -> LauncherResult<CommandLine> {
    let natives_dir = layout.natives_dir(&resolved.id);
    let classpath = build_classpath(resolved, layout)?;
    let vars = placeholder_values(resolved, layout, options);

    let mut args: Vec<String> = options.extra_jvm_args.clone();
    args.push(format!("-Xms{}M", options.min_memory_mb));
    args.push(format!("-Xmx{}M", options.max_memory_mb));
    args.push(HEAP_DUMP_FLAG.to_string());
    args.push(format!("-Djava.library.path={}", safe_path_str(&natives_dir)));
    args.push("-cp".to_string());
    args.push(classpath);
    args.push(resolved.main_class.clone());
    args.extend(
        resolved
            .launch_arguments
            .iter()
            .map(|token| substitute(token, &vars)),
    );

    if let Some((width, height)) = options.window {
        args.push("--width".to_string());
        args.push(width.to_string());
        args.push("--height".to_string());
        args.push(height.to_string());
    }

    let command = CommandLine {
        program: options.java_path.clone(),
        args,
        working_dir: options.game_dir.clone(),
        env: native_library_env(&natives_dir),
    };
    debug!("Command (copy/paste): {}", command.display());
    Ok(command)
}

fn placeholder_values(
    resolved: &ResolvedInstallation,
    layout: &GameLayout,
    options: &RuntimeOptions,
) -> HashMap<&'static str, String> {
    let session = &options.session;
    let mut vars = HashMap::from([
        ("auth_player_name", session.username.clone()),
        ("version_name", resolved.id.clone()),
        ("game_directory", safe_path_str(&options.game_dir)),
        ("assets_root", safe_path_str(&layout.assets_dir())),
        ("game_assets", safe_path_str(&layout.virtual_legacy_dir())),
        ("auth_uuid", session.uuid.clone()),
        ("auth_access_token", session.access_token.clone()),
        ("auth_session", session.session.clone()),
        ("user_properties", session.user_properties.clone()),
        ("user_type", session.user_type.clone()),
        ("version_type", options.version_type.clone()),
    ]);
    if let Some(index) = &resolved.asset_index {
        vars.insert("assets_index_name", index.id.clone());
    }
    if let Some((width, height)) = options.window {
        vars.insert("resolution_width", width.to_string());
        vars.insert("resolution_height", height.to_string());
    }
    vars
}

/// Replace every known `${name}`; unknown placeholders stay as written.
pub fn substitute(token: &str, vars: &HashMap<&'static str, String>) -> String {
    let mut out = String::with_capacity(token.len());
    let mut rest = token;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn native_library_env(natives_dir: &Path) -> Vec<(String, String)> {
    let native_path = safe_path_str(natives_dir);
    let var = if cfg!(target_os = "windows") {
        "PATH"
    } else if cfg!(target_os = "macos") {
        "DYLD_LIBRARY_PATH"
    } else {
        "LD_LIBRARY_PATH"
    };
    vec![(var.to_string(), append_env_path(var, &native_path))]
}

fn append_env_path(var_name: &str, value: &str) -> String {
    let separator = if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    };
    match std::env::var(var_name) {
        Ok(existing) if !existing.trim().is_empty() => {
            format!("{}{}{}", value, separator, existing)
        }
        _ => value.to_string(),
    }
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}
