// ─── mcl Core ───
// Version resolution, artifact acquisition and game launch.
//
// Architecture:
//   core/
//     version/    — Version index, version documents, inheritance resolver
//     maven/      — Library coordinates and derived paths
//     downloader/ — Fetcher boundary + idempotent artifact store
//     assets/     — Asset index + content-addressed objects
//     install/    — Acquisition plan, bounded executor, natives
//     launch/     — Classpath, command builder, process supervisor
//     auth/       — Offline session identity
//     settings    — Launcher settings and on-disk layout
//     events      — Phase notifications
//     launcher    — Pipeline façade

pub mod assets;
pub mod auth;
pub mod downloader;
pub mod error;
pub mod events;
pub mod http;
pub mod install;
pub mod launch;
pub mod launcher;
pub mod maven;
pub mod settings;
pub mod version;
