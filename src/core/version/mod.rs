pub mod local;
pub mod manifest;
pub mod record;
pub mod resolver;
pub mod sync;
pub mod version_file;

pub use local::{installed_versions, read_registered_versions, unregistered_versions};
pub use manifest::{VersionEntry, VersionManifest, VERSION_MANIFEST_URL};
pub use record::{
    AssetIndexRef, ClientJarRef, LaunchTemplate, LibraryRef, NativeRef, ResolvedInstallation, VersionRecord,
};
pub use resolver::{FsVersionSource, VersionResolver, VersionSource};
pub use sync::MetadataSync;
pub use version_file::{current_os_name, VersionDocument};
