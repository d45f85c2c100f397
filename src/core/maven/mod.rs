mod coordinate;

pub use coordinate::LibraryCoordinate;

/// Default repository for libraries whose document gives no usable URL.
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
