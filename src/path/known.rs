//! Symbolic, per-filesystem-instance locations.

/// An enumerated symbolic location resolved by a filesystem instance.
///
/// Resolution happens through
/// [`FileSystem::known_path`](crate::FileSystem::known_path); an overlay
/// may redirect any of these before the parent backend sees them. Four of
/// the locations also have a textual placeholder form expanded by
/// [`FileSystem::parse_unsanitized`](crate::FileSystem::parse_unsanitized)
/// before parsing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum KnownPath {
    /// Directory containing the running executable.
    EntryFolder,
    /// Process current working directory.
    CurrentDirectory,
    /// The user's home directory.
    HomeFolder,
    /// The OS temporary directory.
    TempFolder,
    /// Roaming application data (`~/.config` style).
    AppData,
    /// Local (non-roaming) application data.
    LocalAppData,
    /// `Documents/My Games`.
    MyGames,
}

impl KnownPath {
    /// The locations addressable through textual placeholders, in the
    /// order they are expanded.
    pub const PLACEHOLDERS: [(&'static str, KnownPath); 4] = [
        ("{EntryFolder}", KnownPath::EntryFolder),
        ("{CurrentDirectory}", KnownPath::CurrentDirectory),
        ("{HomeFolder}", KnownPath::HomeFolder),
        ("{MyGames}", KnownPath::MyGames),
    ];

    /// The placeholder token for this location, if it has one.
    pub fn placeholder(self) -> Option<&'static str> {
        Self::PLACEHOLDERS
            .iter()
            .find(|(_, known)| *known == self)
            .map(|(token, _)| *token)
    }
}
