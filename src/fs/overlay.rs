//! Path and known-path redirection in front of a parent filesystem.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::fs::{FileSystem, MappingMode, Metadata};
use crate::mmap::MappedHandle;
use crate::path::{AbsolutePath, Convention, KnownPath};

/// The redirection table an [`OverlayFS`] applies.
#[derive(Default)]
pub struct OverlayOptions {
    path_mappings: Vec<(AbsolutePath, AbsolutePath)>,
    known_path_mappings: HashMap<KnownPath, AbsolutePath>,
    convert_cross_platform: bool,
}

impl OverlayOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Redirects every path at or below `from` to the same relative
    /// location below `to`. When several mappings contain a path, the
    /// longest (most specific) source prefix wins.
    pub fn with_path_mapping(mut self, from: AbsolutePath, to: AbsolutePath) -> Self {
        self.path_mappings.push((from, to));
        self
    }

    /// Redirects a symbolic location lookup.
    pub fn with_known_path(mut self, known: KnownPath, to: AbsolutePath) -> Self {
        self.known_path_mappings.insert(known, to);
        self
    }

    /// Re-anchors paths of the other OS convention onto the parent's
    /// before mapping, so Windows-form input can drive a Posix parent
    /// and vice versa.
    pub fn with_cross_platform_conversion(mut self) -> Self {
        self.convert_cross_platform = true;
        self
    }
}

/// A redirecting facade over a parent [`FileSystem`].
///
/// Not a storage backend: every operation rewrites its path arguments
/// exactly once against the mapping table and delegates to the parent.
/// Rewriting is not transitive; the output of one mapping is never fed
/// back through the table, so a mapping pair `a -> b`, `b -> c` sends
/// paths under `a` to `b`, not to `c`. Overlays compose by stacking
/// instances instead.
pub struct OverlayFS {
    parent: Arc<dyn FileSystem>,
    options: OverlayOptions,
}

impl OverlayFS {
    pub fn new(parent: Arc<dyn FileSystem>, mut options: OverlayOptions) -> Self {
        if options.convert_cross_platform {
            // Mapping endpoints given in the other platform's form are
            // re-anchored once here, so resolution only ever compares
            // paths of the parent's convention.
            let target = parent.convention();
            for (from, to) in &mut options.path_mappings {
                *from = from.convert_to(target);
                *to = to.convert_to(target);
            }
            for mapped in options.known_path_mappings.values_mut() {
                *mapped = mapped.convert_to(target);
            }
        }
        Self { parent, options }
    }

    fn resolve(&self, path: &AbsolutePath) -> Result<AbsolutePath> {
        let path = if self.options.convert_cross_platform
            && path.convention() != self.parent.convention()
        {
            path.convert_to(self.parent.convention())
        } else {
            path.clone()
        };

        let mut best: Option<&(AbsolutePath, AbsolutePath)> = None;
        for mapping in &self.options.path_mappings {
            if path.in_folder(&mapping.0)
                && best.is_none_or(|b| mapping.0.as_str().len() > b.0.as_str().len())
            {
                best = Some(mapping);
            }
        }
        let Some((from, to)) = best else {
            return Ok(path);
        };
        let rewritten = to.combine(&path.relative_to(from)?);
        log::debug!("overlay rewrote {path} to {rewritten}");
        Ok(rewritten)
    }
}

#[async_trait]
impl FileSystem for OverlayFS {
    fn convention(&self) -> Convention {
        self.parent.convention()
    }

    fn known_path(&self, known: KnownPath) -> Result<AbsolutePath> {
        match self.options.known_path_mappings.get(&known) {
            Some(mapped) => Ok(mapped.clone()),
            None => self.parent.known_path(known),
        }
    }

    fn metadata(&self, path: &AbsolutePath) -> Result<Metadata> {
        self.parent.metadata(&self.resolve(path)?)
    }

    fn read(&self, path: &AbsolutePath) -> Result<Vec<u8>> {
        self.parent.read(&self.resolve(path)?)
    }

    fn write(&self, path: &AbsolutePath, content: &[u8]) -> Result<()> {
        self.parent.write(&self.resolve(path)?, content)
    }

    fn create_file(&self, path: &AbsolutePath) -> Result<()> {
        self.parent.create_file(&self.resolve(path)?)
    }

    fn create_directory(&self, path: &AbsolutePath) -> Result<()> {
        self.parent.create_directory(&self.resolve(path)?)
    }

    fn delete_file(&self, path: &AbsolutePath) -> Result<()> {
        self.parent.delete_file(&self.resolve(path)?)
    }

    fn delete_directory(&self, path: &AbsolutePath, recursive: bool) -> Result<()> {
        self.parent.delete_directory(&self.resolve(path)?, recursive)
    }

    fn move_file(&self, from: &AbsolutePath, to: &AbsolutePath, overwrite: bool) -> Result<()> {
        self.parent
            .move_file(&self.resolve(from)?, &self.resolve(to)?, overwrite)
    }

    fn set_read_only(&self, path: &AbsolutePath, read_only: bool) -> Result<()> {
        self.parent.set_read_only(&self.resolve(path)?, read_only)
    }

    fn enumerate_files(
        &self,
        dir: &AbsolutePath,
        pattern: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<AbsolutePath>> {
        self.parent
            .enumerate_files(&self.resolve(dir)?, pattern, recursive)
    }

    fn enumerate_directories(
        &self,
        dir: &AbsolutePath,
        recursive: bool,
    ) -> Result<Vec<AbsolutePath>> {
        self.parent.enumerate_directories(&self.resolve(dir)?, recursive)
    }

    fn read_at(&self, path: &AbsolutePath, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.parent.read_at(&self.resolve(path)?, offset, buf)
    }

    async fn read_at_async(
        &self,
        path: &AbsolutePath,
        offset: u64,
        len: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>> {
        self.parent
            .read_at_async(&self.resolve(path)?, offset, len, cancel)
            .await
    }

    fn create_mapping(&self, path: &AbsolutePath, mode: MappingMode) -> Result<MappedHandle> {
        self.parent.create_mapping(&self.resolve(path)?, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFS;

    fn posix(text: &str) -> AbsolutePath {
        AbsolutePath::from_unsanitized(text, Convention::Posix).unwrap()
    }

    fn setup_overlay(options: OverlayOptions) -> (Arc<MemFS>, OverlayFS) {
        let parent = Arc::new(MemFS::with_convention(Convention::Posix));
        let overlay = OverlayFS::new(parent.clone(), options);
        (parent, overlay)
    }

    mod path_mappings {
        use super::*;

        #[test]
        fn test_paths_under_a_mapping_are_redirected() {
            let options =
                OverlayOptions::new().with_path_mapping(posix("/game/data"), posix("/mods/active"));
            let (parent, overlay) = setup_overlay(options);

            overlay.write(&posix("/game/data/plugin.esp"), b"x").unwrap();

            assert!(parent.is_file(&posix("/mods/active/plugin.esp")));
            assert!(!parent.exists(&posix("/game/data/plugin.esp")));
            // The overlay's own view of the source path still resolves.
            assert_eq!(overlay.read(&posix("/game/data/plugin.esp")).unwrap(), b"x");
        }

        #[test]
        fn test_paths_outside_every_mapping_pass_through() {
            let options =
                OverlayOptions::new().with_path_mapping(posix("/game/data"), posix("/mods"));
            let (parent, overlay) = setup_overlay(options);

            overlay.write(&posix("/elsewhere/file.txt"), b"y").unwrap();
            assert!(parent.is_file(&posix("/elsewhere/file.txt")));
        }

        #[test]
        fn test_longest_source_prefix_wins() {
            let options = OverlayOptions::new()
                .with_path_mapping(posix("/game"), posix("/coarse"))
                .with_path_mapping(posix("/game/data"), posix("/fine"));
            let (parent, overlay) = setup_overlay(options);

            overlay.write(&posix("/game/data/a.esp"), b"1").unwrap();
            overlay.write(&posix("/game/other.txt"), b"2").unwrap();

            assert!(parent.is_file(&posix("/fine/a.esp")));
            assert!(parent.is_file(&posix("/coarse/other.txt")));
        }

        #[test]
        fn test_rewriting_is_not_transitive() {
            let options = OverlayOptions::new()
                .with_path_mapping(posix("/a"), posix("/b"))
                .with_path_mapping(posix("/b"), posix("/c"));
            let (parent, overlay) = setup_overlay(options);

            overlay.write(&posix("/a/file"), b"x").unwrap();
            // One rewrite only: /a -> /b, never chained on to /c.
            assert!(parent.is_file(&posix("/b/file")));
            assert!(!parent.exists(&posix("/c/file")));
        }

        #[test]
        fn test_move_resolves_both_endpoints() {
            let options =
                OverlayOptions::new().with_path_mapping(posix("/virtual"), posix("/real"));
            let (parent, overlay) = setup_overlay(options);

            overlay.write(&posix("/virtual/a.txt"), b"m").unwrap();
            overlay
                .move_file(&posix("/virtual/a.txt"), &posix("/virtual/b.txt"), false)
                .unwrap();

            assert!(parent.is_file(&posix("/real/b.txt")));
            assert!(!parent.exists(&posix("/real/a.txt")));
        }
    }

    mod known_paths {
        use super::*;

        #[test]
        fn test_known_path_override() {
            let options = OverlayOptions::new()
                .with_known_path(KnownPath::MyGames, posix("/profiles/current/games"));
            let (_parent, overlay) = setup_overlay(options);

            assert_eq!(
                overlay.known_path(KnownPath::MyGames).unwrap(),
                posix("/profiles/current/games")
            );
            // Unmapped lookups fall through to the parent.
            assert!(overlay.known_path(KnownPath::HomeFolder).is_ok());
        }

        #[test]
        fn test_placeholders_expand_against_the_overlay() {
            let options = OverlayOptions::new()
                .with_known_path(KnownPath::MyGames, posix("/redirected/games"));
            let (_parent, overlay) = setup_overlay(options);

            let parsed = overlay.parse_unsanitized("{MyGames}/Skyrim/saves").unwrap();
            assert_eq!(parsed.as_str(), "/redirected/games/Skyrim/saves");
        }
    }

    mod cross_platform {
        use super::*;

        fn windows(text: &str) -> AbsolutePath {
            AbsolutePath::from_unsanitized(text, Convention::Windows).unwrap()
        }

        #[test]
        fn test_windows_form_input_reaches_a_posix_parent() {
            let options = OverlayOptions::new().with_cross_platform_conversion();
            let (parent, overlay) = setup_overlay(options);

            overlay
                .write(&windows("D:\\games\\save.dat"), b"s")
                .unwrap();
            assert!(parent.is_file(&posix("/games/save.dat")));
        }

        #[test]
        fn test_conversion_happens_before_mapping() {
            let options = OverlayOptions::new()
                .with_cross_platform_conversion()
                .with_path_mapping(posix("/games"), posix("/library"));
            let (parent, overlay) = setup_overlay(options);

            overlay
                .write(&windows("C:/games/mod.esp"), b"m")
                .unwrap();
            assert!(parent.is_file(&posix("/library/mod.esp")));
        }

        #[test]
        fn test_mapping_endpoints_in_the_other_form_are_converted() {
            let options = OverlayOptions::new()
                .with_cross_platform_conversion()
                .with_path_mapping(windows("C:\\games"), windows("C:\\library"));
            let (parent, overlay) = setup_overlay(options);

            overlay.write(&posix("/games/mod.esp"), b"m").unwrap();
            assert!(parent.is_file(&posix("/library/mod.esp")));
        }

        #[test]
        fn test_foreign_convention_without_conversion_is_rejected() {
            let (_parent, overlay) = setup_overlay(OverlayOptions::new());
            let result = overlay.read(&windows("C:/x"));
            assert!(result.is_err());
        }
    }
}
