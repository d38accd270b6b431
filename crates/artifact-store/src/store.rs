//! Precompressed Artifact Store: `<root>/<z>/<x>/<y>.u16[.br|.gz]` on disk,
//! with content negotiation on read and atomic, immutable writes.

use std::path::{Path, PathBuf};

use crate::encoding::{AcceptEncoding, Encoding};
use crate::Error;
use crate::Result;

/// Read/write access to a precompressed artifact pyramid rooted at a
/// directory. Files are immutable once written; regeneration replaces a
/// tile atomically via temp-file-then-rename, so concurrent readers never
/// observe a partially written file.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ArtifactStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_for(&self, z: u32, x: u32) -> PathBuf {
        self.root.join(z.to_string()).join(x.to_string())
    }

    pub fn path_for(&self, z: u32, x: u32, y: u32, encoding: Encoding) -> PathBuf {
        self.dir_for(z, x).join(format!("{y}.{}", encoding.file_suffix()))
    }

    /// Finds the best artifact for `(z, x, y)` given what the caller's
    /// client accepts, trying `Brotli > Gzip > Identity` in that fixed
    /// order and returning the first that exists on disk.
    pub fn negotiate(&self, accept: &AcceptEncoding, z: u32, x: u32, y: u32) -> Option<(Encoding, PathBuf)> {
        for encoding in Encoding::ALL {
            if !accept.accepts(encoding) {
                continue;
            }
            let path = self.path_for(z, x, y, encoding);
            if path.is_file() {
                return Some((encoding, path));
            }
        }
        None
    }

    /// Reads and decodes the artifact at `(z, x, y)` back into its raw
    /// 131,072-byte uint16 payload, for in-process consumption (e.g. by a
    /// PNG renderer that needs raw elevations rather than wire bytes).
    pub fn read_decoded(&self, encoding: Encoding, path: &Path) -> Result<Vec<u8>> {
        let raw = std::fs::read(path)?;
        encoding.decompress(&raw)
    }

    /// Reads the artifact bytes exactly as they sit on disk, suitable for
    /// streaming straight through to an HTTP client with the matching
    /// `Content-Encoding` header - no decompression needed.
    pub fn read_raw(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }

    /// Writes `payload` (the raw 131,072-byte uint16 tile) to `(z, x, y)`
    /// under every requested encoding, atomically. Used only by the offline
    /// generator; the tile engine never writes to this store.
    pub fn write_tile(&self, z: u32, x: u32, y: u32, payload: &[u8], encodings: &[Encoding]) -> Result<()> {
        let dir = self.dir_for(z, x);
        std::fs::create_dir_all(&dir)?;

        for &encoding in encodings {
            let compressed = encoding.compress(payload)?;
            let final_path = self.path_for(z, x, y, encoding);
            let tmp_path = final_path.with_extension(format!("{}.tmp", encoding.file_suffix()));
            std::fs::write(&tmp_path, &compressed)?;
            std::fs::rename(&tmp_path, &final_path)?;
        }
        Ok(())
    }

    /// Validates that `source_root` looks like a populated DEM source tree
    /// before a generation run begins walking it.
    pub fn require_nonempty_source(source_root: &Path) -> Result<()> {
        let has_entries = std::fs::read_dir(source_root).map(|mut it| it.next().is_some()).unwrap_or(false);
        if !has_entries {
            return Err(Error::EmptySource(source_root.to_path_buf()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_negotiate_prefers_brotli() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let payload = vec![0u8; tile_codec_payload_len()];
        store.write_tile(5, 10, 20, &payload, &[Encoding::Brotli, Encoding::Gzip, Encoding::Identity]).unwrap();

        let accept = AcceptEncoding { br: true, gzip: true };
        let (encoding, path) = store.negotiate(&accept, 5, 10, 20).unwrap();
        assert_eq!(encoding, Encoding::Brotli);
        assert!(path.ends_with("5/10/20.u16.br"));
    }

    #[test]
    fn negotiate_falls_back_to_identity_when_client_accepts_nothing_else() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let payload = vec![0u8; tile_codec_payload_len()];
        store.write_tile(5, 10, 20, &payload, &[Encoding::Brotli, Encoding::Identity]).unwrap();

        let accept = AcceptEncoding::identity_only();
        let (encoding, _) = store.negotiate(&accept, 5, 10, 20).unwrap();
        assert_eq!(encoding, Encoding::Identity);
    }

    #[test]
    fn negotiate_returns_none_for_missing_tile() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let accept = AcceptEncoding { br: true, gzip: true };
        assert!(store.negotiate(&accept, 0, 0, 0).is_none());
    }

    #[test]
    fn write_tile_replaces_existing_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let first = vec![1u8; tile_codec_payload_len()];
        let second = vec![2u8; tile_codec_payload_len()];

        store.write_tile(5, 10, 20, &first, &[Encoding::Identity]).unwrap();
        store.write_tile(5, 10, 20, &second, &[Encoding::Identity]).unwrap();

        let path = store.path_for(5, 10, 20, Encoding::Identity);
        let on_disk = store.read_raw(&path).unwrap();
        assert_eq!(on_disk, second);
        // No leftover temp file.
        assert!(!path.with_extension("u16.tmp").exists());
    }

    #[test]
    fn require_nonempty_source_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(matches!(ArtifactStore::require_nonempty_source(&missing), Err(Error::EmptySource(_))));
    }

    #[test]
    fn require_nonempty_source_rejects_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(ArtifactStore::require_nonempty_source(dir.path()), Err(Error::EmptySource(_))));
    }

    fn tile_codec_payload_len() -> usize {
        // 256 * 256 * 2 bytes; kept local so this crate's tests don't take a
        // dev-dependency on tile-codec just for one constant.
        256 * 256 * 2
    }
}
