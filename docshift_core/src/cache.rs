use std::collections::HashMap;

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use crate::transform::TransformedDocument;

/// SHA-256 digest of a document's raw text. Path and version take no part in
/// it, so identical files in different version trees share one hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ContentHash(String);

impl ContentHash {
	pub fn of(text: &str) -> Self {
		Self::of_bytes(text.as_bytes())
	}

	pub fn of_bytes(bytes: &[u8]) -> Self {
		let mut hasher = Sha256::new();
		hasher.update(bytes);
		Self(format!("{:x}", hasher.finalize()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// First 12 hex digits, for logs.
	pub fn short(&self) -> &str {
		&self.0[..12.min(self.0.len())]
	}
}

impl std::fmt::Display for ContentHash {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// A transformed document stored under its content hash, together with the
/// location it was produced for.
#[derive(Debug, Clone)]
pub struct CacheEntry {
	pub document: TransformedDocument,
	/// Version label the document was transformed for.
	pub version: String,
	/// Version-relative source path the document was transformed for.
	pub path: String,
}

impl CacheEntry {
	pub fn new(
		document: TransformedDocument,
		version: impl Into<String>,
		path: impl Into<String>,
	) -> Self {
		Self {
			document,
			version: version.into(),
			path: path.into(),
		}
	}

	/// Whether the stored output is valid for a document at `path` in
	/// `version`. Output that depends on the document's own location (relative
	/// links, a title taken from the file name) only transfers to the same
	/// relative path; output holding urls in its own version namespace only
	/// transfers within that version.
	pub fn reusable_for(&self, path: &str, version: &str) -> bool {
		(self.path == path || !self.document.location_sensitive)
			&& (self.version == version || !self.document.version_sensitive)
	}
}

/// Write-once store of transformed documents for one migration run.
#[derive(Debug, Default)]
pub struct ContentCache {
	entries: HashMap<ContentHash, CacheEntry>,
}

impl ContentCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn lookup(&self, hash: &ContentHash) -> Option<&CacheEntry> {
		self.entries.get(hash)
	}

	/// Store `entry` under `hash` unless an entry already exists. The first
	/// transformation always wins. Returns whether the entry was stored.
	pub fn store(&mut self, hash: ContentHash, entry: CacheEntry) -> bool {
		if self.entries.contains_key(&hash) {
			return false;
		}

		self.entries.insert(hash, entry);
		true
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
