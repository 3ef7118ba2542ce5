//! Registry of checksum algorithms available to request and response middleware.

use std::fmt;
use std::sync::Arc;

use aws_lc_rs::digest;

/// Incremental checksum computation.
pub trait Checksum: Send {
    fn update(&mut self, data: &[u8]);

    fn finalize(self: Box<Self>) -> Vec<u8>;
}

/// Factory producing a fresh hasher.
pub type ChecksumConstructor = Arc<dyn Fn() -> Box<dyn Checksum> + Send + Sync>;

pub const SHA256: &str = "sha256";
pub const SHA1: &str = "sha1";

struct DigestChecksum(digest::Context);

impl Checksum for DigestChecksum {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finish().as_ref().to_vec()
    }
}

fn digest_constructor(algorithm: &'static digest::Algorithm) -> ChecksumConstructor {
    Arc::new(move || Box::new(DigestChecksum(digest::Context::new(algorithm))) as Box<dyn Checksum>)
}

/// Algorithm id to hasher factory. Ids are case-insensitive.
#[derive(Clone, Default)]
pub struct ChecksumAlgorithms {
    algorithms: Vec<(String, ChecksumConstructor)>,
}

impl ChecksumAlgorithms {
    /// SHA-256 and SHA-1.
    pub fn with_defaults() -> Self {
        let mut algorithms = Self::default();
        algorithms.add(SHA256, digest_constructor(&digest::SHA256));
        algorithms.add(SHA1, digest_constructor(&digest::SHA1_FOR_LEGACY_USE_ONLY));
        algorithms
    }

    /// Register `constructor` under `id`, replacing any previous registration.
    pub fn add(&mut self, id: impl Into<String>, constructor: ChecksumConstructor) {
        let id = id.into().to_ascii_lowercase();
        self.algorithms.retain(|(existing, _)| *existing != id);
        self.algorithms.push((id, constructor));
    }

    pub fn get(&self, id: &str) -> Option<ChecksumConstructor> {
        let id = id.to_ascii_lowercase();
        self.algorithms
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, constructor)| constructor.clone())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.algorithms.iter().map(|(id, _)| id.as_str())
    }

    /// One-shot checksum of `data` with the algorithm registered as `id`.
    pub fn checksum(&self, id: &str, data: &[u8]) -> Option<Vec<u8>> {
        let mut hasher = self.get(id)?();
        hasher.update(data);
        Some(hasher.finalize())
    }
}

impl fmt::Debug for ChecksumAlgorithms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}
