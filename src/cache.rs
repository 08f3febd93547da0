//! Cache of generated and compiled artifacts, keyed by content.
use crate::ast::GeneratedModule;
use crate::interface::GltInterface;
use crate::kernel::GltKernel;
use crate::runtime::CompiledModule;
use log::debug;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;
use std::sync::Arc;

/// A tag identifying generated code by the content it was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentTag(String);

impl ContentTag {
    pub fn of<T: Hash + ?Sized>(content: &T) -> Self {
        Self(format!("{:016x}", fxhash::hash64(content)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything generated for one discrete expression.
pub struct Artifact {
    pub tag: ContentTag,
    pub kernel: Arc<GltKernel>,
    pub interface: GltInterface,
    pub module: GeneratedModule,
    /// The printed module.
    pub source: String,
    pub compiled: Arc<dyn CompiledModule>,
}

impl Debug for Artifact {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("tag", &self.tag)
            .field("module", &self.module.name)
            .field("routines", &self.compiled.routines())
            .finish()
    }
}

/// Cache of immutable artifacts. Failed builds are never inserted.
#[derive(Debug, Default)]
pub struct ArtifactCache {
    artifacts: RwLock<FxHashMap<ContentTag, Arc<Artifact>>>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tag: &ContentTag) -> Option<Arc<Artifact>> {
        self.artifacts.read().get(tag).cloned()
    }

    /// Returns the artifact with the given tag, building and inserting it if absent.
    ///
    /// The lock is not held while building, so concurrent builds of the same tag may both run;
    /// the first inserted artifact wins.
    pub fn get_or_try_insert_with<E>(
        &self,
        tag: &ContentTag,
        build: impl FnOnce() -> Result<Artifact, E>,
    ) -> Result<Arc<Artifact>, E> {
        if let Some(artifact) = self.get(tag) {
            debug!("Artifact cache hit for {}", tag);
            return Ok(artifact);
        }
        debug!("Artifact cache miss for {}", tag);
        let artifact = Arc::new(build()?);
        let mut artifacts = self.artifacts.write();
        Ok(artifacts.entry(tag.clone()).or_insert(artifact).clone())
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.artifacts.write().clear();
    }
}
