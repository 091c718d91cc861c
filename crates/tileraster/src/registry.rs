//! Kernel registry.
//!
//! Each distinct shader type gets one kernel set (clear, transform, bin,
//! draw), built on first use and reused afterwards. The registry is owned by
//! the rasterizer; nothing is cached globally.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies a shader type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderTag {
    id: TypeId,
    name: &'static str,
}

impl ShaderTag {
    pub fn of<S: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: std::any::type_name::<S>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// The four kernels the pipeline launches each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelKind {
    Clear,
    Transform,
    Bin,
    Draw,
}

impl KernelKind {
    pub const ALL: [KernelKind; 4] = [
        KernelKind::Clear,
        KernelKind::Transform,
        KernelKind::Bin,
        KernelKind::Draw,
    ];

    pub fn label(self) -> &'static str {
        match self {
            KernelKind::Clear => "clear",
            KernelKind::Transform => "transform",
            KernelKind::Bin => "bin",
            KernelKind::Draw => "draw",
        }
    }
}

/// A compiled kernel specialised for one shader type.
#[derive(Debug)]
pub struct Kernel {
    id: u64,
    kind: KernelKind,
    shader: ShaderTag,
    label: String,
    launches: AtomicU64,
}

impl Kernel {
    fn compile(id: u64, kind: KernelKind, shader: ShaderTag) -> Self {
        Self {
            id,
            kind,
            shader,
            label: format!("{}::{}", shader.name(), kind.label()),
            launches: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> KernelKind {
        self.kind
    }

    pub fn shader(&self) -> ShaderTag {
        self.shader
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of dispatches of this kernel so far.
    pub fn launches(&self) -> u64 {
        self.launches.load(Ordering::Relaxed)
    }

    pub(crate) fn record_launch(&self) {
        self.launches.fetch_add(1, Ordering::Relaxed);
    }
}

/// The kernels compiled for one shader type.
#[derive(Debug)]
pub struct KernelSet {
    pub clear: Kernel,
    pub transform: Kernel,
    pub bin: Kernel,
    pub draw: Kernel,
}

impl KernelSet {
    pub fn get(&self, kind: KernelKind) -> &Kernel {
        match kind {
            KernelKind::Clear => &self.clear,
            KernelKind::Transform => &self.transform,
            KernelKind::Bin => &self.bin,
            KernelKind::Draw => &self.draw,
        }
    }
}

/// Cache of kernel sets keyed by shader type.
#[derive(Debug, Default)]
pub struct KernelRegistry {
    sets: HashMap<ShaderTag, Arc<KernelSet>>,
    next_id: u64,
    compilations: u64,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the kernel set for `tag`, compiling it on first use.
    pub fn get_or_compile(&mut self, tag: ShaderTag) -> Arc<KernelSet> {
        if let Some(set) = self.sets.get(&tag) {
            return Arc::clone(set);
        }

        let base = self.next_id;
        self.next_id += KernelKind::ALL.len() as u64;
        self.compilations += 1;

        let set = Arc::new(KernelSet {
            clear: Kernel::compile(base, KernelKind::Clear, tag),
            transform: Kernel::compile(base + 1, KernelKind::Transform, tag),
            bin: Kernel::compile(base + 2, KernelKind::Bin, tag),
            draw: Kernel::compile(base + 3, KernelKind::Draw, tag),
        });
        log::info!("Compiled kernel set for shader {}", tag.name());

        self.sets.insert(tag, Arc::clone(&set));
        set
    }

    pub fn kernels_for<S: 'static>(&mut self) -> Arc<KernelSet> {
        self.get_or_compile(ShaderTag::of::<S>())
    }

    pub fn contains(&self, tag: ShaderTag) -> bool {
        self.sets.contains_key(&tag)
    }

    /// Number of distinct shader types with compiled kernels.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Total kernel-set compilations performed.
    pub fn compilations(&self) -> u64 {
        self.compilations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct First;
    struct Second;

    #[test]
    fn compiles_once_per_shader_type() {
        let mut registry = KernelRegistry::new();

        let a = registry.kernels_for::<First>();
        let again = registry.kernels_for::<First>();
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(registry.compilations(), 1);

        let b = registry.kernels_for::<Second>();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.compilations(), 2);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(ShaderTag::of::<Second>()));
    }

    #[test]
    fn kernel_sets_hold_four_distinct_kernels() {
        let mut registry = KernelRegistry::new();
        let set = registry.kernels_for::<First>();

        let mut ids: Vec<u64> = KernelKind::ALL.iter().map(|k| set.get(*k).id()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        for kind in KernelKind::ALL {
            assert_eq!(set.get(kind).kind(), kind);
            assert!(set.get(kind).label().ends_with(kind.label()));
        }
    }
}
