//! Code generation configuration for the memory core.
//!
//! # Usage
//!
//! ```ignore
//! use cone_mem::{MemConfig, PointerWidth, RcChecks, TargetConfig};
//!
//! let config = MemConfig::default()
//!     .with_target(TargetConfig::default().with_pointer_width(PointerWidth::W32))
//!     .with_rc_checks(RcChecks::Unchecked);
//! ```

/// Native word width of the target. Sizes reference-count headers and
/// pointer-sized values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PointerWidth {
    W32,
    W64,
}

impl PointerWidth {
    /// Word size in bytes.
    #[inline]
    pub const fn bytes(self) -> u64 {
        match self {
            PointerWidth::W32 => 4,
            PointerWidth::W64 => 8,
        }
    }

    /// Mask selecting the low `bytes() * 8` bits of a `u64`.
    #[inline]
    pub const fn mask(self) -> u64 {
        match self {
            PointerWidth::W32 => 0xFFFF_FFFF,
            PointerWidth::W64 => u64::MAX,
        }
    }

    /// Width of the host this compiler runs on.
    pub const fn host() -> Self {
        if cfg!(target_pointer_width = "32") {
            PointerWidth::W32
        } else {
            PointerWidth::W64
        }
    }
}

/// External symbols the target links for raw heap memory.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HeapSymbols {
    /// `fn(usize) -> ptr`
    pub alloc: String,
    /// `fn(ptr)`
    pub free: String,
}

impl Default for HeapSymbols {
    fn default() -> Self {
        Self {
            alloc: "malloc".to_owned(),
            free: "free".to_owned(),
        }
    }
}

/// The target environment as seen by the memory core.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TargetConfig {
    pub pointer_width: PointerWidth,
    /// `None` for environments that cannot link a heap allocator.
    pub heap: Option<HeapSymbols>,
}

impl TargetConfig {
    /// Host word width with `malloc`/`free`.
    pub fn native() -> Self {
        Self {
            pointer_width: PointerWidth::host(),
            heap: Some(HeapSymbols::default()),
        }
    }

    /// A target with no heap. Any allocation or release fails at declaration.
    pub fn freestanding() -> Self {
        Self {
            pointer_width: PointerWidth::W64,
            heap: None,
        }
    }

    #[must_use]
    pub fn with_pointer_width(mut self, width: PointerWidth) -> Self {
        self.pointer_width = width;
        self
    }

    #[must_use]
    pub fn with_heap_symbols(mut self, alloc: &str, free: &str) -> Self {
        self.heap = Some(HeapSymbols {
            alloc: alloc.to_owned(),
            free: free.to_owned(),
        });
        self
    }

    /// Word size in bytes.
    #[inline]
    pub fn word_size(&self) -> u64 {
        self.pointer_width.bytes()
    }
}

impl Default for TargetConfig {
    /// 64-bit with `malloc`/`free`, independent of the host.
    fn default() -> Self {
        Self {
            pointer_width: PointerWidth::W64,
            heap: Some(HeapSymbols::default()),
        }
    }
}

/// Whether the reference-count engine guards counter arithmetic.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum RcChecks {
    /// Trap when a decrement observes a zero count or an increment wraps.
    #[default]
    Trap,
    /// Plain load-add-store with no guard.
    Unchecked,
}

/// Configuration for one compilation unit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemConfig {
    pub target: TargetConfig,
    pub rc_checks: RcChecks,
    /// Symbol prefix of generated dealias functions.
    pub glue_prefix: String,
}

impl MemConfig {
    #[must_use]
    pub fn with_target(mut self, target: TargetConfig) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn with_rc_checks(mut self, checks: RcChecks) -> Self {
        self.rc_checks = checks;
        self
    }

    #[must_use]
    pub fn with_glue_prefix(mut self, prefix: &str) -> Self {
        prefix.clone_into(&mut self.glue_prefix);
        self
    }
}

impl Default for MemConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            rc_checks: RcChecks::default(),
            glue_prefix: "_cone_dealias$".to_owned(),
        }
    }
}
