//! Simulated byte-addressed memory.
//!
//! Two arenas share one address space: the heap (`malloc`/`free`) and the
//! stack (`alloca`, released when the frame returns). Addresses are never
//! reused, so a freed block stays recorded and any later access or second
//! free is reported instead of silently succeeding.

use std::collections::BTreeMap;

use super::ExecError;

const HEAP_BASE: u64 = 0x1000_0000;
const STACK_BASE: u64 = 0x7000_0000;
/// Unmapped bytes between consecutive blocks.
const GUARD: u64 = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Arena {
    Heap,
    Stack,
}

#[derive(Clone, Debug)]
struct Block {
    arena: Arena,
    bytes: Vec<u8>,
    live: bool,
}

/// Counters observed by tests.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub mallocs: usize,
    pub frees: usize,
    /// Bytes requested over all `malloc` calls.
    pub bytes_allocated: u64,
}

#[derive(Debug)]
pub struct Heap {
    blocks: BTreeMap<u64, Block>,
    next_heap: u64,
    next_stack: u64,
    stats: HeapStats,
    free_log: Vec<u64>,
}

impl Default for Heap {
    fn default() -> Self {
        Heap {
            blocks: BTreeMap::new(),
            next_heap: HEAP_BASE,
            next_stack: STACK_BASE,
            stats: HeapStats::default(),
            free_log: Vec::new(),
        }
    }
}

impl Heap {
    pub fn malloc(&mut self, size: u64) -> u64 {
        let addr = Self::bump(&mut self.next_heap, size);
        self.insert(addr, size, Arena::Heap);
        self.stats.mallocs += 1;
        self.stats.bytes_allocated += size;
        tracing::trace!(addr, size, "malloc");
        addr
    }

    pub fn free(&mut self, addr: u64) -> Result<(), ExecError> {
        if addr == 0 {
            return Ok(());
        }
        let Some(block) = self.blocks.get_mut(&addr) else {
            return Err(ExecError::InvalidFree { addr });
        };
        if block.arena != Arena::Heap {
            return Err(ExecError::InvalidFree { addr });
        }
        if !block.live {
            return Err(ExecError::DoubleFree { addr });
        }
        block.live = false;
        self.stats.frees += 1;
        self.free_log.push(addr);
        tracing::trace!(addr, "free");
        Ok(())
    }

    pub(crate) fn alloca(&mut self, size: u64) -> u64 {
        let addr = Self::bump(&mut self.next_stack, size);
        self.insert(addr, size, Arena::Stack);
        addr
    }

    /// Release stack slots at the end of a frame.
    pub(crate) fn pop_frame(&mut self, slots: &[u64]) {
        for addr in slots {
            if let Some(block) = self.blocks.get_mut(addr) {
                block.live = false;
            }
        }
    }

    pub fn read(&self, addr: u64, len: u64) -> Result<&[u8], ExecError> {
        let (base, block) = self.locate(addr, len)?;
        let start = usize_of(addr - base);
        Ok(&block.bytes[start..start + usize_of(len)])
    }

    pub fn write(&mut self, addr: u64, data: &[u8]) -> Result<(), ExecError> {
        let (base, _) = self.locate(addr, data.len() as u64)?;
        let start = usize_of(addr - base);
        if let Some(block) = self.blocks.get_mut(&base) {
            block.bytes[start..start + data.len()].copy_from_slice(data);
        }
        Ok(())
    }

    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Block addresses in the order they were freed.
    pub fn free_log(&self) -> &[u64] {
        &self.free_log
    }

    /// `true` if `addr` is the start of a heap block not yet freed.
    pub fn is_live(&self, addr: u64) -> bool {
        self.blocks
            .get(&addr)
            .is_some_and(|b| b.arena == Arena::Heap && b.live)
    }

    pub fn live_blocks(&self) -> usize {
        self.blocks
            .values()
            .filter(|b| b.arena == Arena::Heap && b.live)
            .count()
    }

    fn bump(next: &mut u64, size: u64) -> u64 {
        let addr = *next;
        *next += size.max(1).next_multiple_of(16) + GUARD;
        addr
    }

    fn insert(&mut self, addr: u64, size: u64, arena: Arena) {
        self.blocks.insert(
            addr,
            Block {
                arena,
                bytes: vec![0; usize_of(size)],
                live: true,
            },
        );
    }

    /// The block containing `[addr, addr + len)`.
    fn locate(&self, addr: u64, len: u64) -> Result<(u64, &Block), ExecError> {
        if addr == 0 {
            return Err(ExecError::NullDeref);
        }
        let Some((&base, block)) = self.blocks.range(..=addr).next_back() else {
            return Err(ExecError::OutOfBounds { addr, len });
        };
        let end = base + block.bytes.len() as u64;
        if addr + len > end {
            return Err(ExecError::OutOfBounds { addr, len });
        }
        if !block.live {
            return Err(ExecError::UseAfterFree { addr });
        }
        Ok((base, block))
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "simulated blocks are small and offsets fit in usize"
)]
fn usize_of(value: u64) -> usize {
    value as usize
}
