use crate::error::Error;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Number of 32-bit cells backing one mutex slot.
///
/// Layout per slot: `flag`, `owner`, `recursion`, in that order.
pub const CELLS_PER_MUTEX: usize = 3;

/// Size of one cell in bytes.
pub const CELL_SIZE: usize = size_of::<u32>();

/// Size of one slot in bytes.
pub const BYTES_PER_MUTEX: usize = CELLS_PER_MUTEX * CELL_SIZE;

/// Largest mutex count whose byte size still fits in `usize`.
pub const MAX_MUTEXES: usize = usize::MAX / BYTES_PER_MUTEX;

/// A block of shared atomic cells backing one or more mutex slots.
///
/// The block is the only state the mutexes have: a contiguous run of
/// zero-initialized 32-bit cells, three per slot. It is allocated once
/// and then *referenced* by every thread that needs it; cloning a
/// `SharedBlock` clones the reference, never the cells. The block is
/// reclaimed when the last clone is dropped.
///
/// Cells are only ever touched through atomic operations with
/// sequentially consistent ordering, so any number of handles on any
/// number of threads observe a single coherent history per cell.
///
/// # Examples
///
/// ```rust,ignore
/// let block = SharedBlock::new(4)?;
/// let for_worker = block.clone(); // same cells, moved to another thread
/// ```
#[derive(Clone)]
pub struct SharedBlock {
    /// The shared cells. `Arc` makes the block natively transferable
    /// across threads without copying.
    cells: Arc<[AtomicU32]>,
}

impl SharedBlock {
    /// Allocates a zero-initialized block holding `count` mutex slots.
    ///
    /// The zero fill is load-bearing: a zeroed slot *is* an unlocked
    /// mutex with no owner and zero depth, so no separate formatting
    /// step exists.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCount`] if `count` is zero.
    /// - [`Error::CountExceedsMax`] if `count * 12` bytes would not fit
    ///   in `usize`.
    pub fn new(count: usize) -> Result<SharedBlock, Error> {
        if count == 0 {
            return Err(Error::InvalidCount);
        }

        if count > MAX_MUTEXES {
            return Err(Error::CountExceedsMax);
        }

        let cells = (0..count * CELLS_PER_MUTEX)
            .map(|_| AtomicU32::new(0))
            .collect();

        Ok(Self { cells })
    }

    /// Rebuilds a block from a raw little-endian byte image.
    ///
    /// This is the interop surface for the 12-byte-per-slot wire
    /// layout: flag at offset 0, owner at 4, recursion at 8. Any
    /// int32-aligned length is accepted.
    ///
    /// # Errors
    ///
    /// [`Error::MisalignedLength`] if the length is not a multiple of
    /// the 4-byte cell size.
    pub fn from_bytes(bytes: &[u8]) -> Result<SharedBlock, Error> {
        if bytes.len() % CELL_SIZE != 0 {
            return Err(Error::MisalignedLength);
        }

        let cells = bytes
            .chunks_exact(CELL_SIZE)
            .map(|chunk| {
                let word = u32::from_le_bytes(chunk.try_into().unwrap());
                AtomicU32::new(word)
            })
            .collect();

        Ok(Self { cells })
    }

    /// Returns the number of cells in the block.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Returns the number of whole mutex slots the block can host.
    pub fn mutex_count(&self) -> usize {
        self.cells.len() / CELLS_PER_MUTEX
    }

    /// Returns the block's size in bytes.
    pub fn byte_len(&self) -> usize {
        self.cells.len() * CELL_SIZE
    }

    /// Returns the atomic cell at `index`.
    ///
    /// The block is, by contract, nothing more than shared integer
    /// cells; exposing them keeps the binary layout observable and
    /// lets interop code (and corruption tests) reach the raw state.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn cell(&self, index: usize) -> &AtomicU32 {
        &self.cells[index]
    }

    /// Captures the block as a little-endian byte image in the
    /// published layout.
    ///
    /// The snapshot is a copy: each cell is read atomically, but the
    /// image as a whole is not an atomic view of the block.
    pub fn snapshot(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.byte_len());

        for cell in self.cells.iter() {
            bytes.extend_from_slice(&cell.load(Ordering::SeqCst).to_le_bytes());
        }

        bytes
    }

    /// Returns `true` when `self` and `other` reference the same cells.
    pub fn same_block(&self, other: &SharedBlock) -> bool {
        Arc::ptr_eq(&self.cells, &other.cells)
    }
}

impl fmt::Debug for SharedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBlock")
            .field("mutex_count", &self.mutex_count())
            .field("byte_len", &self.byte_len())
            .finish()
    }
}
