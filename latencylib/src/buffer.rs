use std::alloc::{alloc, Layout};
use std::fmt;
use memmap2::MmapMut;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::sweep::ELEMENT_SIZE;

/// Rough allocator cost of one boxed u64, including chunk header and padding. Only used to
/// estimate whether an indirect buffer will fit before trying to build it
pub const CELL_FOOTPRINT: u64 = 32;

/// A generic trait for the memory under test
///
/// Technically the walker could be written against each layout directly, but going through
/// one trait keeps the timed loop identical for both, and GenericBuffer keeps dispatch static
pub trait MemoryBuffer {
    /// Reads the element at an index
    ///
    /// # Arguments
    ///
    /// * `index`: The element index, must be less than `len()`
    ///
    /// returns: u64
    fn read(&self, index: u64) -> u64;

    /// Gets the number of elements in the buffer
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the layout of this buffer
    fn kind(&self) -> BufferKind;
}

/// Failure to build a buffer. The sweep records the affected size as unavailable and moves on
#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("{elements} elements don't fit in the address space")]
    TooLarge { elements: u64 },
    #[error("couldn't map {bytes} bytes: {source}")]
    Map {
        bytes: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("couldn't allocate {elements} boxed cells")]
    Cells { elements: u64 },
    #[error("{bytes} bytes is over the memory limit of {limit} bytes")]
    OverLimit { bytes: u64, limit: u64 },
}

/// The buffer layouts which can be measured
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferKind {
    #[serde(alias = "array")]
    Contiguous,
    #[serde(alias = "list")]
    Indirect,
}

impl BufferKind {
    /// Both kinds, in reporting order
    pub const ALL: [BufferKind; 2] = [BufferKind::Contiguous, BufferKind::Indirect];

    /// Puts a list of kinds into reporting order, dropping repeats
    pub fn ordered(kinds: &[BufferKind]) -> Vec<BufferKind> {
        BufferKind::ALL.into_iter().filter(|k| kinds.contains(k)).collect()
    }

    /// Builds a buffer of this kind holding `0..element_count`
    pub fn build(self, element_count: u64) -> Result<GenericBuffer, AllocationError> {
        match self {
            BufferKind::Contiguous => Contiguous::new(element_count).map(GenericBuffer::from),
            BufferKind::Indirect => Indirect::new(element_count).map(GenericBuffer::from),
        }
    }

    /// Estimates how many bytes a buffer of this kind would take, saturating on overflow
    pub fn footprint_bytes(self, element_count: u64) -> u64 {
        match self {
            BufferKind::Contiguous => element_count.saturating_mul(ELEMENT_SIZE),
            // One pointer in the vector plus the cell it points at
            BufferKind::Indirect => element_count.saturating_mul(ELEMENT_SIZE + CELL_FOOTPRINT),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BufferKind::Contiguous => "contiguous",
            BufferKind::Indirect => "indirect",
        }
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A flat block of u64s in one anonymous memory mapping
///
/// Index `i` lives at byte offset `i * 8`, so a read is an offset calculation and a load. Mapping
/// the memory rather than using a Vec means an oversized request comes back as an error instead
/// of aborting the process
///
/// Every element is written on construction. Untouched anonymous pages all map to the shared
/// zero page, which would sit in cache no matter how large the buffer is
pub struct Contiguous {
    map: MmapMut,
    len: u64,
}

impl Contiguous {
    pub fn new(element_count: u64) -> Result<Self, AllocationError> {
        let bytes = element_count
            .checked_mul(ELEMENT_SIZE)
            .and_then(|b| usize::try_from(b).ok())
            .ok_or(AllocationError::TooLarge { elements: element_count })?;
        let mut map = MmapMut::map_anon(bytes).map_err(|source| AllocationError::Map {
            bytes: bytes as u64,
            source,
        })?;
        // SAFETY: any bit pattern is a valid u64
        let (prefix, words, _) = unsafe { map.align_to_mut::<u64>() };
        // Mappings are page aligned
        debug_assert!(prefix.is_empty());
        for (i, word) in words.iter_mut().enumerate() {
            *word = i as u64;
        }
        Ok(Self { map, len: element_count })
    }

    fn words(&self) -> &[u64] {
        // SAFETY: the mapping is page aligned, exactly len * 8 bytes long, and was fully
        // initialised in new
        unsafe { std::slice::from_raw_parts(self.map.as_ptr().cast::<u64>(), self.len as usize) }
    }
}

impl MemoryBuffer for Contiguous {
    #[inline(always)]
    fn read(&self, index: u64) -> u64 {
        self.words()[index as usize]
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn kind(&self) -> BufferKind {
        BufferKind::Contiguous
    }
}

/// A collection of individually heap allocated u64 cells
///
/// Every read loads the pointer from the vector and then the cell it points at, which are
/// potentially two different cache lines. This models walking a graph of boxed objects
///
/// Building one is much slower than building a Contiguous buffer of the same length, as every
/// cell is a separate allocation. None of that is charged to the timed region
pub struct Indirect {
    cells: Vec<Box<u64>>,
}

impl Indirect {
    pub fn new(element_count: u64) -> Result<Self, AllocationError> {
        let len = usize::try_from(element_count)
            .map_err(|_| AllocationError::TooLarge { elements: element_count })?;
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(len)
            .map_err(|_| AllocationError::Cells { elements: element_count })?;
        for i in 0..element_count {
            // Cells built so far are freed when `cells` drops on the error path
            let cell = try_box(i).ok_or(AllocationError::Cells { elements: element_count })?;
            cells.push(cell);
        }
        Ok(Self { cells })
    }
}

impl MemoryBuffer for Indirect {
    #[inline(always)]
    fn read(&self, index: u64) -> u64 {
        *self.cells[index as usize]
    }

    fn len(&self) -> u64 {
        self.cells.len() as u64
    }

    fn kind(&self) -> BufferKind {
        BufferKind::Indirect
    }
}

/// Box::new aborts when the allocator is exhausted, so cells are allocated by hand
fn try_box(value: u64) -> Option<Box<u64>> {
    let layout = Layout::new::<u64>();
    // SAFETY: the layout has a non-zero size
    let ptr = unsafe { alloc(layout) }.cast::<u64>();
    if ptr.is_null() {
        return None;
    }
    // SAFETY: ptr is non-null and was allocated by the global allocator with the layout of a
    // u64, which is what Box expects to free
    unsafe {
        ptr.write(value);
        Some(Box::from_raw(ptr))
    }
}

/// Enum for both buffer layouts
///
/// Using trait objects would put a virtual call inside the timed loop for every read, which is
/// exactly the sort of overhead we're trying not to measure. Branching on the variant once per
/// walk lets the compiler inline each layout's read
pub enum GenericBuffer {
    Contiguous(Contiguous),
    Indirect(Indirect),
}

impl From<Contiguous> for GenericBuffer {
    fn from(value: Contiguous) -> Self {
        Self::Contiguous(value)
    }
}

impl From<Indirect> for GenericBuffer {
    fn from(value: Indirect) -> Self {
        Self::Indirect(value)
    }
}

impl MemoryBuffer for GenericBuffer {
    fn read(&self, index: u64) -> u64 {
        match self {
            GenericBuffer::Contiguous(b) => b.read(index),
            GenericBuffer::Indirect(b) => b.read(index),
        }
    }

    fn len(&self) -> u64 {
        match self {
            GenericBuffer::Contiguous(b) => b.len(),
            GenericBuffer::Indirect(b) => b.len(),
        }
    }

    fn kind(&self) -> BufferKind {
        match self {
            GenericBuffer::Contiguous(b) => b.kind(),
            GenericBuffer::Indirect(b) => b.kind(),
        }
    }
}
