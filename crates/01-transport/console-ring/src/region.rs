//! Memory backing for the console page.
//!
//! A hosted session (tests, the loopback demo) owns its page: an anonymous
//! `mmap` on native targets, or an aligned heap allocation when the mapping is
//! unavailable or misaligned. A real guest instead attaches to a page the
//! hypervisor placed at a fixed address; that memory is borrowed for the whole
//! session and never freed here.

use crate::{RingError, RingResult};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::{self, NonNull};

#[cfg(not(target_arch = "wasm32"))]
type NativeMap = memmap2::MmapMut;

#[derive(Debug)]
enum Backing {
    #[cfg(not(target_arch = "wasm32"))]
    Native(#[allow(dead_code)] NativeMap),
    Owned {
        layout: Layout,
    },
    Foreign,
}

/// Contiguous, zero-initialised memory shared between the guest and backend views.
///
/// The base pointer is captured once, mutably, at construction; every later
/// access derives from it so shared `&self` views can hand out raw pointers
/// into the page without re-borrowing the backing.
#[derive(Debug)]
pub struct SharedRegion {
    base: NonNull<u8>,
    len: usize,
    alignment: usize,
    backing: Backing,
}

// SAFETY: the region is plain memory; synchronisation of its contents is the
// responsibility of the ring protocol layered on top (atomic indices with
// acquire/release ordering, one writer per field).
unsafe impl Send for SharedRegion {}
// SAFETY: see above; `&SharedRegion` only exposes raw pointers.
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Allocates a new zeroed region of `len` bytes aligned to `alignment`.
    ///
    /// On native builds we first try to satisfy the request via `mmap`. If the
    /// returned pointer is not suitably aligned, we fall back to the heap.
    pub fn new_zeroed(len: usize, alignment: usize) -> RingResult<Self> {
        if len == 0 || alignment == 0 || !alignment.is_power_of_two() {
            return Err(RingError::AllocationFailed {
                size: len,
                alignment,
            });
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            if let Some(region) = Self::mmap_backed(len, alignment)? {
                return Ok(region);
            }
        }

        Self::heap_backed(len, alignment)
    }

    /// Borrows `len` bytes of foreign memory starting at `base`.
    ///
    /// # Safety
    /// `base` must address `len` bytes that stay mapped, readable and writable
    /// for as long as the returned region (and every view derived from it)
    /// lives. The memory is never freed by this type.
    pub unsafe fn from_foreign(base: NonNull<u8>, len: usize, alignment: usize) -> Self {
        Self {
            base,
            len,
            alignment,
            backing: Backing::Foreign,
        }
    }

    fn heap_backed(len: usize, alignment: usize) -> RingResult<Self> {
        let layout = Layout::from_size_align(len, alignment).map_err(|_| {
            RingError::AllocationFailed {
                size: len,
                alignment,
            }
        })?;

        // SAFETY: `layout` has a non-zero size (checked by the caller).
        let ptr = unsafe { alloc_zeroed(layout) };
        let base = NonNull::new(ptr).ok_or(RingError::AllocationFailed {
            size: len,
            alignment,
        })?;
        Ok(Self {
            base,
            len,
            alignment,
            backing: Backing::Owned { layout },
        })
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn mmap_backed(len: usize, alignment: usize) -> RingResult<Option<Self>> {
        let mut map = memmap2::MmapOptions::new()
            .len(len)
            .map_anon()
            .map_err(|_| RingError::AllocationFailed {
                size: len,
                alignment,
            })?;

        let ptr = map.as_mut_ptr();
        if ptr as usize % alignment != 0 {
            return Ok(None);
        }

        // SAFETY: the anonymous mapping exposes `len` writable bytes.
        unsafe { ptr::write_bytes(ptr, 0, len) };

        let Some(base) = NonNull::new(ptr) else {
            return Ok(None);
        };
        Ok(Some(Self {
            base,
            len,
            alignment,
            backing: Backing::Native(map),
        }))
    }

    /// Total number of bytes managed by this region.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true when the region has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the alignment the region was allocated (or attached) with.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Returns true when the memory belongs to another domain.
    pub fn is_foreign(&self) -> bool {
        matches!(self.backing, Backing::Foreign)
    }

    /// Raw pointer to the first byte of the region.
    pub fn base(&self) -> *mut u8 {
        self.base.as_ptr()
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        if let Backing::Owned { layout } = &self.backing {
            // SAFETY: the pointer was produced by `alloc_zeroed` with this layout.
            unsafe { dealloc(self.base.as_ptr(), *layout) };
        }
    }
}
