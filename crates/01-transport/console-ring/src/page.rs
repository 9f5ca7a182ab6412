//! Shared console page layout.
//!
//! ```text
//! +--------------------+----------------------+---------+---------+----------+----------+
//! | in  (input cap)    | out (output cap)     | in_cons | in_prod | out_cons | out_prod |
//! +--------------------+----------------------+---------+---------+----------+----------+
//!   backend -> guest     guest -> backend       u32 each, trailing the payload arrays
//! ```
//!
//! The standard geometry (1024-byte input, 2048-byte output) matches the
//! layout console backends expect bit-for-bit: indices at offsets 3072..3088.
//! Smaller power-of-two geometries exist for hosted sessions and tests.

use crate::region::SharedRegion;
use crate::ring::{RingChannel, RingConsumer, RingProducer};
use crate::{RingError, RingResult};
#[cfg(feature = "loom")]
use loom::sync::atomic::AtomicU32;
use std::mem::{align_of, size_of};
use std::ptr::NonNull;
use std::sync::Arc;
#[cfg(not(feature = "loom"))]
use std::sync::atomic::AtomicU32;

/// Input ring size of the standard page.
pub const STANDARD_INPUT_CAPACITY: u32 = 1024;
/// Output ring size of the standard page.
pub const STANDARD_OUTPUT_CAPACITY: u32 = 2048;
/// Shift converting a guest page frame number into a byte address.
pub const PAGE_SHIFT: u32 = 12;

const REGION_ALIGNMENT: usize = 64;
const INDEX_COUNT: usize = 4;
const IN_CONS: usize = 0;
const IN_PROD: usize = 1;
const OUT_CONS: usize = 2;
const OUT_PROD: usize = 3;

#[repr(C)]
#[allow(dead_code)]
struct StandardLayout {
    input: [u8; STANDARD_INPUT_CAPACITY as usize],
    output: [u8; STANDARD_OUTPUT_CAPACITY as usize],
    in_cons: u32,
    in_prod: u32,
    out_cons: u32,
    out_prod: u32,
}

const _: () = {
    assert!(std::mem::offset_of!(StandardLayout, output) == 1024);
    assert!(std::mem::offset_of!(StandardLayout, in_cons) == 3072);
    assert!(std::mem::offset_of!(StandardLayout, in_prod) == 3076);
    assert!(std::mem::offset_of!(StandardLayout, out_cons) == 3080);
    assert!(std::mem::offset_of!(StandardLayout, out_prod) == 3084);
    assert!(size_of::<StandardLayout>() == 3088);
};

#[cfg(not(feature = "loom"))]
const _: () = {
    assert!(size_of::<AtomicU32>() == 4);
    assert!(Geometry::STANDARD.index_offset() == std::mem::offset_of!(StandardLayout, in_cons));
    assert!(Geometry::STANDARD.page_len() == size_of::<StandardLayout>());
};

/// Which of the two rings on the page a view refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RingId {
    /// Backend -> guest.
    Input,
    /// Guest -> backend.
    Output,
}

/// Capacities of the two rings; both must be powers of two.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    input: u32,
    output: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl Geometry {
    /// The layout shared with real console backends.
    pub const STANDARD: Geometry = Geometry {
        input: STANDARD_INPUT_CAPACITY,
        output: STANDARD_OUTPUT_CAPACITY,
    };

    /// Validates a custom geometry.
    pub fn new(input: usize, output: usize) -> RingResult<Self> {
        let geometry = Self {
            input: validate_capacity(input)?,
            output: validate_capacity(output)?,
        };
        // `page_len` is unchecked; on 32-bit targets two maximal rings overflow it.
        checked_page_len(input, output).ok_or(RingError::GeometryTooLarge { input, output })?;
        Ok(geometry)
    }

    pub fn input_capacity(&self) -> u32 {
        self.input
    }

    pub fn output_capacity(&self) -> u32 {
        self.output
    }

    pub fn capacity(&self, id: RingId) -> u32 {
        match id {
            RingId::Input => self.input,
            RingId::Output => self.output,
        }
    }

    const fn data_offset(&self, id: RingId) -> usize {
        match id {
            RingId::Input => 0,
            RingId::Output => self.input as usize,
        }
    }

    /// Byte offset of `in_cons`, the first trailing index field.
    pub const fn index_offset(&self) -> usize {
        align_up(
            self.input as usize + self.output as usize,
            align_of::<AtomicU32>(),
        )
    }

    /// Total bytes occupied by the page.
    pub const fn page_len(&self) -> usize {
        self.index_offset() + INDEX_COUNT * size_of::<AtomicU32>()
    }
}

fn validate_capacity(requested: usize) -> RingResult<u32> {
    // Keep the occupancy (at most `capacity`) representable in a u32 index delta.
    if requested == 0 || !requested.is_power_of_two() || requested > (1 << 31) {
        return Err(RingError::InvalidCapacity { requested });
    }
    Ok(requested as u32)
}

fn checked_page_len(input: usize, output: usize) -> Option<usize> {
    let align = align_of::<AtomicU32>();
    input
        .checked_add(output)?
        .checked_add(align - 1)
        .map(|end| end & !(align - 1))?
        .checked_add(INDEX_COUNT * size_of::<AtomicU32>())
}

const fn align_up(value: usize, align: usize) -> usize {
    (value + (align - 1)) & !(align - 1)
}

/// Raw view of one ring: payload pointer, capacity and the two indices.
pub(crate) struct RingParts<'a> {
    pub(crate) data: *mut u8,
    pub(crate) capacity: u32,
    pub(crate) producer: &'a AtomicU32,
    pub(crate) consumer: &'a AtomicU32,
}

/// The guest's halves: consumer of the input ring, producer of the output ring.
#[derive(Debug)]
pub struct GuestRings {
    pub input: RingConsumer,
    pub output: RingProducer,
}

/// The backend's halves: consumer of the output ring, producer of the input ring.
#[derive(Debug)]
pub struct BackendRings {
    pub output: RingConsumer,
    pub input: RingProducer,
}

/// Memory shared by the guest and the backend for one console session.
///
/// Ring halves are only handed out by the constructors, once each, so there is
/// exactly one writer for every index field.
#[derive(Debug)]
pub struct ConsolePage {
    region: SharedRegion,
    geometry: Geometry,
}

impl ConsolePage {
    /// Allocates a zeroed page and returns both parties' ring halves.
    pub fn new_shared(geometry: Geometry) -> RingResult<(GuestRings, BackendRings)> {
        Self::new_shared_at(geometry, 0)
    }

    /// Like [`ConsolePage::new_shared`], but every index starts at `start_index`.
    ///
    /// Indices are never reset during a session, so a page handed over mid-session
    /// carries arbitrary (equal) counters; this reproduces that state.
    pub fn new_shared_at(
        geometry: Geometry,
        start_index: u32,
    ) -> RingResult<(GuestRings, BackendRings)> {
        let region = SharedRegion::new_zeroed(geometry.page_len(), REGION_ALIGNMENT)?;
        let indices = unsafe {
            // SAFETY: the region spans `page_len` bytes and the offset is aligned
            // for `AtomicU32` because the region itself is 64-byte aligned.
            region.base().add(geometry.index_offset()) as *mut AtomicU32
        };
        for slot in 0..INDEX_COUNT {
            unsafe {
                // SAFETY: slot < INDEX_COUNT keeps the write inside the page.
                indices.add(slot).write(AtomicU32::new(start_index));
            }
        }

        let page = Arc::new(Self { region, geometry });
        let guest = GuestRings {
            input: RingConsumer::new(RingChannel::new(Arc::clone(&page), RingId::Input)),
            output: RingProducer::new(RingChannel::new(Arc::clone(&page), RingId::Output)),
        };
        let backend = BackendRings {
            output: RingConsumer::new(RingChannel::new(Arc::clone(&page), RingId::Output)),
            input: RingProducer::new(RingChannel::new(page, RingId::Input)),
        };
        Ok((guest, backend))
    }

    /// Attaches the guest side to a standard page owned by another domain.
    ///
    /// The backend initialised the indices; they are used as found.
    ///
    /// # Safety
    /// `base` must address a standard console page that stays mapped and
    /// writable for the whole session, and no other guest-side view of the same
    /// page may exist.
    #[cfg(not(feature = "loom"))]
    pub unsafe fn attach(base: NonNull<u8>) -> RingResult<GuestRings> {
        let address = base.as_ptr() as usize;
        let alignment = align_of::<AtomicU32>();
        if address % alignment != 0 {
            return Err(RingError::BadAddress { address });
        }
        let geometry = Geometry::STANDARD;
        let region = SharedRegion::from_foreign(base, geometry.page_len(), alignment);
        let page = Arc::new(Self { region, geometry });
        Ok(GuestRings {
            input: RingConsumer::new(RingChannel::new(Arc::clone(&page), RingId::Input)),
            output: RingProducer::new(RingChannel::new(page, RingId::Output)),
        })
    }

    /// Attaches to `address`, rejecting null before delegating to [`ConsolePage::attach`].
    ///
    /// # Safety
    /// Same contract as [`ConsolePage::attach`].
    #[cfg(not(feature = "loom"))]
    pub unsafe fn attach_address(address: usize) -> RingResult<GuestRings> {
        let base = NonNull::new(address as *mut u8).ok_or(RingError::BadAddress { address })?;
        Self::attach(base)
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Returns true when the page belongs to another domain.
    pub fn is_foreign(&self) -> bool {
        self.region.is_foreign()
    }

    pub(crate) fn ring(&self, id: RingId) -> RingParts<'_> {
        let (cons, prod) = match id {
            RingId::Input => (IN_CONS, IN_PROD),
            RingId::Output => (OUT_CONS, OUT_PROD),
        };
        RingParts {
            data: unsafe {
                // SAFETY: the data offset lies within the page.
                self.region.base().add(self.geometry.data_offset(id))
            },
            capacity: self.geometry.capacity(id),
            producer: self.index(prod),
            consumer: self.index(cons),
        }
    }

    fn index(&self, slot: usize) -> &AtomicU32 {
        debug_assert!(slot < INDEX_COUNT);
        unsafe {
            // SAFETY: index fields were initialised by the constructor (or by the
            // backend for attached pages) and live as long as `self`.
            &*(self.region.base().add(self.geometry.index_offset()) as *const AtomicU32)
                .add(slot)
        }
    }
}
