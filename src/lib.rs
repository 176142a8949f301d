//! xsmarshal - XML Schema marshalling runtime
//!
//! Support code for generated record types that map to XML documents:
//!
//! - Generic content trees: build from a cursor, write, release ([`GenericNode`])
//! - Scalar codecs for the built-in schema types ([`scalar`])
//! - Date/time tokenizing and formatting ([`timestamp`])
//! - Base64 binary encoding and decoding ([`base64`])
//!
//! Marshalling code is written against the [`XmlCursor`] and [`XmlWriter`]
//! traits. [`TextReader`] and [`TextWriter`] implement them over an in-memory
//! document and any `std::io::Write` sink.

mod core;

pub mod base64;
pub mod cursor;
pub mod error;
pub mod lexical;
pub mod node;
pub mod reader;
pub mod scalar;
pub mod timestamp;
pub mod writer;

pub use cursor::{advance_to_next_start_or_end_element, read_entire_node_value, NodeKind, XmlCursor, XmlWriter};
pub use error::{Error, Result};
pub use lexical::Lexical;
pub use node::GenericNode;
pub use reader::TextReader;
pub use scalar::{
    read_scalar, write_scalar, BooleanEncoding, CodecOptions, ScalarKind, ScalarValue, XsBase64Binary,
    XsBoolean, XsByte, XsDate, XsDateTime, XsDecimal, XsDouble, XsDuration, XsFloat, XsId, XsIdRef, XsInt,
    XsInteger, XsLong, XsQName, XsShort, XsString, XsTime, XsType,
};
pub use timestamp::{CalendarTimestamp, OffsetSign};
pub use writer::TextWriter;

// ============================================================================
// Allocation Tracking (tests)
// ============================================================================

/// Per-thread allocation accounting, so tests can check that a tree built
/// and then abandoned leaves nothing allocated behind.
#[cfg(test)]
mod tracking {
    use std::alloc::{GlobalAlloc, Layout, System};
    use std::cell::Cell;

    thread_local! {
        static ALLOCATED: Cell<isize> = const { Cell::new(0) };
        static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
    }

    pub struct TrackingAllocator;

    unsafe impl GlobalAlloc for TrackingAllocator {
        unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
            let ptr = System.alloc(layout);
            if !ptr.is_null() {
                record(layout.size() as isize, 1);
            }
            ptr
        }

        unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
            record(-(layout.size() as isize), 0);
            System.dealloc(ptr, layout)
        }
    }

    fn record(bytes: isize, count: usize) {
        // Thread-locals may already be gone during thread teardown
        let _ = ALLOCATED.try_with(|a| a.set(a.get() + bytes));
        let _ = ALLOCATIONS.try_with(|c| c.set(c.get() + count));
    }

    /// Net bytes allocated by the current thread
    pub fn allocated() -> isize {
        ALLOCATED.with(Cell::get)
    }

    /// Allocations made by the current thread
    pub fn allocations() -> usize {
        ALLOCATIONS.with(Cell::get)
    }
}

#[cfg(test)]
#[global_allocator]
static GLOBAL: tracking::TrackingAllocator = tracking::TrackingAllocator;
