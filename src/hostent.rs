//! Serialization of a resolved record into caller-owned hostent storage.
//!
//! The caller hands glibc's `gethostbyname_r` family a `struct hostent`
//! header plus one flat byte buffer; every pointer the header ends up
//! holding must land inside that buffer. [`required_size`] computes the
//! exact footprint in a first pass and [`pack`] writes in a second, so a
//! too-small buffer is refused before a single byte moves.

use crate::core::{AddressFamily, AddressList, HostRecord};
use libc::c_char;
use std::mem::size_of;
use std::ptr;
use thiserror::Error;

const PTR_SIZE: usize = size_of::<*mut c_char>();

/// Packing failure. The only recoverable case: the caller retries with a
/// larger buffer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackError {
    #[error("record needs {needed} bytes, buffer holds {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

#[inline]
fn align_up(offset: usize, align: usize) -> usize {
    (offset + (align - 1)) & !(align - 1)
}

/// Exact number of buffer bytes [`pack`] consumes for `record`,
/// including worst-case slack for aligning the arena base to pointer
/// width. Deterministic: the same record always yields the same size.
pub fn required_size(record: &HostRecord) -> usize {
    let mut n = record.canonical_name.len() + 1;
    for alias in &record.aliases {
        n += alias.len() + 1;
    }
    n = align_up(n, PTR_SIZE);
    n += (record.aliases.len() + 1) * PTR_SIZE;
    n += record.addresses.len() * record.family().width();
    n = align_up(n, PTR_SIZE);
    n += (record.addresses.len() + 1) * PTR_SIZE;
    n + (PTR_SIZE - 1)
}

/// Serializes `record` into `buf` and fills `result` with pointers into
/// it: name bytes, alias byte data, NULL-terminated alias pointer array,
/// raw address bytes, NULL-terminated address pointer array.
///
/// On `Err` neither `result` nor `buf` has been written.
///
/// # Safety
/// `result` must point to writable `hostent` storage and `buf` to
/// `buflen` writable bytes; both regions must be exclusive to this call
/// for its duration.
pub unsafe fn pack(
    record: &HostRecord,
    result: *mut libc::hostent,
    buf: *mut c_char,
    buflen: usize,
) -> Result<(), PackError> {
    let needed = required_size(record);
    if needed > buflen {
        return Err(PackError::BufferTooSmall {
            needed,
            available: buflen,
        });
    }

    // SAFETY: caller contract; capacity was checked against the exact
    // footprint above, so every reserve below is in bounds.
    let mut writer = unsafe { BumpWriter::new(buf.cast::<u8>(), buflen) };

    let name_ptr = writer.push_str(&record.canonical_name);
    let mut alias_ptrs = Vec::with_capacity(record.aliases.len());
    for alias in &record.aliases {
        alias_ptrs.push(writer.push_str(alias));
    }
    let aliases_ptr = writer.push_ptr_array(&alias_ptrs);

    // Address data starts pointer-aligned (it follows a pointer array)
    // and entries are 4 or 16 bytes wide, so every entry stays aligned
    // for the in_addr/in6_addr reads consumers do through h_addr_list.
    let mut addr_ptrs = Vec::with_capacity(record.addresses.len());
    match &record.addresses {
        AddressList::V4(addrs) => {
            for addr in addrs {
                addr_ptrs.push(writer.push_bytes(&addr.octets()));
            }
        }
        AddressList::V6(addrs) => {
            for addr in addrs {
                addr_ptrs.push(writer.push_bytes(&addr.octets()));
            }
        }
    }
    let addr_list_ptr = writer.push_ptr_array(&addr_ptrs);

    let (addrtype, length) = match record.family() {
        AddressFamily::V4 => (libc::AF_INET, 4),
        AddressFamily::V6 => (libc::AF_INET6, 16),
    };

    // SAFETY: result points to caller-owned hostent storage.
    unsafe {
        (*result).h_name = name_ptr;
        (*result).h_aliases = aliases_ptr;
        (*result).h_addrtype = addrtype;
        (*result).h_length = length;
        (*result).h_addr_list = addr_list_ptr;
    }
    Ok(())
}

/// Linear writer over the caller's buffer. No reuse, no freeing; the
/// arena's lifetime belongs entirely to the caller.
struct BumpWriter {
    base: *mut u8,
    cap: usize,
    off: usize,
}

impl BumpWriter {
    /// # Safety
    /// `buf` must point to `cap` writable bytes with `cap` at least
    /// `PTR_SIZE - 1`, exclusive to this writer.
    unsafe fn new(buf: *mut u8, cap: usize) -> Self {
        let pad = (buf as usize).wrapping_neg() & (PTR_SIZE - 1);
        Self {
            // SAFETY: pad < PTR_SIZE <= cap.
            base: unsafe { buf.add(pad) },
            cap: cap - pad,
            off: 0,
        }
    }

    /// Claims `n` bytes. The capacity check in `pack` guarantees this
    /// never runs past the buffer; the assert holds that line.
    fn reserve(&mut self, n: usize) -> *mut u8 {
        assert!(self.off + n <= self.cap, "packer overran its size pass");
        // SAFETY: in bounds per the assert.
        let dst = unsafe { self.base.add(self.off) };
        self.off += n;
        dst
    }

    fn align(&mut self) {
        self.off = align_up(self.off, PTR_SIZE);
    }

    fn push_str(&mut self, s: &str) -> *mut c_char {
        let bytes = s.as_bytes();
        let dst = self.reserve(bytes.len() + 1);
        // SAFETY: reserve returned a region of bytes.len() + 1.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
            *dst.add(bytes.len()) = 0;
        }
        dst.cast::<c_char>()
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> *mut c_char {
        let dst = self.reserve(bytes.len());
        // SAFETY: reserve returned a region of bytes.len().
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len()) };
        dst.cast::<c_char>()
    }

    /// Writes `ptrs` followed by a NULL sentinel, pointer-aligned.
    fn push_ptr_array(&mut self, ptrs: &[*mut c_char]) -> *mut *mut c_char {
        self.align();
        let dst = self
            .reserve((ptrs.len() + 1) * PTR_SIZE)
            .cast::<*mut c_char>();
        // SAFETY: reserve returned ptrs.len() + 1 aligned slots; base is
        // pointer-aligned and off was just rounded up.
        unsafe {
            for (i, p) in ptrs.iter().enumerate() {
                dst.add(i).write(*p);
            }
            dst.add(ptrs.len()).write(ptr::null_mut());
        }
        dst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(aliases: &[&str], addrs: &[&str]) -> HostRecord {
        HostRecord {
            canonical_name: "host.example".to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            addresses: AddressList::V4(addrs.iter().map(|a| a.parse().unwrap()).collect()),
        }
    }

    #[test]
    fn required_size_counts_every_component() {
        let rec = record(&[], &["10.0.0.1"]);
        // name + NUL, aligned, 1 sentinel slot, 4 addr bytes, aligned,
        // 2 addr slots, base slack.
        let expected = align_up(align_up(13, PTR_SIZE) + PTR_SIZE + 4, PTR_SIZE)
            + 2 * PTR_SIZE
            + (PTR_SIZE - 1);
        assert_eq!(required_size(&rec), expected);
    }

    #[test]
    fn required_size_grows_with_aliases_and_addresses() {
        let small = required_size(&record(&[], &["10.0.0.1"]));
        let aliased = required_size(&record(&["a.example"], &["10.0.0.1"]));
        let multi = required_size(&record(&[], &["10.0.0.1", "10.0.0.2"]));
        assert!(aliased > small);
        assert!(multi > small);
    }
}
