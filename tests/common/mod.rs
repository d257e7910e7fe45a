//! Shared helpers for the integration tests.

#![allow(dead_code)]

use libc::c_char;
use nss_dnd::{AddressList, HostRecord};
use std::ffi::CStr;
use std::net::{Ipv4Addr, Ipv6Addr};

pub fn v4_record(name: &str, aliases: &[&str], addrs: &[&str]) -> HostRecord {
    HostRecord {
        canonical_name: name.to_string(),
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        addresses: AddressList::V4(
            addrs
                .iter()
                .map(|a| a.parse::<Ipv4Addr>().unwrap())
                .collect(),
        ),
    }
}

pub fn v6_record(name: &str, aliases: &[&str], addrs: &[&str]) -> HostRecord {
    HostRecord {
        canonical_name: name.to_string(),
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        addresses: AddressList::V6(
            addrs
                .iter()
                .map(|a| a.parse::<Ipv6Addr>().unwrap())
                .collect(),
        ),
    }
}

pub fn zeroed_hostent() -> libc::hostent {
    // SAFETY: hostent is a plain C struct; all-zero is a valid value
    // (null pointers, zero ints).
    unsafe { std::mem::zeroed() }
}

pub fn header_is_untouched(header: &libc::hostent) -> bool {
    header.h_name.is_null()
        && header.h_aliases.is_null()
        && header.h_addr_list.is_null()
        && header.h_addrtype == 0
        && header.h_length == 0
}

/// A packed record read back out of caller memory.
#[derive(Debug, PartialEq, Eq)]
pub struct Unpacked {
    pub name: String,
    pub aliases: Vec<String>,
    pub addrtype: libc::c_int,
    pub length: libc::c_int,
    pub addrs: Vec<Vec<u8>>,
}

/// Walks the packed header the way a C consumer of `gethostbyname_r`
/// would.
///
/// # Safety
/// `header` must have been filled by a successful pack into a buffer
/// that is still alive.
pub unsafe fn unpack(header: &libc::hostent) -> Unpacked {
    let name = CStr::from_ptr(header.h_name).to_str().unwrap().to_string();

    let mut aliases = Vec::new();
    let mut alias = header.h_aliases;
    while !(*alias).is_null() {
        aliases.push(CStr::from_ptr(*alias).to_str().unwrap().to_string());
        alias = alias.add(1);
    }

    let width = header.h_length as usize;
    let mut addrs = Vec::new();
    let mut addr = header.h_addr_list;
    while !(*addr).is_null() {
        addrs.push(std::slice::from_raw_parts((*addr).cast::<u8>(), width).to_vec());
        addr = addr.add(1);
    }

    Unpacked {
        name,
        aliases,
        addrtype: header.h_addrtype,
        length: header.h_length,
        addrs,
    }
}

pub fn in_bounds(ptr: *const c_char, buf: *const c_char, buflen: usize) -> bool {
    let p = ptr as usize;
    let base = buf as usize;
    p >= base && p < base + buflen
}

/// Every pointer reachable from the header must land inside
/// `[buf, buf + buflen)`.
///
/// # Safety
/// Same contract as [`unpack`].
pub unsafe fn assert_pointers_in_bounds(header: &libc::hostent, buf: *const c_char, buflen: usize) {
    assert!(in_bounds(header.h_name, buf, buflen));

    let mut alias = header.h_aliases;
    assert!(in_bounds(alias.cast(), buf, buflen));
    while !(*alias).is_null() {
        assert!(in_bounds(*alias, buf, buflen));
        alias = alias.add(1);
    }
    assert!(in_bounds(alias.cast(), buf, buflen), "alias sentinel slot");

    let mut addr = header.h_addr_list;
    assert!(in_bounds(addr.cast(), buf, buflen));
    while !(*addr).is_null() {
        assert!(in_bounds(*addr, buf, buflen));
        addr = addr.add(1);
    }
    assert!(in_bounds(addr.cast(), buf, buflen), "address sentinel slot");
}
