//! The NSS entry points and the ABI status mapping.
//!
//! glibc resolves `_nss_dnd_gethostbyname_r` and
//! `_nss_dnd_gethostbyname2_r` from `libnss_dnd.so.2` when
//! `/etc/nsswitch.conf` lists `dnd` as a hosts source, and calls them on
//! whatever thread is resolving a name. Everything ABI-shaped lives
//! here; resolution itself is behind [`HostResolver`].

use crate::config::{RuleStore, Settings};
use crate::core::{AddressFamily, HostRecord, HostResolver, ResolveError};
use crate::hostent::{self, PackError};
use crate::logging;
use crate::resolver::RuleResolver;
use libc::{c_char, c_int, size_t};
use log::warn;
use std::ffi::CStr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

/// glibc's NSS status vocabulary.
pub const NSS_STATUS_TRYAGAIN: c_int = -2;
pub const NSS_STATUS_UNAVAIL: c_int = -1;
pub const NSS_STATUS_NOTFOUND: c_int = 0;
pub const NSS_STATUS_SUCCESS: c_int = 1;

/// `<netdb.h>` h_errno codes; the libc crate does not export these.
pub const HOST_NOT_FOUND: c_int = 1;
pub const TRY_AGAIN: c_int = 2;
pub const NO_RECOVERY: c_int = 3;
pub const NETDB_INTERNAL: c_int = -1;
pub const NETDB_SUCCESS: c_int = 0;

/// Fully resolved outcome of one lookup. Nothing else ever crosses the
/// ABI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Success,
    /// The backend has no record for the name.
    NotFound,
    /// Transient backend failure; the caller should retry later.
    TryAgain,
    /// The caller's buffer cannot hold the record; retry with a larger
    /// one.
    InsufficientBuffer,
    /// The backend is unreachable or misbehaving.
    Unavailable,
    /// Unusable arguments (null or empty name, bad family, no buffer).
    InvalidArgument,
}

impl LookupOutcome {
    /// The (status, errno, h_errno) triple the caller observes.
    ///
    /// glibc has no distinct status for an undersized buffer: the
    /// retry-with-larger-buffer protocol is TRYAGAIN + ERANGE, while
    /// retry-later is TRYAGAIN + EAGAIN.
    pub fn codes(self) -> (c_int, c_int, c_int) {
        match self {
            LookupOutcome::Success => (NSS_STATUS_SUCCESS, 0, NETDB_SUCCESS),
            LookupOutcome::NotFound => (NSS_STATUS_NOTFOUND, libc::ENOENT, HOST_NOT_FOUND),
            LookupOutcome::TryAgain => (NSS_STATUS_TRYAGAIN, libc::EAGAIN, TRY_AGAIN),
            LookupOutcome::InsufficientBuffer => {
                (NSS_STATUS_TRYAGAIN, libc::ERANGE, NETDB_INTERNAL)
            }
            LookupOutcome::Unavailable => (NSS_STATUS_UNAVAIL, libc::EAGAIN, NO_RECOVERY),
            LookupOutcome::InvalidArgument => {
                (NSS_STATUS_NOTFOUND, libc::EINVAL, HOST_NOT_FOUND)
            }
        }
    }
}

/// Runs one lookup against `resolver` and reports through the caller's
/// out-pointers. This is the whole bridge between the fixed ABI and the
/// backend; the exported symbols only supply the process-global
/// resolver.
///
/// # Safety
/// `name` must be null or a NUL-terminated C string; `result` must be
/// null or point to writable `hostent` storage; `buf` must be null or
/// point to `buflen` writable bytes; `errnop`/`h_errnop` must each be
/// null or point to a writable int. All regions must stay valid and
/// exclusive for the duration of the call.
pub unsafe fn lookup_into(
    resolver: &dyn HostResolver,
    name: *const c_char,
    af: c_int,
    result: *mut libc::hostent,
    buf: *mut c_char,
    buflen: size_t,
    errnop: *mut c_int,
    h_errnop: *mut c_int,
) -> c_int {
    // SAFETY: forwarded caller contract.
    let outcome = unsafe { run(resolver, name, af, result, buf, buflen) };
    // SAFETY: forwarded caller contract.
    unsafe { finish(outcome, errnop, h_errnop) }
}

unsafe fn run(
    resolver: &dyn HostResolver,
    name: *const c_char,
    af: c_int,
    result: *mut libc::hostent,
    buf: *mut c_char,
    buflen: size_t,
) -> LookupOutcome {
    if name.is_null() || result.is_null() || buf.is_null() || buflen == 0 {
        return LookupOutcome::InvalidArgument;
    }
    let family = match af {
        libc::AF_INET | libc::AF_UNSPEC => AddressFamily::V4,
        libc::AF_INET6 => AddressFamily::V6,
        _ => return LookupOutcome::InvalidArgument,
    };

    // SAFETY: name is non-null and NUL-terminated per caller contract.
    let name = unsafe { CStr::from_ptr(name) };
    let Ok(name) = name.to_str() else {
        // C callers can pass arbitrary bytes; nothing we serve matches.
        return LookupOutcome::NotFound;
    };
    if name.is_empty() {
        return LookupOutcome::InvalidArgument;
    }

    match resolver.resolve(name, family) {
        Ok(None) => LookupOutcome::NotFound,
        Ok(Some(record)) => {
            if let Err(violation) = check_record(&record, family) {
                warn!("lookup for {name:?} unavailable: backend returned {violation}");
                return LookupOutcome::Unavailable;
            }
            // SAFETY: result and buf/buflen were validated non-null
            // above and are caller-owned per contract.
            match unsafe { hostent::pack(&record, result, buf, buflen) } {
                Ok(()) => LookupOutcome::Success,
                Err(PackError::BufferTooSmall { .. }) => LookupOutcome::InsufficientBuffer,
            }
        }
        Err(ResolveError::Transient(_)) => LookupOutcome::TryAgain,
        Err(err @ ResolveError::Failed(_)) => {
            warn!("lookup for {name:?} unavailable: {err}");
            LookupOutcome::Unavailable
        }
    }
}

/// Backend-result validation. The packer only ever sees records that
/// pass; a violation is a backend defect, not a representable result.
fn check_record(record: &HostRecord, family: AddressFamily) -> Result<(), String> {
    if record.family() != family {
        return Err(format!(
            "a {:?} record for a {:?} request",
            record.family(),
            family
        ));
    }
    if record.addresses.is_empty() {
        return Err("a record with no addresses".to_string());
    }
    if record.canonical_name.is_empty() || record.canonical_name.contains('\0') {
        return Err("a record with an unusable canonical name".to_string());
    }
    if record.aliases.iter().any(|alias| alias.contains('\0')) {
        return Err("a record with an unusable alias".to_string());
    }
    Ok(())
}

unsafe fn finish(outcome: LookupOutcome, errnop: *mut c_int, h_errnop: *mut c_int) -> c_int {
    let (status, errno, h_errno) = outcome.codes();
    if !errnop.is_null() {
        // SAFETY: non-null out-parameter per caller contract.
        unsafe { *errnop = errno };
    }
    if !h_errnop.is_null() {
        // SAFETY: non-null out-parameter per caller contract.
        unsafe { *h_errnop = h_errno };
    }
    status
}

// =============================================================================
// Process-global state and the exported symbols
// =============================================================================

static SETTINGS: OnceLock<Settings> = OnceLock::new();
static RULE_STORE: OnceLock<RuleStore> = OnceLock::new();

fn bootstrap() -> (&'static Settings, &'static RuleStore) {
    let settings = SETTINGS.get_or_init(|| match Settings::load() {
        Ok(settings) => settings,
        Err(err) => {
            let fallback = Settings::default();
            logging::init(&fallback.log);
            warn!("invalid NSS_DND_* environment, using defaults: {err}");
            fallback
        }
    });
    logging::init(&settings.log);
    let store =
        RULE_STORE.get_or_init(|| RuleStore::new(settings.config_file_path.clone()));
    (settings, store)
}

/// The implicit-family entry point; equivalent to an `AF_INET` request.
///
/// # Safety
/// Called by glibc with the pointer contract of `gethostbyname_r`; see
/// [`lookup_into`].
#[no_mangle]
pub unsafe extern "C" fn _nss_dnd_gethostbyname_r(
    name: *const c_char,
    result: *mut libc::hostent,
    buf: *mut c_char,
    buflen: size_t,
    errnop: *mut c_int,
    h_errnop: *mut c_int,
) -> c_int {
    // SAFETY: forwarded glibc contract.
    unsafe {
        _nss_dnd_gethostbyname2_r(name, libc::AF_INET, result, buf, buflen, errnop, h_errnop)
    }
}

/// The explicit-family entry point.
///
/// # Safety
/// Called by glibc with the pointer contract of `gethostbyname2_r`; see
/// [`lookup_into`].
#[no_mangle]
pub unsafe extern "C" fn _nss_dnd_gethostbyname2_r(
    name: *const c_char,
    af: c_int,
    result: *mut libc::hostent,
    buf: *mut c_char,
    buflen: size_t,
    errnop: *mut c_int,
    h_errnop: *mut c_int,
) -> c_int {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let (settings, store) = bootstrap();
        let resolver = RuleResolver::new(store.current(), settings.http_timeout());
        // SAFETY: forwarded glibc contract.
        unsafe { lookup_into(&resolver, name, af, result, buf, buflen, errnop, h_errnop) }
    }));
    match outcome {
        Ok(status) => status,
        // A panic must not cross into the host resolver.
        Err(_) => unsafe { finish(LookupOutcome::Unavailable, errnop, h_errnop) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_codes_follow_the_glibc_protocol() {
        assert_eq!(
            LookupOutcome::Success.codes(),
            (NSS_STATUS_SUCCESS, 0, NETDB_SUCCESS)
        );
        assert_eq!(
            LookupOutcome::NotFound.codes(),
            (NSS_STATUS_NOTFOUND, libc::ENOENT, HOST_NOT_FOUND)
        );
        // Retry-later and retry-with-a-larger-buffer share a status and
        // are told apart by errno alone.
        let (again_status, again_errno, _) = LookupOutcome::TryAgain.codes();
        let (range_status, range_errno, _) = LookupOutcome::InsufficientBuffer.codes();
        assert_eq!(again_status, range_status);
        assert_eq!(again_errno, libc::EAGAIN);
        assert_eq!(range_errno, libc::ERANGE);
    }
}
