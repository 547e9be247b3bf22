#![allow(clippy::missing_safety_doc)]

use std::ptr;

use banker_arbiter_core::{BankerState, Outcome};
use banker_arbiter_supervisor::{ArbiterSupervisor, SupervisorSnapshot};

/// FFI ABI version for banker_arbiter_ffi.
///
/// Bump this when any `#[repr(C)]` struct layout or exported function
/// signature changes.
pub const BANKER_ARBITER_FFI_VERSION: u32 = 1;

#[no_mangle]
pub extern "C" fn banker_arbiter_ffi_version() -> u32 {
    BANKER_ARBITER_FFI_VERSION
}

// Snapshot wire format identification.
const SNAP_MAGIC: u32 = 0x314B_4E42; // "BNK1" little-endian
const SNAP_VERSION: u32 = 1;

/// Opaque handle exposed over FFI.
#[repr(C)]
pub struct BnkArbiterSupervisor {
    inner: ArbiterSupervisor,
}

/// FFI string view (UTF-8 bytes).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct BnkStr {
    pub ptr: *const u8,
    pub len: usize,
}

impl BnkStr {
    fn as_str(&self) -> Option<&str> {
        if self.ptr.is_null() {
            return None;
        }
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr, self.len) };
        std::str::from_utf8(bytes).ok()
    }
}

/// Request outcome as a C-friendly enum. Negative values are argument /
/// routing failures; non-negative values are ordinary arbiter outcomes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BnkOutcome {
    UnknownArena = -2,
    InvalidArgument = -1,
    Granted = 0,
    ExceedsMaximumClaim = 1,
    InsufficientlyAvailable = 2,
    DeniedUnsafe = 3,
}

/// Owned byte buffer (for snapshot).
#[repr(C)]
pub struct BnkBytes {
    pub ptr: *mut u8,
    pub len: usize,
}

/// Restore result statistics (FFI-safe).
#[repr(C)]
pub struct BnkRestoreStats {
    pub applied: u32,
    pub overwritten: u32,
    pub rc: i32,
}

fn outcome_to_ffi(o: Outcome) -> BnkOutcome {
    match o {
        Outcome::Granted => BnkOutcome::Granted,
        Outcome::ExceedsMaximumClaim => BnkOutcome::ExceedsMaximumClaim,
        Outcome::InsufficientlyAvailable => BnkOutcome::InsufficientlyAvailable,
        Outcome::DeniedUnsafe => BnkOutcome::DeniedUnsafe,
    }
}

/// Create a new supervisor handle.
///
/// Notes:
/// - `shards` controls internal arena sharding (arena_id -> shard).
/// - This library does not spawn threads. If you call into the same handle
///   concurrently from multiple threads, calls will serialize per-shard via
///   internal mutexes.
#[no_mangle]
pub extern "C" fn banker_arbiter_supervisor_new(shards: usize) -> *mut BnkArbiterSupervisor {
    let handle = BnkArbiterSupervisor {
        inner: ArbiterSupervisor::new(shards.max(1)),
    };
    Box::into_raw(Box::new(handle))
}

#[no_mangle]
pub unsafe extern "C" fn banker_arbiter_supervisor_free(h: *mut BnkArbiterSupervisor) {
    if !h.is_null() {
        drop(Box::from_raw(h));
    }
}

/// Create (or replace) an arena. Returns 0 on success, negative on bad args.
#[no_mangle]
pub unsafe extern "C" fn banker_arbiter_create_arena(
    h: *mut BnkArbiterSupervisor,
    arena_id: BnkStr,
    processes: usize,
    resources: usize,
) -> i32 {
    let Some(handle) = h.as_mut() else { return -1 };
    let Some(id) = arena_id.as_str() else { return -1 };
    handle.inner.create_arena(id, processes, resources);
    0
}

/// Initialize the arena's available vector. Returns 0 on success.
#[no_mangle]
pub unsafe extern "C" fn banker_arbiter_set_available(
    h: *mut BnkArbiterSupervisor,
    arena_id: BnkStr,
    values_ptr: *const u32,
    values_len: usize,
) -> i32 {
    let Some(handle) = h.as_mut() else { return -1 };
    let Some(id) = arena_id.as_str() else { return -1 };
    if values_ptr.is_null() {
        return -1;
    }
    let values = std::slice::from_raw_parts(values_ptr, values_len);
    match handle.inner.set_available(id, values) {
        Ok(()) => 0,
        Err(_) => -2,
    }
}

/// Register one process row. `maximum` and `allocation` must both point at
/// `len` u32 values. Returns 0 on success.
#[no_mangle]
pub unsafe extern "C" fn banker_arbiter_register_process(
    h: *mut BnkArbiterSupervisor,
    arena_id: BnkStr,
    process: usize,
    maximum_ptr: *const u32,
    allocation_ptr: *const u32,
    len: usize,
) -> i32 {
    let Some(handle) = h.as_mut() else { return -1 };
    let Some(id) = arena_id.as_str() else { return -1 };
    if maximum_ptr.is_null() || allocation_ptr.is_null() {
        return -1;
    }
    let maximum = std::slice::from_raw_parts(maximum_ptr, len);
    let allocation = std::slice::from_raw_parts(allocation_ptr, len);
    match handle.inner.register_process(id, process, maximum, allocation) {
        Ok(()) => 0,
        Err(_) => -2,
    }
}

/// Safety query. Returns 1 (safe), 0 (unsafe), or negative on failure.
#[no_mangle]
pub unsafe extern "C" fn banker_arbiter_is_safe(
    h: *mut BnkArbiterSupervisor,
    arena_id: BnkStr,
) -> i32 {
    let Some(handle) = h.as_mut() else { return -1 };
    let Some(id) = arena_id.as_str() else { return -1 };
    match handle.inner.is_safe(id) {
        Ok(true) => 1,
        Ok(false) => 0,
        Err(_) => -2,
    }
}

/// Evaluate one request transactionally.
#[no_mangle]
pub unsafe extern "C" fn banker_arbiter_request(
    h: *mut BnkArbiterSupervisor,
    arena_id: BnkStr,
    process: usize,
    request_ptr: *const u32,
    request_len: usize,
) -> BnkOutcome {
    let Some(handle) = h.as_mut() else {
        return BnkOutcome::InvalidArgument;
    };
    let Some(id) = arena_id.as_str() else {
        return BnkOutcome::InvalidArgument;
    };
    if request_ptr.is_null() {
        return BnkOutcome::InvalidArgument;
    }
    let request = std::slice::from_raw_parts(request_ptr, request_len);
    match handle.inner.request(id, process, request) {
        Ok(outcome) => outcome_to_ffi(outcome),
        Err(banker_arbiter_supervisor::SupervisorError::UnknownArena(_)) => {
            BnkOutcome::UnknownArena
        }
        Err(_) => BnkOutcome::InvalidArgument,
    }
}

/// Snapshot format (binary, little-endian):
/// [u32 magic = "BNK1"][u32 version = 1][u32 arena count]
/// repeated count times:
///   [u32 idlen][id bytes...]
///   [u32 processes][u32 resources]
///   [available: resources u32s]
///   [maximum: processes*resources u32s]
///   [allocation: processes*resources u32s]
///
/// `need` is not stored; restore re-derives it from maximum - allocation.
#[no_mangle]
pub unsafe extern "C" fn banker_arbiter_snapshot(h: *mut BnkArbiterSupervisor) -> BnkBytes {
    let Some(handle) = h.as_mut() else {
        return BnkBytes {
            ptr: ptr::null_mut(),
            len: 0,
        };
    };
    let snap = handle.inner.snapshot();

    let mut buf: Vec<u8> = Vec::new();
    buf.extend_from_slice(&SNAP_MAGIC.to_le_bytes());
    buf.extend_from_slice(&SNAP_VERSION.to_le_bytes());
    buf.extend_from_slice(&(snap.arenas.len() as u32).to_le_bytes());

    for (id, state) in snap.arenas {
        let idb = id.as_bytes();
        buf.extend_from_slice(&(idb.len() as u32).to_le_bytes());
        buf.extend_from_slice(idb);

        buf.extend_from_slice(&(state.processes() as u32).to_le_bytes());
        buf.extend_from_slice(&(state.resources() as u32).to_le_bytes());
        for &v in state.available() {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        for p in 0..state.processes() {
            for &v in state.maximum_row(p).expect("row in range") {
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        for p in 0..state.processes() {
            for &v in state.allocation_row(p).expect("row in range") {
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
    }

    let mut boxed = buf.into_boxed_slice();
    let ptr = boxed.as_mut_ptr();
    let len = boxed.len();
    std::mem::forget(boxed);

    BnkBytes { ptr, len }
}

#[no_mangle]
pub unsafe extern "C" fn banker_arbiter_bytes_free(b: BnkBytes) {
    if !b.ptr.is_null() {
        let slice_ptr = std::ptr::slice_from_raw_parts_mut(b.ptr, b.len);
        drop(Box::from_raw(slice_ptr));
    }
}

fn read_u32(data: &[u8], i: &mut usize) -> Option<u32> {
    if *i + 4 > data.len() {
        return None;
    }
    let v = u32::from_le_bytes(data[*i..*i + 4].try_into().ok()?);
    *i += 4;
    Some(v)
}

fn read_u32_vec(data: &[u8], i: &mut usize, count: usize) -> Option<Vec<u32>> {
    // Capacity hint is bounded by the input size so a malformed count cannot
    // force a huge allocation before the reads fail.
    let mut out = Vec::with_capacity(count.min(data.len() / 4));
    for _ in 0..count {
        out.push(read_u32(data, i)?);
    }
    Some(out)
}

fn decode_snapshot(data: &[u8]) -> Result<SupervisorSnapshot, i32> {
    let mut i = 0usize;

    let magic = read_u32(data, &mut i).ok_or(-2)?;
    if magic != SNAP_MAGIC {
        return Err(-8); // bad magic
    }
    let ver = read_u32(data, &mut i).ok_or(-2)?;
    if ver != SNAP_VERSION {
        return Err(-9); // unsupported version
    }

    let count = read_u32(data, &mut i).ok_or(-2)? as usize;
    let mut arenas: Vec<(String, BankerState)> = Vec::new();

    for _ in 0..count {
        let slen = read_u32(data, &mut i).ok_or(-3)? as usize;
        if i + slen > data.len() {
            return Err(-4);
        }
        let id = std::str::from_utf8(&data[i..i + slen])
            .map_err(|_| -5)?
            .to_string();
        i += slen;

        let processes = read_u32(data, &mut i).ok_or(-6)? as usize;
        let resources = read_u32(data, &mut i).ok_or(-6)? as usize;

        let available = read_u32_vec(data, &mut i, resources).ok_or(-6)?;
        let maximum = read_u32_vec(data, &mut i, processes * resources).ok_or(-6)?;
        let allocation = read_u32_vec(data, &mut i, processes * resources).ok_or(-6)?;

        // Rebuild through the normal initialization path so need is
        // re-derived and allocation <= maximum is re-validated.
        let mut state = BankerState::new(processes, resources);
        state.set_available(&available).map_err(|_| -7)?;
        for p in 0..processes {
            let row = p * resources..(p + 1) * resources;
            state
                .register_process(p, &maximum[row.clone()], &allocation[row])
                .map_err(|_| -7)?;
        }

        arenas.push((id, state));
    }

    Ok(SupervisorSnapshot { arenas })
}

/// Restore arena state from snapshot bytes. `merge != 0` keeps existing
/// arenas not present in the snapshot. Returns 0 on success, negative rc on
/// malformed input (in which case the handle is left unchanged).
#[no_mangle]
pub unsafe extern "C" fn banker_arbiter_restore(
    h: *mut BnkArbiterSupervisor,
    bytes: *const u8,
    len: usize,
    merge: u8,
) -> i32 {
    let stats = banker_arbiter_restore_stats(h, bytes, len, merge);
    stats.rc
}

/// Like `banker_arbiter_restore`, but also reports restore statistics.
#[no_mangle]
pub unsafe extern "C" fn banker_arbiter_restore_stats(
    h: *mut BnkArbiterSupervisor,
    bytes: *const u8,
    len: usize,
    merge: u8,
) -> BnkRestoreStats {
    let fail = |rc: i32| BnkRestoreStats {
        applied: 0,
        overwritten: 0,
        rc,
    };

    let Some(handle) = h.as_mut() else { return fail(-1) };
    if bytes.is_null() || len < 12 {
        return fail(-1);
    }
    let data = std::slice::from_raw_parts(bytes, len);

    let snap = match decode_snapshot(data) {
        Ok(snap) => snap,
        Err(rc) => return fail(rc),
    };

    let stats = if merge != 0 {
        handle.inner.restore_merge(snap)
    } else {
        handle.inner.restore(snap)
    };

    BnkRestoreStats {
        applied: stats.applied as u32,
        overwritten: stats.overwritten as u32,
        rc: 0,
    }
}
