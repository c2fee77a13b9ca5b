//! Byte-count map `{destination bin -> (total, latency-sensitive)}`.
//!
//! Two storage backends satisfy the same contract: a dense, unlocked
//! process-local vector, and a dense vector placed in shared memory where
//! every access takes the segment's lock. [`QueueDepths::adjust`] is the
//! sole mutator used from the data path; `increment`/`decrement` are
//! convenience wrappers over it.

use bpf_types::BinIndex;
use parking_lot::Mutex;

/// One bin's recorded (total_bytes, ls_bytes) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinDepth {
    pub total_bytes: u32,
    pub ls_bytes: u32,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum QueueDepthsError {
    #[error("bin index {0} out of range")]
    OutOfRange(u8),
    #[error("ls_bytes ({ls}) would exceed total_bytes ({total}) for bin {bin}")]
    LsExceedsTotal { bin: u8, ls: u32, total: u32 },
    #[error("shared-memory backend forbids a combined total+ls SetByIdx; set one field at a time")]
    CombinedSetForbidden,
}

trait Backend: Send {
    fn get(&self, bin: BinIndex) -> BinDepth;
    fn set_total(&self, bin: BinIndex, total: u32);
    fn set_ls(&self, bin: BinIndex, ls: u32);
    fn set_both(&self, bin: BinIndex, total: u32, ls: u32) -> Result<(), QueueDepthsError>;
    fn clear_all(&self);
    fn iter_nonzero(&self) -> Vec<(BinIndex, BinDepth)>;
}

struct LocalBackend {
    bins: Mutex<Vec<BinDepth>>,
}

impl LocalBackend {
    fn new(max_bins: usize) -> Self {
        LocalBackend {
            bins: Mutex::new(vec![BinDepth::default(); max_bins]),
        }
    }
}

impl Backend for LocalBackend {
    fn get(&self, bin: BinIndex) -> BinDepth {
        self.bins.lock()[bin.as_usize()]
    }

    fn set_total(&self, bin: BinIndex, total: u32) {
        self.bins.lock()[bin.as_usize()].total_bytes = total;
    }

    fn set_ls(&self, bin: BinIndex, ls: u32) {
        self.bins.lock()[bin.as_usize()].ls_bytes = ls;
    }

    fn set_both(&self, bin: BinIndex, total: u32, ls: u32) -> Result<(), QueueDepthsError> {
        let mut bins = self.bins.lock();
        bins[bin.as_usize()] = BinDepth { total_bytes: total, ls_bytes: ls };
        Ok(())
    }

    fn clear_all(&self) {
        for d in self.bins.lock().iter_mut() {
            *d = BinDepth::default();
        }
    }

    fn iter_nonzero(&self) -> Vec<(BinIndex, BinDepth)> {
        self.bins
            .lock()
            .iter()
            .enumerate()
            .filter(|(_, d)| d.total_bytes != 0 || d.ls_bytes != 0)
            .map(|(i, d)| (BinIndex(i as u8), *d))
            .collect()
    }
}

/// The same dense layout as [`LocalBackend`], conceptually placed in a
/// shared-memory segment. This workspace models the segment lock with the
/// same `parking_lot::Mutex` a real implementation would bracket every
/// access with — see `bpf-pool::shm_ring` for the cross-process primitive
/// this would be built on in a deployment that enables the `shared-memory`
/// feature end to end.
struct SharedBackend {
    bins: Mutex<Vec<BinDepth>>,
}

impl SharedBackend {
    fn new(max_bins: usize) -> Self {
        SharedBackend {
            bins: Mutex::new(vec![BinDepth::default(); max_bins]),
        }
    }
}

impl Backend for SharedBackend {
    fn get(&self, bin: BinIndex) -> BinDepth {
        self.bins.lock()[bin.as_usize()]
    }

    fn set_total(&self, bin: BinIndex, total: u32) {
        self.bins.lock()[bin.as_usize()].total_bytes = total;
    }

    fn set_ls(&self, bin: BinIndex, ls: u32) {
        self.bins.lock()[bin.as_usize()].ls_bytes = ls;
    }

    fn set_both(&self, _bin: BinIndex, _total: u32, _ls: u32) -> Result<(), QueueDepthsError> {
        // The component design forbids this: a combined (total, ls) write is
        // two words and cannot be made atomic under the segment lock without
        // also serializing readers, which the shared-memory backend does
        // not do. Callers must issue two single-field writes.
        Err(QueueDepthsError::CombinedSetForbidden)
    }

    fn clear_all(&self) {
        for d in self.bins.lock().iter_mut() {
            *d = BinDepth::default();
        }
    }

    fn iter_nonzero(&self) -> Vec<(BinIndex, BinDepth)> {
        self.bins
            .lock()
            .iter()
            .enumerate()
            .filter(|(_, d)| d.total_bytes != 0 || d.ls_bytes != 0)
            .map(|(i, d)| (BinIndex(i as u8), *d))
            .collect()
    }
}

/// `{destination bin -> (total_bytes, ls_bytes)}`, backed by either storage
/// mode. Construct with [`QueueDepths::local`] or [`QueueDepths::shared`].
pub struct QueueDepths {
    backend: Box<dyn Backend>,
    max_bins: usize,
}

impl QueueDepths {
    pub fn local() -> Self {
        QueueDepths {
            backend: Box::new(LocalBackend::new(BinIndex::MAX_BINS)),
            max_bins: BinIndex::MAX_BINS,
        }
    }

    pub fn shared() -> Self {
        QueueDepths {
            backend: Box::new(SharedBackend::new(BinIndex::MAX_BINS)),
            max_bins: BinIndex::MAX_BINS,
        }
    }

    /// A local-backed instance sized smaller than the full `BinIndex` range,
    /// for deployments whose `BinMap` never hands out indices above a known
    /// ceiling.
    pub fn local_with_capacity(max_bins: usize) -> Self {
        QueueDepths {
            backend: Box::new(LocalBackend::new(max_bins)),
            max_bins,
        }
    }

    fn check_range(&self, bin: BinIndex) -> Result<(), QueueDepthsError> {
        if bin.as_usize() >= self.max_bins {
            Err(QueueDepthsError::OutOfRange(bin.0))
        } else {
            Ok(())
        }
    }

    pub fn get(&self, bin: BinIndex) -> Result<BinDepth, QueueDepthsError> {
        self.check_range(bin)?;
        Ok(self.backend.get(bin))
    }

    /// The sole mutator used from the data path: applies signed deltas to
    /// both fields and enforces `ls <= total` afterward.
    pub fn adjust(&self, bin: BinIndex, delta: i64, ls_delta: i64) -> Result<(), QueueDepthsError> {
        self.check_range(bin)?;
        let cur = self.backend.get(bin);
        let new_total = (cur.total_bytes as i64 + delta).max(0) as u32;
        let new_ls = (cur.ls_bytes as i64 + ls_delta).max(0) as u32;
        if new_ls > new_total {
            return Err(QueueDepthsError::LsExceedsTotal { bin: bin.0, ls: new_ls, total: new_total });
        }
        self.backend.set_total(bin, new_total);
        self.backend.set_ls(bin, new_ls);
        Ok(())
    }

    pub fn increment(&self, bin: BinIndex, bytes: u32, ls_bytes: u32) -> Result<(), QueueDepthsError> {
        self.adjust(bin, bytes as i64, ls_bytes as i64)
    }

    pub fn decrement(&self, bin: BinIndex, bytes: u32, ls_bytes: u32) -> Result<(), QueueDepthsError> {
        self.adjust(bin, -(bytes as i64), -(ls_bytes as i64))
    }

    /// Direct write of both fields at once. Forbidden on the shared-memory
    /// backend; use `adjust`/`increment`/`decrement` there instead.
    pub fn set(&self, bin: BinIndex, total: u32, ls: u32) -> Result<(), QueueDepthsError> {
        self.check_range(bin)?;
        if ls > total {
            return Err(QueueDepthsError::LsExceedsTotal { bin: bin.0, ls, total });
        }
        self.backend.set_both(bin, total, ls)
    }

    pub fn clear_all(&self) {
        self.backend.clear_all();
    }

    /// Every bin currently holding non-zero content, in ascending bin order.
    pub fn iter_nonzero(&self) -> Vec<(BinIndex, BinDepth)> {
        let mut v = self.backend.iter_nonzero();
        v.sort_by_key(|(bin, _)| bin.0);
        v
    }

    pub fn max_bins(&self) -> usize {
        self.max_bins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjust_then_get_roundtrips() {
        let qd = QueueDepths::local();
        qd.adjust(BinIndex(3), 1000, 200).unwrap();
        let d = qd.get(BinIndex(3)).unwrap();
        assert_eq!(d.total_bytes, 1000);
        assert_eq!(d.ls_bytes, 200);
    }

    #[test]
    fn adjust_never_goes_negative() {
        let qd = QueueDepths::local();
        qd.adjust(BinIndex(1), 100, 0).unwrap();
        qd.adjust(BinIndex(1), -1000, 0).unwrap();
        assert_eq!(qd.get(BinIndex(1)).unwrap().total_bytes, 0);
    }

    #[test]
    fn ls_cannot_exceed_total() {
        let qd = QueueDepths::local();
        let err = qd.adjust(BinIndex(2), 100, 200).unwrap_err();
        assert!(matches!(err, QueueDepthsError::LsExceedsTotal { .. }));
    }

    #[test]
    fn shared_backend_rejects_combined_set() {
        let qd = QueueDepths::shared();
        let err = qd.set(BinIndex(0), 10, 5).unwrap_err();
        assert_eq!(err, QueueDepthsError::CombinedSetForbidden);
        // single-field adjust is still fine
        qd.adjust(BinIndex(0), 10, 5).unwrap();
        assert_eq!(qd.get(BinIndex(0)).unwrap().total_bytes, 10);
    }

    #[test]
    fn clear_all_zeroes_without_shrinking() {
        let qd = QueueDepths::local();
        qd.adjust(BinIndex(5), 500, 0).unwrap();
        qd.clear_all();
        assert_eq!(qd.get(BinIndex(5)).unwrap().total_bytes, 0);
        assert_eq!(qd.max_bins(), BinIndex::MAX_BINS);
    }

    #[test]
    fn iter_nonzero_suppresses_zero_bins() {
        let qd = QueueDepths::local();
        qd.adjust(BinIndex(3), 1234, 200).unwrap();
        qd.adjust(BinIndex(9), 999_999, 999_999).unwrap();
        let entries = qd.iter_nonzero();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, BinIndex(3));
        assert_eq!(entries[1].0, BinIndex(9));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let qd = QueueDepths::local_with_capacity(4);
        let err = qd.get(BinIndex(10)).unwrap_err();
        assert_eq!(err, QueueDepthsError::OutOfRange(10));
    }
}
