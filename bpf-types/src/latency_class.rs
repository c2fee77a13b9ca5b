//! The ten-way forwarding priority enumeration.

use serde::{Deserialize, Serialize};

/// Forwarding priority class of a packet or zombie byte count.
///
/// Ordered exactly as the dequeue priority list in the component design:
/// latency-sensitive packet classes first, then the normal packet class,
/// then the latency-sensitive zombie classes, then the normal zombie
/// classes. [`LatencyClass::PRIORITY_ORDER`] is this same order and is what
/// `BinQueueMgr` polls in.
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum LatencyClass {
    Critical = 0,
    Control = 1,
    LowLatency = 2,
    NormalLatency = 3,
    HighLatExp = 4,
    HighLatNplbLs = 5,
    HighLatZlrLs = 6,
    HighLatRcvd = 7,
    HighLatNplb = 8,
    HighLatZlr = 9,
}

impl LatencyClass {
    pub const COUNT: usize = 10;

    /// Dequeue priority order: lowest latency first.
    pub const PRIORITY_ORDER: [LatencyClass; 10] = [
        LatencyClass::Critical,
        LatencyClass::Control,
        LatencyClass::LowLatency,
        LatencyClass::NormalLatency,
        LatencyClass::HighLatExp,
        LatencyClass::HighLatNplbLs,
        LatencyClass::HighLatZlrLs,
        LatencyClass::HighLatRcvd,
        LatencyClass::HighLatNplb,
        LatencyClass::HighLatZlr,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether this class is always backed by a packet-less `ZombieQueue`
    /// rather than a `PacketQueue`. This is the compile-time table the
    /// component design refers to: zombie classes always are.
    #[inline]
    pub const fn is_zombie_class(self) -> bool {
        matches!(
            self,
            LatencyClass::HighLatExp
                | LatencyClass::HighLatNplbLs
                | LatencyClass::HighLatZlrLs
                | LatencyClass::HighLatRcvd
                | LatencyClass::HighLatNplb
                | LatencyClass::HighLatZlr
        )
    }

    /// Whether this class counts toward the latency-sensitive byte total.
    #[inline]
    pub const fn is_latency_sensitive(self) -> bool {
        matches!(
            self,
            LatencyClass::Critical
                | LatencyClass::Control
                | LatencyClass::LowLatency
                | LatencyClass::HighLatExp
                | LatencyClass::HighLatNplbLs
                | LatencyClass::HighLatZlrLs
        )
    }

    /// True for the single "real traffic" class that non-LS ZLR treats as
    /// non-zombie occupancy.
    #[inline]
    pub const fn is_nonzombie_real_class(self) -> bool {
        matches!(self, LatencyClass::NormalLatency)
            || matches!(
                self,
                LatencyClass::Critical | LatencyClass::Control | LatencyClass::LowLatency
            )
    }

    /// The non-LS ZLR zombie classes it owns and accounts against.
    #[inline]
    pub const fn is_zlr_zombie_class(self) -> bool {
        matches!(
            self,
            LatencyClass::HighLatRcvd | LatencyClass::HighLatNplb | LatencyClass::HighLatZlr
        )
    }

    /// The LS ZLR zombie classes it owns and accounts against.
    #[inline]
    pub const fn is_zlr_ls_zombie_class(self) -> bool {
        matches!(
            self,
            LatencyClass::HighLatExp | LatencyClass::HighLatNplbLs | LatencyClass::HighLatZlrLs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_matches_repr() {
        for (i, class) in LatencyClass::PRIORITY_ORDER.iter().enumerate() {
            assert_eq!(class.index(), i);
        }
    }

    #[test]
    fn zombie_classes_are_latency_sensitive_or_not_consistently() {
        assert!(LatencyClass::HighLatZlr.is_zombie_class());
        assert!(!LatencyClass::HighLatZlr.is_latency_sensitive());
        assert!(LatencyClass::HighLatZlrLs.is_zombie_class());
        assert!(LatencyClass::HighLatZlrLs.is_latency_sensitive());
        assert!(!LatencyClass::NormalLatency.is_zombie_class());
    }
}
