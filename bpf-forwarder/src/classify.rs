//! Edge-ingress classification: step 2 of the main loop (§4.10), "Drain
//! ready edge-in packets → classify → BinQueueMgr::Enqueue". The component
//! design leaves the classification rule itself outside the core's scope —
//! real deployments classify on DSCP bits, a 5-tuple policy table, or an
//! application-supplied tag. [`HeaderClassifier`] is a reference rule
//! sufficient to drive the forwarder end-to-end in tests and the demo
//! binary: a 2-byte prefix naming the latency class and destination bin,
//! stripped before the remaining bytes become packet payload.

use bpf_types::{BinIndex, LatencyClass};

pub trait Classifier: Send + Sync {
    /// Classify raw edge-in bytes, returning the assigned latency class,
    /// destination bin, and the payload to store (sans any classification
    /// header this implementation strips). `None` means the bytes could
    /// not be classified and should be dropped.
    fn classify<'a>(&self, raw: &'a [u8]) -> Option<(LatencyClass, BinIndex, &'a [u8])>;
}

#[derive(Debug, Default)]
pub struct HeaderClassifier;

impl Classifier for HeaderClassifier {
    fn classify<'a>(&self, raw: &'a [u8]) -> Option<(LatencyClass, BinIndex, &'a [u8])> {
        if raw.len() < 2 {
            return None;
        }
        let class = LatencyClass::PRIORITY_ORDER.iter().copied().find(|c| *c as u8 == raw[0])?;
        let bin = BinIndex(raw[1]);
        Some((class, bin, &raw[2..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_header_and_resolves_class_and_bin() {
        let classifier = HeaderClassifier;
        let raw = [LatencyClass::Critical as u8, 7, 1, 2, 3];
        let (class, bin, payload) = classifier.classify(&raw).unwrap();
        assert_eq!(class, LatencyClass::Critical);
        assert_eq!(bin, BinIndex(7));
        assert_eq!(payload, &[1, 2, 3]);
    }

    #[test]
    fn rejects_short_input() {
        let classifier = HeaderClassifier;
        assert!(classifier.classify(&[0]).is_none());
    }

    #[test]
    fn rejects_unknown_class_tag() {
        let classifier = HeaderClassifier;
        assert!(classifier.classify(&[250, 1, 1]).is_none());
    }
}
