//! A monotonic instant expressed as an elapsed [`Duration`], so every
//! algorithm below can be driven by an explicit, test-injectable clock
//! rather than reading `Instant::now()` itself.

use std::time::Duration;

pub type Timestamp = Duration;
