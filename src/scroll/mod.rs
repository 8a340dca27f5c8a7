pub mod metrics;
pub mod persistence;
pub mod sync;
pub mod viewport;

pub use metrics::{ScrollMetrics, ScrollPane};
pub use persistence::{FileScrollStore, ScrollPersistence, ScrollStore};
pub use sync::{Pane, ScrollSynchronizer};
pub use viewport::ViewportTracker;
