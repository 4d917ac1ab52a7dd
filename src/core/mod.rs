pub mod intent;
pub mod model;
pub mod projection;
pub mod range;

pub use intent::{FilterUpdate, Intent, ToggleField};
pub use model::{Configuration, Filter, FilterGroup, Range, DEFAULT_RANGE_ID};
pub use projection::{Projection, Projector};
pub use range::LineBounds;
