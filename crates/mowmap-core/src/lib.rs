pub mod edit;
pub mod error;
pub mod features;
pub mod geo;
pub mod models;

pub use edit::{EditPhase, EditSession, PointerEvent, PointerTarget};
pub use error::{MapError, Result};
pub use features::{
    build_from_snapshot, build_save_plan, to_persistable_planar, upsert_mower_marker,
    FeatureKind, FeatureMap, MapFeature,
};
pub use geo::{to_geo, to_planar, Datum, GeoDelta, GeoPoint, Offsets, PlanarPoint};
pub use models::{AbsolutePose, AddMowingAreaRequest, MapSnapshot, SetDockingPointRequest};
