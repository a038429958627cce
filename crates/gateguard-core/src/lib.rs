pub mod alerts;
pub mod deviation;
pub mod models;
pub mod progress;
pub mod spatial;

pub use alerts::{AlertThresholds, ThresholdError};
pub use deviation::{
    accuracy_warning, AccuracyWarning, DeviationConfig, DeviationEvent, DeviationTracker,
};
pub use models::{
    AlertLevel, DeviationState, DeviationStatus, GeoPoint, Leg, Position, Progress,
    RerouteAttempt, ReturnInfo, RoutePlan, Segment, Stop, StopRole, TravelMode,
};
pub use progress::compute_progress;
pub use spatial::haversine_distance;
