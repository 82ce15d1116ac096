pub mod ordering;
pub mod planner;
pub mod service;

pub use planner::TripPlanner;
pub use service::ItineraryService;
