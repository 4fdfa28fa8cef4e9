pub mod aggregator;
pub mod decision;
pub mod links;
pub mod opener;
pub mod pipeline;
pub mod planner;
