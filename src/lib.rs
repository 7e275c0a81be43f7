pub mod conglomerate;
pub mod dashboard;
pub mod error;
pub mod feeds;
pub mod geometry;
pub mod membership;
pub mod metro_areas;
pub mod ntd;
pub mod output;
pub mod regions;
pub mod table;
