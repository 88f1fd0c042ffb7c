pub mod analysis;
pub mod charts;
pub mod excel;
pub mod report;
