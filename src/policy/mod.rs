pub mod bounded;
pub mod chained;
pub mod null;
pub mod soft;
pub mod weak;
