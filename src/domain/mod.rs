// Domain layer: records and ports. No storage or network code here.

pub mod model;
pub mod ports;
