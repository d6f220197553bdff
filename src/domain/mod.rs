// Domain layer: wire models, key layout and the ports (traits) the core depends on.

pub mod keys;
pub mod model;
pub mod ports;
