// HTTP handlers, one module per route group.

pub mod moderate;
pub mod tokens;
