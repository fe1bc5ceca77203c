#[allow(clippy::module_inception)]
mod group_map;

pub use group_map::{GroupError, GroupMap, GroupState};

#[cfg(test)]
mod tests;
