pub mod group_definition;
pub mod group_index;
