pub mod sim_clock;
pub mod vec3d;

use std::fmt::{Display, Formatter};

/// Identifier of a group: the entities URL listed in the group index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(url: &str) -> Self { Self(url.to_string()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for GroupId {
    fn from(value: &str) -> Self { Self::new(value) }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

#[cfg(test)]
mod tests;
