use indexmap::IndexMap;

/// One entry of the group index document.
#[derive(serde::Deserialize, Debug, Clone)]
pub struct GroupIndexEntry {
    /// URL of the group definition; doubles as the group identifier.
    entities: String,
    /// Authoritative member count; fixes the transform buffer size.
    count: usize,
    #[serde(rename = "baseColor", default)]
    base_color: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl GroupIndexEntry {
    pub fn new(entities: &str, count: usize, base_color: Option<&str>) -> Self {
        Self {
            entities: entities.to_string(),
            count,
            base_color: base_color.map(str::to_string),
            country: None,
        }
    }

    pub fn entities(&self) -> &str { &self.entities }
    pub fn count(&self) -> usize { self.count }
    pub fn base_color(&self) -> Option<&str> { self.base_color.as_deref() }
    pub fn country(&self) -> Option<&str> { self.country.as_deref() }
}

/// The group index document: group display name → [`GroupIndexEntry`], in document order.
#[derive(serde::Deserialize, Debug, Clone, Default)]
#[serde(transparent)]
pub struct GroupIndexResponse {
    groups: IndexMap<String, GroupIndexEntry>,
}

impl GroupIndexResponse {
    pub fn from_entries(groups: IndexMap<String, GroupIndexEntry>) -> Self { Self { groups } }

    pub fn get(&self, name: &str) -> Option<&GroupIndexEntry> { self.groups.get(name) }

    /// Looks up a group by its entities URL.
    pub fn find_by_entities(&self, entities_url: &str) -> Option<(&str, &GroupIndexEntry)> {
        self.groups
            .iter()
            .find(|(_, entry)| entry.entities == entities_url)
            .map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GroupIndexEntry)> {
        self.groups.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize { self.groups.len() }
    pub fn is_empty(&self) -> bool { self.groups.is_empty() }
}
