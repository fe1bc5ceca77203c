use indexmap::IndexMap;

/// One raw entity of a group definition: a two-line element set and an optional color.
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
pub struct RawEntity {
    #[serde(rename = "tleLine1", alias = "rawElementLine1")]
    line1: String,
    #[serde(rename = "tleLine2", alias = "rawElementLine2")]
    line2: String,
    #[serde(rename = "entityColor", default)]
    color: Option<String>,
}

impl RawEntity {
    pub fn new(line1: &str, line2: &str, color: Option<&str>) -> Self {
        Self { line1: line1.to_string(), line2: line2.to_string(), color: color.map(str::to_string) }
    }

    pub fn line1(&self) -> &str { &self.line1 }
    pub fn line2(&self) -> &str { &self.line2 }
    pub fn color(&self) -> Option<&str> { self.color.as_deref() }
}

/// A group definition document. Entities keep their document order.
#[derive(serde::Deserialize, Debug, Clone, Default)]
pub struct GroupDefinitionResponse {
    entities: IndexMap<String, RawEntity>,
    #[serde(rename = "baseColor", default)]
    base_color: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl GroupDefinitionResponse {
    pub fn from_entities(entities: IndexMap<String, RawEntity>) -> Self {
        Self { entities, base_color: None, country: None }
    }

    pub fn len(&self) -> usize { self.entities.len() }
    pub fn is_empty(&self) -> bool { self.entities.is_empty() }
    pub fn base_color(&self) -> Option<&str> { self.base_color.as_deref() }
    pub fn country(&self) -> Option<&str> { self.country.as_deref() }

    /// Consumes the document, yielding `(identifier, entity)` pairs in document order.
    pub fn into_entities(self) -> Vec<(String, RawEntity)> { self.entities.into_iter().collect() }
}
