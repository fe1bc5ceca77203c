use super::orbital_record::{OrbitalRecord, RecordConstructionError};
use super::propagator::Propagator;
use crate::common::GroupId;
use crate::http_handler::RawEntity;

/// The orbital records of one group, in stable ordinal order.
///
/// The ordinal of a record is its slot index in the group's transform buffer.
pub struct OrbitRecordStore<E> {
    group_id: GroupId,
    records: Vec<OrbitalRecord<E>>,
}

impl<E> OrbitRecordStore<E> {
    /// Builds the store for `group_id` from raw entities in document order.
    ///
    /// # Arguments
    /// * `group_id` - The group the records belong to.
    /// * `raw_entities` - `(identifier, entity)` pairs as listed in the group definition.
    /// * `propagator` - Parses each entity into propagator elements.
    ///
    /// # Returns
    /// The store holding every entity that could be parsed, and one error per dropped entity.
    pub fn init<P>(
        group_id: GroupId,
        raw_entities: Vec<(String, RawEntity)>,
        propagator: &P,
    ) -> (Self, Vec<RecordConstructionError>)
    where
        P: Propagator<Elements = E>,
    {
        let mut records = Vec::with_capacity(raw_entities.len());
        let mut errors = Vec::new();
        for (id, raw) in raw_entities {
            match propagator.elements_from(&id, &raw) {
                Ok(elements) => {
                    let color = raw.color().map(str::to_string);
                    records.push(OrbitalRecord::new(id, color, elements));
                }
                Err(e) => errors.push(e),
            }
        }
        (Self { group_id, records }, errors)
    }

    /// Drops every record past `capacity`. Returns the identifiers that were dropped.
    pub fn truncate(&mut self, capacity: usize) -> Vec<String> {
        if self.records.len() <= capacity {
            return Vec::new();
        }
        self.records.split_off(capacity).into_iter().map(|rec| rec.id().to_string()).collect()
    }

    pub fn group_id(&self) -> &GroupId { &self.group_id }
    pub fn count(&self) -> usize { self.records.len() }
    pub fn get(&self, ordinal: usize) -> Option<&OrbitalRecord<E>> { self.records.get(ordinal) }
    pub fn records(&self) -> &[OrbitalRecord<E>] { &self.records }

    /// Member identifiers in ordinal order.
    pub fn ids(&self) -> Vec<String> { self.records.iter().map(|rec| rec.id().to_string()).collect() }
}
