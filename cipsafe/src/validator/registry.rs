//! Stack wide instance id to array slot mapping.
//!
//! Safety validator instance ids are shared between client and server
//! validators; this registry records, per id, which arena slot the instance
//! occupies and which side it is. It owns no instance data, only the index.

use super::{MAX_CLIENT_INSTANCES, MAX_SERVER_INSTANCES, MAX_VALIDATOR_INSTANCES};
use crate::error::ErrorKind;

/// Which side of a safety connection an instance id refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValidatorRole {
    Client,
    Server,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct RegistryEntry {
    pub index: usize,
    pub role: ValidatorRole,
}

/// Instance id registry, ids 1..=[`MAX_VALIDATOR_INSTANCES`].
#[derive(Debug)]
pub(crate) struct Registry {
    entries: [Option<RegistryEntry>; MAX_VALIDATOR_INSTANCES],
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            entries: [None; MAX_VALIDATOR_INSTANCES],
        }
    }
}

impl Registry {
    fn slot(instance_id: u16) -> Option<usize> {
        if (1..=MAX_VALIDATOR_INSTANCES as u16).contains(&instance_id) {
            Some(instance_id as usize - 1)
        } else {
            None
        }
    }

    /// Record that `instance_id` lives at `index` of the arena of `role`.
    pub fn assign(
        &mut self,
        instance_id: u16,
        index: usize,
        role: ValidatorRole,
    ) -> Result<(), ErrorKind> {
        let slot = Self::slot(instance_id).ok_or(ErrorKind::InstanceIdInvalid)?;
        let capacity = match role {
            ValidatorRole::Client => MAX_CLIENT_INSTANCES,
            ValidatorRole::Server => MAX_SERVER_INSTANCES,
        };
        if index >= capacity {
            return Err(ErrorKind::IndexOutOfRange);
        }
        self.entries[slot] = Some(RegistryEntry { index, role });
        Ok(())
    }

    /// Remove the entry of `instance_id`.
    pub fn delete(&mut self, instance_id: u16) -> Result<(), ErrorKind> {
        let slot = Self::slot(instance_id).ok_or(ErrorKind::InstanceIdInvalid)?;
        self.entries[slot] = None;
        Ok(())
    }

    /// The arena index of `instance_id`, whatever its role.
    pub fn index_of(&self, instance_id: u16) -> Option<usize> {
        Self::slot(instance_id)
            .and_then(|slot| self.entries[slot])
            .map(|entry| entry.index)
    }

    /// The role of `instance_id`, or `None` if never assigned.
    pub fn role_of(&self, instance_id: u16) -> Option<ValidatorRole> {
        Self::slot(instance_id)
            .and_then(|slot| self.entries[slot])
            .map(|entry| entry.role)
    }

    /// The client arena index of `instance_id`; `None` for unknown ids and
    /// for server instances.
    pub fn client_index(&self, instance_id: u16) -> Option<usize> {
        Self::slot(instance_id)
            .and_then(|slot| self.entries[slot])
            .and_then(|entry| match entry.role {
                ValidatorRole::Client => Some(entry.index),
                ValidatorRole::Server => None,
            })
    }

    /// All registered client instances as `(instance_id, index)` pairs.
    pub fn clients(&self) -> impl Iterator<Item = (u16, usize)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| match entry {
                Some(RegistryEntry {
                    index,
                    role: ValidatorRole::Client,
                }) => Some((slot as u16 + 1, *index)),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_lookup_delete() {
        let mut registry = Registry::default();
        registry.assign(3, 1, ValidatorRole::Client).unwrap();
        registry.assign(4, 0, ValidatorRole::Server).unwrap();

        assert_eq!(registry.index_of(3), Some(1));
        assert_eq!(registry.role_of(3), Some(ValidatorRole::Client));
        assert_eq!(registry.client_index(3), Some(1));
        // server instances never resolve to a client index
        assert_eq!(registry.client_index(4), None);
        assert_eq!(registry.role_of(4), Some(ValidatorRole::Server));

        registry.delete(3).unwrap();
        assert_eq!(registry.index_of(3), None);
        assert_eq!(registry.role_of(3), None);
    }

    #[test]
    fn instance_id_bounds() {
        let mut registry = Registry::default();
        assert_eq!(
            registry.assign(0, 0, ValidatorRole::Client),
            Err(ErrorKind::InstanceIdInvalid)
        );
        assert_eq!(
            registry.assign(MAX_VALIDATOR_INSTANCES as u16 + 1, 0, ValidatorRole::Client),
            Err(ErrorKind::InstanceIdInvalid)
        );
        assert_eq!(registry.delete(0), Err(ErrorKind::InstanceIdInvalid));
        assert_eq!(registry.index_of(0), None);
        assert_eq!(registry.index_of(u16::MAX), None);
    }

    #[test]
    fn index_bounds_depend_on_role() {
        let mut registry = Registry::default();
        assert_eq!(
            registry.assign(1, MAX_CLIENT_INSTANCES, ValidatorRole::Client),
            Err(ErrorKind::IndexOutOfRange)
        );
        assert_eq!(
            registry.assign(1, MAX_SERVER_INSTANCES, ValidatorRole::Server),
            Err(ErrorKind::IndexOutOfRange)
        );
        registry
            .assign(1, MAX_CLIENT_INSTANCES - 1, ValidatorRole::Client)
            .unwrap();
    }

    #[test]
    fn clients_iterates_only_clients() {
        let mut registry = Registry::default();
        registry.assign(1, 0, ValidatorRole::Client).unwrap();
        registry.assign(2, 0, ValidatorRole::Server).unwrap();
        registry.assign(5, 2, ValidatorRole::Client).unwrap();

        let clients: std::vec::Vec<_> = registry.clients().collect();
        assert_eq!(clients, [(1, 0), (5, 2)]);
    }
}
