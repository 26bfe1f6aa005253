// Local entity cache and reconciliation
//
// EntityList is the in-memory ordered list a sync hook owns. All mutations
// are keyed by id, so applying the same change twice, or applying a change
// for an entity the fetch already returned, converges to the same list.

use crate::change::ChangeEvent;
use crate::config::ListOrdering;
use crate::entity::Entity;

/// What a reconciliation step did to the list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// New entry added
    Inserted,
    /// Existing entry replaced (insert of a known id, or update)
    Replaced,
    /// Entry removed
    Removed,
    /// Id not present; nothing changed
    Ignored,
}

impl Applied {
    pub fn changed(&self) -> bool {
        !matches!(self, Applied::Ignored)
    }
}

/// Ordered, id-unique list of entities
#[derive(Debug, Clone)]
pub struct EntityList<E: Entity> {
    items: Vec<E>,
    ordering: ListOrdering,
}

impl<E: Entity> EntityList<E> {
    pub fn new(ordering: ListOrdering) -> Self {
        Self {
            items: Vec::new(),
            ordering,
        }
    }

    /// Build a list from fetched entities, dropping duplicate ids (first wins)
    pub fn from_vec(items: Vec<E>, ordering: ListOrdering) -> Self {
        let mut list = Self::new(ordering);
        list.replace_all(items);
        list
    }

    pub fn ordering(&self) -> ListOrdering {
        self.ordering
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[E] {
        &self.items
    }

    pub fn to_vec(&self) -> Vec<E> {
        self.items.clone()
    }

    pub fn into_vec(self) -> Vec<E> {
        self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn position(&self, id: &E::Id) -> Option<usize> {
        self.items.iter().position(|e| e.id() == id)
    }

    pub fn get(&self, id: &E::Id) -> Option<&E> {
        self.items.iter().find(|e| e.id() == id)
    }

    pub fn contains(&self, id: &E::Id) -> bool {
        self.position(id).is_some()
    }

    /// Replace the whole list with a fresh fetch result
    pub fn replace_all(&mut self, items: Vec<E>) {
        self.items.clear();
        self.items.reserve(items.len());
        for item in items {
            if !self.contains(item.id()) {
                self.items.push(item);
            }
        }
    }

    /// Append a fetched page at the tail.
    ///
    /// Entities already present (e.g. delivered by a change event while the
    /// page was in flight) are refreshed in place instead of duplicated.
    /// Returns how many new entries were appended.
    pub fn append_page(&mut self, page: Vec<E>) -> usize {
        let mut appended = 0;
        for item in page {
            match self.position(item.id()) {
                Some(idx) => self.items[idx] = item,
                None => {
                    self.items.push(item);
                    appended += 1;
                }
            }
        }
        appended
    }

    /// Insert or replace by id.
    ///
    /// A known id is replaced in place; a new one goes to the head for
    /// newest-first lists and to the tail otherwise.
    pub fn upsert(&mut self, entity: E) -> Applied {
        match self.position(entity.id()) {
            Some(idx) => {
                self.items[idx] = entity;
                Applied::Replaced
            }
            None => {
                match self.ordering {
                    ListOrdering::NewestFirst => self.items.insert(0, entity),
                    ListOrdering::AsFetched => self.items.push(entity),
                }
                Applied::Inserted
            }
        }
    }

    /// Replace an existing entry; ignored when the id is not in the list
    pub fn replace(&mut self, entity: E) -> Applied {
        match self.position(entity.id()) {
            Some(idx) => {
                self.items[idx] = entity;
                Applied::Replaced
            }
            None => Applied::Ignored,
        }
    }

    /// Mutate an existing entry in place
    pub fn update_with<F>(&mut self, id: &E::Id, patch: F) -> Applied
    where
        F: FnOnce(&mut E),
    {
        match self.items.iter_mut().find(|e| e.id() == id) {
            Some(entity) => {
                patch(entity);
                Applied::Replaced
            }
            None => Applied::Ignored,
        }
    }

    pub fn remove(&mut self, id: &E::Id) -> Option<E> {
        self.position(id).map(|idx| self.items.remove(idx))
    }

    /// Apply one change event (reconciliation)
    pub fn apply(&mut self, event: ChangeEvent<E>) -> Applied {
        match event {
            ChangeEvent::Inserted(entity) => self.upsert(entity),
            ChangeEvent::Updated(entity) => self.replace(entity),
            ChangeEvent::Deleted(id) => match self.remove(&id) {
                Some(_) => Applied::Removed,
                None => Applied::Ignored,
            },
        }
    }
}

impl<E: Entity> Default for EntityList<E> {
    fn default() -> Self {
        Self::new(ListOrdering::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::OwnerId;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: u32,
        owner_id: OwnerId,
        name: String,
    }

    impl Entity for Item {
        type Id = u32;
        const COLLECTION: &'static str = "items";

        fn id(&self) -> &u32 {
            &self.id
        }

        fn owner_id(&self) -> &OwnerId {
            &self.owner_id
        }
    }

    fn item(id: u32, name: &str) -> Item {
        Item {
            id,
            owner_id: OwnerId::from("U1"),
            name: name.to_string(),
        }
    }

    fn ids(list: &EntityList<Item>) -> Vec<u32> {
        list.iter().map(|i| i.id).collect()
    }

    #[test]
    fn test_delete_then_update_scenario() {
        let mut list = EntityList::from_vec(
            vec![item(1, "a"), item(2, "b")],
            ListOrdering::AsFetched,
        );

        assert_eq!(list.apply(ChangeEvent::Deleted(2)), Applied::Removed);
        assert_eq!(
            list.apply(ChangeEvent::Updated(item(1, "x"))),
            Applied::Replaced
        );

        assert_eq!(list.to_vec(), vec![item(1, "x")]);
    }

    #[test]
    fn test_insert_prepends_for_feeds() {
        let mut list = EntityList::from_vec(vec![item(1, "a")], ListOrdering::NewestFirst);
        list.apply(ChangeEvent::Inserted(item(2, "b")));
        assert_eq!(ids(&list), vec![2, 1]);

        let mut list = EntityList::from_vec(vec![item(1, "a")], ListOrdering::AsFetched);
        list.apply(ChangeEvent::Inserted(item(2, "b")));
        assert_eq!(ids(&list), vec![1, 2]);
    }

    #[test]
    fn test_insert_of_known_id_replaces_in_place() {
        let mut list = EntityList::new(ListOrdering::NewestFirst);
        list.upsert(item(1, "optimistic"));
        list.upsert(item(2, "other"));

        let applied = list.apply(ChangeEvent::Inserted(item(1, "server")));

        assert_eq!(applied, Applied::Replaced);
        assert_eq!(ids(&list), vec![2, 1]);
        assert_eq!(list.get(&1).unwrap().name, "server");
    }

    #[test]
    fn test_update_and_delete_of_unknown_id_are_ignored() {
        let mut list = EntityList::from_vec(vec![item(1, "a")], ListOrdering::AsFetched);

        assert_eq!(list.apply(ChangeEvent::Updated(item(9, "z"))), Applied::Ignored);
        assert_eq!(list.apply(ChangeEvent::Deleted(9)), Applied::Ignored);
        assert_eq!(ids(&list), vec![1]);
    }

    #[test]
    fn test_replace_all_drops_duplicate_ids() {
        let list = EntityList::from_vec(
            vec![item(1, "first"), item(2, "b"), item(1, "second")],
            ListOrdering::AsFetched,
        );
        assert_eq!(ids(&list), vec![1, 2]);
        assert_eq!(list.get(&1).unwrap().name, "first");
    }

    #[test]
    fn test_append_page_refreshes_known_entries() {
        let mut list = EntityList::from_vec(vec![item(3, "c"), item(2, "b")], ListOrdering::NewestFirst);

        let appended = list.append_page(vec![item(2, "b2"), item(1, "a")]);

        assert_eq!(appended, 1);
        assert_eq!(ids(&list), vec![3, 2, 1]);
        assert_eq!(list.get(&2).unwrap().name, "b2");
    }

    #[test]
    fn test_update_with_patches_in_place() {
        let mut list = EntityList::from_vec(vec![item(1, "a")], ListOrdering::AsFetched);

        assert_eq!(
            list.update_with(&1, |i| i.name = "patched".to_string()),
            Applied::Replaced
        );
        assert_eq!(list.update_with(&2, |i| i.name.clear()), Applied::Ignored);
        assert_eq!(list.get(&1).unwrap().name, "patched");
    }

    #[test]
    fn test_applying_same_event_twice_is_idempotent() {
        let mut list = EntityList::from_vec(vec![item(1, "a")], ListOrdering::NewestFirst);

        for _ in 0..2 {
            list.apply(ChangeEvent::Inserted(item(2, "b")));
            list.apply(ChangeEvent::Updated(item(1, "a2")));
            list.apply(ChangeEvent::Deleted(3));
        }

        assert_eq!(ids(&list), vec![2, 1]);
        assert_eq!(list.get(&1).unwrap().name, "a2");
    }
}
