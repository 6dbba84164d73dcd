//! Dirty-tracking session item collection.
//!
//! [`SessionItems`] holds the current value of every field together with a
//! baseline: the encoded form of each field as it was last loaded from or
//! written to the backend. [`SessionItems::delta`] compares the two by encoded
//! text, so a value mutated in place is detected just like a replaced one,
//! and a value set back to what it was is not written at all.
//!
//! ```
//! use sessionbox::SessionItems;
//! use sessionbox_backend::SessionCodec;
//!
//! let codec = SessionCodec::new();
//! let items = SessionItems::new();
//! items.set("visits", 1);
//! items.set("user", "ada");
//!
//! let delta = items.delta(&codec);
//! assert_eq!(delta.changed.len(), 2);
//!
//! // The delta is now the baseline.
//! assert!(items.delta(&codec).is_empty());
//! ```
//!
//! The collection is shared between every in-flight request for the same
//! session. Each operation locks briefly; there is no cross-field atomicity
//! and concurrent writers to one field race with last-write-wins.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::Mutex;
use sessionbox_backend::format::{DecodedField, FormatError, SessionCodec};
use sessionbox_core::SessionValue;
use smol_str::SmolStr;

/// A field whose encoded value differs from the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedField {
    /// Field name.
    pub name: SmolStr,
    /// Current value.
    pub value: SessionValue,
    /// Current value encoded for the backend.
    pub encoded: String,
}

/// Fields to write back, computed by [`SessionItems::delta`].
#[derive(Debug, Default)]
pub struct ItemsDelta {
    /// New or modified fields.
    pub changed: Vec<ChangedField>,
    /// Fields present in the baseline but gone now.
    pub removed: Vec<SmolStr>,
    /// Fields skipped because they could not be encoded.
    pub errors: Vec<(SmolStr, FormatError)>,
}

impl ItemsDelta {
    /// True if nothing needs to be written.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }

    /// Changed fields as name / encoded value pairs.
    pub fn changed_fields(&self) -> Vec<(SmolStr, String)> {
        self.changed
            .iter()
            .map(|field| (field.name.clone(), field.encoded.clone()))
            .collect()
    }
}

#[derive(Default)]
struct State {
    current: BTreeMap<SmolStr, SessionValue>,
    baseline: BTreeMap<SmolStr, String>,
}

/// Session fields with change tracking against the last persisted state.
#[derive(Default)]
pub struct SessionItems {
    state: Mutex<State>,
}

impl fmt::Debug for SessionItems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SessionItems")
            .field("current", &state.current)
            .field("baseline", &state.baseline.len())
            .finish()
    }
}

impl SessionItems {
    /// Creates an empty collection with an empty baseline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collection from fields read from the backend. They become
    /// both the current values and the baseline.
    pub fn from_decoded(fields: impl IntoIterator<Item = DecodedField>) -> Self {
        let mut state = State::default();
        for field in fields {
            state.baseline.insert(field.name.clone(), field.encoded);
            state.current.insert(field.name, field.value);
        }
        Self {
            state: Mutex::new(state),
        }
    }

    /// Returns a copy of a field value.
    pub fn get(&self, name: &str) -> Option<SessionValue> {
        self.state.lock().current.get(name).cloned()
    }

    /// Sets a field, returning the previous value.
    pub fn set(&self, name: impl Into<SmolStr>, value: impl Into<SessionValue>) -> Option<SessionValue> {
        self.state.lock().current.insert(name.into(), value.into())
    }

    /// Removes a field, returning its value. The removal is written back on
    /// the next save if the field had been persisted.
    pub fn remove(&self, name: &str) -> Option<SessionValue> {
        self.state.lock().current.remove(name)
    }

    /// Removes every field.
    pub fn clear(&self) {
        self.state.lock().current.clear();
    }

    /// Forgets all fields and the baseline, leaving nothing to write back.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.current.clear();
        state.baseline.clear();
    }

    /// Mutates a field in place. Returns `None` if the field does not exist.
    ///
    /// The change is picked up by the next [`delta`](Self::delta) through
    /// encoded comparison, so no explicit dirty marking is needed.
    pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut SessionValue) -> R) -> Option<R> {
        self.state.lock().current.get_mut(name).map(f)
    }

    /// Field names in sorted order.
    pub fn names(&self) -> Vec<SmolStr> {
        self.state.lock().current.keys().cloned().collect()
    }

    /// Whether the field exists.
    pub fn contains(&self, name: &str) -> bool {
        self.state.lock().current.contains_key(name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.state.lock().current.len()
    }

    /// True if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.state.lock().current.is_empty()
    }

    /// Copies of every field.
    pub fn snapshot(&self) -> Vec<(SmolStr, SessionValue)> {
        self.state
            .lock()
            .current
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Approximate persisted size: field name plus encoded value bytes.
    /// Fields that cannot be encoded count only their name.
    pub fn estimated_size(&self, codec: &SessionCodec) -> usize {
        let state = self.state.lock();
        state
            .current
            .iter()
            .map(|(name, value)| name.len() + codec.encode(value).map_or(0, |encoded| encoded.len()))
            .sum()
    }

    /// Computes the fields to write back and commits the current state as
    /// the new baseline, so an immediate second call returns an empty delta.
    ///
    /// Fields that fail to encode are reported in [`ItemsDelta::errors`];
    /// their previous baseline entry, if any, is kept.
    pub fn delta(&self, codec: &SessionCodec) -> ItemsDelta {
        let mut state = self.state.lock();
        let State { current, baseline } = &mut *state;

        let mut delta = ItemsDelta::default();
        let mut committed = BTreeMap::new();

        for (name, value) in current.iter() {
            match codec.encode(value) {
                Ok(encoded) => {
                    if baseline.get(name) != Some(&encoded) {
                        delta.changed.push(ChangedField {
                            name: name.clone(),
                            value: value.clone(),
                            encoded: encoded.clone(),
                        });
                    }
                    committed.insert(name.clone(), encoded);
                }
                Err(error) => {
                    if let Some(previous) = baseline.get(name) {
                        committed.insert(name.clone(), previous.clone());
                    }
                    delta.errors.push((name.clone(), error));
                }
            }
        }

        delta.removed = baseline
            .keys()
            .filter(|name| !current.contains_key(*name))
            .cloned()
            .collect();

        *baseline = committed;
        delta
    }
}
