use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Optional request parameter that remembers whether the caller sent it.
///
/// `Option<T>` collapses "key missing" and `"key": null` into one state, which
/// would make the relay either drop an explicit null or invent one. `Field`
/// keeps the three cases apart:
///
/// * [`Field::Absent`]: the key was not in the JSON object. Never serialized;
///   pair with `#[serde(default, skip_serializing_if = "Field::is_absent")]`.
/// * [`Field::Null`]: the key was present with `null`. Serialized as `null`.
/// * [`Field::Value`]: the key was present with a value. Serialized verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Field<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    pub fn is_present(&self) -> bool {
        !self.is_absent()
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Absent
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Value(value)
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Value(value) => value.serialize(serializer),
            // `Absent` only reaches here when a container forgot `skip_serializing_if`.
            Field::Null | Field::Absent => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Only called when the key exists; a missing key goes through `Default`.
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Field::Value(value),
            None => Field::Null,
        })
    }
}
