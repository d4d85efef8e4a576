use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps credentials and personal data so `{:?}` and `{}` never print them.
///
/// Serialization still emits the inner value: API responses need the real
/// email, while `tracing` fields formatted with Debug stay masked.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Masked<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_value() {
        let hash = Masked("$2b$04$secret".to_string());
        assert_eq!(format!("{:?}", hash), "********");
        assert_eq!(format!("{}", hash), "********");
        assert_eq!(hash.expose(), "$2b$04$secret");
    }

    #[test]
    fn serializes_inner_value() {
        let email = Masked("ana@example.com".to_string());
        let json = serde_json::to_string(&email).unwrap();
        assert_eq!(json, "\"ana@example.com\"");
    }
}
