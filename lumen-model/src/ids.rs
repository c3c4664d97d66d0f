use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                $name(Uuid::now_v7())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn to_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                $name(id)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map($name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

catalog_id!(
    /// Identifier of a library (a named set of filesystem roots).
    LibraryId
);

catalog_id!(
    /// Identifier of one indexed file.
    MediaItemId
);

catalog_id!(
    /// Identifier of a queued job row.
    JobId
);

catalog_id!(
    /// Identifier of a single scanner execution.
    ScanRunId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_v7() {
        let id = MediaItemId::new();
        assert_eq!(id.as_uuid().get_version_num(), 7);
        assert_ne!(id, MediaItemId::new());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("not-a-uuid".parse::<LibraryId>().is_err());
        let id = LibraryId::new();
        let parsed: LibraryId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
