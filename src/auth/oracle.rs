use std::fmt;
use serde::{Deserialize, Serialize};
use crate::codec::field_codec::FieldCodec;
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, StoredValue};
use crate::index::engine::{FieldSelector, StoredFields};
use crate::schema::schema::fields;

/// Opaque identity of the caller, interpreted only by the oracle
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Token(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Token values are credentials; keep them out of logs
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(..)")
    }
}

/// Per-candidate fields the oracle needs; built per round, never stored
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityDescriptor {
    pub doc_id: DocId,
    pub uri: String,
    pub owner: Option<String>,
    pub acl_node_id: Option<i32>,
    pub authorized: bool,
}

impl SecurityDescriptor {
    /// Stored fields that `from_stored` reads
    pub fn selector() -> FieldSelector {
        FieldSelector::only([fields::URI, fields::OWNER, fields::ACL_NODE_ID])
    }

    pub fn from_stored(doc_id: DocId, stored: &StoredFields) -> Result<Self> {
        let uri = match first(stored, fields::URI) {
            Some(StoredValue::Text(uri)) => uri.clone(),
            _ => return Err(Error::Format(format!("document {} has no stored uri", doc_id.0))),
        };

        let owner = match first(stored, fields::OWNER) {
            Some(StoredValue::Text(owner)) => Some(owner.clone()),
            _ => None,
        };

        let acl_node_id = match first(stored, fields::ACL_NODE_ID) {
            Some(StoredValue::Binary(bytes)) => Some(FieldCodec::decode_int32_from_binary(bytes)?),
            Some(StoredValue::Text(_)) => {
                return Err(Error::Format(format!("document {} has a text acl node id", doc_id.0)));
            }
            None => None,
        };

        Ok(SecurityDescriptor {
            doc_id,
            uri,
            owner,
            acl_node_id,
            authorized: false,
        })
    }
}

fn first<'a>(stored: &'a StoredFields, name: &str) -> Option<&'a StoredValue> {
    stored.get(name).and_then(|values| values.first())
}

/// Per-document permission check.
///
/// `authorize` marks each descriptor in `batch`. One search may call it
/// several times with disjoint batches.
pub trait AuthorizationOracle: Send + Sync {
    fn authorize(&self, token: &Token, batch: &mut [SecurityDescriptor]) -> Result<()>;
}

impl<F> AuthorizationOracle for F
where
    F: Fn(&Token, &SecurityDescriptor) -> bool + Send + Sync,
{
    fn authorize(&self, token: &Token, batch: &mut [SecurityDescriptor]) -> Result<()> {
        for descriptor in batch.iter_mut() {
            descriptor.authorized = self(token, descriptor);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(uri: &str, owner: Option<&str>, acl: Option<i32>) -> StoredFields {
        let mut map = StoredFields::new();
        map.insert(fields::URI.into(), vec![StoredValue::Text(uri.into())]);
        if let Some(owner) = owner {
            map.insert(fields::OWNER.into(), vec![StoredValue::Text(owner.into())]);
        }
        if let Some(acl) = acl {
            map.insert(
                fields::ACL_NODE_ID.into(),
                vec![StoredValue::Binary(FieldCodec::encode_int32_to_binary(acl).to_vec())],
            );
        }
        map
    }

    #[test]
    fn test_descriptor_from_stored() {
        let descriptor = SecurityDescriptor::from_stored(DocId(4), &stored("/x", Some("alice"), Some(12))).unwrap();
        assert_eq!(descriptor.uri, "/x");
        assert_eq!(descriptor.owner.as_deref(), Some("alice"));
        assert_eq!(descriptor.acl_node_id, Some(12));
        assert!(!descriptor.authorized);

        let bare = SecurityDescriptor::from_stored(DocId(5), &stored("/y", None, None)).unwrap();
        assert_eq!(bare.owner, None);
        assert_eq!(bare.acl_node_id, None);
    }

    #[test]
    fn test_descriptor_requires_uri() {
        let err = SecurityDescriptor::from_stored(DocId(1), &StoredFields::new()).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_closure_oracle_marks_batch() {
        let oracle = |token: &Token, d: &SecurityDescriptor| d.owner.as_deref() == Some(token.as_str());
        let mut batch = vec![
            SecurityDescriptor::from_stored(DocId(0), &stored("/a", Some("bob"), None)).unwrap(),
            SecurityDescriptor::from_stored(DocId(1), &stored("/b", Some("eve"), None)).unwrap(),
        ];

        oracle.authorize(&Token::new("bob"), &mut batch).unwrap();
        assert_eq!(batch.iter().map(|d| d.authorized).collect::<Vec<_>>(), vec![true, false]);
    }

    #[test]
    fn test_token_debug_is_redacted() {
        assert_eq!(format!("{:?}", Token::new("secret")), "Token(..)");
    }
}
