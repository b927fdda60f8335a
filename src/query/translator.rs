use std::ops::Bound;
use std::sync::Arc;
use tracing::debug;
use crate::codec::field_codec::FieldCodec;
use crate::core::error::{Error, Result};
use crate::core::types::FieldValue;
use crate::index::engine::{FieldSelector, IndexEngine, SnapshotHandle};
use crate::query::ast::{
    MembershipOperator, PrefixQuery, Query, RangeQuery, TermOperator, TermQuery, TypeOperator,
    TypeTermQuery, UriPrefixQuery, VocabularyMembershipQuery, WildcardQuery,
};
use crate::query::native::NativeQuery;
use crate::schema::schema::{fields, FieldType, Schema};
use crate::search::wildcard::WildcardBitsetFilter;

/// Maps the abstract query AST to `NativeQuery`, one rule per case.
///
/// Uri resolution reads through `snapshot`, so translation must happen
/// inside the same snapshot scope as execution.
pub struct QueryTranslator<'a> {
    schema: &'a Schema,
    engine: &'a dyn IndexEngine,
    snapshot: &'a SnapshotHandle,
}

impl<'a> QueryTranslator<'a> {
    pub fn new(schema: &'a Schema, engine: &'a dyn IndexEngine, snapshot: &'a SnapshotHandle) -> Self {
        QueryTranslator { schema, engine, snapshot }
    }

    pub fn translate(&self, query: &Query) -> Result<NativeQuery> {
        match query {
            Query::Term(q) => self.translate_term(q),
            Query::Prefix(q) => self.translate_prefix(q),
            Query::Range(q) => self.translate_range(q),
            Query::Wildcard(q) => self.translate_wildcard(q),
            Query::Exists(q) => Ok(NativeQuery::exists(&q.field)),
            Query::UriPrefix(q) => self.translate_uri_prefix(q),
            Query::UriDepth(q) => {
                let depth = i32::try_from(q.depth)
                    .map_err(|_| Error::InvalidArgument(format!("uri depth {} is too large", q.depth)))?;
                Ok(NativeQuery::term(fields::DEPTH, FieldCodec::encode_int32(depth)))
            }
            Query::TypeTerm(q) => self.translate_type(q),
            Query::VocabularyMembership(q) => self.translate_membership(q),
            Query::And(children) => Ok(NativeQuery::and(self.translate_all(children)?)),
            Query::Or(children) => Ok(NativeQuery::or(self.translate_all(children)?)),
        }
    }

    fn translate_all(&self, children: &[Query]) -> Result<Vec<NativeQuery>> {
        children.iter().map(|child| self.translate(child)).collect()
    }

    fn translate_term(&self, q: &TermQuery) -> Result<NativeQuery> {
        let field_type = self.schema.field_type(&q.field);
        let value = FieldCodec::encode_term(field_type, &q.value)?;

        let range = |lower, upper| NativeQuery::Range { field: q.field.clone(), lower, upper };

        Ok(match q.operator {
            TermOperator::Eq => NativeQuery::term(&q.field, value),
            TermOperator::Ne => NativeQuery::present_but_not(&q.field, NativeQuery::term(&q.field, value)),
            TermOperator::Gt => range(Bound::Excluded(value), Bound::Unbounded),
            TermOperator::Ge => range(Bound::Included(value), Bound::Unbounded),
            TermOperator::Lt => range(Bound::Unbounded, Bound::Excluded(value)),
            TermOperator::Le => range(Bound::Unbounded, Bound::Included(value)),
        })
    }

    fn translate_range(&self, q: &RangeQuery) -> Result<NativeQuery> {
        if q.from.is_none() && q.to.is_none() {
            return Ok(NativeQuery::exists(&q.field));
        }

        let field_type = self.schema.field_type(&q.field);
        let bound = |raw: &Option<String>| -> Result<Bound<String>> {
            Ok(match raw {
                None => Bound::Unbounded,
                Some(raw) => {
                    let encoded = FieldCodec::encode_term(field_type, raw)?;
                    if q.inclusive { Bound::Included(encoded) } else { Bound::Excluded(encoded) }
                }
            })
        };

        Ok(NativeQuery::Range {
            field: q.field.clone(),
            lower: bound(&q.from)?,
            upper: bound(&q.to)?,
        })
    }

    fn translate_prefix(&self, q: &PrefixQuery) -> Result<NativeQuery> {
        self.require_text(&q.field, "PrefixQuery")?;

        let prefix = NativeQuery::Prefix {
            field: q.field.clone(),
            prefix: q.prefix.clone(),
        };
        Ok(if q.inverted { NativeQuery::not(prefix) } else { prefix })
    }

    fn translate_wildcard(&self, q: &WildcardQuery) -> Result<NativeQuery> {
        self.require_text(&q.field, "WildcardQuery")?;
        Ok(NativeQuery::Filter(Arc::new(WildcardBitsetFilter::new(&q.field, &q.pattern))))
    }

    fn translate_uri_prefix(&self, q: &UriPrefixQuery) -> Result<NativeQuery> {
        let uri = normalize_uri(&q.uri);

        // An unknown uri has no subtree, whatever ids the index holds
        let subtree = match self.resolve_id(uri)? {
            Some(id) => {
                let encoded = FieldCodec::encode_int32(id);
                NativeQuery::or(vec![
                    NativeQuery::term(fields::ID, encoded.clone()),
                    NativeQuery::term(fields::ANCESTOR_IDS, encoded),
                ])
            }
            None => {
                debug!(uri, "uri not found; prefix branch will match nothing");
                NativeQuery::MatchNone
            }
        };
        Ok(if q.inverted { NativeQuery::not(subtree) } else { subtree })
    }

    /// Point lookup of `uri`, then its stored resource id
    fn resolve_id(&self, uri: &str) -> Result<Option<i32>> {
        let Some(doc_id) = self.engine.point_lookup(self.snapshot, fields::URI, uri)? else {
            return Ok(None);
        };

        let stored = self.engine.fetch_document(self.snapshot, doc_id, &FieldSelector::only([fields::ID]))?;
        match stored.get(fields::ID).and_then(|values| values.first()) {
            Some(value) => match FieldCodec::decode_stored(FieldType::Int32, value)? {
                FieldValue::Int32(id) => Ok(Some(id)),
                _ => Ok(None),
            },
            None => {
                debug!(uri, doc = doc_id.0, "resource has no stored id");
                Ok(None)
            }
        }
    }

    fn translate_type(&self, q: &TypeTermQuery) -> Result<NativeQuery> {
        let direct = || NativeQuery::term(fields::RESOURCE_TYPE, q.type_name.clone());

        Ok(match q.operator {
            TypeOperator::Eq => direct(),
            TypeOperator::Ne => NativeQuery::not(direct()),
            TypeOperator::IsA | TypeOperator::IsNotA => {
                let tree = &self.schema.type_tree;
                if !tree.contains(&q.type_name) {
                    return Err(Error::UnsupportedQuery(format!(
                        "TypeTermQuery: unknown resource type '{}'",
                        q.type_name
                    )));
                }

                let mut names = vec![q.type_name.clone()];
                names.extend(tree.descendants(&q.type_name));
                let expanded = NativeQuery::or(names.into_iter()
                    .map(|name| NativeQuery::term(fields::RESOURCE_TYPE, name))
                    .collect());

                if q.operator == TypeOperator::IsA { expanded } else { NativeQuery::not(expanded) }
            }
        })
    }

    fn translate_membership(&self, q: &VocabularyMembershipQuery) -> Result<NativeQuery> {
        let vocabulary = self.schema.vocabulary(&q.field)
            .filter(|v| v.is_hierarchical())
            .ok_or_else(|| Error::UnsupportedQuery(format!(
                "VocabularyMembershipQuery: field '{}' has no hierarchical vocabulary",
                q.field
            )))?;

        let field_type = self.schema.field_type(&q.field);
        let mut values = vec![q.value.clone()];
        values.extend(vocabulary.descendants(&q.value));

        let terms = values.iter()
            .map(|value| Ok(NativeQuery::term(&q.field, FieldCodec::encode_term(field_type, value)?)))
            .collect::<Result<Vec<_>>>()?;
        let expanded = NativeQuery::or(terms);

        Ok(match q.operator {
            MembershipOperator::In => expanded,
            MembershipOperator::Ni => NativeQuery::present_but_not(&q.field, expanded),
        })
    }

    fn require_text(&self, field: &str, kind: &str) -> Result<()> {
        match self.schema.field_type(field) {
            FieldType::Text => Ok(()),
            other => Err(Error::UnsupportedQuery(format!(
                "{} on field '{}' of type {:?}; only text fields are supported",
                kind, field, other
            ))),
        }
    }
}

/// Strip a trailing slash except on the root
fn normalize_uri(uri: &str) -> &str {
    let trimmed = uri.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Document;
    use crate::index::memory::InMemoryIndex;
    use crate::query::ast::MembershipOperator::{In, Ni};
    use crate::schema::vocabulary::Vocabulary;

    fn schema() -> Schema {
        Schema::new()
            .add_field("size", FieldType::Int32)
            .add_field("created", FieldType::Date)
            .add_vocabulary_field("topic", FieldType::Text, Vocabulary::hierarchical()
                .with_child("science", "physics")
                .with_child("physics", "optics"))
            .add_vocabulary_field("color", FieldType::Text, Vocabulary::flat(["red"]))
            .with_type_tree(Vocabulary::hierarchical()
                .with_child("resource", "file")
                .with_child("file", "image"))
    }

    fn index() -> InMemoryIndex {
        InMemoryIndex::with_documents([
            Document::new().with_field(fields::URI, "/").with_field(fields::ID, 0i32),
            Document::new().with_field(fields::URI, "/docs").with_field(fields::ID, 7i32),
        ]).unwrap()
    }

    fn translate(query: &Query) -> Result<NativeQuery> {
        let schema = schema();
        let index = index();
        let snapshot = index.acquire_snapshot().unwrap();
        let result = QueryTranslator::new(&schema, &index, &snapshot).translate(query);
        index.release_snapshot(&snapshot);
        result
    }

    #[test]
    fn test_term_operators_encode_by_type() {
        let eq = translate(&Query::term("size", TermOperator::Eq, "-1")).unwrap();
        assert_eq!(eq, NativeQuery::term("size", "7fffffff"));

        let gt = translate(&Query::term("size", TermOperator::Gt, "0")).unwrap();
        assert_eq!(gt, NativeQuery::Range {
            field: "size".into(),
            lower: Bound::Excluded("80000000".into()),
            upper: Bound::Unbounded,
        });

        let ne = translate(&Query::term("title", TermOperator::Ne, "x")).unwrap();
        assert_eq!(ne, NativeQuery::present_but_not("title", NativeQuery::term("title", "x")));

        let bad = translate(&Query::term("size", TermOperator::Eq, "big"));
        assert!(matches!(bad, Err(Error::Format(_))));
    }

    #[test]
    fn test_range_bounds() {
        let closed = translate(&Query::range("created", Some("2020-01-01"), Some("2020-12-31"), true)).unwrap();
        assert_eq!(closed, NativeQuery::Range {
            field: "created".into(),
            lower: Bound::Included("20200101000000".into()),
            upper: Bound::Included("20201231000000".into()),
        });

        let open = translate(&Query::range("size", None, Some("5"), false)).unwrap();
        assert!(matches!(open, NativeQuery::Range { lower: Bound::Unbounded, upper: Bound::Excluded(_), .. }));

        assert_eq!(translate(&Query::range("size", None, None, true)).unwrap(), NativeQuery::exists("size"));
    }

    #[test]
    fn test_prefix_and_wildcard_need_text() {
        let inverted = translate(&Query::Prefix(PrefixQuery {
            field: "title".into(),
            prefix: "ab".into(),
            inverted: true,
        })).unwrap();
        assert!(matches!(inverted, NativeQuery::Bool { ref must_not, .. } if must_not.len() == 1));

        assert!(matches!(translate(&Query::prefix("size", "1")), Err(Error::UnsupportedQuery(_))));
        assert!(matches!(translate(&Query::wildcard("size", "1*")), Err(Error::UnsupportedQuery(_))));

        match translate(&Query::wildcard("title", "re*rt")).unwrap() {
            NativeQuery::Filter(filter) => {
                assert_eq!(filter.field(), "title");
                assert_eq!(filter.pattern(), "re*rt");
                assert!(!filter.is_computed());
            }
            other => panic!("expected filter, got {:?}", other),
        }
    }

    #[test]
    fn test_uri_prefix_resolves_id() {
        let expected = NativeQuery::or(vec![
            NativeQuery::term(fields::ID, FieldCodec::encode_int32(7)),
            NativeQuery::term(fields::ANCESTOR_IDS, FieldCodec::encode_int32(7)),
        ]);
        assert_eq!(translate(&Query::uri_prefix("/docs/")).unwrap(), expected);

        let inverted = translate(&Query::UriPrefix(UriPrefixQuery { uri: "/docs".into(), inverted: true })).unwrap();
        assert_eq!(inverted, NativeQuery::not(expected));
    }

    #[test]
    fn test_unknown_uri_matches_nothing() {
        assert_eq!(translate(&Query::uri_prefix("/nowhere")).unwrap(), NativeQuery::MatchNone);

        let inverted = translate(&Query::UriPrefix(UriPrefixQuery { uri: "/nowhere".into(), inverted: true }));
        assert_eq!(inverted.unwrap(), NativeQuery::not(NativeQuery::MatchNone));
    }

    #[test]
    fn test_uri_depth() {
        assert_eq!(
            translate(&Query::uri_depth(2)).unwrap(),
            NativeQuery::term(fields::DEPTH, FieldCodec::encode_int32(2))
        );
        assert!(matches!(translate(&Query::uri_depth(u32::MAX)), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_type_hierarchy_expansion() {
        let is_a = translate(&Query::type_term("file", TypeOperator::IsA)).unwrap();
        assert_eq!(is_a, NativeQuery::or(vec![
            NativeQuery::term(fields::RESOURCE_TYPE, "file"),
            NativeQuery::term(fields::RESOURCE_TYPE, "image"),
        ]));

        let eq = translate(&Query::type_term("file", TypeOperator::Eq)).unwrap();
        assert_eq!(eq, NativeQuery::term(fields::RESOURCE_TYPE, "file"));

        let unknown = translate(&Query::type_term("video", TypeOperator::IsNotA));
        assert!(matches!(unknown, Err(Error::UnsupportedQuery(_))));
    }

    #[test]
    fn test_vocabulary_membership() {
        let in_query = translate(&Query::membership("topic", In, "physics")).unwrap();
        let expanded = NativeQuery::or(vec![
            NativeQuery::term("topic", "physics"),
            NativeQuery::term("topic", "optics"),
        ]);
        assert_eq!(in_query, expanded);

        let ni = translate(&Query::membership("topic", Ni, "physics")).unwrap();
        assert_eq!(ni, NativeQuery::present_but_not("topic", expanded));

        assert!(matches!(translate(&Query::membership("color", In, "red")), Err(Error::UnsupportedQuery(_))));
        assert!(matches!(translate(&Query::membership("title", In, "x")), Err(Error::UnsupportedQuery(_))));
    }

    #[test]
    fn test_composites() {
        let query = Query::And(vec![
            Query::exists("title"),
            Query::Or(vec![Query::uri_depth(1), Query::uri_depth(2)]),
        ]);
        let native = translate(&query).unwrap();
        match native {
            NativeQuery::Bool { must, should, must_not } => {
                assert_eq!(must.len(), 2);
                assert!(should.is_empty() && must_not.is_empty());
            }
            other => panic!("expected bool, got {:?}", other),
        }

        assert_eq!(translate(&Query::And(vec![])).unwrap(), NativeQuery::MatchAll);
        assert_eq!(translate(&Query::Or(vec![])).unwrap(), NativeQuery::MatchNone);

        // An error anywhere in the tree fails the whole translation
        let nested = Query::Or(vec![Query::exists("a"), Query::prefix("size", "1")]);
        assert!(translate(&nested).is_err());
    }
}
