use serde::{Serialize, Deserialize};

/// Abstract, engine-independent query. Matched exhaustively by the translator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Term(TermQuery),
    Prefix(PrefixQuery),
    Range(RangeQuery),
    Wildcard(WildcardQuery),
    Exists(ExistsQuery),
    UriPrefix(UriPrefixQuery),
    UriDepth(UriDepthQuery),
    TypeTerm(TypeTermQuery),
    VocabularyMembership(VocabularyMembershipQuery),
    And(Vec<Query>),
    Or(Vec<Query>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeOperator {
    Eq,
    Ne,
    IsA,
    IsNotA,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipOperator {
    In,
    Ni,
}

/// Single value comparison on a typed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    pub field: String,
    pub operator: TermOperator,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixQuery {
    pub field: String,
    pub prefix: String,
    pub inverted: bool,
}

/// Range with optional bounds; `inclusive` applies to both ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeQuery {
    pub field: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub inclusive: bool,
}

/// `*` matches any sequence, `?` one character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WildcardQuery {
    pub field: String,
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistsQuery {
    pub field: String,
}

/// Resource at `uri` and everything below it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UriPrefixQuery {
    pub uri: String,
    pub inverted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UriDepthQuery {
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeTermQuery {
    pub type_name: String,
    pub operator: TypeOperator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyMembershipQuery {
    pub field: String,
    pub operator: MembershipOperator,
    pub value: String,
}

impl Query {
    pub fn term(field: &str, operator: TermOperator, value: &str) -> Self {
        Query::Term(TermQuery {
            field: field.to_string(),
            operator,
            value: value.to_string(),
        })
    }

    pub fn prefix(field: &str, prefix: &str) -> Self {
        Query::Prefix(PrefixQuery {
            field: field.to_string(),
            prefix: prefix.to_string(),
            inverted: false,
        })
    }

    pub fn range(field: &str, from: Option<&str>, to: Option<&str>, inclusive: bool) -> Self {
        Query::Range(RangeQuery {
            field: field.to_string(),
            from: from.map(String::from),
            to: to.map(String::from),
            inclusive,
        })
    }

    pub fn wildcard(field: &str, pattern: &str) -> Self {
        Query::Wildcard(WildcardQuery {
            field: field.to_string(),
            pattern: pattern.to_string(),
        })
    }

    pub fn exists(field: &str) -> Self {
        Query::Exists(ExistsQuery { field: field.to_string() })
    }

    pub fn uri_prefix(uri: &str) -> Self {
        Query::UriPrefix(UriPrefixQuery { uri: uri.to_string(), inverted: false })
    }

    pub fn uri_depth(depth: u32) -> Self {
        Query::UriDepth(UriDepthQuery { depth })
    }

    pub fn type_term(type_name: &str, operator: TypeOperator) -> Self {
        Query::TypeTerm(TypeTermQuery {
            type_name: type_name.to_string(),
            operator,
        })
    }

    pub fn membership(field: &str, operator: MembershipOperator, value: &str) -> Self {
        Query::VocabularyMembership(VocabularyMembershipQuery {
            field: field.to_string(),
            operator,
            value: value.to_string(),
        })
    }

    /// Case name, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Query::Term(_) => "TermQuery",
            Query::Prefix(_) => "PrefixQuery",
            Query::Range(_) => "RangeQuery",
            Query::Wildcard(_) => "WildcardQuery",
            Query::Exists(_) => "ExistsQuery",
            Query::UriPrefix(_) => "UriPrefixQuery",
            Query::UriDepth(_) => "UriDepthQuery",
            Query::TypeTerm(_) => "TypeTermQuery",
            Query::VocabularyMembership(_) => "VocabularyMembershipQuery",
            Query::And(_) => "AndQuery",
            Query::Or(_) => "OrQuery",
        }
    }
}
