/// Sieve Search API Demo
///
/// Demonstrates the search layer end to end:
/// - Schema with a hierarchical vocabulary and a resource type tree
/// - Indexing a small resource tree
/// - ACL-style authorization through a closure oracle
/// - Throttled, paged searches

use std::collections::HashMap;
use std::sync::Arc;
use sieve_search::auth::oracle::{SecurityDescriptor, Token};
use sieve_search::core::config::SearchConfig;
use sieve_search::core::types::Document;
use sieve_search::index::memory::InMemoryIndex;
use sieve_search::query::ast::{MembershipOperator, Query, TermOperator, TypeOperator};
use sieve_search::query::types::{SortOrder, Sorting};
use sieve_search::schema::schema::{fields, FieldType, Schema};
use sieve_search::schema::vocabulary::Vocabulary;
use sieve_search::search::executor::SearchExecutor;
use sieve_search::search::request::{PropertySelect, SearchRequest};
use sieve_search::search::results::ResultSet;
use sieve_search::search::throttle::ConcurrencyThrottle;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("\n╔═══════════════════════════════════════════════╗");
    println!("║        Sieve Search - API Demo                ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    // Step 1: Schema
    println!("Step 1: Building schema...");
    let schema = Arc::new(Schema::new()
        .add_field("size", FieldType::Int32)
        .add_field("title", FieldType::Text)
        .add_vocabulary_field("topic", FieldType::Text, Vocabulary::hierarchical()
            .with_child("engineering", "backend")
            .with_child("engineering", "frontend")
            .with_child("backend", "storage"))
        .with_type_tree(Vocabulary::hierarchical()
            .with_child("resource", "folder")
            .with_child("resource", "document")
            .with_child("document", "report")));
    println!("  {} fields declared\n", schema.fields.len());

    // Step 2: Index a resource tree
    println!("Step 2: Indexing resources...");
    let index = Arc::new(InMemoryIndex::new());
    index.add_document(resource("/", 0, &[], "folder", "Root"))?;
    index.add_document(resource("/teams", 1, &[0], "folder", "Teams"))?;
    index.add_document(resource("/teams/db", 2, &[0, 1], "folder", "Database team"))?;

    let topics = ["storage", "backend", "frontend"];
    for i in 0..30 {
        let doc = resource(&format!("/teams/db/r{:02}", i), 10 + i, &[0, 1, 2], "report", &format!("Report {}", i))
            .with_field("topic", topics[i as usize % topics.len()])
            .with_field("size", i * 100);
        index.add_document(doc)?;
    }
    let version = index.commit()?;
    println!("  Committed {} documents (version {})\n", index.doc_count(), version);

    // Step 3: Authorization and throttle
    println!("Step 3: Configuring authorization...");
    // ACL node -> principals allowed to read it
    let mut acl: HashMap<i32, Vec<&'static str>> = HashMap::new();
    for node in 0..40 {
        let mut readers = vec!["admin"];
        if node % 3 == 0 {
            readers.push("carol");
        }
        acl.insert(node, readers);
    }
    let oracle = Arc::new(move |token: &Token, d: &SecurityDescriptor| {
        d.acl_node_id
            .and_then(|node| acl.get(&node))
            .is_some_and(|readers| readers.iter().any(|r| *r == token.as_str()))
    });

    let config = SearchConfig { min_upscale: 8, ..SearchConfig::default() };
    let executor = SearchExecutor::new(schema.clone(), index.clone(), oracle).with_config(config.clone())?;
    let throttle = ConcurrencyThrottle::from_config(Arc::new(executor), &config)?;
    println!("  Throttle admits {} concurrent searches\n", throttle.max_concurrent_queries());

    // Step 4: Searches
    println!("Step 4: Searching...");
    let admin = Token::new("admin");
    let carol = Token::new("carol");

    let reports = SearchRequest::new(Query::type_term("document", TypeOperator::IsA))
        .with_limit(5)?
        .with_select(PropertySelect::named(["title"]));
    print_page("documents (admin)", &throttle.execute(&admin, &reports).await?);
    print_page("documents (carol)", &throttle.execute(&carol, &reports).await?);

    let backend = SearchRequest::new(Query::And(vec![
        Query::uri_prefix("/teams/db"),
        Query::membership("topic", MembershipOperator::In, "backend"),
    ]))
    .with_limit(4)?
    .with_sorting(Sorting::by("size", SortOrder::Desc));
    print_page("backend topics, largest first (carol)", &throttle.execute(&carol, &backend).await?);

    let second_page = SearchRequest::new(Query::wildcard("title", "Report 1*"))
        .with_cursor(3)?
        .with_limit(3)?;
    print_page("'Report 1*', second page (admin)", &throttle.execute(&admin, &second_page).await?);

    let small = SearchRequest::new(Query::term("size", TermOperator::Lt, "500"));
    print_page("size < 500 (carol)", &throttle.execute(&carol, &small).await?);

    println!("\n╔═══════════════════════════════════════════════╗");
    println!("║              Demo complete                    ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    Ok(())
}

fn resource(uri: &str, id: i32, ancestors: &[i32], kind: &str, title: &str) -> Document {
    let mut doc = Document::new()
        .with_field(fields::URI, uri)
        .with_field(fields::ID, id)
        .with_field(fields::DEPTH, ancestors.len() as i32)
        .with_field(fields::RESOURCE_TYPE, kind)
        .with_field(fields::ACL_NODE_ID, id)
        .with_field("title", title);
    for &ancestor in ancestors {
        doc.add_field(fields::ANCESTOR_IDS, ancestor);
    }
    doc
}

fn print_page(label: &str, results: &ResultSet) {
    println!(
        "  {}: {} records, {} raw hits, {} round(s), {}ms",
        label,
        results.len(),
        results.total_hits,
        results.rounds,
        results.took_ms
    );
    for record in &results.records {
        println!("    {} {:?}", record.uri, record.property("title"));
    }
}
