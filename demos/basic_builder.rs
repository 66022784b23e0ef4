//! Example demonstrating the unified CacheBuilder API.
//!
//! Run with: cargo run --example basic_builder

use std::sync::Arc;

use refcache::builder::{CacheBuilder, CacheConfig, CachePolicy};
use refcache::traits::ObjectCache;

fn main() {
    println!("=== CacheBuilder Examples ===\n");

    // Example 1: Fixed-size cache chosen by name
    println!("1. Fixed cache (\"fixed\")");
    let policy: CachePolicy = "fixed".parse().unwrap();
    let fixed = CacheBuilder::new(2).try_build::<u64, String>(policy).unwrap();

    fixed.put(1, Arc::new("one".to_string()));
    fixed.put(2, Arc::new("two".to_string()));
    // Full: key 3 is declined, nothing is evicted
    fixed.put(3, Arc::new("three".to_string()));

    println!("   contains 1? {}", fixed.contains_key(&1));
    println!("   contains 3? {} (declined, cache full)", fixed.contains_key(&3));
    println!();

    // Example 2: Soft cache with a soft limit
    println!("2. Soft cache (\"soft\", soft limit 2)");
    let soft = CacheBuilder::new(50)
        .soft_limit(2)
        .try_build::<u64, String>(CachePolicy::Soft)
        .unwrap();

    soft.put(1, Arc::new("one".to_string()));
    soft.put(2, Arc::new("two".to_string()));
    soft.get(&1);
    // Over the limit: least recently used key 2 is reclaimed
    soft.put(3, Arc::new("three".to_string()));

    println!("   contains 1? {} (recently used)", soft.contains_key(&1));
    println!("   contains 2? {} (reclaimed)", soft.contains_key(&2));
    println!();

    // Example 3: Null cache turns caching off
    println!("3. Null cache (\"none\")");
    let none = CacheBuilder::default()
        .try_build::<u64, String>("none".parse().unwrap())
        .unwrap();
    none.put(1, Arc::new("one".to_string()));
    println!("   contains 1? {}", none.contains_key(&1));
    println!();

    // Example 4: From a validated configuration
    println!("4. From CacheConfig");
    let config = CacheConfig {
        policy: CachePolicy::Bounded,
        capacity: 10,
        soft_limit: None,
    };
    let configured = CacheBuilder::try_build_from_config::<&str, u32>(&config).unwrap();
    let value = configured
        .get_or_try_insert_with("answer", || Ok::<_, ()>(Arc::new(42)))
        .unwrap();
    println!("   answer -> {value} (capacity {:?})", configured.capacity());

    let broken = CacheConfig {
        soft_limit: Some(0),
        ..CacheConfig::default()
    };
    if let Err(err) = CacheBuilder::try_build_from_config::<&str, u32>(&broken) {
        println!("   invalid config rejected: {err}");
    }
}
