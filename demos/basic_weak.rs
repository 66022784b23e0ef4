//! Weak cache and canonical set sharing one sweeper.
//!
//! Run with: cargo run --example basic_weak

use std::sync::Arc;
use std::time::Duration;

use refcache::ds::CanonicalSet;
use refcache::policy::weak::WeakCache;
use refcache::reclaim::{Sweeper, Tracked};
use refcache::traits::ObjectCache;

fn main() {
    let sweeper = Sweeper::start().expect("failed to start sweeper thread");

    // Canonicalize equal identifiers to one shared allocation.
    let names = CanonicalSet::with_sweeper(sweeper.handle());
    let a = names.intern(Tracked::new(String::from("EPSG:4326")));
    let b = names.intern(Tracked::new(String::from("EPSG:4326")));
    println!("same allocation: {}", Arc::ptr_eq(&a, &b));

    // Cache the canonical value weakly under its code.
    let cache = WeakCache::with_sweeper(sweeper.handle());
    cache.put("4326", Arc::clone(&a));
    println!("cached while held: {}", cache.contains_key(&"4326"));

    // Release every owner; the sweeper purges both collections.
    drop(a);
    drop(b);
    sweeper.handle().sync(Duration::from_secs(1));
    println!("cache entries after release: {}", cache.len());
    println!("canonical set size after release: {}", names.len());

    sweeper.stop();
}
