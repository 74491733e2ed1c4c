// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use std::path::Path;

use sql_source_tracer::cache::SearchCache;

#[test]
fn test_key_depends_on_every_part() {
    let root = Path::new("/srv/app");
    let key = SearchCache::<u8>::key(r"Member\.where", "rb", root);
    assert_eq!(key, SearchCache::<u8>::key(r"Member\.where", "rb", root));
    assert_ne!(key, SearchCache::<u8>::key(r"Member\.where", "erb", root));
    assert_ne!(key, SearchCache::<u8>::key(r"Member\.find", "rb", root));
    assert_ne!(
        key,
        SearchCache::<u8>::key(r"Member\.where", "rb", Path::new("/srv/other"))
    );
}

#[test]
fn test_hits_and_misses() {
    let mut cache: SearchCache<Vec<usize>> = SearchCache::new(8);
    let key = SearchCache::<Vec<usize>>::key("limit", "rb", Path::new("/srv/app"));

    assert!(cache.get(key).is_none());
    cache.insert(key, vec![3, 7]);
    assert_eq!(cache.get(key), Some(vec![3, 7]));
    assert_eq!(cache.get(key), Some(vec![3, 7]));

    assert_eq!(cache.misses(), 1);
    assert_eq!(cache.hits(), 2);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_eviction_keeps_size_bounded() {
    let mut cache: SearchCache<usize> = SearchCache::new(4);
    for i in 0..20 {
        cache.insert(SearchCache::<usize>::key(&i.to_string(), "rb", Path::new("/")), i);
        assert!(cache.len() <= 4);
    }
    assert!(!cache.is_empty());
}

#[test]
fn test_clear() {
    let mut cache: SearchCache<usize> = SearchCache::new(4);
    cache.insert(1, 1);
    cache.clear();
    assert!(cache.is_empty());
}
