//! Canonical ordering: pure tuple compare, never traversal or timing order.

use std::cmp::Ordering;
use std::path::PathBuf;
use veridex::order::{compare, order_key, sort_canonical};
use veridex::types::{CanonicalKey, DocumentDescriptor};

fn descriptor(hash_byte: u8, path: &str) -> DocumentDescriptor {
    DocumentDescriptor {
        path: PathBuf::from(path),
        content_hash: [hash_byte; 32],
        size: 1,
        discovered_at: 0,
    }
}

fn key(hash_byte: u8, path: &str) -> CanonicalKey {
    CanonicalKey {
        content_hash: [hash_byte; 32],
        path: PathBuf::from(path),
    }
}

#[test]
fn test_compare_hash_dominates_path() {
    // h1 < h2 even though b.txt > a.txt lexicographically.
    assert_eq!(compare(&key(1, "/b.txt"), &key(2, "/a.txt")), Ordering::Less);
    assert_eq!(
        compare(&key(2, "/a.txt"), &key(1, "/b.txt")),
        Ordering::Greater
    );
}

#[test]
fn test_compare_equal_content_smaller_path_first() {
    assert_eq!(compare(&key(7, "/a.txt"), &key(7, "/b.txt")), Ordering::Less);
    assert_eq!(compare(&key(7, "/a.txt"), &key(7, "/a.txt")), Ordering::Equal);
}

#[test]
fn test_order_key_rejects_empty_path() {
    let d = descriptor(1, "");
    assert!(order_key(&d).is_err());
}

#[test]
fn test_order_key_ignores_discovery_metadata() {
    let mut a = descriptor(3, "/x");
    let mut b = descriptor(3, "/x");
    a.discovered_at = 1;
    b.discovered_at = 999_999;
    a.size = 10;
    b.size = 20;
    assert_eq!(order_key(&a).unwrap(), order_key(&b).unwrap());
}

// Hashes h1<h2<h3 at paths b.txt, a.txt, a.txt sort to
// h1/b.txt, h2/a.txt, h3/a.txt.
#[test]
fn test_sort_canonical_hash_then_path() {
    let mut docs = vec![
        descriptor(3, "/root/a.txt"),
        descriptor(1, "/root/b.txt"),
        descriptor(2, "/root/a.txt"),
    ];
    sort_canonical(&mut docs);
    let order: Vec<(u8, &str)> = docs
        .iter()
        .map(|d| (d.content_hash[0], d.path.to_str().unwrap()))
        .collect();
    assert_eq!(
        order,
        vec![(1, "/root/b.txt"), (2, "/root/a.txt"), (3, "/root/a.txt")]
    );
}

#[test]
fn test_sort_canonical_independent_of_input_order() {
    let base = vec![
        descriptor(5, "/e"),
        descriptor(1, "/z"),
        descriptor(1, "/a"),
        descriptor(9, "/m"),
        descriptor(4, "/q"),
    ];
    let mut forward = base.clone();
    let mut reversed: Vec<_> = base.into_iter().rev().collect();
    sort_canonical(&mut forward);
    sort_canonical(&mut reversed);
    let keys = |v: &[DocumentDescriptor]| {
        v.iter()
            .map(|d| (d.content_hash, d.path.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(keys(&forward), keys(&reversed));
}
