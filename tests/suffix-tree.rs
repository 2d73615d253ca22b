mod common {
    use std::io::Write;

    pub fn init() {
        let _ = env_logger::builder()
            .format(|buf, record| writeln!(buf, "{}", record.args()))
            .is_test(true)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use index_store::{StoreError, SuffixTree};
    use rand::Rng;

    fn sorted_matches(
        tree: &SuffixTree<'_>,
        needle: &[u8],
    ) -> (usize, Vec<usize>) {
        let (total, mut positions) =
            tree.match_all(needle, 0, usize::MAX).unwrap();
        positions.sort_unstable();
        (total, positions)
    }

    #[test]
    fn test_mississippi() {
        super::common::init();

        let mut tree = SuffixTree::new();
        tree.build(b"mississippi").unwrap();

        assert!(tree.contains(b"issi"));
        assert!(tree.contains(b"mississippi"));
        assert!(tree.contains(b"i"));
        assert!(!tree.contains(b"pip"));
        assert!(!tree.contains(b"issis"));

        assert_eq!(sorted_matches(&tree, b"issi"), (2, vec![1, 4]));
        assert_eq!(sorted_matches(&tree, b"ssi"), (2, vec![2, 5]));
        assert_eq!(
            sorted_matches(&tree, b"i"),
            (4, vec![1, 4, 7, 10])
        );
    }

    #[test]
    fn test_overlapping_occurrences() {
        super::common::init();

        let mut tree = SuffixTree::new();
        tree.build(b"ccxccxccc").unwrap();

        assert_eq!(sorted_matches(&tree, b"cc"), (4, vec![0, 3, 6, 7]));
        assert_eq!(sorted_matches(&tree, b"ccc"), (1, vec![6]));
        assert_eq!(sorted_matches(&tree, b"x"), (2, vec![2, 5]));
        assert_eq!(
            sorted_matches(&tree, b"ccxccxccc"),
            (1, vec![0])
        );
    }

    #[test]
    fn test_end_marker_forces_leaf_per_suffix() {
        super::common::init();

        let mut tree = SuffixTree::new();
        tree.build(b"AAAAA").unwrap();

        assert_eq!(sorted_matches(&tree, b"A"), (5, vec![0, 1, 2, 3, 4]));
        assert_eq!(sorted_matches(&tree, b"AA"), (4, vec![0, 1, 2, 3]));
        assert_eq!(sorted_matches(&tree, b"AAAAA"), (1, vec![0]));

        // one leaf per suffix and a chain of split nodes
        let stats = tree.stats();
        assert_eq!(stats.input_len, 5);
        assert_eq!(stats.leaves, 5);
        assert_eq!(stats.inner_nodes, 4);
    }

    #[test]
    fn test_skip_and_max_window_the_walk_order() {
        super::common::init();

        let mut tree = SuffixTree::new();
        tree.build(b"AAAAA").unwrap();

        let (total, full) = tree.match_all(b"A", 0, usize::MAX).unwrap();
        assert_eq!(total, 5);
        assert_eq!(full.len(), 5);

        let (total, window) = tree.match_all(b"A", 2, 2).unwrap();
        assert_eq!(total, 5);
        assert_eq!(window, full[2..4].to_vec());

        let (total, tail) = tree.match_all(b"A", 4, 10).unwrap();
        assert_eq!(total, 5);
        assert_eq!(tail, full[4..].to_vec());

        let (total, none) = tree.match_all(b"A", 9, 10).unwrap();
        assert_eq!(total, 5);
        assert!(none.is_empty());
    }

    #[test]
    fn test_absent_needles() {
        super::common::init();

        let mut tree = SuffixTree::new();
        tree.build(b"abcabc").unwrap();

        assert_eq!(
            tree.match_all(b"zzz", 0, 10),
            Err(StoreError::NotFound)
        );
        assert_eq!(tree.match_all(b"", 0, 10), Err(StoreError::NotFound));
        // longer than the input: rejected without searching
        assert!(!tree.contains(b"abcabca"));
        assert_eq!(
            tree.match_all(b"abcabca", 0, 10),
            Err(StoreError::NotFound)
        );
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        super::common::init();

        let input = b"xabxac";
        let mut tree = SuffixTree::new();
        tree.build(input).unwrap();
        let first = sorted_matches(&tree, b"xa");
        let dump_lines = tree.dump().lines().count();

        tree.clear();
        assert!(tree.is_empty());
        tree.build(input).unwrap();
        assert_eq!(sorted_matches(&tree, b"xa"), first);
        assert_eq!(tree.dump().lines().count(), dump_lines);
    }

    #[test]
    fn test_against_brute_force() {
        super::common::init();

        let mut rng = rand::rng();

        for _ in 0..40 {
            let len = rng.random_range(1..80);
            let input: Vec<u8> = (0..len)
                .map(|_| b"abc"[rng.random_range(0..3)])
                .collect();
            let mut tree = SuffixTree::new();
            tree.build(&input).unwrap();

            for _ in 0..60 {
                let patlen = rng.random_range(1..=len.min(8));
                let pattern: Vec<u8> = (0..patlen)
                    .map(|_| b"abcd"[rng.random_range(0..4)])
                    .collect();
                let brute: Vec<usize> = (0..=len - patlen)
                    .filter(|i| &input[*i..*i + patlen] == &pattern[..])
                    .collect();

                assert_eq!(
                    tree.contains(&pattern),
                    !brute.is_empty(),
                    "input {:?} pattern {:?}",
                    input,
                    pattern
                );
                if !brute.is_empty() {
                    assert_eq!(
                        sorted_matches(&tree, &pattern),
                        (brute.len(), brute)
                    );
                }
            }
            tree.clear();
        }
    }

    #[test]
    fn test_dump_structure() {
        super::common::init();

        let mut tree = SuffixTree::new();
        assert_eq!(tree.dump(), "node(0):\n childs:\n");

        tree.build(b"ABAC").unwrap();
        let dump = tree.dump();
        assert!(dump.starts_with("node(0):\n childs:\n"));
        // the split node for 'A' and its two leaves
        assert!(dump.contains(" A -> node("));
        assert!(dump.contains(" B -> leaf: 'BAC'"));
        assert!(dump.contains(" C -> leaf: 'C'"));
        assert!(dump.contains("node(") && dump.contains("): 'A'"));
        assert!(dump.contains("suffix->node(0)"));
    }

    #[test]
    fn test_build_over_memory_mapped_file() {
        super::common::init();

        let path = std::env::temp_dir().join("index-store-suffix-map.txt");
        let content = b"the quick brown fox jumps over the lazy dog";
        std::fs::write(&path, content).unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let map = unsafe { memmap2::Mmap::map(&file).unwrap() };

        let mut tree = SuffixTree::new();
        tree.build(&map[..]).unwrap();
        assert!(tree.contains(b"brown fox"));
        assert!(!tree.contains(b"brown cat"));
        assert_eq!(sorted_matches(&tree, b"the"), (2, vec![0, 31]));
        assert_eq!(sorted_matches(&tree, b"o"), (4, vec![12, 17, 26, 41]));

        drop(tree);
        drop(map);
        let _ = std::fs::remove_file(&path);
    }
}
