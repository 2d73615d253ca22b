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
    use std::collections::BTreeSet;
    use std::ptr::NonNull;

    use index_store::types::test_types::{Token, TokenOrd};
    use index_store::{ExtHash, StoreError};
    use rand::seq::SliceRandom;
    use rand::Rng;

    fn arena(keys: &[u32]) -> Vec<Box<Token>> {
        keys.iter().map(|k| Box::new(Token::new(*k))).collect()
    }

    fn ptr(token: &Token) -> NonNull<Token> {
        NonNull::from(token)
    }

    #[test]
    fn test_directory_growth_over_half_a_million_keys() {
        super::common::init();

        const COUNT: usize = 1 << 19;
        let all: Vec<u32> = (0..COUNT as u32).collect();
        let tokens = arena(&all);
        let mut table = ExtHash::new(TokenOrd, 1, COUNT).unwrap();

        for token in &tokens {
            unsafe { table.insert(ptr(token)).unwrap() };
        }

        // with the identity hash over 0..2^19 the directory settles at
        // 2^18 slots, each owning a two-element bucket; every slot above
        // index 0 was unshared exactly once on the way
        let stats = table.stats();
        assert_eq!(table.len(), COUNT);
        assert_eq!(stats.level, 18);
        assert_eq!(stats.max_level, 19);
        assert_eq!(stats.directory_len, 1 << 18);
        assert_eq!(stats.directory_doublings, 18);
        assert_eq!(stats.bucket_splits, (1 << 18) - 1);

        for key in &all {
            assert_eq!(table.find(key).unwrap().key(), *key);
        }
        assert!(table.find(&(COUNT as u32)).is_none());

        assert_eq!(table.iter().count(), COUNT);
        table.check_invariant().unwrap();
    }

    #[test]
    fn test_len_tracks_unique_inserts_and_removes() {
        super::common::init();

        let mut rng = rand::rng();
        let mut table = ExtHash::new(TokenOrd, 2, 256).unwrap();
        let mut model: BTreeSet<u32> = BTreeSet::new();

        let all: Vec<u32> = (0..400).collect();
        let tokens = arena(&all);

        for _ in 0..4 {
            let mut order: Vec<usize> = (0..tokens.len()).collect();
            order.shuffle(&mut rng);
            for idx in order {
                let token = &tokens[idx];
                if model.contains(&token.key()) {
                    let removed = table.remove(&token.key()).unwrap();
                    assert_eq!(
                        unsafe { removed.as_ref() }.key(),
                        token.key()
                    );
                    model.remove(&token.key());
                } else if rng.random_range(0..3) > 0 {
                    unsafe { table.insert(ptr(token)).unwrap() };
                    model.insert(token.key());
                }
                assert_eq!(table.len(), model.len());
            }
            table.check_invariant().unwrap();

            let mut seen: Vec<u32> =
                table.iter().map(|t| t.key()).collect();
            seen.sort_unstable();
            assert_eq!(seen, model.iter().copied().collect::<Vec<_>>());
        }

        for key in 0..400u32 {
            assert_eq!(table.find(&key).is_some(), model.contains(&key));
        }
    }

    #[test]
    fn test_remove_all_empties_and_reports_state() {
        super::common::init();

        let all: Vec<u32> = (0..64).collect();
        let tokens = arena(&all);
        let mut table = ExtHash::new(TokenOrd, 1, 1 << 8).unwrap();
        for token in &tokens {
            unsafe { table.insert(ptr(token)).unwrap() };
        }
        let level_before = table.stats().level;
        assert!(level_before > 0);

        table.remove_all().unwrap();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert_eq!(table.iter().count(), 0);
        // the directory never shrinks
        assert_eq!(table.stats().level, level_before);
        for token in &tokens {
            assert_eq!(token.deleted.get(), 1);
        }

        for token in &tokens {
            unsafe { table.insert(ptr(token)).unwrap() };
        }
        assert_eq!(table.len(), 64);
        table.check_invariant().unwrap();
    }

    #[test]
    fn test_errors() {
        super::common::init();

        assert_eq!(
            ExtHash::new(TokenOrd, 16, 8).err(),
            Some(StoreError::InvalidKey)
        );

        let tokens = arena(&[1, 1]);
        let mut table = ExtHash::new(TokenOrd, 1, 16).unwrap();
        unsafe {
            table.insert(ptr(&tokens[0])).unwrap();
            assert_eq!(
                table.insert(ptr(&tokens[1])),
                Err(StoreError::AlreadyExists)
            );
        }
        assert_eq!(table.remove(&2), Err(StoreError::NotFound));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_stats_serialize() {
        super::common::init();

        let tokens = arena(&[0, 1, 2, 3, 4, 5, 6, 7]);
        let mut table = ExtHash::new(TokenOrd, 1, 64).unwrap();
        for token in &tokens {
            unsafe { table.insert(ptr(token)).unwrap() };
        }

        let json = serde_json::to_string(&table.stats()).unwrap();
        assert!(json.contains("\"elements\":8"));
        assert!(json.contains("\"level\""));
    }
}
