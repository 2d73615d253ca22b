//------------ Types for Statistics -----------------------------------------

use serde_derive::Serialize;

/// Counters describing an extendible hash table. Obtained from
/// `ExtHash::stats`; serializable so they can be exported as-is.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct HashStats {
    /// number of stored elements
    pub elements: usize,
    /// current number of directory slots
    pub directory_len: usize,
    /// log2 of the directory size
    pub level: u8,
    /// log2 of the directory size the table may grow to
    pub max_level: u8,
    /// buckets repartitioned to unshare a directory slot
    pub bucket_splits: usize,
    /// times the directory was doubled
    pub directory_doublings: usize,
}

/// Counters describing a built suffix tree. Obtained from
/// `SuffixTree::stats`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SuffixTreeStats {
    /// length of the input the tree was built from
    pub input_len: usize,
    /// inner nodes created during construction
    pub inner_nodes: usize,
    /// leaves created during construction; every suffix ends in one
    pub leaves: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_serialize() {
        let stats = HashStats {
            elements: 12,
            directory_len: 8,
            level: 3,
            max_level: 19,
            bucket_splits: 4,
            directory_doublings: 3,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"elements\":12"));
        assert!(json.contains("\"directory_doublings\":3"));

        let stats = SuffixTreeStats::default();
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"input_len\":0"));
    }
}
