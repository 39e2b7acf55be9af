//! Property tests for block mapping and read-through correctness.

use proptest::prelude::*;

use readat_cache::cache::block::BlockMapper;
use readat_cache::{CachedReader, MemorySource};

proptest! {
    #[test]
    fn block_range_covers_request(
        block_size in 1u64..10_000,
        start in 0u64..1_000_000_000_000,
        len in 0u64..1_000_000,
    ) {
        let mapper = BlockMapper::new(block_size);
        let end = start + len;
        let blocks = mapper.byte_range_to_block_range(start, end);
        let span = mapper.block_range_to_byte_range(blocks.clone());

        prop_assert!(blocks.start <= blocks.end);
        prop_assert_eq!(span.start % block_size, 0);
        prop_assert_eq!(span.end % block_size, 0);
        if start < end {
            prop_assert!(span.start <= start && end <= span.end);
        } else {
            prop_assert!(blocks.is_empty());
        }
        prop_assert!((span.end - span.start) - len < 2 * block_size);
    }

    #[test]
    fn reads_match_source(
        content in prop::collection::vec(any::<u8>(), 0..600),
        block_size in 1u64..16,
        capacity in 1usize..8,
        reads in prop::collection::vec((0u64..700, 0usize..64), 1..40),
    ) {
        let reader = CachedReader::new(MemorySource::new(content.clone()), block_size, capacity).unwrap();
        for (offset, len) in reads {
            let mut buf = vec![0u8; len];
            let outcome = reader.read_at(&mut buf, offset).unwrap();

            let start = (offset as usize).min(content.len());
            let expected = &content[start..(start + len).min(content.len())];
            prop_assert_eq!(outcome.bytes_read, expected.len());
            prop_assert_eq!(outcome.end_of_stream, expected.len() < len);
            prop_assert_eq!(&buf[..outcome.bytes_read], expected);
            prop_assert!(reader.cached_blocks().len() <= capacity);
        }
    }
}
