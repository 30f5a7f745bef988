//! Property tests comparing chains against in-memory models.

use blockdb::{
    AccumulatedChain, AggregatedChain, BytesCodec, Chain, FixedChain, FnAccumulator,
    FnAggregator, U64Codec, VariableChain, GROUP_SIZE,
};
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

type FoldFn = fn(Option<&u64>, &[u64], &mut [u64]);
type CombineFn = fn(&u64, &u64) -> u64;

fn running_sum(carry: Option<&u64>, data: &[u64], results: &mut [u64]) {
    let mut acc = carry.copied().unwrap_or(0);
    for (d, r) in data.iter().zip(results.iter_mut()) {
        acc += d;
        *r = acc;
    }
}

fn difference(from: &u64, to: &u64) -> u64 {
    to - from
}

fn max(values: &[u64]) -> u64 {
    values.iter().copied().max().unwrap_or(0)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Windowed cumulatives equal direct sums over the raw data, whatever
    /// batch size the edges were folded with.
    #[test]
    fn windows_match_direct_sums(
        values in prop::collection::vec(0u64..1_000, 2..400),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 2..8),
        batch in 1usize..64,
    ) {
        let dir = TempDir::new().unwrap();
        let data = Arc::new(FixedChain::open(U64Codec, dir.path().join("data.bin")).unwrap());
        data.write(0, &values).unwrap();

        let sums = AccumulatedChain::open(
            Arc::clone(&data),
            U64Codec,
            FnAccumulator::new(running_sum as FoldFn, difference as CombineFn),
            dir.path().join("sum.bin"),
        )
        .unwrap()
        .with_batch_size(batch);
        sums.sync().unwrap();

        let mut indices: Vec<u64> = picks.iter().map(|i| i.index(values.len()) as u64).collect();
        indices.sort_unstable();
        indices.dedup();
        prop_assume!(indices.len() >= 2);

        let windows = sums.windows(&indices).unwrap();
        for (k, pair) in indices.windows(2).enumerate() {
            let (from, to) = (pair[0] as usize, pair[1] as usize);
            let direct: u64 = values[from + 1..=to].iter().sum();
            prop_assert_eq!(windows[k], direct);
        }
    }

    /// Level lengths follow floor division by the group size at every level.
    #[test]
    fn level_lengths_follow_group_size(count in 0u64..40_000, batch in 128usize..4096) {
        let dir = TempDir::new().unwrap();
        let data = Arc::new(FixedChain::open(U64Codec, dir.path().join("data.bin")).unwrap());
        data.write(0, &vec![1u64; count as usize]).unwrap();

        let agg = AggregatedChain::open(
            Arc::clone(&data),
            U64Codec,
            FnAggregator::new(max as fn(&[u64]) -> u64, max as fn(&[u64]) -> u64),
            3,
            dir.path().join("agg"),
        )
        .unwrap()
        .with_batch_size(batch);

        let lengths = agg.sync().unwrap();
        let g = GROUP_SIZE as u64;
        prop_assert_eq!(lengths, vec![count / g, count / g / g, count / g / g / g]);
    }

    /// Variable-chain offsets are the running total of block sizes.
    #[test]
    fn variable_offsets_are_cumulative(sizes in prop::collection::vec(0usize..64, 1..50)) {
        let dir = TempDir::new().unwrap();
        let chain = VariableChain::open(BytesCodec, dir.path().join("var")).unwrap();
        let blocks: Vec<Vec<u8>> = sizes.iter().map(|&n| vec![n as u8; n]).collect();
        chain.write(0, &blocks).unwrap();

        prop_assert_eq!(chain.data_size().unwrap(), sizes.iter().sum::<usize>() as u64);
        for (i, block) in blocks.iter().enumerate() {
            prop_assert_eq!(&chain.read_block(i as u64).unwrap(), block);
        }
    }
}
