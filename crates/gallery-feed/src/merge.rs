//! Combines per-source batches into one shuffled batch ready for appending.

use gallery_proto::protocol::FeedItem;
use rand::seq::SliceRandom;
use rand::Rng;

/// Concatenate `batches` and Fisher-Yates shuffle the result with `rng`.
pub fn merge<R: Rng + ?Sized>(batches: Vec<Vec<FeedItem>>, rng: &mut R) -> Vec<FeedItem> {
    let mut merged: Vec<FeedItem> = batches.into_iter().flatten().collect();
    merged.shuffle(rng);
    merged
}

/// `merge` with the thread-local RNG.
pub fn merge_random(batches: Vec<Vec<FeedItem>>) -> Vec<FeedItem> {
    merge(batches, &mut rand::thread_rng())
}
