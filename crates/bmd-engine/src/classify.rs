//! Shared classification of a block search's hit set.

use crate::profile::SearchOptions;
use crate::sink::RecordSink;
use bmd_digest::{ambival, bit_distance, min_index};
use bmd_error::Result;
use bmd_sidecar::InstructionRecord;
use bmd_types::{BlockIndex, RecordKind};

/// A candidate reconstruction whose digest fell within tolerance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub data: Vec<u8>,
    pub digest: Vec<u8>,
}

/// What the search concluded for one block.
///
/// This replaces the sign-smuggled ambivalence of older tooling: callers
/// match on the variant instead of inspecting a negated score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchOutcome {
    Unique,
    Ambiguous { ambival: u64 },
    NoHits,
}

/// Classify `hits` for `block` and emit the corresponding instruction
/// records: nothing found, a unique candidate, or per-candidate `HIT`
/// records closed by an ambiguous summary.
///
/// Distances are scored against the observed `(reference_block,
/// reference_digest)` pair.
pub(crate) fn classify_and_emit(
    hits: Vec<Candidate>,
    reference_block: &[u8],
    reference_digest: &[u8],
    block: BlockIndex,
    redundancy: u32,
    opts: &SearchOptions,
    sink: &mut RecordSink,
) -> Result<SearchOutcome> {
    match hits.len() {
        0 => {
            sink.instruction(&InstructionRecord {
                kind: RecordKind::NoHits,
                block,
                distance: 0,
                ambival: 0,
                digest: reference_digest.to_vec(),
                data: reference_block.to_vec(),
            })?;
            Ok(SearchOutcome::NoHits)
        }
        1 => {
            let only = &hits[0];
            let distance = score(only, reference_block, reference_digest, redundancy, opts);
            sink.instruction(&InstructionRecord {
                kind: RecordKind::HitUnique,
                block,
                distance,
                ambival: 0,
                digest: only.digest.clone(),
                data: only.data.clone(),
            })?;
            Ok(SearchOutcome::Unique)
        }
        _ => {
            let distances: Vec<u64> = hits
                .iter()
                .map(|hit| score(hit, reference_block, reference_digest, redundancy, opts))
                .collect();
            for (hit, &distance) in hits.iter().zip(&distances) {
                sink.instruction(&InstructionRecord {
                    kind: RecordKind::Hit,
                    block,
                    distance,
                    ambival: 0,
                    digest: hit.digest.clone(),
                    data: hit.data.clone(),
                })?;
            }
            let best = min_index(&distances);
            let ambival_score = ambival(&distances);
            sink.instruction(&InstructionRecord {
                kind: RecordKind::HitAmbiguous,
                block,
                distance: distances[best],
                ambival: ambival_score,
                digest: hits[best].digest.clone(),
                data: hits[best].data.clone(),
            })?;
            Ok(SearchOutcome::Ambiguous {
                ambival: ambival_score,
            })
        }
    }
}

fn score(
    hit: &Candidate,
    reference_block: &[u8],
    reference_digest: &[u8],
    redundancy: u32,
    opts: &SearchOptions,
) -> u64 {
    let block_bits = bit_distance(&hit.data, reference_block);
    let digest_bits = bit_distance(&hit.digest, reference_digest);
    opts.distance
        .pair_distance(block_bits, digest_bits, opts.penalty, redundancy)
}
