//! Key hash to partition mapping.
//!
//! Must agree bit-for-bit with the cluster's own partition function. A
//! disagreement does not break correctness, since any node can serve any key,
//! but every misrouted request costs an extra hop inside the cluster.

/// Mask value meaning "partition count is not a power of two, use modulo".
pub const NO_MASK: i32 = -1;

/// Routing mask for a partition count: `count - 1` for a non-zero power of
/// two, [`NO_MASK`] otherwise.
pub fn routing_mask(partition_count: usize) -> i32 {
    if partition_count > 0
        && partition_count.is_power_of_two()
        && partition_count <= i32::MAX as usize
    {
        (partition_count - 1) as i32
    } else {
        NO_MASK
    }
}

/// Partition index for a key hash.
///
/// With a mask, the high half of the hash is folded into the low half before
/// masking, since low bits of object hashes tend to be poorly distributed.
/// Without one, falls back to `abs(hash % count)`.
///
/// Always returns a value in `[0, partition_count)` when `partition_count > 0`.
pub fn partition_of(hash: i32, partition_count: i32, mask: i32) -> i32 {
    if mask >= 0 {
        return (hash ^ ((hash as u32) >> 16) as i32) & mask;
    }

    if partition_count <= 0 {
        return 0;
    }

    let part = (hash % partition_count).wrapping_abs();

    // wrapping_abs(i32::MIN) stays negative
    if part < 0 {
        0
    } else {
        part
    }
}
