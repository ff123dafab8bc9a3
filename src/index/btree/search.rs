//! Single-node key lookup.

use super::node::Node;

/// Position of the last key `<= key`, scanning from position 1.
///
/// Position 0 is the node's lower bound (the sentinel of the leftmost path,
/// or the first key a parent routed here), so it is returned when no later
/// key qualifies. Ties resolve to the rightmost qualifying position.
pub fn lookup_floor<B: AsRef<[u8]>>(node: &Node<B>, key: &[u8]) -> usize {
    // Keys are strictly increasing, so the qualifying positions are a prefix
    // of 1..nkeys.
    let mut lo = 1;
    let mut hi = node.nkeys();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if node.key(mid) <= key {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo.saturating_sub(1)
}
