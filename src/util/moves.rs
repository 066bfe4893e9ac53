use std::fmt::{Debug};
use std::hash::{Hash};

use indexmap::{IndexMap};

/**
 * Find a sequence of moves to implement the specified mapping `dest_to_src`.
 * Returns a sequence of (dest, src) pairs, or `None` if `temp` appears in
 * `dest_to_src`.
 *
 *  - dest_to_src - for each destination V, the corresponding source V. The
 *    order of the map determines the order of the result, so equal maps give
 *    equal sequences.
 *  - temp - a temporary location used to break cycles. Each cycle uses it
 *    once: a move into `temp` comes before the rest of the cycle and the move
 *    out of it comes after.
 */
pub fn moves<V: Debug + Clone + Hash + Eq>(
    mut dest_to_src: IndexMap<V, V>,
    temp: &V,
) -> Option<Vec<(V, V)>> {
    // Make a work list that won't change as we remove elements from the map.
    let mut dests: Vec<V> = Vec::with_capacity(dest_to_src.len());
    for (dest, src) in &dest_to_src {
        if dest == temp || src == temp { return None; }
        dests.push(dest.clone());
    }
    // Loop through the work list.
    let mut moves: Vec<(V, V)> = Vec::new(); // In reverse order.
    let mut chain: Vec<V> = Vec::new(); // In forwards order.
    for mut current in dests {
        // Follow the chain starting at `current`.
        while let Some(src) = dest_to_src.swap_remove(&current) {
            if src == current {
                // Optimized case: remove a trivial cycle.
                break;
            }
            chain.push(current);
            current = src;
        }
        // If the chain ended with a non-trivial cycle, break it.
        let cycle = chain.iter().find(|&dest: &&V| dest == &current).cloned();
        if cycle.is_some() {
            current = temp.clone();
        }
        // Process the chain.
        while let Some(dest) = chain.pop() {
            moves.push((dest.clone(), current));
            current = dest;
        }
        // Close the cycle, if any.
        if let Some(src) = cycle {
            moves.push((temp.clone(), src));
        }
        debug_assert_eq!(chain.len(), 0);
    }
    moves.reverse();
    Some(moves)
}

//-----------------------------------------------------------------------------
