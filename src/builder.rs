//! The Shuffle Plan Builder: turns a pair of argument layouts into a
//! [`ShuffleArray`] that relocates a call laid out one way into a call laid
//! out the other way.
//!
//! The builder is a pure function of its inputs. It never allocates
//! executable memory and holds no shared state.

use indexmap::{IndexMap};
use rustc_hash::{FxHashMap};
use tracing::{trace};

use crate::convention::{ArgType, ArgRole, ArgPlacement, Layout};
use crate::error::{BuildError, EncodeError};
use crate::shuffle::{ShuffleArray, Move, Location, Frame};
use crate::util::{moves};

/// The structural transform between the source and destination layouts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Adaptation {
    /// The destination has a leading receiver that the source lacks. The
    /// receiver is not sourced from the incoming call.
    InsertReceiver,
    /// The source has a leading receiver that the destination lacks, e.g. the
    /// delegate object when invoking an open static target.
    RemoveReceiver,
    /// The destination additionally takes a generic context argument, which
    /// is not sourced from the incoming call.
    InstantiatingStub,
}

fn unreconcilable(message: impl Into<String>) -> BuildError {
    BuildError::Unreconcilable(message.into())
}

/** Removes and returns the argument with `role`, if any. */
fn take_role<'a>(args: &mut Vec<&'a ArgPlacement>, role: ArgRole) -> Option<&'a ArgPlacement> {
    let index = args.iter().position(|a| a.role == role)?;
    Some(args.remove(index))
}

/** Tests whether a value of type `a` can be relocated into an argument of type `b`. */
fn compatible(a: &ArgType, b: &ArgType) -> bool {
    match (a, b) {
        (ArgType::Aggregate {size: x, ..}, ArgType::Aggregate {size: y, ..}) => {
            x == y && a.eightbytes() == b.eightbytes()
        },
        (ArgType::Aggregate {..}, _) | (_, ArgType::Aggregate {..}) => false,
        _ => a.eightbytes() == b.eightbytes(),
    }
}

/**
 * Pairs each destination argument with the source argument that supplies
 * it. Destination arguments introduced by `mode` are left unpaired.
 */
fn correspond<'a>(
    source: &'a Layout,
    dest: &'a Layout,
    mode: Adaptation,
) -> Result<Vec<(&'a ArgPlacement, &'a ArgPlacement)>, BuildError> {
    let mut src: Vec<&ArgPlacement> = source.args().iter().collect();
    let mut dst: Vec<&ArgPlacement> = dest.args().iter().collect();
    match mode {
        Adaptation::InsertReceiver => {
            if source.find(ArgRole::Receiver).is_some() {
                return Err(unreconcilable("source already has a receiver"));
            }
            take_role(&mut dst, ArgRole::Receiver)
                .ok_or_else(|| unreconcilable("destination has no receiver"))?;
        },
        Adaptation::RemoveReceiver => {
            if src.first().map(|a| a.role) != Some(ArgRole::Receiver) {
                return Err(unreconcilable("source has no receiver"));
            }
            src.remove(0);
        },
        Adaptation::InstantiatingStub => {
            if source.find(ArgRole::GenericContext).is_some() {
                return Err(unreconcilable("source already has a generic context"));
            }
            take_role(&mut dst, ArgRole::GenericContext)
                .ok_or_else(|| unreconcilable("destination has no generic context"))?;
        },
    }
    let mut pairs = Vec::new();
    // The return buffer always supplies the return buffer.
    match (take_role(&mut src, ArgRole::ReturnBuffer), take_role(&mut dst, ArgRole::ReturnBuffer)) {
        (Some(s), Some(d)) => pairs.push((s, d)),
        (None, None) => {},
        _ => return Err(unreconcilable("only one side has a return buffer")),
    }
    if src.len() != dst.len() {
        return Err(unreconcilable(format!(
            "{} source arguments but {} destination arguments", src.len(), dst.len(),
        )));
    }
    pairs.extend(src.into_iter().zip(dst));
    for (i, &(s, d)) in pairs.iter().enumerate() {
        if !compatible(&s.ty, &d.ty) {
            return Err(unreconcilable(format!("argument {}: {:?} cannot be passed as {:?}", i, s.ty, d.ty)));
        }
        let expected = s.ty.eightbytes().len();
        if s.chunks.len() != expected || d.chunks.len() != expected {
            return Err(unreconcilable(format!(
                "argument {}: {:?} needs {} locations, got {} and {}",
                i, s.ty, expected, s.chunks.len(), d.chunks.len(),
            )));
        }
    }
    Ok(pairs)
}

/**
 * Builds the [`ShuffleArray`] that transforms a call laid out per `source`
 * into one laid out per `dest`, under the transform `mode`.
 *
 * Executing the records left to right, using only the helper register as
 * temporary storage, gives every paired destination location the value of
 * its source location. Every destination other than the helper is written by
 * exactly one record. The terminal record carries
 * `source.stack_size() - dest.stack_size()`.
 */
pub fn build_shuffle_array(
    source: &Layout,
    dest: &Layout,
    mode: Adaptation,
) -> Result<ShuffleArray, BuildError> {
    if dest.stack_size() > source.stack_size() {
        return Err(BuildError::StackGrowth {available: source.stack_size(), required: dest.stack_size()});
    }
    let delta = i32::from(source.stack_size()) - i32::from(dest.stack_size());
    let delta = i16::try_from(delta).map_err(|_| EncodeError::StackDelta(delta))?;

    // Collect the relocations, keyed by destination slot.
    let mut dest_to_src: IndexMap<Location, Location> = IndexMap::new();
    let mut src_for_dest: FxHashMap<Location, Location> = FxHashMap::default();
    let mut dest_tags: FxHashMap<Location, Location> = FxHashMap::default();
    let mut read_tags: FxHashMap<Location, Location> = FxHashMap::default();
    let mut chunk_pairs: Vec<(Location, Location)> = Vec::new();
    for (s, d) in correspond(source, dest, mode)? {
        for (&sc, &dc) in s.chunks.iter().zip(&d.chunks) {
            let crosses_banks = matches!(
                (sc, dc),
                (Location::Register(_), Location::FloatRegister {..}) |
                (Location::FloatRegister {..}, Location::Register(_))
            );
            if crosses_banks {
                return Err(unreconcilable(format!("{:?} and {:?} are in different register banks", sc, dc)));
            }
            if dest_to_src.insert(dc.slot(), sc.slot()).is_some() {
                return Err(BuildError::DuplicateDestination(format!("{:?}", dc)));
            }
            src_for_dest.insert(dc.slot(), sc);
            dest_tags.insert(dc.slot(), dc);
            read_tags.entry(sc.slot()).or_insert(sc);
            chunk_pairs.push((sc, dc));
        }
    }

    // Sequence them, breaking cycles through the helper register.
    let sequence = moves(dest_to_src, &Location::Helper)
        .ok_or_else(|| unreconcilable("a layout uses the helper register"))?;
    let plan: Vec<Move> = sequence.into_iter().map(|(d, s)| {
        if d == Location::Helper {
            Move {src: read_tags[&s], dest: Location::Helper}
        } else if s == Location::Helper {
            Move {src: Location::Helper, dest: dest_tags[&d]}
        } else {
            Move {src: src_for_dest[&d], dest: dest_tags[&d]}
        }
    }).collect();
    let shuffle = ShuffleArray::new(plan, delta)?;
    trace!(?mode, ?shuffle, "planned shuffle");

    verify(&shuffle, &chunk_pairs)?;
    Ok(shuffle)
}

/**
 * Executes `shuffle` symbolically and checks that every destination chunk
 * receives the original value of its source chunk.
 */
fn verify(shuffle: &ShuffleArray, chunk_pairs: &[(Location, Location)]) -> Result<(), BuildError> {
    let mut before = Frame::new();
    let mut token: u64 = 0;
    for &(sc, _) in chunk_pairs {
        if before.get(sc).is_none() {
            token += 1;
            before.set(sc, token);
        }
    }
    let mut after = before.clone();
    after.apply(shuffle).map_err(|_| BuildError::UnbreakableCycle)?;
    for &(sc, dc) in chunk_pairs {
        if after.get(dc) != before.get(sc) {
            return Err(BuildError::UnbreakableCycle);
        }
    }
    Ok(())
}

//-----------------------------------------------------------------------------
