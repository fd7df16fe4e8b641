//! Builders - deferred selection of an algorithm and its arguments
//!
//! Graph-like applications are configured long before any data flows
//! through them. A builder keeps, per declared key, which algorithm to run
//! and with which arguments (a "piece"), and hands that selection to the
//! consumer once data arrives. The builder never runs the algorithm itself.

use crate::error::{PipeError, Result};
use crate::options::Kwargs;
use crate::types::Value;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Closed family of algorithms a builder selects from
pub trait Algorithm: Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Every valid name, for error messages
    fn names() -> Vec<&'static str>;

    fn from_name(name: &str) -> Option<Self>;

    fn name(&self) -> &'static str;

    /// Reject keyword arguments this algorithm cannot take
    fn check_kwargs(&self, _kwargs: &Kwargs) -> Result<()> {
        Ok(())
    }
}

/// Algorithm selection plus its positional and keyword arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Piece<A> {
    name: Option<A>,
    args: Vec<JsonValue>,
    kwargs: Kwargs,
}

impl<A: Algorithm> Piece<A> {
    pub fn new(name: A, args: Vec<JsonValue>, kwargs: Kwargs) -> Self {
        Self {
            name: Some(name),
            args,
            kwargs,
        }
    }

    /// Selected algorithm, `None` while unset
    pub fn name(&self) -> Option<A> {
        self.name
    }

    pub fn args(&self) -> &[JsonValue] {
        &self.args
    }

    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    pub fn is_set(&self) -> bool {
        self.name.is_some()
    }
}

impl<A> Default for Piece<A> {
    fn default() -> Self {
        Self {
            name: None,
            args: Vec::new(),
            kwargs: Kwargs::new(),
        }
    }
}

/// Pieces keyed by the keys declared at construction.
///
/// Keys are never added or removed after `init_pieces`.
#[derive(Debug, Clone, PartialEq)]
pub struct PieceRegistry<K: Ord, A> {
    pieces: BTreeMap<K, Piece<A>>,
}

impl<K, A> PieceRegistry<K, A>
where
    K: Clone + Ord + fmt::Debug,
    A: Algorithm,
{
    /// Declare every key with the default (unset) piece
    pub fn init_pieces<I: IntoIterator<Item = K>>(keys: I) -> Self {
        Self {
            pieces: keys.into_iter().map(|k| (k, Piece::default())).collect(),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.pieces.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.pieces.keys()
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn get(&self, key: &K) -> Result<&Piece<A>> {
        self.pieces.get(key).ok_or_else(|| self.unknown_key(key))
    }

    pub fn check_key(&self, key: &K) -> Result<()> {
        if self.contains(key) {
            Ok(())
        } else {
            Err(self.unknown_key(key))
        }
    }

    fn insert(&mut self, key: K, piece: Piece<A>) -> Result<()> {
        match self.pieces.get_mut(&key) {
            Some(slot) => {
                *slot = piece;
                Ok(())
            }
            None => Err(self.unknown_key(&key)),
        }
    }

    fn unknown_key(&self, key: &K) -> PipeError {
        PipeError::UnknownPieceKey {
            key: format!("{:?}", key),
            valid: self.pieces.keys().map(|k| format!("{:?}", k)).collect(),
        }
    }
}

/// What `build_model` hands to the consumer
#[derive(Debug, Clone, PartialEq)]
pub struct Built<A> {
    pub data: Value,
    pub algorithm: Option<A>,
    pub kwargs: Kwargs,
}

/// Mixin for stages that defer algorithm selection to run time
pub trait Builder {
    type Key: Clone + Ord + fmt::Debug;
    type Algorithm: Algorithm;

    fn pieces(&self) -> &PieceRegistry<Self::Key, Self::Algorithm>;

    fn pieces_mut(&mut self) -> &mut PieceRegistry<Self::Key, Self::Algorithm>;

    /// Validate a key and name pair before it is stored.
    ///
    /// Implementors narrowing the accepted names per key override this.
    fn check_name(&self, key: &Self::Key, name: &str) -> Result<Self::Algorithm> {
        self.pieces().check_key(key)?;

        if name.is_empty() {
            return Err(PipeError::InvalidPieceName {
                key: format!("{:?}", key),
                name: name.to_string(),
                expected: Self::Algorithm::names(),
            });
        }

        Self::Algorithm::from_name(name).ok_or_else(|| PipeError::InvalidPieceName {
            key: format!("{:?}", key),
            name: name.to_string(),
            expected: Self::Algorithm::names(),
        })
    }

    /// Select the algorithm and arguments used for `key`
    fn set_piece(
        &mut self,
        key: Self::Key,
        name: &str,
        args: Vec<JsonValue>,
        kwargs: Kwargs,
    ) -> Result<&mut Self>
    where
        Self: Sized,
    {
        let algorithm = self.check_name(&key, name)?;
        algorithm.check_kwargs(&kwargs)?;
        self.pieces_mut()
            .insert(key, Piece::new(algorithm, args, kwargs))?;
        Ok(self)
    }

    /// Pair `data` with the selection stored under `key`
    fn build_model(&self, data: Value, key: &Self::Key) -> Result<Built<Self::Algorithm>> {
        let piece = self.pieces().get(key)?;
        Ok(Built {
            data,
            algorithm: piece.name(),
            kwargs: piece.kwargs().clone(),
        })
    }
}
