use crate::{Encoder, Error, Result, Vector};
use ahash::AHashMap;
use rayon::prelude::*;
use std::fmt::Display;
use std::hash::Hash;

/// Immutable, insertion-ordered collection of embeddings.
///
/// Identities and vectors live in parallel arrays indexed by position; the
/// position of an item never changes once the store is built, which is what
/// rank tie-breaking relies on.
#[derive(Debug, Clone)]
pub struct EmbeddingStore<K = crate::ItemId> {
    ids: Vec<K>,
    vectors: Vec<Vector>,
    positions: AHashMap<K, usize>,
    dim: usize,
}

impl<K> EmbeddingStore<K>
where
    K: Eq + Hash + Clone + Display,
{
    /// Encode every text once and assemble a store aligned with `ids`.
    ///
    /// Encoder calls run on the current rayon pool; results are re-joined by
    /// index, never by completion order. Any encoder failure aborts the build.
    pub fn build<S>(ids: Vec<K>, texts: &[S], encoder: &dyn Encoder) -> Result<Self>
    where
        S: AsRef<str> + Sync,
    {
        if ids.len() != texts.len() {
            return Err(Error::InvalidConfig(format!(
                "{} ids but {} texts",
                ids.len(),
                texts.len()
            )));
        }
        Self::check_unique(&ids)?;

        let vectors: Vec<Vector> = texts
            .par_iter()
            .enumerate()
            .map(|(i, text)| {
                encoder
                    .encode(text.as_ref())
                    .map(Vector::new)
                    .map_err(|e| Error::encoding_at(i, e))
            })
            .collect::<Result<Vec<_>>>()?;

        if let (Some(declared), Some(first)) = (encoder.dimension(), vectors.first()) {
            if first.dim() != declared {
                return Err(Error::DimensionMismatch {
                    expected: declared,
                    actual: first.dim(),
                });
            }
        }

        Self::from_vectors(ids, vectors)
    }

    /// Assemble a store from already computed vectors
    pub fn from_vectors(ids: Vec<K>, vectors: Vec<Vector>) -> Result<Self> {
        if ids.len() != vectors.len() {
            return Err(Error::InvalidConfig(format!(
                "{} ids but {} vectors",
                ids.len(),
                vectors.len()
            )));
        }

        let dim = vectors.first().map(Vector::dim).unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.dim() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: bad.dim(),
            });
        }
        if vectors.first().is_some() && dim == 0 {
            return Err(Error::InvalidConfig("zero-length embedding".to_string()));
        }

        let positions = Self::check_unique(&ids)?;

        Ok(Self {
            ids,
            vectors,
            positions,
            dim,
        })
    }

    fn check_unique(ids: &[K]) -> Result<AHashMap<K, usize>> {
        let mut positions = AHashMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            if positions.insert(id.clone(), i).is_some() {
                return Err(Error::DuplicateId(id.to_string()));
            }
        }
        Ok(positions)
    }

    /// Get the vector stored for `id`
    pub fn get(&self, id: &K) -> Result<&Vector> {
        self.position(id)
            .map(|i| &self.vectors[i])
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Insertion position of `id`
    #[inline]
    pub fn position(&self, id: &K) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// All entries in insertion order
    pub fn all(&self) -> impl ExactSizeIterator<Item = (&K, &Vector)> + '_ {
        self.ids.iter().zip(self.vectors.iter())
    }

    #[inline]
    pub fn ids(&self) -> &[K] {
        &self.ids
    }

    #[inline]
    pub fn vectors(&self) -> &[Vector] {
        &self.vectors
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Vector dimension; 0 for an empty store
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EncoderError, HashEncoder, ItemId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns vectors whose length is the text length
    struct LengthEncoder;

    impl Encoder for LengthEncoder {
        fn encode(&self, text: &str) -> std::result::Result<Vec<f32>, EncoderError> {
            Ok(vec![1.0; text.len()])
        }

        fn name(&self) -> &str {
            "length"
        }
    }

    struct FailingEncoder {
        fail_on: &'static str,
        calls: AtomicUsize,
    }

    impl Encoder for FailingEncoder {
        fn encode(&self, text: &str) -> std::result::Result<Vec<f32>, EncoderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text == self.fail_on {
                Err(EncoderError::Failed("model crashed".to_string()))
            } else {
                Ok(vec![0.5, 0.5])
            }
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn ids(n: u64) -> Vec<ItemId> {
        (1..=n).map(ItemId::Integer).collect()
    }

    #[test]
    fn test_build_preserves_order() {
        let texts = ["red floral", "blue striped", "red floral frock", "linen", "wool"];
        let encoder = HashEncoder::new(32);
        let store = EmbeddingStore::build(ids(5), &texts, &encoder).unwrap();

        assert_eq!(store.len(), 5);
        assert_eq!(store.dim(), 32);
        for (i, (id, vector)) in store.all().enumerate() {
            assert_eq!(*id, ItemId::Integer(i as u64 + 1));
            assert_eq!(vector.as_slice(), encoder.encode(texts[i]).unwrap().as_slice());
        }
    }

    #[test]
    fn test_get_and_not_found() {
        let store = EmbeddingStore::build(ids(2), &["a", "b"], &HashEncoder::new(8)).unwrap();
        assert!(store.get(&ItemId::Integer(2)).is_ok());
        assert!(matches!(store.get(&ItemId::Integer(9)), Err(Error::NotFound(_))));
        assert_eq!(store.position(&ItemId::Integer(2)), Some(1));
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = EmbeddingStore::build(ids(2), &["ab", "abc"], &LengthEncoder);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_encoding_failure_aborts_build() {
        let encoder = FailingEncoder {
            fail_on: "bad",
            calls: AtomicUsize::new(0),
        };
        let result = EmbeddingStore::build(ids(3), &["ok", "bad", "ok"], &encoder);
        assert!(matches!(
            result,
            Err(Error::EncodingFailure { index: Some(1), .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dup = vec![ItemId::Integer(1), ItemId::Integer(1)];
        let result = EmbeddingStore::build(dup, &["a", "b"], &HashEncoder::new(8));
        assert!(matches!(result, Err(Error::DuplicateId(_))));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = EmbeddingStore::build(ids(3), &["a"], &HashEncoder::new(8));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_store() {
        let texts: [&str; 0] = [];
        let store = EmbeddingStore::<ItemId>::build(Vec::new(), &texts, &HashEncoder::new(8)).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.dim(), 0);
    }

    #[test]
    fn test_string_keys() {
        let store = EmbeddingStore::from_vectors(
            vec!["Cottagecore".to_string(), "Goth".to_string()],
            vec![Vector::new(vec![1.0, 0.0]), Vector::new(vec![0.0, 1.0])],
        )
        .unwrap();
        assert_eq!(store.get(&"Goth".to_string()).unwrap().as_slice(), &[0.0, 1.0]);
    }
}
