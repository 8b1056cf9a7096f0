//! Per-type cache of derived table shapes.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::extract::describe;
use crate::types::{Record, TableShape};
use crate::validate::ConfigError;

/// Caches the [`TableShape`] of each record type.
///
/// Shapes are derived on first use and kept for the lifetime of the
/// registry. Failed derivations are not cached.
///
/// # Examples
///
/// ```
/// use rowmap_core::{Record, ShapeRegistry};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Tag {
///     name: String,
/// }
///
/// impl Record for Tag {
///     type Key = String;
///     const PRIMARY_KEY: &'static str = "name";
///     fn primary_key(&self) -> &String {
///         &self.name
///     }
/// }
///
/// let registry = ShapeRegistry::new();
/// let first = registry.shape::<Tag>().unwrap();
/// let second = registry.shape::<Tag>().unwrap();
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// assert_eq!(registry.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ShapeRegistry {
    shapes: RwLock<HashMap<TypeId, Arc<TableShape>>>,
}

impl ShapeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached shape of `T`, deriving it on first use.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] reported by [`describe`].
    pub fn shape<T: Record>(&self) -> Result<Arc<TableShape>, ConfigError> {
        let id = TypeId::of::<T>();
        if let Some(shape) = self
            .shapes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
        {
            return Ok(Arc::clone(shape));
        }

        let shape = Arc::new(describe::<T>()?);
        let mut shapes = self.shapes.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(shapes.entry(id).or_insert(shape)))
    }

    /// Number of cached shapes.
    pub fn len(&self) -> usize {
        self.shapes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no shape has been derived yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
