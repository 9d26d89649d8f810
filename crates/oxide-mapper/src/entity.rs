//! The mapping contract implemented by `#[derive(Entity)]`.
//!
//! The derive emits the raw field table of a struct (names, tag strings,
//! declared types, association targets) together with by-name accessors.
//! Everything else, tag parsing included, happens once in the
//! [`Registry`](crate::Registry).

use std::fmt;
use std::sync::Arc;

use crate::association::Children;
use crate::db::RowSet;
use crate::error::Result;
use crate::registry::{Registry, TypeDescriptor};
use crate::value::{Value, ValueError};

/// Looks up the descriptor of an association's far type.
pub type DescribeFn = fn(&Registry) -> Result<Arc<TypeDescriptor>>;

/// Scans a batch of child rows into a type-erased [`Children`] set.
pub type HydrateFn = fn(&TypeDescriptor, &RowSet, &str) -> Result<Children>;

/// A struct field as seen by the derive.
#[derive(Clone, Copy)]
pub struct FieldDef {
    /// Rust field name.
    pub name: &'static str,
    /// Contents of the `#[column("...")]` attribute, if any.
    pub tag: Option<&'static str>,
    /// Declared type, as written.
    pub rust_type: &'static str,
    /// Far side of an association field; `None` for columns and for
    /// association fields whose shape cannot hold a mapped type.
    pub target: Option<AssociationTarget>,
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("rust_type", &self.rust_type)
            .field("target", &self.target)
            .finish()
    }
}

/// Entry points into the far type of an association.
#[derive(Clone, Copy)]
pub struct AssociationTarget {
    /// Name of the far type.
    pub type_name: &'static str,
    /// Descriptor lookup for the far type.
    pub describe: DescribeFn,
    /// Row scanning for the far type.
    pub hydrate: HydrateFn,
}

impl fmt::Debug for AssociationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AssociationTarget")
            .field(&self.type_name)
            .finish()
    }
}

impl AssociationTarget {
    /// Target for entity type `C`.
    #[must_use]
    pub const fn of<C: Entity + Clone>() -> Self {
        Self {
            type_name: C::TYPE_NAME,
            describe: Registry::describe_entity::<C>,
            hydrate: Children::hydrate::<C>,
        }
    }
}

/// A struct mapped to table rows.
///
/// Implemented by `#[derive(Entity)]`; the default value is the zero state
/// that scanning starts from.
pub trait Entity: Default + 'static {
    /// Rust name of the type.
    const TYPE_NAME: &'static str;

    /// Mappable fields in declaration order.
    const FIELDS: &'static [FieldDef];

    /// Reads a column field by Rust field name.
    ///
    /// Returns `None` for transient, association and unknown fields.
    fn field_value(&self, field: &str) -> Option<Value>;

    /// Stores `value` into a column field.
    ///
    /// Returns `Ok(false)` when no writable field has that name.
    ///
    /// # Errors
    ///
    /// Returns a [`ValueError`] when the value does not fit the field's type.
    fn set_field(&mut self, field: &str, value: Value) -> std::result::Result<bool, ValueError>;

    /// Assigns the children matching `key` to an association field.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::AssociationShape`](crate::OrmError::AssociationShape)
    /// when the field cannot hold the children.
    fn assign_association(&mut self, field: &str, children: &Children, key: &Value)
        -> Result<()>;
}

/// Types whose descriptor is that of an entity they contain.
///
/// `T`, `Box<T>`, `Option<T>`, `Vec<T>`, slices, arrays, references and
/// `Arc<T>` all resolve to `T`.
pub trait Mapped {
    /// The entity behind the container.
    type Entity: Entity;
}

impl<T: Mapped + ?Sized> Mapped for Box<T> {
    type Entity = T::Entity;
}

impl<T: Mapped + ?Sized> Mapped for &T {
    type Entity = T::Entity;
}

impl<T: Mapped + ?Sized> Mapped for Arc<T> {
    type Entity = T::Entity;
}

impl<T: Mapped> Mapped for Option<T> {
    type Entity = T::Entity;
}

impl<T: Mapped> Mapped for Vec<T> {
    type Entity = T::Entity;
}

impl<T: Mapped> Mapped for [T] {
    type Entity = T::Entity;
}

impl<T: Mapped, const N: usize> Mapped for [T; N] {
    type Entity = T::Entity;
}

/// Destination shapes a fetch can produce: `T` or `Box<T>`.
pub trait Record: Mapped + Sized {
    /// Wraps a freshly scanned entity.
    fn from_entity(entity: Self::Entity) -> Self;
}

impl<T: Record> Record for Box<T> {
    fn from_entity(entity: Self::Entity) -> Self {
        Self::new(T::from_entity(entity))
    }
}
