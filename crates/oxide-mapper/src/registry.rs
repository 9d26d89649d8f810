//! Type registry: descriptors built once per mapped type and cached.
//!
//! A descriptor is derived from an entity's raw field table by parsing each
//! field's tag:
//!
//! ```text
//! <column-or-"-">[,pk|primarykey][,autoincrement|serial][,table=<name>]
//! oneToOne=<local foreign-key field>
//! oneToMany=<child foreign-key field>
//! ```
//!
//! Fields without a tag map to a column named exactly like the field.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::entity::{AssociationTarget, Entity, FieldDef, Mapped};
use crate::error::{OrmError, Result};

/// Column mapping of a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Rust field name.
    pub name: &'static str,
    /// Column name; empty for transient fields.
    pub column: String,
    /// Declared Rust type.
    pub rust_type: &'static str,
    /// Marked `pk`/`primarykey`.
    pub primary_key: bool,
    /// Marked `autoincrement`/`serial`.
    pub auto_increment: bool,
    /// Marked `-`: never read from or written to the database.
    pub transient: bool,
}

/// A field holding the single row its local foreign key points at.
#[derive(Debug, Clone)]
pub struct OneToOne {
    /// Association field.
    pub field: &'static str,
    /// Local field holding the foreign-key value.
    pub foreign_key_field: String,
    owner: &'static str,
    target: Option<AssociationTarget>,
}

/// A field holding every child row whose foreign key points back here.
#[derive(Debug, Clone)]
pub struct OneToMany {
    /// Association field.
    pub field: &'static str,
    /// Container type as declared (`Vec<OrderItem>`).
    pub container_type: &'static str,
    /// Field on the child holding the parent's primary key.
    pub foreign_key_field: String,
    owner: &'static str,
    target: Option<AssociationTarget>,
}

fn require_target(
    target: Option<AssociationTarget>,
    owner: &'static str,
    field: &str,
) -> Result<AssociationTarget> {
    target.ok_or_else(|| OrmError::AssociationShape {
        type_name: owner,
        field: field.to_string(),
    })
}

impl OneToOne {
    /// Name of the target type, if the field shape carries one.
    #[must_use]
    pub fn target_type(&self) -> Option<&'static str> {
        self.target.map(|t| t.type_name)
    }

    pub(crate) fn target(&self) -> Result<AssociationTarget> {
        require_target(self.target, self.owner, self.field)
    }

    /// Descriptor of the target type.
    ///
    /// # Errors
    ///
    /// Fails with `AssociationShape` when the field is not `Option<T>`, or
    /// with whatever describing the target fails with.
    pub fn describe_target(&self, registry: &Registry) -> Result<Arc<TypeDescriptor>> {
        (self.target()?.describe)(registry)
    }

    /// Table of the target type.
    ///
    /// # Errors
    ///
    /// Fails with `NoTableName` when the target declares none.
    pub fn table_name(&self, registry: &Registry) -> Result<String> {
        Ok(self.describe_target(registry)?.require_table()?.to_string())
    }

    /// Primary-key column of the target type.
    ///
    /// # Errors
    ///
    /// Fails with `NoPrimaryKey` when the target declares none.
    pub fn column_name(&self, registry: &Registry) -> Result<String> {
        Ok(self
            .describe_target(registry)?
            .require_primary_key()?
            .column
            .clone())
    }
}

impl OneToMany {
    /// Name of the element type, if the field shape carries one.
    #[must_use]
    pub fn element_type(&self) -> Option<&'static str> {
        self.target.map(|t| t.type_name)
    }

    pub(crate) fn target(&self) -> Result<AssociationTarget> {
        require_target(self.target, self.owner, self.field)
    }

    /// Descriptor of the element type.
    ///
    /// # Errors
    ///
    /// Fails with `AssociationShape` when the field is not a `Vec`.
    pub fn describe_target(&self, registry: &Registry) -> Result<Arc<TypeDescriptor>> {
        (self.target()?.describe)(registry)
    }

    /// Table of the element type.
    ///
    /// # Errors
    ///
    /// Fails with `NoTableName` when the element type declares none.
    pub fn table_name(&self, registry: &Registry) -> Result<String> {
        Ok(self.describe_target(registry)?.require_table()?.to_string())
    }

    /// Column of the child's foreign-key field.
    ///
    /// # Errors
    ///
    /// Fails with `Mapping` when the element type has no such column field.
    pub fn column_name(&self, registry: &Registry) -> Result<String> {
        let target = self.describe_target(registry)?;
        target
            .field(&self.foreign_key_field)
            .filter(|f| !f.transient)
            .map(|f| f.column.clone())
            .ok_or_else(|| {
                OrmError::mapping(
                    self.owner,
                    self.field,
                    format!(
                        "{} has no column field named `{}`",
                        target.type_name(),
                        self.foreign_key_field
                    ),
                )
            })
    }
}

/// Cached mapping metadata for one entity type.
#[derive(Debug)]
pub struct TypeDescriptor {
    type_name: &'static str,
    table_name: Option<String>,
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<&'static str, usize>,
    by_column: HashMap<String, usize>,
    one_to_one: Vec<OneToOne>,
    one_to_many: Vec<OneToMany>,
    associations: Vec<&'static str>,
    primary_key: Option<usize>,
    auto_increment: Option<usize>,
}

enum Tag<'a> {
    Column {
        name: &'a str,
        primary_key: bool,
        auto_increment: bool,
        table: Option<&'a str>,
    },
    Transient,
    OneToOne(&'a str),
    OneToMany(&'a str),
}

fn parse_association<'a>(
    type_name: &'static str,
    def: &FieldDef,
    kind: &str,
    rest: &'a str,
) -> Result<&'a str> {
    rest.strip_prefix('=')
        .map(str::trim)
        .filter(|rhs| !rhs.is_empty())
        .ok_or_else(|| {
            OrmError::mapping(
                type_name,
                def.name,
                format!(
                    "invalid {kind} specification `{}`, expected {kind}=<FieldName>",
                    def.tag.unwrap_or_default()
                ),
            )
        })
}

fn parse_tag(type_name: &'static str, def: &FieldDef) -> Result<Tag<'static>> {
    let Some(tag) = def.tag.map(str::trim) else {
        return Ok(Tag::Column {
            name: def.name,
            primary_key: false,
            auto_increment: false,
            table: None,
        });
    };

    if let Some(rest) = tag.strip_prefix("oneToMany") {
        return parse_association(type_name, def, "oneToMany", rest).map(Tag::OneToMany);
    }
    if let Some(rest) = tag.strip_prefix("oneToOne") {
        return parse_association(type_name, def, "oneToOne", rest).map(Tag::OneToOne);
    }

    let mut parts = tag.split(',').map(str::trim);
    let name = parts.next().unwrap_or_default();
    if name == "-" {
        return Ok(Tag::Transient);
    }

    let mut primary_key = false;
    let mut auto_increment = false;
    let mut table = None;
    for part in parts {
        if part.eq_ignore_ascii_case("pk") || part.eq_ignore_ascii_case("primarykey") {
            primary_key = true;
        } else if part.eq_ignore_ascii_case("autoincrement") || part.eq_ignore_ascii_case("serial")
        {
            auto_increment = true;
        } else if let Some(value) = part.strip_prefix("table") {
            let value = value.strip_prefix('=').map(str::trim).unwrap_or_default();
            if value.is_empty() {
                return Err(OrmError::mapping(
                    type_name,
                    def.name,
                    format!("invalid table specification `{part}`, expected table=<name>"),
                ));
            }
            table = Some(value);
        }
    }

    Ok(Tag::Column {
        name: if name.is_empty() { def.name } else { name },
        primary_key,
        auto_increment,
        table,
    })
}

impl TypeDescriptor {
    /// Builds the descriptor of `type_name` from its raw field table.
    ///
    /// # Errors
    ///
    /// Fails with `Mapping` on malformed tags, on more than one primary-key
    /// or auto-increment field, and on two fields sharing a column.
    pub fn build(type_name: &'static str, defs: &[FieldDef]) -> Result<Self> {
        let mut descriptor = Self {
            type_name,
            table_name: None,
            fields: Vec::with_capacity(defs.len()),
            by_name: HashMap::with_capacity(defs.len()),
            by_column: HashMap::with_capacity(defs.len()),
            one_to_one: Vec::new(),
            one_to_many: Vec::new(),
            associations: Vec::new(),
            primary_key: None,
            auto_increment: None,
        };

        for def in defs {
            match parse_tag(type_name, def)? {
                Tag::OneToOne(fk) => {
                    descriptor.associations.push(def.name);
                    descriptor.one_to_one.push(OneToOne {
                        field: def.name,
                        foreign_key_field: fk.to_string(),
                        owner: type_name,
                        target: def.target,
                    });
                }
                Tag::OneToMany(fk) => {
                    descriptor.associations.push(def.name);
                    descriptor.one_to_many.push(OneToMany {
                        field: def.name,
                        container_type: def.rust_type,
                        foreign_key_field: fk.to_string(),
                        owner: type_name,
                        target: def.target,
                    });
                }
                Tag::Transient => descriptor.push_field(FieldDescriptor {
                    name: def.name,
                    column: String::new(),
                    rust_type: def.rust_type,
                    primary_key: false,
                    auto_increment: false,
                    transient: true,
                })?,
                Tag::Column {
                    name,
                    primary_key,
                    auto_increment,
                    table,
                } => {
                    if let Some(table) = table {
                        descriptor.table_name = Some(table.to_string());
                    }
                    descriptor.push_field(FieldDescriptor {
                        name: def.name,
                        column: name.to_string(),
                        rust_type: def.rust_type,
                        primary_key,
                        auto_increment,
                        transient: false,
                    })?;
                }
            }
        }

        Ok(descriptor)
    }

    fn push_field(&mut self, field: FieldDescriptor) -> Result<()> {
        let index = self.fields.len();
        if field.primary_key {
            if let Some(existing) = self.primary_key {
                return Err(OrmError::mapping(
                    self.type_name,
                    field.name,
                    format!(
                        "second primary key, `{}` is already one",
                        self.fields[existing].name
                    ),
                ));
            }
            self.primary_key = Some(index);
        }
        if field.auto_increment {
            if let Some(existing) = self.auto_increment {
                return Err(OrmError::mapping(
                    self.type_name,
                    field.name,
                    format!(
                        "second auto-increment field, `{}` is already one",
                        self.fields[existing].name
                    ),
                ));
            }
            self.auto_increment = Some(index);
        }
        if !field.transient {
            if let Some(&existing) = self.by_column.get(&field.column) {
                return Err(OrmError::mapping(
                    self.type_name,
                    field.name,
                    format!(
                        "column `{}` is already mapped by `{}`",
                        field.column, self.fields[existing].name
                    ),
                ));
            }
            self.by_column.insert(field.column.clone(), index);
        }
        self.by_name.insert(field.name, index);
        self.fields.push(field);
        Ok(())
    }

    /// Rust name of the described type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Table name from a `table=` modifier, if any.
    #[must_use]
    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    /// Table name, required.
    ///
    /// # Errors
    ///
    /// Fails with `NoTableName` when no field declared one.
    pub fn require_table(&self) -> Result<&str> {
        self.table_name()
            .ok_or(OrmError::NoTableName(self.type_name))
    }

    /// Column and transient fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by Rust field name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Looks up a non-transient field by column name.
    #[must_use]
    pub fn field_by_column(&self, column: &str) -> Option<&FieldDescriptor> {
        self.by_column.get(column).map(|&i| &self.fields[i])
    }

    /// Columns of all non-transient fields in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns().map(|f| f.column.as_str()).collect()
    }

    /// Non-transient fields in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.transient)
    }

    /// The primary-key field, if declared.
    #[must_use]
    pub fn primary_key(&self) -> Option<&FieldDescriptor> {
        self.primary_key.map(|i| &self.fields[i])
    }

    /// The primary-key field, required.
    ///
    /// # Errors
    ///
    /// Fails with `NoPrimaryKey` when no field is marked `pk`.
    pub fn require_primary_key(&self) -> Result<&FieldDescriptor> {
        self.primary_key()
            .ok_or(OrmError::NoPrimaryKey(self.type_name))
    }

    /// The auto-increment field, if declared.
    #[must_use]
    pub fn auto_increment_field(&self) -> Option<&FieldDescriptor> {
        self.auto_increment.map(|i| &self.fields[i])
    }

    /// One-to-one association by field name.
    #[must_use]
    pub fn one_to_one(&self, field: &str) -> Option<&OneToOne> {
        self.one_to_one.iter().find(|a| a.field == field)
    }

    /// One-to-many association by field name.
    #[must_use]
    pub fn one_to_many(&self, field: &str) -> Option<&OneToMany> {
        self.one_to_many.iter().find(|a| a.field == field)
    }

    /// Names of all association fields in declaration order.
    #[must_use]
    pub fn association_names(&self) -> &[&'static str] {
        &self.associations
    }
}

/// Process-lifetime cache of type descriptors, keyed by type identity.
///
/// Lookups take a shared lock; a miss builds the descriptor without holding
/// the lock and inserts it first-writer-wins, so every caller observes the
/// same `Arc`.
#[derive(Debug, Default)]
pub struct Registry {
    cache: RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by sessions that were not given one.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<Registry>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::new())))
    }

    /// Describes the entity behind `M` (`T`, `Box<T>`, `Vec<T>`, ...).
    ///
    /// # Errors
    ///
    /// Fails with `Mapping` when the entity's tags are invalid.
    pub fn describe<M: Mapped + ?Sized>(&self) -> Result<Arc<TypeDescriptor>> {
        self.describe_entity::<M::Entity>()
    }

    /// Describes entity `E`.
    ///
    /// # Errors
    ///
    /// Fails with `Mapping` when the entity's tags are invalid.
    pub fn describe_entity<E: Entity>(&self) -> Result<Arc<TypeDescriptor>> {
        let key = TypeId::of::<E>();
        if let Some(found) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(found));
        }

        let built = Arc::new(TypeDescriptor::build(E::TYPE_NAME, E::FIELDS)?);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let entry = cache.entry(key).or_insert_with(|| {
            debug!(
                type_name = E::TYPE_NAME,
                table = built.table_name().unwrap_or_default(),
                "Registered type"
            );
            Arc::clone(&built)
        });
        Ok(Arc::clone(entry))
    }

    /// Number of cached descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing has been described yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
