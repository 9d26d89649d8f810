//! Derive macro for mapped entities.
//!
//! This crate provides `#[derive(Entity)]`, which turns a struct with named
//! fields into an `oxide_mapper::Entity`: a static field table carrying each
//! field's `#[column("...")]` tag, plus by-name accessors used for writing
//! statements, scanning rows and assigning loaded associations.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Fields, GenericArgument, Ident, LitStr, Meta,
    PathArguments, Type,
};

/// Derives `oxide_mapper::Entity`, `Mapped` and `Record` for a struct.
///
/// # Field Attributes
///
/// - `#[column("name")]` - Maps the field to column `name` (defaults to the
///   field name)
/// - `#[column("name,pk,autoincrement,table=users")]` - Adds modifiers:
///   `pk`/`primarykey`, `autoincrement`/`serial`, `table=<name>`
/// - `#[column("-")]` - Transient field, never read or written
/// - `#[column("oneToMany=order_id")]` - `Vec<T>` or `Vec<Box<T>>` filled
///   with the `T` rows whose `order_id` equals this row's primary key
/// - `#[column("oneToOne=order_id")]` - `Option<T>` or `Option<Box<T>>`
///   filled with the `T` row whose primary key equals this row's `order_id`
///
/// Fields of a kind that can never hold a column (function and raw
/// pointers, trait objects, maps, sets, channel endpoints) are skipped.
/// The struct must implement `Default`, and association targets `Clone`.
#[proc_macro_derive(Entity, attributes(column))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_entity_impl(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

enum Kind {
    Column,
    Transient,
    OneToMany,
    OneToOne,
}

struct FieldInfo {
    ident: Ident,
    ty: Type,
    tag: Option<String>,
    kind: Kind,
}

fn derive_entity_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let type_name = struct_name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Entity derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Entity derive only supports structs",
            ));
        }
    };

    let mut infos = Vec::new();
    for field in fields {
        if is_unmappable(&field.ty) {
            continue;
        }
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let tag = parse_tag(&field.attrs)?;
        let kind = classify(tag.as_deref());
        infos.push(FieldInfo {
            ident,
            ty: field.ty.clone(),
            tag,
            kind,
        });
    }

    let field_defs = infos.iter().map(field_def);

    let getters = infos
        .iter()
        .filter(|info| matches!(info.kind, Kind::Column))
        .map(|info| {
            let ident = &info.ident;
            let name = ident.to_string();
            quote! {
                #name => ::core::option::Option::Some(::oxide_mapper::ToValue::to_value(&self.#ident)),
            }
        });

    let setters = infos
        .iter()
        .filter(|info| matches!(info.kind, Kind::Column))
        .map(|info| {
            let ident = &info.ident;
            let name = ident.to_string();
            quote! {
                #name => {
                    self.#ident = ::oxide_mapper::FromValue::from_value(value)?;
                    ::core::result::Result::Ok(true)
                }
            }
        });

    let assigners = infos.iter().filter_map(assigner);

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::oxide_mapper::Entity for #struct_name #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;

            const FIELDS: &'static [::oxide_mapper::FieldDef] = &[
                #(#field_defs),*
            ];

            #[allow(unused_variables)]
            fn field_value(&self, field: &str) -> ::core::option::Option<::oxide_mapper::Value> {
                match field {
                    #(#getters)*
                    _ => ::core::option::Option::None,
                }
            }

            #[allow(unused_variables)]
            fn set_field(
                &mut self,
                field: &str,
                value: ::oxide_mapper::Value,
            ) -> ::core::result::Result<bool, ::oxide_mapper::ValueError> {
                match field {
                    #(#setters)*
                    _ => ::core::result::Result::Ok(false),
                }
            }

            #[allow(unused_variables)]
            fn assign_association(
                &mut self,
                field: &str,
                children: &::oxide_mapper::Children,
                key: &::oxide_mapper::Value,
            ) -> ::oxide_mapper::Result<()> {
                match field {
                    #(#assigners)*
                    _ => {}
                }
                ::core::result::Result::Ok(())
            }
        }

        #[automatically_derived]
        impl #impl_generics ::oxide_mapper::Mapped for #struct_name #ty_generics #where_clause {
            type Entity = Self;
        }

        #[automatically_derived]
        impl #impl_generics ::oxide_mapper::Record for #struct_name #ty_generics #where_clause {
            fn from_entity(entity: Self) -> Self {
                entity
            }
        }
    })
}

/// Reads the string of the single `#[column("...")]` attribute, if any.
fn parse_tag(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut tag = None;
    for attr in attrs {
        if !attr.path().is_ident("column") {
            continue;
        }
        // Handle empty attribute like #[column]
        if matches!(attr.meta, Meta::Path(_)) {
            continue;
        }
        if tag.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                "a field takes at most one #[column(\"...\")] attribute",
            ));
        }
        let lit: LitStr = attr.parse_args()?;
        tag = Some(lit.value());
    }
    Ok(tag)
}

fn classify(tag: Option<&str>) -> Kind {
    let Some(tag) = tag.map(str::trim) else {
        return Kind::Column;
    };
    if tag.starts_with("oneToMany") {
        Kind::OneToMany
    } else if tag.starts_with("oneToOne") {
        Kind::OneToOne
    } else if tag.split(',').next().map(str::trim) == Some("-") {
        Kind::Transient
    } else {
        Kind::Column
    }
}

/// Where an association field stores its children.
struct Target<'a> {
    ty: &'a Type,
    boxed: bool,
}

fn association_target(info: &FieldInfo) -> Option<Target<'_>> {
    let container = match info.kind {
        Kind::OneToMany => "Vec",
        Kind::OneToOne => "Option",
        Kind::Column | Kind::Transient => return None,
    };
    let inner = single_generic(&info.ty, container)?;
    Some(match single_generic(inner, "Box") {
        Some(ty) if !matches!(ty, Type::TraitObject(_)) => Target { ty, boxed: true },
        _ => Target {
            ty: inner,
            boxed: false,
        },
    })
}

fn field_def(info: &FieldInfo) -> TokenStream2 {
    let name = info.ident.to_string();
    let ty = &info.ty;
    let rust_type = quote!(#ty).to_string().replace(' ', "");
    let tag = match &info.tag {
        Some(tag) => quote! { ::core::option::Option::Some(#tag) },
        None => quote! { ::core::option::Option::None },
    };
    let target = match association_target(info) {
        Some(Target { ty, .. }) => quote! {
            ::core::option::Option::Some(::oxide_mapper::AssociationTarget::of::<#ty>())
        },
        None => quote! { ::core::option::Option::None },
    };
    quote! {
        ::oxide_mapper::FieldDef {
            name: #name,
            tag: #tag,
            rust_type: #rust_type,
            target: #target,
        }
    }
}

fn assigner(info: &FieldInfo) -> Option<TokenStream2> {
    if matches!(info.kind, Kind::Column | Kind::Transient) {
        return None;
    }
    let ident = &info.ident;
    let name = ident.to_string();
    let Some(Target { ty, boxed }) = association_target(info) else {
        return Some(quote! {
            #name => {
                return ::core::result::Result::Err(::oxide_mapper::OrmError::AssociationShape {
                    type_name: <Self as ::oxide_mapper::Entity>::TYPE_NAME,
                    field: ::std::string::ToString::to_string(field),
                });
            }
        });
    };

    let load = match info.kind {
        Kind::OneToMany if boxed => quote! {
            children
                .matching::<#ty>(<Self as ::oxide_mapper::Entity>::TYPE_NAME, field, key)?
                .into_iter()
                .map(::std::boxed::Box::new)
                .collect()
        },
        Kind::OneToMany => quote! {
            children.matching::<#ty>(<Self as ::oxide_mapper::Entity>::TYPE_NAME, field, key)?
        },
        _ if boxed => quote! {
            children
                .first::<#ty>(<Self as ::oxide_mapper::Entity>::TYPE_NAME, field, key)?
                .map(::std::boxed::Box::new)
        },
        _ => quote! {
            children.first::<#ty>(<Self as ::oxide_mapper::Entity>::TYPE_NAME, field, key)?
        },
    };
    Some(quote! {
        #name => {
            self.#ident = #load;
        }
    })
}

/// Returns `T` when `ty` is `<wrapper><T>` (matched on the last path segment).
fn single_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    let mut types = args.args.iter().filter_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    });
    let first = types.next()?;
    types.next().is_none().then_some(first)
}

const UNMAPPABLE: &[&str] = &[
    "HashMap",
    "BTreeMap",
    "HashSet",
    "BTreeSet",
    "Sender",
    "SyncSender",
    "Receiver",
    "UnboundedSender",
    "UnboundedReceiver",
];

/// Field kinds that can never be a column or an association.
fn is_unmappable(ty: &Type) -> bool {
    match ty {
        Type::BareFn(_) | Type::Ptr(_) | Type::TraitObject(_) | Type::ImplTrait(_) => true,
        Type::Paren(inner) => is_unmappable(&inner.elem),
        Type::Group(inner) => is_unmappable(&inner.elem),
        Type::Path(path) => path.path.segments.last().is_some_and(|segment| {
            UNMAPPABLE.iter().any(|name| segment.ident == name)
                || single_generic(ty, "Box").is_some_and(|inner| matches!(inner, Type::TraitObject(_)))
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_tags() {
        assert!(matches!(classify(None), Kind::Column));
        assert!(matches!(classify(Some("id,pk")), Kind::Column));
        assert!(matches!(classify(Some("-")), Kind::Transient));
        assert!(matches!(classify(Some(" - ,pk")), Kind::Transient));
        assert!(matches!(classify(Some("oneToMany=order_id")), Kind::OneToMany));
        assert!(matches!(classify(Some("oneToOne=order_id")), Kind::OneToOne));
    }

    #[test]
    fn test_unmappable_kinds_are_detected() {
        let skipped: [Type; 6] = [
            syn::parse_quote!(fn(i64) -> i64),
            syn::parse_quote!(*const u8),
            syn::parse_quote!(std::collections::HashMap<String, i64>),
            syn::parse_quote!(std::sync::mpsc::Sender<i64>),
            syn::parse_quote!(Box<dyn Fn()>),
            syn::parse_quote!(dyn std::fmt::Debug),
        ];
        for ty in &skipped {
            assert!(is_unmappable(ty), "{}", quote!(#ty));
        }

        let kept: [Type; 3] = [
            syn::parse_quote!(Option<f64>),
            syn::parse_quote!(Vec<Box<OrderItem>>),
            syn::parse_quote!(Box<i64>),
        ];
        for ty in &kept {
            assert!(!is_unmappable(ty), "{}", quote!(#ty));
        }
    }

    #[test]
    fn test_association_shapes() {
        let info = |ty: Type, kind| FieldInfo {
            ident: syn::parse_quote!(items),
            ty,
            tag: None,
            kind,
        };

        let many = info(syn::parse_quote!(Vec<Box<OrderItem>>), Kind::OneToMany);
        let target = association_target(&many).unwrap();
        assert!(target.boxed);

        let one = info(syn::parse_quote!(Option<Order>), Kind::OneToOne);
        let target = association_target(&one).unwrap();
        assert!(!target.boxed);

        let wrong = info(syn::parse_quote!(Order), Kind::OneToOne);
        assert!(association_target(&wrong).is_none());
    }
}
