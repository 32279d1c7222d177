//! Code generation for `#[derive(Seekable)]`.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    spanned::Spanned, Data, DeriveInput, Error, Fields, GenericArgument, Ident, PathArguments,
    Result, Type,
};

use super::attrs::{parse_seek_attrs, SeekKind};

/// How a field wraps its element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Plain,
    Optional,
    List,
    OptionalList,
}

/// Splits `Option<..>` and `Vec<..>` wrappers off a field type.
fn shape_of(ty: &Type) -> (Shape, &Type) {
    match wrapper(ty, "Option") {
        Some(inner) => match wrapper(inner, "Vec") {
            Some(element) => (Shape::OptionalList, element),
            None => (Shape::Optional, inner),
        },
        None => match wrapper(ty, "Vec") {
            Some(element) => (Shape::List, element),
            None => (Shape::Plain, ty),
        },
    }
}

fn wrapper<'a>(ty: &'a Type, name: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != name {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first() {
        Some(GenericArgument::Type(inner)) if args.args.len() == 1 => Some(inner),
        _ => None,
    }
}

/// Converts a reference to one element into a `Value`.
fn element_value(kind: SeekKind, v: &Ident) -> TokenStream {
    match kind {
        SeekKind::String => quote! {
            ::seekspec::Value::String(::core::convert::AsRef::<str>::as_ref(#v))
        },
        SeekKind::Number => quote! {
            ::seekspec::Value::Number(::seekspec::Number::from(*#v))
        },
        SeekKind::Timestamp => quote! {
            ::seekspec::Value::Timestamp(::seekspec::SeekerTimestamp::seeker_timestamp(#v))
        },
        SeekKind::Uuid => quote! { ::seekspec::Value::Uuid(*#v) },
        SeekKind::Enum => quote! {
            ::seekspec::Value::Enum(::seekspec::SeekerEnum::seeker_discriminant(#v))
        },
        SeekKind::Bool => quote! { ::seekspec::Value::Bool(*#v) },
        SeekKind::Object => quote! { ::seekspec::Value::Object(#v) },
    }
}

fn field_def(kind: SeekKind, name: &str, element: &Type, shape: Shape) -> TokenStream {
    let base = match kind {
        SeekKind::String => quote! { ::seekspec::FieldDef::string(#name) },
        SeekKind::Number => quote! { ::seekspec::FieldDef::number(#name) },
        SeekKind::Timestamp => quote! { ::seekspec::FieldDef::timestamp(#name) },
        SeekKind::Uuid => quote! { ::seekspec::FieldDef::uuid(#name) },
        SeekKind::Enum => quote! {
            ::seekspec::FieldDef::enumeration(#name, <#element as ::seekspec::SeekerEnum>::VARIANTS)
        },
        SeekKind::Bool => quote! { ::seekspec::FieldDef::boolean(#name) },
        SeekKind::Object => quote! {
            ::seekspec::FieldDef::object(#name, <#element as ::seekspec::Seekable>::schema)
        },
    };
    match shape {
        Shape::Plain => base,
        Shape::Optional => quote! { #base.nullable() },
        Shape::List => quote! { #base.list() },
        Shape::OptionalList => quote! { #base.list().nullable() },
    }
}

/// Main implementation of the Seekable derive macro.
pub fn seekable_derive_impl(input: DeriveInput) -> Result<TokenStream> {
    let struct_name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "Seekable cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(Error::new(
                    input.span(),
                    "Seekable can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new(
                input.span(),
                "Seekable can only be derived for structs",
            ))
        }
    };

    let mut field_defs: Vec<TokenStream> = Vec::new();
    let mut field_matches: Vec<TokenStream> = Vec::new();
    let mut field_constants: Vec<TokenStream> = Vec::new();
    let v = format_ident!("v");

    for field in fields.iter() {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new(field.span(), "expected named field"))?;

        let Some(attr) = parse_seek_attrs(&field.attrs)? else {
            continue;
        };
        if attr.skip {
            continue;
        }
        let Some(kind) = attr.kind else {
            continue;
        };

        let query_name = attr.rename.unwrap_or_else(|| field_name.to_string());
        let const_name = format_ident!("{}", to_screaming_snake_case(&query_name));
        field_constants.push(quote! {
            /// Field name constant for filter documents and sort strings.
            pub const #const_name: &'static str = #query_name;
        });

        let (shape, element) = shape_of(&field.ty);
        field_defs.push(field_def(kind, &query_name, element, shape));

        let one = element_value(kind, &v);
        let value_expr = match shape {
            Shape::Plain => quote! {{
                let #v = &self.#field_name;
                #one
            }},
            Shape::Optional => quote! {
                match &self.#field_name {
                    ::core::option::Option::Some(#v) => #one,
                    ::core::option::Option::None => ::seekspec::Value::None,
                }
            },
            Shape::List => quote! {
                ::seekspec::Value::List(self.#field_name.iter().map(|#v| #one).collect())
            },
            Shape::OptionalList => quote! {
                match &self.#field_name {
                    ::core::option::Option::Some(items) => {
                        ::seekspec::Value::List(items.iter().map(|#v| #one).collect())
                    }
                    ::core::option::Option::None => ::seekspec::Value::None,
                }
            },
        };
        field_matches.push(quote! {
            #query_name => #value_expr,
        });
    }

    let schema_name = struct_name.to_string();
    let expanded = quote! {
        impl #struct_name {
            #(#field_constants)*
        }

        impl ::seekspec::Seekable for #struct_name {
            fn schema() -> &'static ::seekspec::Schema {
                static SCHEMA: ::seekspec::Schema = ::seekspec::Schema::new(
                    #schema_name,
                    &[#(#field_defs),*],
                );
                &SCHEMA
            }

            fn seeker_field_value(&self, field: &str) -> ::seekspec::Value<'_> {
                match field {
                    #(#field_matches)*
                    _ => ::seekspec::Value::None,
                }
            }
        }
    };

    Ok(expanded)
}

/// Convert a string to SCREAMING_SNAKE_CASE.
fn to_screaming_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_was_lower = false;

    for c in s.chars() {
        if c.is_uppercase() {
            if prev_was_lower {
                result.push('_');
            }
            result.push(c);
            prev_was_lower = false;
        } else if c == '_' || c == '-' || c == '.' {
            result.push('_');
            prev_was_lower = false;
        } else {
            result.push(c.to_ascii_uppercase());
            prev_was_lower = c.is_alphanumeric();
        }
    }

    result
}
