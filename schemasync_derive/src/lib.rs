extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{Data, DeriveInput, Fields, GenericArgument, Ident, Lit, LitStr, PathArguments, Type, parse_macro_input};

const KINDS: [(&str, &str); 7] = [
    ("string", "String"),
    ("number", "Number"),
    ("boolean", "Boolean"),
    ("date", "Date"),
    ("array", "Array"),
    ("object", "Object"),
    ("any", "Any"),
];

/// Implements `schemasync::Entity` for a struct with named fields.
///
/// ```ignore
/// #[derive(Entity, Serialize, Deserialize)]
/// #[table(name = "users")]
/// pub struct User {
///     #[column(primary_key)]
///     pub id: i64,
///     #[column(unique)]
///     pub email: String,
///     #[column(default = "now")]
///     pub created_at: Option<NaiveDateTime>,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(table, column))]
pub fn derive_entity(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;

    // -------- table name --------
    let mut table_name = struct_name.to_string().to_lowercase();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("table")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                table_name = lit.value();
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"`"))
            }
        })?;
    }

    // -------- fields --------
    let fields = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    struct_name,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "Entity can only be derived for structs",
            ));
        }
    };

    let mut cols = Vec::with_capacity(fields.len());
    for field in fields {
        cols.push(expand_field(field)?);
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::schemasync::Entity for #struct_name #ty_generics #where_clause {
            fn descriptor() -> ::schemasync::Result<::schemasync::TableDescriptor> {
                ::schemasync::TableDescriptor::new(#table_name, ::std::vec![#(#cols),*])
            }
        }
    })
}

#[derive(Default)]
struct ColumnAttrs {
    name: Option<String>,
    kind: Option<&'static str>,
    primary_key: bool,
    not_null: bool,
    nullable: bool,
    unique: bool,
    uuid: bool,
    references: Option<(String, String)>,
    default: Option<TokenStream2>,
}

fn expand_field(field: &syn::Field) -> syn::Result<TokenStream2> {
    let ident = field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;

    let mut attrs = ColumnAttrs::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("column")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary_key") {
                attrs.primary_key = true;
            } else if meta.path.is_ident("not_null") {
                attrs.not_null = true;
            } else if meta.path.is_ident("nullable") {
                attrs.nullable = true;
            } else if meta.path.is_ident("unique") {
                attrs.unique = true;
            } else if meta.path.is_ident("uuid") {
                attrs.uuid = true;
            } else if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                attrs.name = Some(lit.value());
            } else if meta.path.is_ident("kind") {
                let lit: LitStr = meta.value()?.parse()?;
                let tag = lit.value().to_lowercase();
                let variant = KINDS
                    .iter()
                    .find(|(name, _)| *name == tag)
                    .map(|(_, variant)| *variant)
                    .ok_or_else(|| syn::Error::new(lit.span(), format!("unsupported field kind: {}", tag)))?;
                attrs.kind = Some(variant);
            } else if meta.path.is_ident("references") {
                let lit: LitStr = meta.value()?.parse()?;
                let value = lit.value();
                let (table, column) = value
                    .split_once('.')
                    .ok_or_else(|| syn::Error::new(lit.span(), "expected `references = \"table.column\"`"))?;
                attrs.references = Some((table.to_string(), column.to_string()));
            } else if meta.path.is_ident("default") {
                let lit: Lit = meta.value()?.parse()?;
                attrs.default = Some(default_tokens(&lit)?);
            } else {
                return Err(meta.error("unsupported column attribute"));
            }
            Ok(())
        })?;
    }

    let column_name = attrs
        .name
        .clone()
        .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string());
    let (inferred, optional) = infer_kind(&field.ty);
    let kind = match (attrs.kind, inferred) {
        (Some(kind), _) => kind,
        (None, Ok(kind)) => kind,
        (None, Err(type_name)) => {
            return Err(syn::Error::new_spanned(
                &field.ty,
                format!(
                    "`{}` does not read back from a TIMESTAMP column; \
                     set the kind explicitly, e.g. `#[column(kind = \"string\")]`",
                    type_name
                ),
            ));
        }
    };
    let kind = Ident::new(kind, Span::call_site());

    let primary_key = attrs.primary_key;
    let not_null = attrs.not_null || !(optional || attrs.nullable || attrs.primary_key);
    let unique = attrs.unique;
    let generate_uuid = attrs.uuid;
    let references = match &attrs.references {
        Some((table, column)) => quote! {
            ::core::option::Option::Some(::schemasync::References::new(#table, #column))
        },
        None => quote! { ::core::option::Option::None },
    };
    let default_value = match &attrs.default {
        Some(tokens) => quote! { ::core::option::Option::Some(#tokens) },
        None => quote! { ::core::option::Option::None },
    };

    Ok(quote! {
        ::schemasync::FieldDescriptor::new(
            #column_name,
            ::schemasync::FieldKind::#kind,
            ::schemasync::ColumnMetadata {
                primary_key: #primary_key,
                not_null: #not_null,
                unique: #unique,
                references: #references,
                default_value: #default_value,
                generate_uuid: #generate_uuid,
            },
        )
    })
}

fn default_tokens(lit: &Lit) -> syn::Result<TokenStream2> {
    match lit {
        Lit::Str(s) => {
            let value = s.value();
            Ok(quote! { ::schemasync::DefaultValue::Text(::std::string::String::from(#value)) })
        }
        Lit::Int(i) => {
            let value: i64 = i.base10_parse()?;
            Ok(quote! { ::schemasync::DefaultValue::from(#value) })
        }
        Lit::Bool(b) => {
            let value = b.value;
            Ok(quote! { ::schemasync::DefaultValue::Boolean(#value) })
        }
        other => Err(syn::Error::new_spanned(
            other,
            "default must be a string, integer or boolean literal",
        )),
    }
}

/// Picks a field kind from the Rust type; the flag reports an `Option` wrapper.
///
/// Only `NaiveDateTime` maps to `Date`: other time types serialize to forms a
/// zone-less TIMESTAMP does not hand back, so their name is returned as the
/// error and the field needs an explicit `kind`.
fn infer_kind(ty: &Type) -> (Result<&'static str, String>, bool) {
    match ty {
        Type::Reference(r) => infer_kind(&r.elem),
        Type::Array(_) | Type::Slice(_) => (Ok("Array"), false),
        Type::Path(path) => {
            let Some(segment) = path.path.segments.last() else {
                return (Ok("Object"), false);
            };
            let name = segment.ident.to_string();
            if name == "Option" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner)) = args.args.first() {
                        return (infer_kind(inner).0, true);
                    }
                }
                return (Ok("Object"), true);
            }
            let kind = match name.as_str() {
                "String" | "str" | "char" | "Uuid" => Ok("String"),
                "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
                | "u128" | "usize" | "f32" | "f64" => Ok("Number"),
                "bool" => Ok("Boolean"),
                "NaiveDateTime" => Ok("Date"),
                "DateTime" | "NaiveDate" | "NaiveTime" | "SystemTime" | "Instant" => Err(name),
                "Vec" | "VecDeque" | "HashSet" | "BTreeSet" => Ok("Array"),
                "Value" => Ok("Any"),
                _ => Ok("Object"),
            };
            (kind, false)
        }
        _ => (Ok("Object"), false),
    }
}
