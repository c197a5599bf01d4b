//! Derive macro for oxide-sqlkit records.
//!
//! This crate provides `#[derive(Record)]`, which maps a struct with named
//! fields onto a table specification. Field attributes are collected into
//! the same tag map [`ColumnSpec::from_tags`] consumes, so a derived spec and
//! a hand-built one behave identically.
//!
//! [`ColumnSpec::from_tags`]: https://docs.rs/oxide-sqlkit

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    ext::IdentExt, meta::ParseNestedMeta, parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, Ident,
    Lit, Type,
};

/// Tags a field attribute may carry, besides `skip` and `compound`.
const TAGS: &[&str] = &[
    "width",
    "text_length",
    "charset",
    "nullable",
    "primary",
    "index",
    "default",
    "precision",
    "auto_increment",
    "auto_increment_offset",
    "auto_version",
    "created_at",
    "updated_at",
    "name",
    "sql_name",
    "clickhouse_ttl",
];

/// Derives `oxide_sqlkit::Record` for a struct.
///
/// # Struct Attributes
///
/// - `#[sqlkit(table = "name")]` - SQL table name (defaults to the snake_case
///   struct name)
/// - `#[sqlkit(index = "a, b")]` / `#[sqlkit(unique_index = "a, b")]` -
///   multi-column indexes, repeatable
/// - `#[sqlkit(partition_by = "expr")]` - ClickHouse partition expression
/// - `#[sqlkit(read_only)]` - refuse INSERT and UPDATE
/// - `#[sqlkit(hooks)]` - forward `before_insert`/`before_update` to the
///   struct's `RecordHooks` impl
///
/// # Field Attributes
///
/// Any column tag, as a flag or `key = value`: `width = 128`,
/// `charset = "ascii"`, `nullable = false`, `primary`, `index`,
/// `default = "x"`, `precision = 2`, `auto_increment`,
/// `auto_increment_offset = 100`, `auto_version`, `created_at`,
/// `updated_at`, `name = "col"`, `sql_name = "col"`,
/// `clickhouse_ttl = "3m"`, `text_length = "medium"`. Additionally:
///
/// - `#[sqlkit(skip)]` - not a column
/// - `#[sqlkit(compound)]` - stored as JSON text; the field type only needs
///   `serde::Serialize`
#[proc_macro_derive(Record, attributes(sqlkit))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_record_impl(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

struct TableAttrs {
    name: Option<String>,
    indexes: Vec<(Vec<String>, bool)>,
    partition_by: Option<String>,
    read_only: bool,
    hooks: bool,
}

struct FieldInfo {
    ident: Ident,
    ty: Type,
    column_name: String,
    tags: Vec<(String, String)>,
    compound: bool,
}

fn derive_record_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record derive does not support generic structs",
        ));
    }
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Record derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Record derive only supports structs",
            ));
        }
    };

    let table = parse_table_attrs(&input.attrs)?;
    let table_name = table
        .name
        .clone()
        .unwrap_or_else(|| to_snake_case(&struct_name.unraw().to_string()));

    let mut infos = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let Some((tags, compound)) = parse_field_attrs(&field.attrs)? else {
            continue;
        };
        let column_name = tags
            .iter()
            .find(|(k, _)| k == "sql_name")
            .or_else(|| tags.iter().find(|(k, _)| k == "name"))
            .map_or_else(|| ident.unraw().to_string(), |(_, v)| v.clone());
        infos.push(FieldInfo {
            ident,
            ty: field.ty.clone(),
            column_name,
            tags,
            compound,
        });
    }

    let columns: Vec<TokenStream2> = infos.iter().map(column_tokens).collect();
    let values: Vec<TokenStream2> = infos.iter().map(value_tokens).collect();

    let indexes: Vec<TokenStream2> = table
        .indexes
        .iter()
        .map(|(cols, unique)| {
            if *unique {
                quote! { .unique_index(&[#(#cols),*]) }
            } else {
                quote! { .index(&[#(#cols),*]) }
            }
        })
        .collect();
    let partition = table
        .partition_by
        .as_ref()
        .map(|p| quote! { .partition_by(#p) });
    let read_only = table.read_only.then(|| quote! { .read_only() });
    let hooks = table.hooks.then(|| {
        quote! {
            fn before_insert(&mut self) {
                <Self as ::oxide_sqlkit::RecordHooks>::before_insert(self);
            }

            fn before_update(&mut self) {
                <Self as ::oxide_sqlkit::RecordHooks>::before_update(self);
            }
        }
    });

    Ok(quote! {
        impl ::oxide_sqlkit::Record for #struct_name {
            fn table_spec() -> ::oxide_sqlkit::Result<::std::sync::Arc<::oxide_sqlkit::TableSpec>> {
                static SPEC: ::std::sync::OnceLock<::std::sync::Arc<::oxide_sqlkit::TableSpec>> =
                    ::std::sync::OnceLock::new();
                if let Some(spec) = SPEC.get() {
                    return Ok(::std::sync::Arc::clone(spec));
                }
                let columns: ::std::vec::Vec<::oxide_sqlkit::ColumnSpec> = vec![#(#columns),*];
                let spec = ::oxide_sqlkit::TableSpec::builder(#table_name)
                    .columns(columns)
                    #(#indexes)*
                    #partition
                    #read_only
                    .build()?;
                Ok(::std::sync::Arc::clone(
                    SPEC.get_or_init(|| ::std::sync::Arc::new(spec)),
                ))
            }

            fn values(
                &self,
            ) -> ::oxide_sqlkit::Result<::std::vec::Vec<(&'static str, ::oxide_sqlkit::SqlValue)>> {
                Ok(vec![#(#values),*])
            }

            #hooks
        }
    })
}

fn column_tokens(info: &FieldInfo) -> TokenStream2 {
    let field = info.ident.unraw().to_string();
    let ty = &info.ty;
    let keys = info.tags.iter().map(|(k, _)| k);
    let vals = info.tags.iter().map(|(_, v)| v);
    let (kind, pointer) = if info.compound {
        let pointer = is_option(ty);
        (quote! { ::oxide_sqlkit::ColumnKind::Compound }, quote! { #pointer })
    } else {
        (
            quote! { <#ty as ::oxide_sqlkit::ColumnType>::KIND },
            quote! { <#ty as ::oxide_sqlkit::ColumnType>::IS_POINTER },
        )
    };
    quote! {
        ::oxide_sqlkit::ColumnSpec::from_tags(
            #field,
            #kind,
            &[#((#keys, #vals)),*]
                .into_iter()
                .map(|(k, v): (&str, &str)| (k.to_string(), v.to_string()))
                .collect::<::oxide_sqlkit::TagMap>(),
            #pointer,
        )?
    }
}

fn value_tokens(info: &FieldInfo) -> TokenStream2 {
    let ident = &info.ident;
    let column = &info.column_name;
    if info.compound {
        quote! { (#column, ::oxide_sqlkit::compound_value(&self.#ident)?) }
    } else {
        quote! {
            (
                #column,
                ::oxide_sqlkit::ToSqlValue::to_sql_value(::std::clone::Clone::clone(&self.#ident)),
            )
        }
    }
}

fn is_option(ty: &Type) -> bool {
    match ty {
        Type::Path(p) => p
            .path
            .segments
            .last()
            .is_some_and(|s| s.ident == "Option"),
        _ => false,
    }
}

fn lit_string(meta: &ParseNestedMeta) -> syn::Result<String> {
    let value: Expr = meta.value()?.parse()?;
    match value {
        Expr::Lit(lit) => match lit.lit {
            Lit::Str(s) => Ok(s.value()),
            Lit::Int(i) => Ok(i.base10_digits().to_string()),
            Lit::Bool(b) => Ok(b.value.to_string()),
            other => Err(syn::Error::new_spanned(other, "expected a string, integer or bool")),
        },
        other => Err(syn::Error::new_spanned(other, "expected a literal")),
    }
}

fn parse_table_attrs(attrs: &[Attribute]) -> syn::Result<TableAttrs> {
    let mut result = TableAttrs {
        name: None,
        indexes: Vec::new(),
        partition_by: None,
        read_only: false,
        hooks: false,
    };
    for attr in attrs.iter().filter(|a| a.path().is_ident("sqlkit")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                result.name = Some(lit_string(&meta)?);
            } else if meta.path.is_ident("index") || meta.path.is_ident("unique_index") {
                let unique = meta.path.is_ident("unique_index");
                let cols = lit_string(&meta)?
                    .split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect();
                result.indexes.push((cols, unique));
            } else if meta.path.is_ident("partition_by") {
                result.partition_by = Some(lit_string(&meta)?);
            } else if meta.path.is_ident("read_only") {
                result.read_only = true;
            } else if meta.path.is_ident("hooks") {
                result.hooks = true;
            } else {
                return Err(meta.error("unknown sqlkit table attribute"));
            }
            Ok(())
        })?;
    }
    Ok(result)
}

/// Returns `None` for skipped fields, else the tags and the compound flag.
fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<Option<(Vec<(String, String)>, bool)>> {
    let mut tags = Vec::new();
    let mut compound = false;
    let mut skip = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("sqlkit")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                return Ok(());
            }
            if meta.path.is_ident("compound") {
                compound = true;
                return Ok(());
            }
            let Some(key) = meta
                .path
                .get_ident()
                .map(ToString::to_string)
                .filter(|k| TAGS.contains(&k.as_str()))
            else {
                return Err(meta.error("unknown sqlkit column attribute"));
            };
            let value = if meta.input.peek(syn::Token![=]) {
                lit_string(&meta)?
            } else {
                String::from("true")
            };
            tags.push((key, value));
            Ok(())
        })?;
    }
    Ok((!skip).then_some((tags, compound)))
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
