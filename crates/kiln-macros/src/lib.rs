//! Procedural macros for Kiln dependency tracking.
//!
//! This crate provides the `#[kiln::tracked]` attribute macro, which gives a
//! type a fixed dependency table and registers it with the link-time
//! registry. Use it through the `kiln` crate, which re-exports it.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::parse::Parser;
use syn::{Generics, Ident, Item, LitStr};

/// Declares the dependencies of a hot-reloadable type.
///
/// Each argument becomes one entry of the type's tracking table, indexed in
/// the order written:
///
/// - `source = "file"`: a source file, relative to the declaring file
/// - `source_extension = "ext"`: the declaring file with its extension replaced
/// - `link_library = "lib"`: a library passed to the toolchain as-is
/// - `include_file = "path"`: an include file to watch
/// - `modifiable_include`: the declaring file itself is a watched include
///
/// # Example
///
/// ```rust,ignore
/// #[kiln::tracked(source = "physics.cpp", link_library = "-lm")]
/// pub struct Physics;
///
/// let tracking = <Physics as kiln::Tracked>::tracking();
/// assert_eq!(tracking.max_num(), 2);
/// ```
///
/// The type must not be generic.
///
/// Paths derived from the declaring file come from `file!()`, which is
/// relative to the directory cargo compiled from (the workspace root in a
/// workspace). Resolve them against that directory with
/// `DependencySet::rooted_at` when the process runs elsewhere.
#[proc_macro_attribute]
pub fn tracked(attr: TokenStream, item: TokenStream) -> TokenStream {
    match expand_tracked(attr.into(), item.into()) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// One declared dependency.
#[derive(Debug, Clone, PartialEq)]
enum Dependency {
    Source(LitStr),
    SourceExtension(LitStr),
    LinkLibrary(LitStr),
    IncludeFile(LitStr),
    ModifiableInclude,
}

impl Dependency {
    fn parse(meta: &ParseNestedMeta) -> syn::Result<Self> {
        let key = meta
            .path
            .get_ident()
            .map(Ident::to_string)
            .unwrap_or_default();

        match key.as_str() {
            "source" => Ok(Self::Source(meta.value()?.parse()?)),
            "source_extension" => Ok(Self::SourceExtension(meta.value()?.parse()?)),
            "link_library" => Ok(Self::LinkLibrary(meta.value()?.parse()?)),
            "include_file" => Ok(Self::IncludeFile(meta.value()?.parse()?)),
            "modifiable_include" => Ok(Self::ModifiableInclude),
            _ => Err(meta.error(
                "expected `source`, `source_extension`, `link_library`, `include_file` or `modifiable_include`",
            )),
        }
    }

    /// The `TrackingEntry` expression for this dependency.
    fn entry(&self) -> TokenStream2 {
        match self {
            Self::Source(file) => quote! {
                ::kiln::tracking::TrackingEntry::source(
                    ::kiln::tracking::SourceDependency::file(#file).relative_to(::core::file!())
                )
            },
            Self::SourceExtension(ext) => quote! {
                ::kiln::tracking::TrackingEntry::source(
                    ::kiln::tracking::SourceDependency::file(::core::file!()).with_extension(#ext)
                )
            },
            Self::LinkLibrary(library) => quote! {
                ::kiln::tracking::TrackingEntry::link_library(#library)
            },
            Self::IncludeFile(path) => quote! {
                ::kiln::tracking::TrackingEntry::include_file(#path)
            },
            Self::ModifiableInclude => quote! {
                ::kiln::tracking::TrackingEntry::include_file(::core::file!())
            },
        }
    }
}

fn parse_dependencies(attr: TokenStream2) -> syn::Result<Vec<Dependency>> {
    let mut dependencies = Vec::new();
    let parser = syn::meta::parser(|meta| {
        dependencies.push(Dependency::parse(&meta)?);
        Ok(())
    });
    parser.parse2(attr)?;
    Ok(dependencies)
}

fn type_name(item: &Item) -> syn::Result<(&Ident, &Generics)> {
    match item {
        Item::Struct(s) => Ok((&s.ident, &s.generics)),
        Item::Enum(e) => Ok((&e.ident, &e.generics)),
        Item::Union(u) => Ok((&u.ident, &u.generics)),
        _ => Err(syn::Error::new_spanned(
            item,
            "#[tracked] can only be applied to a struct, enum or union",
        )),
    }
}

fn expand_tracked(attr: TokenStream2, item: TokenStream2) -> syn::Result<TokenStream2> {
    let dependencies = parse_dependencies(attr)?;
    let item: Item = syn::parse2(item)?;

    let (name, generics) = type_name(&item)?;
    if !generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            generics,
            "#[tracked] types cannot be generic",
        ));
    }

    let entries = dependencies.iter().map(Dependency::entry);

    Ok(quote! {
        #item

        impl ::kiln::tracking::Tracked for #name {
            const TRACKING: ::kiln::tracking::TrackingTable =
                ::kiln::tracking::TrackingTable::new(&[#(#entries),*]);

            fn tracking() -> &'static dyn ::kiln::tracking::RuntimeTracking {
                &<Self as ::kiln::tracking::Tracked>::TRACKING
            }
        }

        ::kiln::__private::inventory::submit! {
            ::kiln::tracking::TrackedEntity::new(
                ::core::stringify!(#name),
                <#name as ::kiln::tracking::Tracked>::tracking,
            )
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(attr: TokenStream2) -> Vec<Dependency> {
        parse_dependencies(attr).expect("arguments parse")
    }

    #[test]
    fn test_parse_in_declaration_order() {
        let deps = parse(quote! {
            source = "a.cpp",
            link_library = "-lm",
            source_extension = "cpp",
            modifiable_include,
            include_file = "a.h"
        });

        let kinds: Vec<&str> = deps
            .iter()
            .map(|dep| match dep {
                Dependency::Source(_) => "source",
                Dependency::SourceExtension(_) => "source_extension",
                Dependency::LinkLibrary(_) => "link_library",
                Dependency::IncludeFile(_) => "include_file",
                Dependency::ModifiableInclude => "modifiable_include",
            })
            .collect();
        assert_eq!(
            kinds,
            ["source", "link_library", "source_extension", "modifiable_include", "include_file"]
        );

        let Dependency::Source(file) = &deps[0] else {
            panic!("expected source");
        };
        assert_eq!(file.value(), "a.cpp");
    }

    #[test]
    fn test_parse_repeated_keys() {
        let deps = parse(quote! { source = "a.cpp", source = "b.cpp" });
        assert_eq!(deps.len(), 2);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse(TokenStream2::new()).is_empty());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = parse_dependencies(quote! { sauce = "a.cpp" }).unwrap_err();
        assert!(err.to_string().contains("expected `source`"));
    }

    #[test]
    fn test_non_string_value_rejected() {
        assert!(parse_dependencies(quote! { source = 3 }).is_err());
    }

    #[test]
    fn test_expand_struct() {
        let tokens = expand_tracked(
            quote! { source = "physics.cpp", link_library = "-lm" },
            quote! { pub struct Physics; },
        )
        .unwrap()
        .to_string();

        assert!(tokens.contains("pub struct Physics"));
        assert!(tokens.contains("impl :: kiln :: tracking :: Tracked for Physics"));
        assert!(tokens.contains("\"physics.cpp\""));
        assert!(tokens.contains("inventory :: submit"));
    }

    #[test]
    fn test_generic_type_rejected() {
        let err = expand_tracked(quote! {}, quote! { struct Wrapper<T>(T); }).unwrap_err();
        assert!(err.to_string().contains("cannot be generic"));
    }

    #[test]
    fn test_function_rejected() {
        assert!(expand_tracked(quote! {}, quote! { fn update() {} }).is_err());
    }
}
