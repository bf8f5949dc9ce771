//! Proc-macros for the `ll_worker` axum handlers. Only expanded inside `ll_worker`, so paths are
//! `crate::`-relative.

use proc_macro2::TokenStream;
use quote::{quote, quote_spanned, ToTokens};
use syn::spanned::Spanned;
use syn::{parse_macro_input, parse_quote, Field, ItemFn, ItemStruct, LitStr, ReturnType};

/// Runs an axum handler's body on the isolate's local executor through
/// `crate::local_future::HandlerFuture`, so the handler future is `Send` even though D1 futures
/// are not. The handler must return `Result<_, ApiError>`.
///
/// Takes an optional route label for logs, e.g. `#[local_async("POST /api/cleanup")]`; defaults
/// to the function name.
#[proc_macro_attribute]
pub fn local_async(
    attr: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let mut f = parse_macro_input!(item as ItemFn);
    if f.sig.asyncness.is_none() {
        return quote_spanned! {f.sig.span()=>
            ::std::compile_error!("`local_async` handlers must be `async`.");
        }
        .into();
    }
    if let ReturnType::Default = f.sig.output {
        return quote_spanned! {f.sig.span()=>
            ::std::compile_error!("`local_async` handlers must return `Result<_, ApiError>`.");
        }
        .into();
    }
    let route = if attr.is_empty() {
        LitStr::new(&f.sig.ident.to_string(), f.sig.ident.span())
    } else {
        parse_macro_input!(attr as LitStr)
    };
    let block = &f.block;
    f.block = parse_quote! {
        {
            crate::local_future::HandlerFuture::spawn(#route, async move #block).await
        }
    };
    f.to_token_stream().into()
}

/// For the `'static` app state struct, lets handlers extract `State<&'static Field>` for each
/// field. Field types must be distinct, since the field is found by type.
#[proc_macro_derive(FromRefStatic)]
pub fn derive_from_ref_static(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let st = parse_macro_input!(item as ItemStruct);
    let state = &st.ident;

    let mut seen: Vec<String> = Vec::new();
    let mut out = TokenStream::new();
    for Field { ident, ty, .. } in st.fields.iter() {
        let ty_str = ty.to_token_stream().to_string();
        if seen.contains(&ty_str) {
            out.extend(quote_spanned! {ty.span()=>
                ::std::compile_error!("App state field types must be distinct to extract by type.");
            });
            continue;
        }
        seen.push(ty_str);
        out.extend(quote! {
            impl ::axum::extract::FromRef<&'static #state> for &'static #ty {
                fn from_ref(state: &&'static #state) -> Self {
                    &state.#ident
                }
            }
        });
    }
    out.into()
}
