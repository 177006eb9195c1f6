//! Derive macro for `stepforge_context::ContextKey`.
//!
//! A context key is a unit struct naming a task-local slot. The derive
//! fills in the slot's backing `tokio::task_local!` static and the
//! trait methods that read and thread it through; hand-writing a
//! `ContextKey` impl is possible but defeats the purpose, since the
//! static has to be unique per key and the derive is what guarantees
//! that.

extern crate proc_macro;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod expand;

/// Implements `ContextKey` for a unit struct.
///
/// # Example
///
/// ```ignore
/// #[derive(ContextKey)]
/// #[context_key(value = SessionId, default = SessionId::nil())]
/// pub struct SessionIdKey;
/// ```
#[proc_macro_derive(ContextKey, attributes(context_key))]
pub fn derive_context_key(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
