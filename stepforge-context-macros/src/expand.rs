use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::{DeriveInput, Expr, Token, Type};

struct ContextKeyArgs {
    value: Type,
    default: Expr,
}

impl Parse for ContextKeyArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut value: Option<Type> = None;
        let mut default: Option<Expr> = None;

        while !input.is_empty() {
            let ident: syn::Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            match ident.to_string().as_str() {
                "value" => value = Some(input.parse()?),
                "default" => default = Some(input.parse()?),
                other => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!(
                            "unknown `context_key` argument `{other}`, expected `value` or `default`"
                        ),
                    ))
                }
            }
            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }

        let value = value.ok_or_else(|| {
            syn::Error::new(Span::call_site(), "`context_key` requires `value = <Type>`")
        })?;
        let default = default.ok_or_else(|| {
            syn::Error::new(Span::call_site(), "`context_key` requires `default = <expr>`")
        })?;
        Ok(ContextKeyArgs { value, default })
    }
}

/// Expand `#[derive(ContextKey)]` for a unit struct carrying a
/// `#[context_key(value = ..., default = ...)]` attribute.
pub fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;

    if !matches!(input.data, syn::Data::Struct(ref s) if matches!(s.fields, syn::Fields::Unit)) {
        return Err(syn::Error::new_spanned(
            &input,
            "`#[derive(ContextKey)]` only applies to unit structs",
        ));
    }

    let attr = input
        .attrs
        .iter()
        .find(|a| a.path().is_ident("context_key"))
        .ok_or_else(|| {
            syn::Error::new_spanned(
                &input,
                "`#[derive(ContextKey)]` requires a `#[context_key(value = ..., default = ...)]` attribute",
            )
        })?;
    let args: ContextKeyArgs = attr.parse_args()?;
    let value_ty = &args.value;
    let default_expr = &args.default;

    let tls_ident = format_ident!("__STEPFORGE_CONTEXT_TLS_{}", ident);

    Ok(quote! {
        const _: () = {
            ::stepforge_context::__private::tokio::task_local! {
                static #tls_ident: #value_ty;
            }

            impl ::stepforge_context::ContextKey for #ident {
                type Value = #value_ty;

                fn default_value() -> Self::Value {
                    #default_expr
                }

                fn __task_local()
                    -> &'static ::stepforge_context::__private::tokio::task::LocalKey<Self::Value>
                {
                    &#tls_ident
                }
            }
        };
    })
}
