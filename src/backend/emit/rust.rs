//! Rust implementation emitter.
//!
//! Every Rust file is built as a token stream with `quote`, parsed back through `syn` and printed
//! with `prettyplease`, so the output is well-formed before it ever reaches disk.
//!
//! ## Files
//! - `<api>_trait.rs`: one trait per interface, lifecycle operations included.
//! - `<api>_ffi.rs`: one `#[no_mangle] extern "C"` function per C ABI symbol.
//! - `<api>_types.rs`: `#[repr]` translations of the resolved schema types.
//! - project scaffolds: `src/<api>_impl.rs`, `src/lib.rs` and `Cargo.toml`.

use proc_macro2::{Ident, Literal, Span, TokenStream};
use quote::{format_ident, quote};

use xplatter_core::lang::primitives::{self, PrimitiveId};
use xplatter_core::naming;
use xplatter_core::{Transfer, TypeRef};

use crate::backend::artifact::Artifact;
use crate::backend::banner::{self, CommentStyle};
use crate::backend::context::EmitContext;
use crate::backend::ctypes::OUT_RESULT;
use crate::backend::errors::EmitError;
use crate::backend::registry::Emitter;
use crate::backend::writer::CodeWriter;
use crate::frontend::model::{MethodShape, Operation, ParameterDef};
use crate::frontend::resolver::{FieldType, TypeInfo, TypeKind};

pub const NAME: &str = "impl_rust";

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do", "dyn", "else",
    "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "macro", "match",
    "mod", "move", "mut", "override", "priv", "pub", "ref", "return", "static", "struct", "trait", "true",
    "try", "type", "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

pub fn emitter() -> Emitter {
    Emitter::new(NAME, emit)
}

fn emit(ctx: &EmitContext<'_>) -> Result<Vec<Artifact>, EmitError> {
    let rust = RustGen::new(ctx);
    let api = ctx.api_name();
    let source = ctx.source_name();
    let generated = |tokens| -> Result<String, EmitError> {
        Ok(banner::generated(CommentStyle::Slash, &source) + &unparse(tokens)?)
    };

    let mut out = vec![
        Artifact::generated(format!("{api}_trait.rs"), generated(rust.trait_file()?)?),
        Artifact::generated(format!("{api}_ffi.rs"), generated(rust.ffi_file()?)?),
    ];
    if rust.has_types() {
        out.push(Artifact::generated(format!("{api}_types.rs"), generated(rust.types_file()?)?));
    }
    let impl_rs = banner::scaffold(CommentStyle::Slash, &source) + &unparse(rust.impl_file()?)?;
    out.push(Artifact::scaffold(format!("src/{api}_impl.rs"), impl_rs).in_project());
    out.push(Artifact::scaffold("src/lib.rs", rust.lib_rs()).in_project());
    out.push(Artifact::scaffold("Cargo.toml", rust.cargo_toml()).in_project());
    Ok(out)
}

fn unparse(tokens: TokenStream) -> Result<String, EmitError> {
    let file: syn::File = syn::parse2(tokens).map_err(|e| EmitError::SynParse {
        emitter: NAME,
        detail: e.to_string(),
    })?;
    Ok(prettyplease::unparse(&file))
}

/// Identifier for a user-supplied name, raw when it collides with a keyword.
fn ident(name: &str) -> Ident {
    match name {
        "self" | "super" | "crate" | "Self" => format_ident!("{name}_"),
        n if KEYWORDS.contains(&n) => Ident::new_raw(n, Span::call_site()),
        n => format_ident!("{n}"),
    }
}

fn type_ident(qualified: &str) -> Ident {
    ident(&naming::flat_type_name(qualified))
}

fn prim(p: PrimitiveId) -> TokenStream {
    let t = format_ident!("{}", primitives::info_for(p).rust);
    quote!(#t)
}

fn doc(text: &str) -> TokenStream {
    let text = format!(" {text}");
    quote!(#[doc = #text])
}

fn discriminant(value: i64) -> TokenStream {
    let lit = Literal::u64_unsuffixed(value.unsigned_abs());
    if value < 0 { quote!(-#lit) } else { quote!(#lit) }
}

struct RustGen<'a> {
    ctx: &'a EmitContext<'a>,
    types_mod: Ident,
    trait_mod: Ident,
    ffi_mod: Ident,
    impl_mod: Ident,
}

impl<'a> RustGen<'a> {
    fn new(ctx: &'a EmitContext<'a>) -> Self {
        let api = ctx.api_name();
        Self {
            ctx,
            types_mod: format_ident!("{api}_types"),
            trait_mod: format_ident!("{api}_trait"),
            ffi_mod: format_ident!("{api}_ffi"),
            impl_mod: format_ident!("{api}_impl"),
        }
    }

    fn has_types(&self) -> bool {
        !self.ctx.types.is_empty()
    }

    fn use_types(&self) -> TokenStream {
        let types_mod = &self.types_mod;
        if self.has_types() { quote!(use crate::#types_mod::*;) } else { TokenStream::new() }
    }

    /// A type as a value: returns, out-param pointees, by-value enums.
    fn value_type(&self, ty: &str) -> Result<TokenStream, EmitError> {
        match self.ctx.classify(NAME, ty)? {
            TypeRef::Handle(_) => Ok(quote!(*mut c_void)),
            TypeRef::Primitive(p) => Ok(prim(p)),
            TypeRef::Qualified(q) => {
                let t = type_ident(q);
                Ok(quote!(#t))
            }
            TypeRef::String | TypeRef::Buffer(_) => {
                Err(EmitError::unsupported(NAME, format!("{ty} cannot be returned by value")))
            }
        }
    }

    /// Borrowing form of a parameter as trait methods see it.
    fn trait_param(&self, p: &ParameterDef) -> Result<TokenStream, EmitError> {
        let name = ident(&p.name);
        let transfer = p.effective_transfer();
        let ty = match self.ctx.classify(NAME, &p.ty)? {
            TypeRef::String => quote!(&str),
            TypeRef::Buffer(e) => {
                let e = prim(e);
                if transfer.is_mut() { quote!(&mut [#e]) } else { quote!(&[#e]) }
            }
            TypeRef::Handle(_) => quote!(*mut c_void),
            TypeRef::Primitive(prim_id) => prim(prim_id),
            TypeRef::Qualified(q) => {
                let t = type_ident(q);
                match transfer {
                    Transfer::Value if self.ctx.is_enum(q) => quote!(#t),
                    Transfer::Value | Transfer::Ref => quote!(&#t),
                    Transfer::RefMut => quote!(&mut #t),
                }
            }
        };
        Ok(quote!(#name: #ty))
    }

    fn trait_return(&self, op: &Operation<'_>) -> Result<TokenStream, EmitError> {
        let error = op.error.as_deref().map(type_ident);
        Ok(match (op.shape(), op.return_type(), error) {
            (MethodShape::FallibleValue, Some(ty), Some(e)) => {
                let t = self.value_type(ty)?;
                quote!(-> Result<#t, #e>)
            }
            (MethodShape::FallibleVoid, _, Some(e)) => quote!(-> Result<(), #e>),
            (MethodShape::InfallibleValue, Some(ty), _) => {
                let t = self.value_type(ty)?;
                quote!(-> #t)
            }
            (MethodShape::InfallibleVoid, _, _) => TokenStream::new(),
            (shape, _, _) => return Err(EmitError::internal(NAME, format!("{shape:?} is inconsistent on {}", op.name))),
        })
    }

    fn trait_signature(&self, op: &Operation<'_>) -> Result<TokenStream, EmitError> {
        let name = ident(&op.name);
        let mut args = vec![quote!(&self)];
        for p in &op.parameters {
            args.push(self.trait_param(p)?);
        }
        let ret = self.trait_return(op)?;
        Ok(quote!(fn #name(#(#args),*) #ret))
    }

    fn trait_file(&self) -> Result<TokenStream, EmitError> {
        let mut traits = Vec::new();
        for iface in &self.ctx.api.interfaces {
            let name = ident(&naming::pascal_case(&iface.name));
            let iface_doc = doc(iface
                .description
                .as_deref()
                .unwrap_or(&format!("Operations of the `{}` interface.", iface.name)));
            let mut methods = Vec::new();
            for op in iface.operations() {
                let sig = self.trait_signature(&op)?;
                let method_doc = op.description.as_deref().map(doc);
                methods.push(quote! { #method_doc #sig; });
            }
            traits.push(quote! {
                #iface_doc
                pub trait #name {
                    #(#methods)*
                }
            });
        }
        let use_types = self.use_types();
        Ok(quote! {
            #![allow(unused_imports)]
            use std::ffi::c_void;
            #use_types
            #(#traits)*
        })
    }

    /// C-side parameters of one IR parameter.
    fn ffi_params(&self, p: &ParameterDef) -> Result<Vec<TokenStream>, EmitError> {
        let name = ident(&p.name);
        let transfer = p.effective_transfer();
        Ok(match self.ctx.classify(NAME, &p.ty)? {
            TypeRef::String => vec![quote!(#name: *const c_char)],
            TypeRef::Buffer(e) => {
                let e = prim(e);
                let len = format_ident!("{}_len", p.name);
                let ptr = if transfer.is_mut() { quote!(*mut #e) } else { quote!(*const #e) };
                vec![quote!(#name: #ptr), quote!(#len: u32)]
            }
            TypeRef::Handle(_) => vec![quote!(#name: *mut c_void)],
            TypeRef::Primitive(prim_id) => {
                let t = prim(prim_id);
                vec![quote!(#name: #t)]
            }
            TypeRef::Qualified(q) => {
                let t = type_ident(q);
                match transfer {
                    Transfer::Value => vec![quote!(#name: #t)],
                    Transfer::Ref => vec![quote!(#name: *const #t)],
                    Transfer::RefMut => vec![quote!(#name: *mut #t)],
                }
            }
        })
    }

    /// Unsafe conversion of one C parameter to its borrowed Rust form, and the call argument.
    fn ffi_conversion(&self, p: &ParameterDef) -> Result<(TokenStream, TokenStream), EmitError> {
        let name = ident(&p.name);
        let transfer = p.effective_transfer();
        Ok(match self.ctx.classify(NAME, &p.ty)? {
            TypeRef::String => (
                quote!(let #name = CStr::from_ptr(#name).to_string_lossy();),
                quote!(&#name),
            ),
            TypeRef::Buffer(e) => {
                let e = prim(e);
                let len = format_ident!("{}_len", p.name);
                let convert = if transfer.is_mut() {
                    quote! {
                        let #name: &mut [#e] = if #name.is_null() || #len == 0 {
                            &mut []
                        } else {
                            std::slice::from_raw_parts_mut(#name, #len as usize)
                        };
                    }
                } else {
                    quote! {
                        let #name: &[#e] = if #name.is_null() || #len == 0 {
                            &[]
                        } else {
                            std::slice::from_raw_parts(#name, #len as usize)
                        };
                    }
                };
                (convert, quote!(#name))
            }
            TypeRef::Handle(_) | TypeRef::Primitive(_) => (TokenStream::new(), quote!(#name)),
            TypeRef::Qualified(q) => match transfer {
                Transfer::Value if self.ctx.is_enum(q) => (TokenStream::new(), quote!(#name)),
                Transfer::Value => (TokenStream::new(), quote!(&#name)),
                Transfer::Ref => (TokenStream::new(), quote!(&*#name)),
                Transfer::RefMut => (TokenStream::new(), quote!(&mut *#name)),
            },
        })
    }

    fn ffi_function(&self, op: &Operation<'_>) -> Result<TokenStream, EmitError> {
        let symbol = format_ident!("{}", op.symbol(self.ctx.api_name()));
        let trait_name = ident(&naming::pascal_case(&op.interface.name));
        let method = ident(&op.name);
        let out = format_ident!("{OUT_RESULT}");

        let mut params = Vec::new();
        let mut conversions = Vec::new();
        let mut args = vec![quote!(&Impl)];
        for p in &op.parameters {
            params.extend(self.ffi_params(p)?);
            let (convert, arg) = self.ffi_conversion(p)?;
            conversions.push(convert);
            args.push(arg);
        }

        let call = quote!(#trait_name::#method(#(#args),*));
        let (ret, body) = match (op.shape(), op.return_type()) {
            (MethodShape::FallibleValue, Some(ty)) => {
                let t = self.value_type(ty)?;
                params.push(quote!(#out: *mut #t));
                let body = quote! {
                    match #call {
                        Ok(value) => {
                            *#out = value;
                            0
                        }
                        Err(err) => err as i32,
                    }
                };
                (quote!(-> i32), body)
            }
            (MethodShape::FallibleVoid, _) => {
                let body = quote! {
                    match #call {
                        Ok(()) => 0,
                        Err(err) => err as i32,
                    }
                };
                (quote!(-> i32), body)
            }
            (MethodShape::InfallibleValue, Some(ty)) => {
                let t = self.value_type(ty)?;
                (quote!(-> #t), call)
            }
            (MethodShape::InfallibleVoid, _) => (TokenStream::new(), quote!(#call;)),
            (shape, None) => return Err(EmitError::internal(NAME, format!("{shape:?} without a return type"))),
        };

        Ok(quote! {
            #[no_mangle]
            pub unsafe extern "C" fn #symbol(#(#params),*) #ret {
                #(#conversions)*
                #body
            }
        })
    }

    fn ffi_file(&self) -> Result<TokenStream, EmitError> {
        let mut fns = Vec::new();
        for iface in &self.ctx.api.interfaces {
            for op in iface.operations() {
                fns.push(self.ffi_function(&op)?);
            }
        }
        let (trait_mod, impl_mod) = (&self.trait_mod, &self.impl_mod);
        let use_types = self.use_types();
        Ok(quote! {
            #![allow(unused_imports, clippy::missing_safety_doc)]
            use std::ffi::{c_char, c_void, CStr};
            #use_types
            use crate::#trait_mod::*;
            use crate::#impl_mod::*;
            #(#fns)*
        })
    }

    fn field_tokens(&self, ty: &FieldType) -> TokenStream {
        match ty {
            FieldType::Primitive(p) => prim(*p),
            FieldType::String => quote!(*const c_char),
            FieldType::Vector(inner) => {
                let inner = self.field_tokens(inner);
                quote!(*const #inner)
            }
            FieldType::Named(name) => {
                let t = type_ident(name);
                quote!(#t)
            }
        }
    }

    fn record(&self, name: &str, info: &TypeInfo) -> TokenStream {
        let rust_name = type_ident(name);
        let mut fields = Vec::new();
        for f in &info.fields {
            let field = ident(&f.name);
            let ty = self.field_tokens(&f.ty);
            fields.push(quote!(pub #field: #ty));
            if matches!(f.ty, FieldType::Vector(_)) {
                let count = format_ident!("{}_count", f.name);
                fields.push(quote!(pub #count: u32));
            }
        }
        let derive = if info.kind == TypeKind::Struct {
            quote!(#[derive(Debug, Clone, Copy)])
        } else {
            quote!(#[derive(Debug)])
        };
        quote! {
            #[repr(C)]
            #derive
            pub struct #rust_name {
                #(#fields),*
            }
        }
    }

    fn types_file(&self) -> Result<TokenStream, EmitError> {
        let mut items = Vec::new();
        for (name, info) in self.ctx.types.of_kind(TypeKind::Enum) {
            let rust_name = type_ident(name);
            let repr = prim(info.abi_scalar());
            let variants = info.enum_values.iter().map(|v| {
                let variant = ident(&v.name);
                let value = discriminant(v.value);
                quote!(#variant = #value)
            });
            items.push(quote! {
                #[repr(#repr)]
                #[derive(Debug, Clone, Copy, PartialEq, Eq)]
                pub enum #rust_name {
                    #(#variants),*
                }
            });
        }
        for kind in [TypeKind::Struct, TypeKind::Table] {
            for (name, info) in self.ctx.types.of_kind(kind) {
                items.push(self.record(name, info));
            }
        }
        Ok(quote! {
            #![allow(unused_imports)]
            use std::ffi::c_char;
            #(#items)*
        })
    }

    fn impl_file(&self) -> Result<TokenStream, EmitError> {
        let mut impls = Vec::new();
        for iface in &self.ctx.api.interfaces {
            let trait_name = ident(&naming::pascal_case(&iface.name));
            let mut methods = Vec::new();
            for op in iface.operations() {
                let sig = self.trait_signature(&op)?;
                let msg = format!("implement {}::{}", iface.name, op.name);
                methods.push(quote! {
                    #sig {
                        todo!(#msg)
                    }
                });
            }
            impls.push(quote! {
                impl #trait_name for Impl {
                    #(#methods)*
                }
            });
        }
        let trait_mod = &self.trait_mod;
        let use_types = self.use_types();
        Ok(quote! {
            #![allow(unused_imports, unused_variables)]
            use std::ffi::c_void;
            #use_types
            use crate::#trait_mod::*;

            /// Implements every interface trait.
            pub struct Impl;

            #(#impls)*
        })
    }

    /// `src/lib.rs`: generated modules are pulled in from the output directory by path.
    fn lib_rs(&self) -> String {
        let dir = self.ctx.generated_dir;
        let mut w = CodeWriter::new();
        w.write(&banner::scaffold(CommentStyle::Slash, &self.ctx.source_name()));
        let mut generated = Vec::new();
        if self.has_types() {
            generated.push(&self.types_mod);
        }
        generated.push(&self.trait_mod);
        generated.push(&self.ffi_mod);
        for module in generated {
            w.line(&format!("#[path = \"../{dir}/{module}.rs\"]"));
            w.line(&format!("pub mod {module};"));
        }
        w.line(&format!("pub mod {};", self.impl_mod));
        w.finish()
    }

    fn cargo_toml(&self) -> String {
        let mut w = CodeWriter::new();
        w.write(&banner::scaffold(CommentStyle::Hash, &self.ctx.source_name()));
        w.lines([
            "[package]".to_string(),
            format!("name = \"{}\"", self.ctx.api_name()),
            format!("version = \"{}\"", self.ctx.api.api.version),
            "edition = \"2021\"".to_string(),
            String::new(),
            "[lib]".to_string(),
            "crate-type = [\"cdylib\", \"staticlib\", \"rlib\"]".to_string(),
        ]);
        w.finish()
    }
}
