//! Kotlin + JNI emitter: `<Pascal>.kt` and `<api>_jni.c`.
//!
//! Every C ABI symbol gets an `external fun` on the API object and a `JNIEXPORT` bridge. Records
//! cross as data classes: the bridge reads parameter fields by name and builds returned objects
//! through their constructors. Enums travel as `Int`. A fallible call returning a record throws
//! from C; other fallible values come back as `[code, payload]` in a `LongArray`.

use xplatter_core::lang::primitives::{self, PrimitiveId};
use xplatter_core::naming;
use xplatter_core::{Transfer, TypeRef};

use crate::backend::artifact::Artifact;
use crate::backend::banner::{self, CommentStyle};
use crate::backend::context::EmitContext;
use crate::backend::ctypes::{CSignature, OUT_RESULT};
use crate::backend::errors::EmitError;
use crate::backend::registry::Emitter;
use crate::backend::writer::CodeWriter;
use crate::frontend::model::{HandleDef, MethodShape, Operation, OperationKind};
use crate::frontend::resolver::FieldType;

pub const NAME: &str = "kotlin";

const KOTLIN_KEYWORDS: &[&str] = &[
    "as", "break", "class", "continue", "do", "else", "false", "for", "fun", "if", "in", "interface", "is", "null",
    "object", "package", "return", "super", "this", "throw", "true", "try", "typealias", "typeof", "val", "var",
    "when", "while",
];

pub fn emitter() -> Emitter {
    Emitter::new(NAME, emit)
}

fn emit(ctx: &EmitContext<'_>) -> Result<Vec<Artifact>, EmitError> {
    let kt = KotlinGen::new(ctx);
    Ok(vec![
        Artifact::generated(format!("{}.kt", kt.object), kt.kotlin_file()?),
        Artifact::generated(format!("{}_jni.c", ctx.api_name()), kt.jni_file()?),
    ])
}

fn kt_ident(name: &str) -> String {
    let camel = naming::camel_case(name);
    if KOTLIN_KEYWORDS.contains(&camel.as_str()) { format!("`{camel}`") } else { camel }
}

fn exception_name(error_type: &str) -> String {
    format!("{}Exception", naming::flat_type_name(error_type))
}

/// How a parameter or return value crosses between Kotlin and C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KtType<'t> {
    Prim(PrimitiveId),
    String,
    Buffer(PrimitiveId),
    Handle(&'t str),
    Enum(&'t str),
    Record(&'t str),
}

impl KtType<'_> {
    /// Type in the public Kotlin API.
    fn kotlin(&self) -> String {
        match *self {
            KtType::Prim(p) => primitives::info_for(p).kotlin.to_string(),
            KtType::String => "String".to_string(),
            KtType::Buffer(p) => primitives::info_for(p).kotlin_array.to_string(),
            KtType::Handle(h) => h.to_string(),
            KtType::Enum(_) => "Int".to_string(),
            KtType::Record(q) => naming::flat_type_name(q),
        }
    }

    /// Type in the `external fun` declaration; handles travel as their raw pointer.
    fn native(&self) -> String {
        match self {
            KtType::Handle(_) => "Long".to_string(),
            other => other.kotlin(),
        }
    }

    fn jni(&self) -> &'static str {
        match *self {
            KtType::Prim(p) => primitives::info_for(p).jni,
            KtType::String => "jstring",
            KtType::Buffer(p) => primitives::info_for(p).jni_array,
            KtType::Handle(_) => "jlong",
            KtType::Enum(_) => "jint",
            KtType::Record(_) => "jobject",
        }
    }
}

struct KotlinGen<'a> {
    ctx: &'a EmitContext<'a>,
    /// JVM package, `example.app` for `example_app`.
    package: String,
    /// The API object and file name, `ExampleApp`.
    object: String,
}

impl<'a> KotlinGen<'a> {
    fn new(ctx: &'a EmitContext<'a>) -> Self {
        Self {
            ctx,
            package: naming::kotlin_package(ctx.api_name()),
            object: ctx.pascal_api(),
        }
    }

    /// `example/app/<class>`, as `FindClass` wants it.
    fn class_path(&self, class: &str) -> String {
        format!("{}/{class}", self.package.replace('.', "/"))
    }

    fn native_name(op: &Operation<'_>) -> String {
        format!("native{}", op.pascal_name())
    }

    fn kt_type<'t>(&self, ty: &'t str) -> Result<KtType<'t>, EmitError> {
        Ok(match self.ctx.classify(NAME, ty)? {
            TypeRef::Primitive(p) => KtType::Prim(p),
            TypeRef::String => KtType::String,
            TypeRef::Buffer(p) => KtType::Buffer(p),
            TypeRef::Handle(h) => KtType::Handle(h),
            TypeRef::Qualified(q) => {
                let info = self.ctx.type_info(NAME, q)?;
                if info.is_enum() {
                    KtType::Enum(q)
                } else if info.is_record() {
                    KtType::Record(q)
                } else {
                    return Err(EmitError::unsupported(NAME, format!("{q} is a {} and has no JVM mapping", info.kind)));
                }
            }
        })
    }

    /// Records reachable from `roots` through record-typed fields, nested ones first.
    fn record_closure(&self, roots: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut visiting = Vec::new();
        for root in roots {
            self.visit_record(root, &mut visiting, &mut out);
        }
        out
    }

    fn visit_record(&self, name: &'a str, visiting: &mut Vec<&'a str>, out: &mut Vec<&'a str>) {
        if out.contains(&name) || visiting.contains(&name) {
            return;
        }
        let Some(info) = self.ctx.types.get(name).filter(|i| i.is_record()) else {
            return;
        };
        visiting.push(name);
        for field in &info.fields {
            if let FieldType::Named(inner) = &field.ty {
                self.visit_record(inner.as_str(), visiting, out);
            }
        }
        visiting.pop();
        out.push(name);
    }

    /// Record types named by parameters, with their nested records.
    fn passed_records(&self) -> Vec<&'a str> {
        let mut roots = Vec::new();
        for iface in &self.ctx.api.interfaces {
            for m in iface.constructors.iter().chain(iface.methods.iter()) {
                for p in &m.parameters {
                    if let Some(TypeRef::Qualified(q)) = TypeRef::parse(&p.ty) {
                        if !roots.contains(&q) {
                            roots.push(q);
                        }
                    }
                }
            }
        }
        self.record_closure(roots)
    }

    /// Record types returned by any operation, with their nested records.
    fn returned_records(&self) -> Vec<&'a str> {
        self.record_closure(self.ctx.returned_qualified_types())
    }

    fn field_kotlin(&self, record: &str, ty: &FieldType) -> Result<String, EmitError> {
        Ok(match ty {
            FieldType::Primitive(p) => primitives::info_for(*p).kotlin.to_string(),
            FieldType::String => "String".to_string(),
            FieldType::Vector(inner) => match inner.as_ref() {
                FieldType::Primitive(p) => primitives::info_for(*p).kotlin_array.to_string(),
                other => {
                    return Err(EmitError::unsupported(
                        NAME,
                        format!("{record}: vectors of {other} have no JNI mapping"),
                    ));
                }
            },
            FieldType::Named(n) if self.ctx.is_enum(n) => "Int".to_string(),
            FieldType::Named(n) if self.ctx.types.get(n).is_some_and(|i| i.is_record()) => naming::flat_type_name(n),
            FieldType::Named(n) => {
                return Err(EmitError::unsupported(NAME, format!("{record}: field type {n} has no JVM mapping")));
            }
        })
    }

    /// JVM descriptor of a data-class field.
    fn field_signature(&self, ty: &FieldType) -> String {
        match ty {
            FieldType::Primitive(p) => primitives::info_for(*p).jni_signature.to_string(),
            FieldType::String => "Ljava/lang/String;".to_string(),
            FieldType::Vector(inner) => format!("[{}", self.field_signature(inner)),
            FieldType::Named(n) if self.ctx.is_enum(n) => "I".to_string(),
            FieldType::Named(n) => format!("L{};", self.class_path(&naming::flat_type_name(n))),
        }
    }

    // ---- Kotlin ----

    fn kotlin_file(&self) -> Result<String, EmitError> {
        let mut w = CodeWriter::new();
        w.write(&banner::generated(CommentStyle::Slash, &self.ctx.source_name()));
        w.line(&format!("package {}", self.package));
        w.blank_line();

        for error in self.ctx.api.error_types() {
            w.line(&format!(
                "class {}(val errorCode: Int) : Exception(\"Error code: $errorCode\")",
                exception_name(error)
            ));
            w.blank_line();
        }

        let mut records = self.returned_records();
        for r in self.passed_records() {
            if !records.contains(&r) {
                records.push(r);
            }
        }
        for record in records {
            let info = self.ctx.type_info(NAME, record)?;
            let mut fields = Vec::with_capacity(info.fields.len());
            for f in &info.fields {
                fields.push(format!("val {}: {}", kt_ident(&f.name), self.field_kotlin(record, &f.ty)?));
            }
            w.line(&format!("data class {}({})", naming::flat_type_name(record), fields.join(", ")));
            w.blank_line();
        }

        for handle in &self.ctx.api.handles {
            self.write_handle_class(&mut w, handle)?;
        }
        self.write_object(&mut w)?;
        Ok(w.finish())
    }

    fn write_handle_class(&self, w: &mut CodeWriter, handle: &HandleDef) -> Result<(), EmitError> {
        if let Some(desc) = &handle.description {
            w.lines(["/**".to_string(), format!(" * {desc}"), " */".to_string()]);
        }
        w.line(&format!("class {} internal constructor(handle: Long) : AutoCloseable {{", handle.name));
        w.indent();
        w.line("internal var handle: Long = handle");
        w.indented(|w| w.line("private set"));
        w.blank_line();

        for iface in &self.ctx.api.interfaces {
            for op in iface.operations() {
                if op.kind == OperationKind::Method && op.leading_handle() == Some(handle.name.as_str()) {
                    self.write_wrapper(w, &op, true)?;
                }
            }
        }

        let destructor = self.ctx.api.handle_owner(&handle.name).and_then(|iface| {
            iface
                .operations()
                .into_iter()
                .find(|op| op.kind == OperationKind::Destructor)
                .map(|op| Self::native_name(&op))
        });
        match destructor {
            Some(native) => {
                w.block("override fun close()", |w| {
                    w.block("if (handle != 0L)", |w| {
                        w.line(&format!("{}.{native}(handle)", self.object));
                        w.line("handle = 0L");
                    });
                });
            }
            None => w.line("override fun close() { }"),
        }
        w.dedent();
        w.line("}");
        w.blank_line();
        Ok(())
    }

    fn write_object(&self, w: &mut CodeWriter) -> Result<(), EmitError> {
        w.line(&format!("object {} {{", self.object));
        w.indent();
        w.block("init", |w| w.line(&format!("System.loadLibrary(\"{}\")", self.ctx.api_name())));
        w.blank_line();

        for iface in &self.ctx.api.interfaces {
            for op in iface.operations() {
                if op.kind == OperationKind::Constructor {
                    self.write_wrapper(w, &op, false)?;
                }
            }
        }
        for iface in &self.ctx.api.interfaces {
            for op in iface.operations() {
                let instance = op.leading_handle().is_some_and(|h| self.ctx.api.handle(h).is_some());
                if op.kind == OperationKind::Method && !instance {
                    self.write_wrapper(w, &op, false)?;
                }
            }
        }

        for iface in &self.ctx.api.interfaces {
            for op in iface.operations() {
                w.line(&self.native_decl(&op)?);
            }
        }
        w.dedent();
        w.line("}");
        Ok(())
    }

    /// A public wrapper around one native call. Instance wrappers take the receiver's handle as
    /// the first native argument.
    fn write_wrapper(&self, w: &mut CodeWriter, op: &Operation<'_>, instance: bool) -> Result<(), EmitError> {
        let params = if instance { &op.parameters[1..] } else { &op.parameters[..] };
        let mut decls = Vec::with_capacity(params.len());
        let mut args = Vec::with_capacity(params.len() + 1);
        if instance {
            args.push("handle".to_string());
        }
        for p in params {
            let kt = self.kt_type(&p.ty)?;
            let name = kt_ident(&p.name);
            decls.push(format!("{name}: {}", kt.kotlin()));
            args.push(match kt {
                KtType::Handle(_) => format!("{name}.handle"),
                _ => name,
            });
        }
        let ret = op.return_type().map(|t| self.kt_type(t)).transpose()?;

        let fn_name = kt_ident(&op.name);
        let head = match &ret {
            Some(r) => format!("fun {fn_name}({}): {}", decls.join(", "), r.kotlin()),
            None => format!("fun {fn_name}({})", decls.join(", ")),
        };
        let receiver = if instance { format!("{}.", self.object) } else { String::new() };
        let call = format!("{receiver}{}({})", Self::native_name(op), args.join(", "));

        w.line(&format!("{head} {{"));
        w.indent();
        match (op.error.as_deref(), ret) {
            (Some(_), Some(KtType::Record(_))) => w.line(&format!("return {call}")),
            (Some(err), Some(r)) => {
                w.line(&format!("val result = {call}"));
                w.line(&format!("if (result[0] != 0L) throw {}(result[0].toInt())", exception_name(err)));
                w.line(&format!("return {}", decode_payload(r, "result[1]")?));
            }
            (Some(err), None) => {
                w.line(&format!("val rc = {call}"));
                w.line(&format!("if (rc != 0) throw {}(rc)", exception_name(err)));
            }
            (None, Some(KtType::Handle(h))) => w.line(&format!("return {h}({call})")),
            (None, Some(_)) => w.line(&format!("return {call}")),
            (None, None) => w.line(&call),
        }
        w.dedent();
        w.line("}");
        w.blank_line();
        Ok(())
    }

    fn native_decl(&self, op: &Operation<'_>) -> Result<String, EmitError> {
        let mut params = Vec::with_capacity(op.parameters.len());
        for p in &op.parameters {
            params.push(format!("{}: {}", kt_ident(&p.name), self.kt_type(&p.ty)?.native()));
        }
        let ret = op.return_type().map(|t| self.kt_type(t)).transpose()?;
        let ret = match (op.shape(), ret) {
            (MethodShape::InfallibleVoid, _) => "Unit".to_string(),
            (MethodShape::FallibleVoid, _) => "Int".to_string(),
            (MethodShape::FallibleValue, Some(r @ KtType::Record(_))) => r.kotlin(),
            (MethodShape::FallibleValue, _) => "LongArray".to_string(),
            (MethodShape::InfallibleValue, Some(r)) => r.native(),
            (MethodShape::InfallibleValue, None) => {
                return Err(EmitError::internal(NAME, format!("{} returns a value without a type", op.name)));
            }
        };
        Ok(format!("external fun {}({}): {ret}", Self::native_name(op), params.join(", ")))
    }

    // ---- JNI ----

    fn jni_file(&self) -> Result<String, EmitError> {
        let mut w = CodeWriter::new();
        w.write(&banner::generated(CommentStyle::Slash, &self.ctx.source_name()));
        w.lines(["#include <jni.h>", "#include <stdint.h>", "#include <stdlib.h>", "#include <string.h>"]);
        w.line(&format!("#include \"{}.h\"", self.ctx.api_name()));
        w.blank_line();

        let passed = self.passed_records();
        let returned = self.returned_records();

        let throws = self.ctx.api.interfaces.iter().any(|iface| {
            iface.constructors.iter().chain(iface.methods.iter()).any(|m| {
                m.is_fallible()
                    && m
                        .return_type()
                        .and_then(TypeRef::parse)
                        .and_then(|t| t.qualified_name())
                        .is_some_and(|q| self.ctx.types.get(q).is_some_and(|i| i.is_record()))
            })
        });
        if throws {
            write_throw_helper(&mut w);
        }
        let copies_strings = passed.iter().any(|r| {
            self.ctx
                .types
                .get(r)
                .is_some_and(|i| i.fields.iter().any(|f| f.ty == FieldType::String))
        });
        if copies_strings {
            write_copy_string_helper(&mut w);
        }

        for record in &returned {
            self.write_to_java(&mut w, record)?;
        }
        for record in &passed {
            self.write_from_java(&mut w, record)?;
            self.write_release(&mut w, record)?;
        }

        for iface in &self.ctx.api.interfaces {
            w.line(&format!("/* {} */", iface.name));
            w.blank_line();
            for op in iface.operations() {
                self.write_bridge(&mut w, &op)?;
            }
        }
        Ok(w.finish())
    }

    fn write_to_java(&self, w: &mut CodeWriter, record: &str) -> Result<(), EmitError> {
        let info = self.ctx.type_info(NAME, record)?;
        let flat = naming::flat_type_name(record);
        w.line(&format!(
            "static jobject {flat}_to_java(JNIEnv *env, const {} *value) {{",
            naming::c_type_name(record)
        ));
        w.indent();
        let mut signature = String::new();
        let mut args = Vec::with_capacity(info.fields.len());
        for f in &info.fields {
            let n = &f.name;
            signature.push_str(&self.field_signature(&f.ty));
            match &f.ty {
                FieldType::Primitive(p) => args.push(format!("({})value->{n}", primitives::info_for(*p).jni)),
                FieldType::String => {
                    w.line(&format!(
                        "jstring j_{n} = (*env)->NewStringUTF(env, value->{n} != NULL ? value->{n} : \"\");"
                    ));
                    args.push(format!("j_{n}"));
                }
                FieldType::Vector(inner) => {
                    let FieldType::Primitive(p) = inner.as_ref() else {
                        return Err(EmitError::unsupported(NAME, format!("{record}: vectors of {inner} have no JNI mapping")));
                    };
                    let prim = primitives::info_for(*p);
                    w.line(&format!(
                        "{} j_{n} = (*env)->New{}Array(env, (jsize)value->{n}_count);",
                        prim.jni_array, prim.jni_array_accessor
                    ));
                    w.block(&format!("if (j_{n} != NULL && value->{n}_count > 0)"), |w| {
                        w.line(&format!(
                            "(*env)->Set{}ArrayRegion(env, j_{n}, 0, (jsize)value->{n}_count, (const {} *)value->{n});",
                            prim.jni_array_accessor, prim.jni
                        ));
                    });
                    args.push(format!("j_{n}"));
                }
                FieldType::Named(t) if self.ctx.is_enum(t) => args.push(format!("(jint)value->{n}")),
                FieldType::Named(t) => {
                    w.line(&format!(
                        "jobject j_{n} = {}_to_java(env, &value->{n});",
                        naming::flat_type_name(t)
                    ));
                    args.push(format!("j_{n}"));
                }
            }
        }
        w.line(&format!("jclass cls = (*env)->FindClass(env, \"{}\");", self.class_path(&flat)));
        w.line(&format!("jmethodID ctor = (*env)->GetMethodID(env, cls, \"<init>\", \"({signature})V\");"));
        if args.is_empty() {
            w.line("return (*env)->NewObject(env, cls, ctor);");
        } else {
            w.line(&format!("return (*env)->NewObject(env, cls, ctor, {});", args.join(", ")));
        }
        w.dedent();
        w.line("}");
        w.blank_line();
        Ok(())
    }

    fn write_from_java(&self, w: &mut CodeWriter, record: &str) -> Result<(), EmitError> {
        let info = self.ctx.type_info(NAME, record)?;
        let flat = naming::flat_type_name(record);
        w.line(&format!(
            "static void {flat}_from_java(JNIEnv *env, jobject obj, {} *out) {{",
            naming::c_type_name(record)
        ));
        w.indent();
        w.line("memset(out, 0, sizeof *out);");
        w.block("if (obj == NULL)", |w| w.line("return;"));
        w.line("jclass cls = (*env)->GetObjectClass(env, obj);");
        for f in &info.fields {
            let n = &f.name;
            let jvm_name = naming::camel_case(n);
            let field_id = format!(
                "(*env)->GetFieldID(env, cls, \"{jvm_name}\", \"{}\")",
                self.field_signature(&f.ty)
            );
            match &f.ty {
                FieldType::Primitive(PrimitiveId::Bool) => {
                    w.line(&format!("out->{n} = (*env)->GetBooleanField(env, obj, {field_id}) == JNI_TRUE;"));
                }
                FieldType::Primitive(p) => {
                    let prim = primitives::info_for(*p);
                    w.line(&format!(
                        "out->{n} = ({})(*env)->Get{}Field(env, obj, {field_id});",
                        prim.c, prim.jni_array_accessor
                    ));
                }
                FieldType::String => {
                    w.line(&format!(
                        "out->{n} = copy_string(env, (jstring)(*env)->GetObjectField(env, obj, {field_id}));"
                    ));
                }
                FieldType::Vector(inner) => {
                    let FieldType::Primitive(p) = inner.as_ref() else {
                        return Err(EmitError::unsupported(NAME, format!("{record}: vectors of {inner} have no JNI mapping")));
                    };
                    let prim = primitives::info_for(*p);
                    w.line("{");
                    w.indented(|w| {
                        w.line(&format!(
                            "{arr} arr = ({arr})(*env)->GetObjectField(env, obj, {field_id});",
                            arr = prim.jni_array
                        ));
                        w.line("jsize n = arr != NULL ? (*env)->GetArrayLength(env, arr) : 0;");
                        w.line(&format!(
                            "{c} *data = n > 0 ? ({c} *)malloc(sizeof({c}) * (size_t)n) : NULL;",
                            c = prim.c
                        ));
                        w.block("if (data != NULL)", |w| {
                            w.line(&format!(
                                "(*env)->Get{}ArrayRegion(env, arr, 0, n, ({} *)data);",
                                prim.jni_array_accessor, prim.jni
                            ));
                        });
                        w.line(&format!("out->{n} = data;"));
                        w.line(&format!("out->{n}_count = data != NULL ? (uint32_t)n : 0;"));
                    });
                    w.line("}");
                }
                FieldType::Named(t) if self.ctx.is_enum(t) => {
                    w.line(&format!(
                        "out->{n} = ({})(*env)->GetIntField(env, obj, {field_id});",
                        naming::c_type_name(t)
                    ));
                }
                FieldType::Named(t) => {
                    w.line(&format!(
                        "{}_from_java(env, (*env)->GetObjectField(env, obj, {field_id}), &out->{n});",
                        naming::flat_type_name(t)
                    ));
                }
            }
        }
        w.dedent();
        w.line("}");
        w.blank_line();
        Ok(())
    }

    /// Frees what `_from_java` copied.
    fn write_release(&self, w: &mut CodeWriter, record: &str) -> Result<(), EmitError> {
        let info = self.ctx.type_info(NAME, record)?;
        let mut lines = Vec::new();
        for f in &info.fields {
            match &f.ty {
                FieldType::String | FieldType::Vector(_) => lines.push(format!("free((void *)value->{});", f.name)),
                FieldType::Named(t) if !self.ctx.is_enum(t) => {
                    lines.push(format!("{}_release(&value->{});", naming::flat_type_name(t), f.name));
                }
                _ => {}
            }
        }
        if lines.is_empty() {
            lines.push("(void)value;".to_string());
        }
        w.block(
            &format!(
                "static void {}_release({} *value)",
                naming::flat_type_name(record),
                naming::c_type_name(record)
            ),
            |w| w.lines(lines),
        );
        w.blank_line();
        Ok(())
    }

    fn write_bridge(&self, w: &mut CodeWriter, op: &Operation<'_>) -> Result<(), EmitError> {
        let sig = CSignature::for_operation(self.ctx, NAME, op)?;
        let ret = op.return_type().map(|t| self.kt_type(t)).transpose()?;
        let jni_ret = match (op.shape(), ret) {
            (MethodShape::InfallibleVoid, _) => "void",
            (MethodShape::FallibleVoid, _) => "jint",
            (_, Some(KtType::Record(_))) => "jobject",
            (MethodShape::FallibleValue, _) => "jlongArray",
            (MethodShape::InfallibleValue, Some(r)) => r.jni(),
            (MethodShape::InfallibleValue, None) => {
                return Err(EmitError::internal(NAME, format!("{} returns a value without a type", op.name)));
            }
        };

        let mut params = vec!["JNIEnv *env".to_string(), "jobject thiz".to_string()];
        let mut setup = Vec::new();
        let mut args = Vec::new();
        let mut cleanup = Vec::new();
        for p in &op.parameters {
            let kt = self.kt_type(&p.ty)?;
            let n = &p.name;
            params.push(format!("{} {n}", kt.jni()));
            match kt {
                KtType::String => {
                    setup.push(format!("const char *c_{n} = (*env)->GetStringUTFChars(env, {n}, NULL);"));
                    args.push(format!("c_{n}"));
                    cleanup.push(format!("(*env)->ReleaseStringUTFChars(env, {n}, c_{n});"));
                }
                KtType::Buffer(elem) => {
                    let prim = primitives::info_for(elem);
                    let (cast, mode) = if p.effective_transfer().is_mut() {
                        (format!("({} *)", prim.c), "0")
                    } else {
                        (format!("(const {} *)", prim.c), "JNI_ABORT")
                    };
                    setup.push(format!(
                        "{} *{n}_elems = (*env)->Get{}ArrayElements(env, {n}, NULL);",
                        prim.jni, prim.jni_array_accessor
                    ));
                    setup.push(format!("jsize {n}_len = (*env)->GetArrayLength(env, {n});"));
                    args.push(format!("{cast}{n}_elems"));
                    args.push(format!("(uint32_t){n}_len"));
                    cleanup.push(format!(
                        "(*env)->Release{}ArrayElements(env, {n}, {n}_elems, {mode});",
                        prim.jni_array_accessor
                    ));
                }
                KtType::Handle(h) => args.push(format!("({})(intptr_t){n}", naming::handle_typedef(h))),
                KtType::Prim(PrimitiveId::Bool) => args.push(format!("{n} == JNI_TRUE")),
                KtType::Prim(prim) => args.push(format!("({}){n}", primitives::info_for(prim).c)),
                KtType::Enum(q) => args.push(format!("({}){n}", naming::c_type_name(q))),
                KtType::Record(q) => {
                    let flat = naming::flat_type_name(q);
                    setup.push(format!("{} c_{n};", naming::c_type_name(q)));
                    setup.push(format!("{flat}_from_java(env, {n}, &c_{n});"));
                    args.push(match p.effective_transfer() {
                        Transfer::Value => format!("c_{n}"),
                        Transfer::Ref | Transfer::RefMut => format!("&c_{n}"),
                    });
                    cleanup.push(format!("{flat}_release(&c_{n});"));
                }
            }
        }

        let symbol = naming::jni_symbol(&self.package, &self.object, &Self::native_name(op));
        w.line(&format!("JNIEXPORT {jni_ret} JNICALL"));
        w.line(&format!("{symbol}({}) {{", params.join(", ")));
        w.indent();
        w.line("(void)thiz;");
        w.lines(&setup);
        let c_fn = &sig.name;
        match (op.shape(), ret) {
            (MethodShape::InfallibleVoid, _) => {
                w.line(&format!("{c_fn}({});", args.join(", ")));
                w.lines(&cleanup);
            }
            (MethodShape::InfallibleValue, Some(KtType::Record(q))) => {
                w.line(&format!("{} {OUT_RESULT} = {c_fn}({});", sig.ret, args.join(", ")));
                w.lines(&cleanup);
                w.line(&format!("return {}_to_java(env, &{OUT_RESULT});", naming::flat_type_name(q)));
            }
            (MethodShape::InfallibleValue, r) => {
                w.line(&format!("{} result = {c_fn}({});", sig.ret, args.join(", ")));
                w.lines(&cleanup);
                let value = match r {
                    Some(KtType::Handle(_)) => "(jlong)(intptr_t)result".to_string(),
                    Some(KtType::Prim(PrimitiveId::Bool)) => "result ? JNI_TRUE : JNI_FALSE".to_string(),
                    _ => format!("({jni_ret})result"),
                };
                w.line(&format!("return {value};"));
            }
            (MethodShape::FallibleVoid, _) => {
                w.line(&format!("int32_t rc = {c_fn}({});", args.join(", ")));
                w.lines(&cleanup);
                w.line("return (jint)rc;");
            }
            (MethodShape::FallibleValue, r) => {
                let pointee = sig
                    .out_pointee
                    .as_deref()
                    .ok_or_else(|| EmitError::internal(NAME, format!("{} has no out-parameter", op.name)))?;
                args.push(format!("&{OUT_RESULT}"));
                w.line(&format!("{pointee} {OUT_RESULT};"));
                w.line(&format!("int32_t rc = {c_fn}({});", args.join(", ")));
                w.lines(&cleanup);
                match r {
                    Some(KtType::Record(q)) => {
                        let error = op.error.as_deref().unwrap_or_default();
                        let class = self.class_path(&exception_name(error));
                        w.block("if (rc != 0)", |w| {
                            w.line(&format!("throw_error(env, \"{class}\", rc);"));
                            w.line("return NULL;");
                        });
                        w.line(&format!("return {}_to_java(env, &{OUT_RESULT});", naming::flat_type_name(q)));
                    }
                    other => {
                        w.line("jlong values[2] = { (jlong)rc, 0 };");
                        w.block("if (rc == 0)", |w| write_payload(w, other));
                        w.line("jlongArray arr = (*env)->NewLongArray(env, 2);");
                        w.block("if (arr != NULL)", |w| {
                            w.line("(*env)->SetLongArrayRegion(env, arr, 0, 2, values);");
                        });
                        w.line("return arr;");
                    }
                }
            }
        }
        w.dedent();
        w.line("}");
        w.blank_line();
        Ok(())
    }
}

/// Kotlin expression turning the `LongArray` payload `e` back into the declared return type.
fn decode_payload(ret: KtType<'_>, e: &str) -> Result<String, EmitError> {
    Ok(match ret {
        KtType::Handle(h) => format!("{h}({e})"),
        KtType::Enum(_) => format!("{e}.toInt()"),
        KtType::Prim(p) => match p {
            PrimitiveId::Int64 | PrimitiveId::UInt64 => e.to_string(),
            PrimitiveId::Int32 | PrimitiveId::UInt32 => format!("{e}.toInt()"),
            PrimitiveId::Int16 | PrimitiveId::UInt16 => format!("{e}.toShort()"),
            PrimitiveId::Int8 | PrimitiveId::UInt8 => format!("{e}.toByte()"),
            PrimitiveId::Float32 => format!("Float.fromBits({e}.toInt())"),
            PrimitiveId::Float64 => format!("Double.fromBits({e})"),
            PrimitiveId::Bool => format!("{e} != 0L"),
        },
        other => {
            return Err(EmitError::unsupported(
                NAME,
                format!("{} cannot travel in a LongArray", other.kotlin()),
            ));
        }
    })
}

/// Store `out_result` in `values[1]`; floats keep their bit pattern.
fn write_payload(w: &mut CodeWriter, ret: Option<KtType<'_>>) {
    match ret {
        Some(KtType::Prim(PrimitiveId::Float32)) => {
            w.line("int32_t bits;");
            w.line(&format!("memcpy(&bits, &{OUT_RESULT}, sizeof bits);"));
            w.line("values[1] = (jlong)bits;");
        }
        Some(KtType::Prim(PrimitiveId::Float64)) => {
            w.line(&format!("memcpy(&values[1], &{OUT_RESULT}, sizeof {OUT_RESULT});"));
        }
        Some(KtType::Handle(_)) => w.line(&format!("values[1] = (jlong)(intptr_t){OUT_RESULT};")),
        _ => w.line(&format!("values[1] = (jlong){OUT_RESULT};")),
    }
}

fn write_throw_helper(w: &mut CodeWriter) {
    w.block("static void throw_error(JNIEnv *env, const char *class_name, int32_t code)", |w| {
        w.line("jclass cls = (*env)->FindClass(env, class_name);");
        w.block("if (cls == NULL)", |w| w.line("return;"));
        w.line("jmethodID ctor = (*env)->GetMethodID(env, cls, \"<init>\", \"(I)V\");");
        w.line("(*env)->Throw(env, (jthrowable)(*env)->NewObject(env, cls, ctor, (jint)code));");
    });
    w.blank_line();
}

fn write_copy_string_helper(w: &mut CodeWriter) {
    w.block("static char *copy_string(JNIEnv *env, jstring s)", |w| {
        w.block("if (s == NULL)", |w| w.line("return NULL;"));
        w.line("const char *chars = (*env)->GetStringUTFChars(env, s, NULL);");
        w.block("if (chars == NULL)", |w| w.line("return NULL;"));
        w.line("size_t len = strlen(chars);");
        w.line("char *copy = (char *)malloc(len + 1);");
        w.block("if (copy != NULL)", |w| w.line("memcpy(copy, chars, len + 1);"));
        w.line("(*env)->ReleaseStringUTFChars(env, s, chars);");
        w.line("return copy;");
    });
    w.blank_line();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::emit::test_support::{content, fixture, minimal, paths, run};

    #[test]
    fn artifact_set() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        assert_eq!(paths(&arts), ["ExampleApp.kt", "example_app_jni.c"]);
        assert!(arts.iter().all(|a| !a.is_scaffold));
    }

    #[test]
    fn exception_carries_the_first_long_array_element() {
        let (api, types) = minimal();
        let arts = run(emitter(), &api, &types);
        let kt = content(&arts, "TestApi.kt");
        assert!(kt.contains("package test.api\n"));
        assert!(kt.contains("class CommonErrorCodeException(val errorCode: Int) : Exception(\"Error code: $errorCode\")"));
        assert!(kt.contains(
            "    fun createEngine(): Engine {\n        val result = nativeLifecycleCreateEngine()\n        if (result[0] != 0L) throw CommonErrorCodeException(result[0].toInt())\n        return Engine(result[1])\n    }\n"
        ));
        assert!(kt.contains("    external fun nativeLifecycleCreateEngine(): LongArray\n"));
        assert!(kt.contains("    external fun nativeLifecycleDestroyEngine(engine: Long): Unit\n"));
    }

    #[test]
    fn handle_close_routes_to_the_destructor() {
        let (api, types) = minimal();
        let arts = run(emitter(), &api, &types);
        let kt = content(&arts, "TestApi.kt");
        assert!(kt.contains("/**\n * The engine instance.\n */\nclass Engine internal constructor(handle: Long) : AutoCloseable {"));
        assert!(kt.contains("            TestApi.nativeLifecycleDestroyEngine(handle)\n            handle = 0L\n"));
        assert!(kt.contains("System.loadLibrary(\"test_api\")"));
    }

    #[test]
    fn instance_methods_live_on_the_handle_class() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let kt = content(&arts, "ExampleApp.kt");
        let renderer = &kt[kt.find("class Renderer internal").expect("renderer class")..kt.find("object ExampleApp").expect("object")];
        assert!(renderer.contains("    fun beginFrame() {\n        val rc = ExampleApp.nativeRendererBeginFrame(handle)\n        if (rc != 0) throw CommonErrorCodeException(rc)\n"));
        assert!(renderer.contains("    fun uploadPixels(pixels: ByteArray, format: Int) {"));
        assert!(renderer.contains("    fun getConfig(): RenderingRendererConfig {\n        return ExampleApp.nativeRendererGetConfig(handle)\n"));
        assert!(renderer.contains("        return result[1].toInt()\n"), "read_depth decodes an Int");
        assert!(!renderer.contains("fun getGreeting"));

        let object = &kt[kt.find("object ExampleApp").expect("object")..];
        assert!(object.contains("    fun createRenderer(config: RenderingRendererConfig): Renderer {"));
        assert!(object.contains("    fun getGreeting(name: String): HelloGreeting {\n        return nativeInfoGetGreeting(name)\n"));
        assert!(object.contains("    fun scale(value: Double, enabled: Boolean): Double {"));
        assert!(object.contains("    external fun nativeRendererGetConfig(renderer: Long): RenderingRendererConfig\n"));
        assert!(object.contains("    external fun nativeRendererUploadPixels(renderer: Long, pixels: ByteArray, format: Int): Int\n"));
    }

    #[test]
    fn data_classes_cover_passed_and_returned_records() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let kt = content(&arts, "ExampleApp.kt");
        assert!(kt.contains("data class HelloGreeting(val message: String, val apiImpl: String)\n"));
        assert!(kt.contains("data class RenderingRendererConfig(val width: Int, val height: Int, val vsync: Boolean)\n"));
    }

    #[test]
    fn jni_bridge_follows_the_java_symbol_convention() {
        let (api, types) = minimal();
        let arts = run(emitter(), &api, &types);
        let c = content(&arts, "test_api_jni.c");
        assert!(c.contains("#include \"test_api.h\""));
        assert!(c.contains("JNIEXPORT jlongArray JNICALL\nJava_test_api_TestApi_nativeLifecycleCreateEngine(JNIEnv *env, jobject thiz) {"));
        assert!(c.contains("    engine_handle out_result;\n    int32_t rc = test_api_lifecycle_create_engine(&out_result);\n"));
        assert!(c.contains("values[1] = (jlong)(intptr_t)out_result;"));
        assert!(c.contains("test_api_lifecycle_destroy_engine((engine_handle)(intptr_t)engine);"));
        assert!(!c.contains("throw_error"), "no record-returning fallible calls");
    }

    #[test]
    fn jni_releases_pinned_arguments_before_returning() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let c = content(&arts, "example_app_jni.c");
        assert!(c.contains("    const char *c_title = (*env)->GetStringUTFChars(env, title, NULL);\n    example_app_renderer_set_title((renderer_handle)(intptr_t)renderer, c_title);\n    (*env)->ReleaseStringUTFChars(env, title, c_title);\n"));
        assert!(c.contains("(*env)->ReleaseByteArrayElements(env, pixels, pixels_elems, JNI_ABORT);"));
        assert!(c.contains("(*env)->ReleaseFloatArrayElements(env, dest, dest_elems, 0);"));
        assert!(c.contains("(Rendering_TextureFormat)format"));
    }

    #[test]
    fn jni_converts_records_by_field_name() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let c = content(&arts, "example_app_jni.c");
        assert!(c.contains("out->width = (uint32_t)(*env)->GetIntField(env, obj, (*env)->GetFieldID(env, cls, \"width\", \"I\"));"));
        assert!(c.contains("out->vsync = (*env)->GetBooleanField(env, obj, (*env)->GetFieldID(env, cls, \"vsync\", \"Z\")) == JNI_TRUE;"));
        assert!(c.contains("RenderingRendererConfig_from_java(env, config, &c_config);"));
        assert!(c.contains("example_app_renderer_create_renderer(&c_config, &out_result);"));
        assert!(c.contains("jmethodID ctor = (*env)->GetMethodID(env, cls, \"<init>\", \"(Ljava/lang/String;Ljava/lang/String;)V\");"));
        assert!(c.contains("FindClass(env, \"example/app/HelloGreeting\")"));
    }

    #[test]
    fn fallible_record_returns_throw_from_native_code() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let c = content(&arts, "example_app_jni.c");
        assert!(c.contains("static void throw_error(JNIEnv *env, const char *class_name, int32_t code) {"));
        assert!(c.contains(
            "    if (rc != 0) {\n        throw_error(env, \"example/app/CommonErrorCodeException\", rc);\n        return NULL;\n    }\n    return RenderingRendererConfig_to_java(env, &out_result);\n"
        ));
    }
}
