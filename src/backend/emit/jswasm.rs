//! JavaScript + WebAssembly binding emitter.
//!
//! One ES module, `<api>.js`: linear-memory helpers, a class per handle, a WASI preview1 shim, the
//! platform-service import object, an async loader and one wrapper object per interface. Records
//! cross the boundary as pointers to memory laid out by [`layout`]; every allocation a call makes
//! is freed in its `finally`.

use xplatter_core::lang::primitives::{self, PrimitiveId};
use xplatter_core::naming;
use xplatter_core::{Transfer, TypeRef};

use crate::backend::artifact::Artifact;
use crate::backend::banner::{self, CommentStyle};
use crate::backend::context::EmitContext;
use crate::backend::errors::EmitError;
use crate::backend::layout::{self, POINTER_SIZE, SlotKind, StructLayout};
use crate::backend::registry::Emitter;
use crate::backend::writer::CodeWriter;
use crate::frontend::model::{InterfaceDef, MethodShape, Operation, OperationKind, ParameterDef};
use crate::frontend::resolver::{FieldType, TypeKind};

pub const NAME: &str = "jswasm";

const JS_RESERVED: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do", "else",
    "enum", "export", "extends", "false", "finally", "for", "function", "if", "import", "in", "instanceof", "let",
    "new", "null", "return", "static", "super", "switch", "this", "throw", "true", "try", "typeof", "var", "void",
    "while", "with", "yield",
];

const MEMORY_HELPERS: &str = r#"const _encoder = new TextEncoder();
const _decoder = new TextDecoder();

let _wasm = null;

// Memory management helpers
function _malloc(size) {
  return _wasm.exports.malloc(size);
}

function _free(ptr) {
  _wasm.exports.free(ptr);
}

function _memoryBuffer() {
  return _wasm.exports.memory.buffer;
}

// A fresh view: any allocation may grow memory and detach older ones.
function _view() {
  return new DataView(_memoryBuffer());
}

// String marshalling
function _encodeString(str) {
  const bytes = _encoder.encode(str);
  const ptr = _malloc(bytes.length + 1);
  const dest = new Uint8Array(_memoryBuffer(), ptr, bytes.length + 1);
  dest.set(bytes);
  dest[bytes.length] = 0;
  return ptr;
}

function _decodeString(ptr) {
  if (ptr === 0) return '';
  const mem = new Uint8Array(_memoryBuffer());
  let end = ptr;
  while (mem[end] !== 0) end++;
  return _decoder.decode(mem.subarray(ptr, end));
}

function _allocString(str, allocs) {
  const ptr = _encodeString(str ?? '');
  allocs.push(ptr);
  return ptr;
}

// Buffer marshalling
function _copyBufferToWasm(typedArray) {
  const bytes = new Uint8Array(typedArray.buffer, typedArray.byteOffset, typedArray.byteLength);
  const ptr = _malloc(bytes.length);
  new Uint8Array(_memoryBuffer(), ptr, bytes.length).set(bytes);
  return [ptr, typedArray.length];
}

function _copyBufferFromWasm(ptr, typedArray) {
  const bytes = new Uint8Array(typedArray.buffer, typedArray.byteOffset, typedArray.byteLength);
  bytes.set(new Uint8Array(_memoryBuffer(), ptr, bytes.length));
}

// Record vectors
function _readArray(ptr, count, stride, read) {
  const out = [];
  if (ptr === 0) return out;
  for (let i = 0; i < count; i++) out.push(read(ptr + i * stride));
  return out;
}

function _writeArray(items, stride, write, allocs) {
  if (!items || items.length === 0) return 0;
  const ptr = _malloc(items.length * stride);
  allocs.push(ptr);
  items.forEach((item, i) => write(item, ptr + i * stride));
  return ptr;
}

"#;

const WASI_POLYFILL: &str = r#"// Minimal WASI snapshot_preview1 implementation for command-style (wasip1) modules.
function _buildWasiImports() {
  const ERRNO_SUCCESS = 0;
  const ERRNO_BADF = 8;
  const ERRNO_NOSYS = 52;
  return {
    fd_write(fd, iovsPtr, iovsLen, nwrittenPtr) {
      const mem = _memoryBuffer();
      const view = new DataView(mem);
      let written = 0;
      for (let i = 0; i < iovsLen; i++) {
        const base = iovsPtr + i * 8;
        const ptr = view.getUint32(base, true);
        const len = view.getUint32(base + 4, true);
        if (len > 0 && (fd === 1 || fd === 2)) {
          const text = _decoder.decode(new Uint8Array(mem, ptr, len));
          (fd === 2 ? console.error : console.log)(text.replace(/\n$/, ''));
        }
        written += len;
      }
      view.setUint32(nwrittenPtr, written, true);
      return ERRNO_SUCCESS;
    },
    fd_read: () => ERRNO_NOSYS,
    fd_seek: () => ERRNO_NOSYS,
    fd_close: () => ERRNO_SUCCESS,
    fd_fdstat_get: () => ERRNO_NOSYS,
    fd_fdstat_set_flags: () => ERRNO_NOSYS,
    // BADF: no preopened directories.
    fd_prestat_get: () => ERRNO_BADF,
    fd_prestat_dir_name: () => ERRNO_BADF,
    path_open: () => ERRNO_NOSYS,
    path_filestat_get: () => ERRNO_NOSYS,
    environ_sizes_get(countPtr, bufSizePtr) {
      const view = _view();
      view.setUint32(countPtr, 0, true);
      view.setUint32(bufSizePtr, 0, true);
      return ERRNO_SUCCESS;
    },
    environ_get(environPtr) {
      _view().setUint32(environPtr, 0, true);
      return ERRNO_SUCCESS;
    },
    args_sizes_get(argcPtr, bufSizePtr) {
      const view = _view();
      view.setUint32(argcPtr, 0, true);
      view.setUint32(bufSizePtr, 0, true);
      return ERRNO_SUCCESS;
    },
    args_get(argvPtr) {
      _view().setUint32(argvPtr, 0, true);
      return ERRNO_SUCCESS;
    },
    // Must not return: command modules trap right after proc_exit.
    proc_exit: (code) => {
      const e = new Error('proc_exit:' + code);
      e.wasiExitCode = code;
      throw e;
    },
    random_get(bufPtr, bufLen) {
      crypto.getRandomValues(new Uint8Array(_memoryBuffer(), bufPtr, bufLen));
      return ERRNO_SUCCESS;
    },
    clock_time_get(_clockId, _precision, timePtr) {
      _view().setBigUint64(timePtr, BigInt(Date.now()) * 1_000_000n, true);
      return ERRNO_SUCCESS;
    },
    clock_res_get(_clockId, resPtr) {
      _view().setBigUint64(resPtr, 1_000_000n, true);
      return ERRNO_SUCCESS;
    },
    sched_yield: () => ERRNO_SUCCESS,
    poll_oneoff: () => ERRNO_NOSYS,
    sock_accept: () => ERRNO_NOSYS,
    sock_recv: () => ERRNO_NOSYS,
    sock_send: () => ERRNO_NOSYS,
    sock_shutdown: () => ERRNO_NOSYS,
  };
}

"#;

pub fn emitter() -> Emitter {
    Emitter::new(NAME, emit)
}

fn emit(ctx: &EmitContext<'_>) -> Result<Vec<Artifact>, EmitError> {
    let js = Js { ctx };
    let mut w = CodeWriter::js();
    w.write(&banner::generated(CommentStyle::Slash, &ctx.source_name()));
    w.write(MEMORY_HELPERS);
    js.write_record_codecs(&mut w)?;
    js.write_handle_classes(&mut w);
    w.write(WASI_POLYFILL);
    js.write_platform_imports(&mut w);
    js.write_loader(&mut w);
    for iface in &ctx.api.interfaces {
        js.write_interface(&mut w, iface)?;
    }
    js.write_exports(&mut w);
    Ok(vec![Artifact::generated(format!("{}.js", ctx.api_name()), w.finish())])
}

fn js_ident(name: &str) -> String {
    let camel = naming::camel_case(name);
    if JS_RESERVED.contains(&camel.as_str()) { format!("{camel}_") } else { camel }
}

fn layout_error(err: layout::LayoutError) -> EmitError {
    EmitError::internal(NAME, err.to_string())
}

/// `ptr + 8`, or `ptr` at offset zero.
fn at(base: &str, offset: u32) -> String {
    if offset == 0 { base.to_string() } else { format!("{base} + {offset}") }
}

/// Value class of a record field or element, for memory access.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Prim(PrimitiveId),
    String,
    Record(String),
}

impl Slot {
    fn read(&self, addr: &str) -> String {
        match self {
            Slot::Prim(PrimitiveId::Bool) => format!("_view().getUint8({addr}) !== 0"),
            Slot::Prim(p) => format!("_view().get{}({addr}, true)", primitives::info_for(*p).data_view),
            Slot::String => format!("_decodeString(_view().getUint32({addr}, true))"),
            Slot::Record(q) => format!("_read{}({addr})", naming::flat_type_name(q)),
        }
    }

    fn write(&self, addr: &str, value: &str) -> String {
        match self {
            Slot::Prim(PrimitiveId::Bool) => format!("_view().setUint8({addr}, {value} ? 1 : 0);"),
            Slot::Prim(p) => format!("_view().set{}({addr}, {value}, true);", primitives::info_for(*p).data_view),
            Slot::String => format!("_view().setUint32({addr}, _allocString({value}, allocs), true);"),
            Slot::Record(q) => format!("_write{}({value}, {addr}, allocs);", naming::flat_type_name(q)),
        }
    }
}

struct Js<'a> {
    ctx: &'a EmitContext<'a>,
}

impl Js<'_> {
    /// Memory class of a schema field type; `None` for references the layout does not follow.
    fn field_slot(&self, ty: &FieldType) -> Option<Slot> {
        match ty {
            FieldType::Primitive(p) => Some(Slot::Prim(*p)),
            FieldType::String => Some(Slot::String),
            FieldType::Named(name) => self.named_slot(name),
            FieldType::Vector(_) => None,
        }
    }

    fn named_slot(&self, qualified: &str) -> Option<Slot> {
        let info = self.ctx.types.get(qualified)?;
        if info.is_enum() {
            Some(Slot::Prim(info.abi_scalar()))
        } else if info.is_record() {
            Some(Slot::Record(qualified.to_string()))
        } else {
            None
        }
    }

    fn stride(&self, slot: &Slot) -> Result<u32, EmitError> {
        Ok(match slot {
            Slot::Prim(p) => primitives::info_for(*p).wasm_size,
            Slot::String => POINTER_SIZE,
            Slot::Record(q) => layout::struct_layout(self.ctx.types, q).map_err(layout_error)?.size,
        })
    }

    fn write_record_codecs(&self, w: &mut CodeWriter) -> Result<(), EmitError> {
        let mut records = Vec::new();
        for kind in [TypeKind::Struct, TypeKind::Table] {
            for (name, _) in self.ctx.types.of_kind(kind) {
                records.push((name, layout::struct_layout(self.ctx.types, name).map_err(layout_error)?));
            }
        }
        if records.is_empty() {
            return Ok(());
        }
        w.comment("Records, at their wasm32 layout");
        for (name, layout) in &records {
            self.write_record_codec(w, name, layout)?;
        }
        Ok(())
    }

    fn write_record_codec(&self, w: &mut CodeWriter, name: &str, layout: &StructLayout) -> Result<(), EmitError> {
        let flat = naming::flat_type_name(name);
        let info = self.ctx.type_info(NAME, name)?;
        let mut reads = Vec::new();
        let mut writes = Vec::new();
        for field in &info.fields {
            let Some(slot) = layout.field(&field.name) else {
                continue;
            };
            let key = js_ident(&field.name);
            let addr = at("ptr", slot.offset);
            match &field.ty {
                FieldType::Vector(inner) => {
                    let Some(elem) = self.field_slot(inner) else {
                        continue;
                    };
                    let count = layout
                        .field(&format!("{}_count", field.name))
                        .filter(|c| c.kind == SlotKind::Count)
                        .ok_or_else(|| EmitError::internal(NAME, format!("{name}.{} has no count slot", field.name)))?;
                    let count_addr = at("ptr", count.offset);
                    let stride = self.stride(&elem)?;
                    reads.push(format!(
                        "{key}: _readArray(_view().getUint32({addr}, true), _view().getUint32({count_addr}, true), {stride}, (p) => {}),",
                        elem.read("p")
                    ));
                    writes.push(format!(
                        "_view().setUint32({addr}, _writeArray(value.{key}, {stride}, (item, p) => {{ {} }}, allocs), true);",
                        elem.write("p", "item")
                    ));
                    writes.push(format!("_view().setUint32({count_addr}, value.{key}?.length ?? 0, true);"));
                }
                other => {
                    let Some(elem) = self.field_slot(other) else {
                        continue;
                    };
                    reads.push(format!("{key}: {},", elem.read(&addr)));
                    writes.push(elem.write(&addr, &format!("value.{key}")));
                }
            }
        }
        w.block(&format!("function _read{flat}(ptr)"), |w| {
            w.block_with("return", "};", |w| w.lines(&reads));
        });
        w.blank_line();
        w.block(&format!("function _write{flat}(value, ptr, allocs)"), |w| w.lines(&writes));
        w.blank_line();
        Ok(())
    }

    fn write_handle_classes(&self, w: &mut CodeWriter) {
        if self.ctx.api.handles.is_empty() {
            return;
        }
        w.comment("Handle wrapper classes");
        for h in &self.ctx.api.handles {
            let destructor = self.ctx.api.destructor_symbol(&h.name);
            if let Some(desc) = &h.description {
                w.line(&format!("/** {desc} */"));
            }
            w.block(&format!("class {}", h.name), |w| {
                w.line("#ptr;");
                w.blank_line();
                w.line("/** @internal */");
                w.block("constructor(ptr)", |w| w.line("this.#ptr = ptr;"));
                w.blank_line();
                w.line("/** @internal */");
                w.block("get _ptr()", |w| {
                    w.block("if (this.#ptr === 0)", |w| {
                        w.line(&format!("throw new Error('{} has been disposed');", h.name));
                    });
                    w.line("return this.#ptr;");
                });
                w.blank_line();
                w.block("dispose()", |w| {
                    w.block("if (this.#ptr !== 0)", |w| {
                        if let Some(symbol) = &destructor {
                            w.line(&format!("_wasm.exports.{symbol}(this.#ptr);"));
                        }
                        w.line("this.#ptr = 0;");
                    });
                });
                w.blank_line();
                w.block("close()", |w| w.line("this.dispose();"));
                w.blank_line();
                w.block("[Symbol.dispose]()", |w| w.line("this.dispose();"));
            });
            w.blank_line();
        }
    }

    fn write_platform_imports(&self, w: &mut CodeWriter) {
        let api = self.ctx.api_name();
        w.comment("Platform services, provided to the module as `env` imports");
        w.block("function _buildPlatformImports(services)", |w| {
            w.line("services = services || {};");
            w.block_with("return", "};", |w| {
                w.block_with("env:", "},", |w| {
                    w.block_with(&format!("{api}_log_sink: (level, tagPtr, msgPtr) =>"), "},", |w| {
                        w.block("if (services.logSink)", |w| {
                            w.line("services.logSink(level, _decodeString(tagPtr), _decodeString(msgPtr));");
                        });
                    });
                    w.line(&format!(
                        "{api}_resource_count: () => (services.resourceCount ? services.resourceCount() : 0),"
                    ));
                    w.block_with(&format!("{api}_resource_name: (index, bufferPtr, bufferSize) =>"), "},", |w| {
                        w.lines([
                            "if (!services.resourceName) return -1;",
                            "const name = services.resourceName(index);",
                            "if (!name) return -1;",
                            "const bytes = _encoder.encode(name);",
                            "if (bytes.length + 1 > bufferSize) return -1;",
                            "const dest = new Uint8Array(_memoryBuffer(), bufferPtr, bufferSize);",
                            "dest.set(bytes);",
                            "dest[bytes.length] = 0;",
                            "return bytes.length;",
                        ]);
                    });
                    w.block_with(&format!("{api}_resource_exists: (namePtr) =>"), "},", |w| {
                        w.line("if (!services.resourceExists) return 0;");
                        w.line("return services.resourceExists(_decodeString(namePtr)) ? 1 : 0;");
                    });
                    w.block_with(&format!("{api}_resource_size: (namePtr) =>"), "},", |w| {
                        w.line("if (!services.resourceSize) return 0;");
                        w.line("return services.resourceSize(_decodeString(namePtr));");
                    });
                    w.block_with(&format!("{api}_resource_read: (namePtr, bufferPtr, bufferSize) =>"), "},", |w| {
                        w.lines([
                            "if (!services.resourceRead) return -1;",
                            "const data = services.resourceRead(_decodeString(namePtr));",
                            "if (!data || data.byteLength > bufferSize) return -1;",
                            "const bytes = ArrayBuffer.isView(data)",
                            "  ? new Uint8Array(data.buffer, data.byteOffset, data.byteLength)",
                            "  : new Uint8Array(data);",
                            "new Uint8Array(_memoryBuffer(), bufferPtr, bufferSize).set(bytes);",
                            "return bytes.length;",
                        ]);
                    });
                });
                w.line("wasi_snapshot_preview1: _buildWasiImports(),");
            });
        });
        w.blank_line();
    }

    fn loader_name(&self) -> String {
        naming::camel_case(&format!("load_{}", self.ctx.api_name()))
    }

    fn write_loader(&self, w: &mut CodeWriter) {
        let interfaces: Vec<String> = self
            .ctx
            .api
            .interfaces
            .iter()
            .map(|i| format!("{}: _create{}(),", js_ident(&i.name), naming::pascal_case(&i.name)))
            .collect();
        w.comment("Instantiate the module and return one wrapper object per interface.");
        w.block(&format!("async function {}(wasmSource, platformServices)", self.loader_name()), |w| {
            w.line("const imports = _buildPlatformImports(platformServices);");
            w.block_with("if (wasmSource instanceof WebAssembly.Module)", "} else if (wasmSource instanceof Response || typeof wasmSource === 'string') {", |w| {
                w.line("_wasm = await WebAssembly.instantiate(wasmSource, imports);");
            });
            w.indented(|w| {
                w.line("const response = typeof wasmSource === 'string' ? fetch(wasmSource) : wasmSource;");
                w.line("_wasm = (await WebAssembly.instantiateStreaming(response, imports)).instance;");
            });
            w.line("} else if (wasmSource instanceof ArrayBuffer || ArrayBuffer.isView(wasmSource)) {");
            w.indented(|w| {
                w.line("_wasm = (await WebAssembly.instantiate(wasmSource, imports)).instance;");
            });
            w.block_with("} else", "}", |w| {
                w.line("throw new Error('wasmSource must be a URL string, Response, WebAssembly.Module, or ArrayBuffer');");
            });
            w.comment("Reactor modules export _initialize. Command modules export _start, whose");
            w.comment("proc_exit(0) throws to unwind; exit code 0 is a successful start.");
            w.block_with("if (_wasm.exports._initialize)", "} else if (_wasm.exports._start) {", |w| {
                w.line("_wasm.exports._initialize();");
            });
            w.indented(|w| {
                w.block_with("try", "} catch (e) {", |w| w.line("_wasm.exports._start();"));
                w.indented(|w| w.line("if (!e || e.wasiExitCode !== 0) throw e;"));
                w.line("}");
            });
            w.line("}");
            w.block_with("return", "};", |w| w.lines(&interfaces));
        });
        w.blank_line();
    }

    fn write_interface(&self, w: &mut CodeWriter, iface: &InterfaceDef) -> Result<(), EmitError> {
        let mut methods = Vec::new();
        for op in iface.operations() {
            if op.kind == OperationKind::Destructor {
                continue;
            }
            methods.push(self.method_lines(&op)?);
        }
        w.comment(&format!("{} interface", iface.name));
        w.block(&format!("function _create{}()", naming::pascal_case(&iface.name)), |w| {
            w.block_with("return", "};", |w| {
                for (i, lines) in methods.iter().enumerate() {
                    if i > 0 {
                        w.blank_line();
                    }
                    w.lines(lines);
                }
            });
        });
        w.blank_line();
        Ok(())
    }

    /// Lines of one wrapper method, relative to the wrapper object's indentation.
    fn method_lines(&self, op: &Operation<'_>) -> Result<Vec<String>, EmitError> {
        let ctx = self.ctx;
        let js_name = naming::camel_case(&op.name);
        let symbol = op.symbol(ctx.api_name());
        let params: Vec<String> = op.parameters.iter().map(|p| js_ident(&p.name)).collect();

        let mut prologue = Vec::new();
        let mut args = Vec::new();
        let mut frees = Vec::new();
        let mut writebacks = Vec::new();
        let mut uses_allocs = false;
        for p in &op.parameters {
            self.marshal(p, &mut prologue, &mut args, &mut frees, &mut writebacks, &mut uses_allocs)?;
        }

        let shape = op.shape();
        let ret = op.return_type();
        let sret = shape == MethodShape::InfallibleValue && ret.is_some_and(|ty| layout::is_record_type(ctx.types, ty));
        if let Some(ty) = ret.filter(|_| shape == MethodShape::FallibleValue || sret) {
            let size = layout::value_size(ctx.types, ty).map_err(layout_error)?;
            prologue.push(format!("const _outPtr = _malloc({size});"));
            frees.push("_outPtr".to_string());
            if sret {
                args.insert(0, "_outPtr".to_string());
            } else {
                args.push("_outPtr".to_string());
            }
        }
        if uses_allocs {
            prologue.insert(0, "const allocs = [];".to_string());
        }

        let call = format!("_wasm.exports.{symbol}({})", args.join(", "));
        let mut body = Vec::new();
        match (shape, ret) {
            (MethodShape::FallibleValue | MethodShape::FallibleVoid, _) => {
                body.push(format!("const _rc = {call};"));
                body.push("if (_rc !== 0) {".to_string());
                body.push(format!("  throw new Error(`{js_name} failed with error code ${{_rc}}`);"));
                body.push("}".to_string());
                body.extend(writebacks);
                if let (MethodShape::FallibleValue, Some(ty)) = (shape, ret) {
                    body.push(format!("return {};", self.read_out(ty)?));
                }
            }
            (MethodShape::InfallibleValue, Some(ty)) if sret => {
                body.push(format!("{call};"));
                body.extend(writebacks);
                body.push(format!("return {};", self.read_out(ty)?));
            }
            (MethodShape::InfallibleValue, Some(ty)) => {
                body.push(format!("const _result = {call};"));
                body.extend(writebacks);
                body.push(format!("return {};", self.direct_result(ty)?));
            }
            _ => {
                body.push(format!("{call};"));
                body.extend(writebacks);
            }
        }

        let mut out = vec![format!("{js_name}({}) {{", params.join(", "))];
        let inner: Vec<String> = if frees.is_empty() && !uses_allocs {
            body
        } else {
            let mut wrapped = prologue;
            wrapped.push("try {".to_string());
            wrapped.extend(body.into_iter().map(|l| format!("  {l}")));
            wrapped.push("} finally {".to_string());
            wrapped.extend(frees.iter().map(|f| format!("  _free({f});")));
            if uses_allocs {
                wrapped.push("  allocs.forEach(_free);".to_string());
            }
            wrapped.push("}".to_string());
            wrapped
        };
        out.extend(inner.into_iter().map(|l| format!("  {l}")));
        out.push("},".to_string());
        Ok(out)
    }

    fn marshal(
        &self,
        p: &ParameterDef,
        prologue: &mut Vec<String>,
        args: &mut Vec<String>,
        frees: &mut Vec<String>,
        writebacks: &mut Vec<String>,
        uses_allocs: &mut bool,
    ) -> Result<(), EmitError> {
        let name = js_ident(&p.name);
        let ptr = format!("_{}Ptr", naming::camel_case(&p.name));
        match self.ctx.classify(NAME, &p.ty)? {
            TypeRef::String => {
                prologue.push(format!("const {ptr} = _encodeString({name});"));
                args.push(ptr.clone());
                frees.push(ptr);
            }
            TypeRef::Buffer(_) => {
                let len = format!("_{}Len", naming::camel_case(&p.name));
                prologue.push(format!("const [{ptr}, {len}] = _copyBufferToWasm({name});"));
                args.push(ptr.clone());
                args.push(len);
                if p.effective_transfer() == Transfer::RefMut {
                    writebacks.push(format!("_copyBufferFromWasm({ptr}, {name});"));
                }
                frees.push(ptr);
            }
            TypeRef::Handle(_) => args.push(format!("{name}._ptr")),
            TypeRef::Primitive(PrimitiveId::Bool) => args.push(format!("{name} ? 1 : 0")),
            TypeRef::Primitive(_) => args.push(name),
            TypeRef::Qualified(q) => {
                let slot = self.named_slot(q).ok_or_else(|| EmitError::missing_type(NAME, q))?;
                let transfer = p.effective_transfer();
                if let (Slot::Prim(_), Transfer::Value) = (&slot, transfer) {
                    args.push(name);
                    return Ok(());
                }
                let size = layout::value_size(self.ctx.types, &p.ty).map_err(layout_error)?;
                prologue.push(format!("const {ptr} = _malloc({size});"));
                prologue.push(slot.write(&ptr, &name));
                args.push(ptr.clone());
                if transfer == Transfer::RefMut {
                    if let Slot::Record(flat) = &slot {
                        writebacks.push(format!("Object.assign({name}, _read{}({ptr}));", naming::flat_type_name(flat)));
                    }
                }
                frees.push(ptr);
                *uses_allocs |= matches!(slot, Slot::Record(_));
            }
        }
        Ok(())
    }

    /// Expression reading a result of type `ty` out of `_outPtr`.
    fn read_out(&self, ty: &str) -> Result<String, EmitError> {
        Ok(match self.ctx.classify(NAME, ty)? {
            TypeRef::Handle(h) => format!("new {h}(_view().getUint32(_outPtr, true))"),
            TypeRef::Primitive(p) => Slot::Prim(p).read("_outPtr"),
            TypeRef::Qualified(q) => self
                .named_slot(q)
                .ok_or_else(|| EmitError::missing_type(NAME, q))?
                .read("_outPtr"),
            TypeRef::String | TypeRef::Buffer(_) => {
                return Err(EmitError::unsupported(NAME, format!("{ty} cannot be returned by value")));
            }
        })
    }

    /// Expression converting a direct wasm result.
    fn direct_result(&self, ty: &str) -> Result<String, EmitError> {
        Ok(match self.ctx.classify(NAME, ty)? {
            TypeRef::Handle(h) => format!("new {h}(_result)"),
            TypeRef::Primitive(PrimitiveId::Bool) => "_result !== 0".to_string(),
            _ => "_result".to_string(),
        })
    }

    fn write_exports(&self, w: &mut CodeWriter) {
        w.comment("Exports");
        w.line(&format!("export {{ {} }};", self.loader_name()));
        for h in &self.ctx.api.handles {
            w.line(&format!("export {{ {} }};", h.name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::emit::test_support::{content, fixture, greeter, minimal, paths, run};

    #[test]
    fn single_module() {
        let (api, types) = minimal();
        let arts = run(emitter(), &api, &types);
        assert_eq!(paths(&arts), ["test_api.js"]);
        let js = &arts[0].content;
        assert!(js.starts_with("// Code generated by xplatter"));
        assert!(js.contains("async function loadTestApi(wasmSource, platformServices) {"));
        assert!(js.contains("    lifecycle: _createLifecycle(),\n"));
        assert!(js.contains("export { loadTestApi };\nexport { Engine };\n"));
    }

    #[test]
    fn fallible_constructor_frees_its_out_param() {
        let (api, types) = minimal();
        let arts = run(emitter(), &api, &types);
        let js = content(&arts, "test_api.js");
        let expected = "    createEngine() {
      const _outPtr = _malloc(4);
      try {
        const _rc = _wasm.exports.test_api_lifecycle_create_engine(_outPtr);
        if (_rc !== 0) {
          throw new Error(`createEngine failed with error code ${_rc}`);
        }
        return new Engine(_view().getUint32(_outPtr, true));
      } finally {
        _free(_outPtr);
      }
    },
";
        assert!(js.contains(expected), "{js}");
    }

    #[test]
    fn dispose_calls_the_destructor() {
        let (api, types) = minimal();
        let arts = run(emitter(), &api, &types);
        let js = content(&arts, "test_api.js");
        assert!(js.contains("      _wasm.exports.test_api_lifecycle_destroy_engine(this.#ptr);\n      this.#ptr = 0;\n"));
        assert!(js.contains("  [Symbol.dispose]() {\n    this.dispose();\n  }\n"));
        assert!(!js.contains("destroyEngine("), "destructors are reached through dispose");
    }

    #[test]
    fn loader_handles_reactor_and_command_modules() {
        let (api, types) = minimal();
        let arts = run(emitter(), &api, &types);
        let js = content(&arts, "test_api.js");
        assert!(js.contains("if (_wasm.exports._initialize) {\n    _wasm.exports._initialize();\n  } else if (_wasm.exports._start) {"));
        assert!(js.contains("if (!e || e.wasiExitCode !== 0) throw e;"));
        assert!(js.contains("proc_exit: (code) => {"));
    }

    #[test]
    fn infallible_record_return_prepends_the_out_pointer() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let js = content(&arts, "example_app.js");
        let size = layout::struct_layout(&types, "Hello.Greeting").expect("layout").size;
        assert!(js.contains(&format!("const _outPtr = _malloc({size});")));
        assert!(js.contains("_wasm.exports.example_app_info_get_greeting(_outPtr, _namePtr);"));
        assert!(js.contains("return _readHelloGreeting(_outPtr);"));
        assert!(js.contains("_wasm.exports.example_app_renderer_get_config(renderer._ptr, _outPtr);"));
    }

    #[test]
    fn records_decode_at_layout_offsets() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let js = content(&arts, "example_app.js");
        let config = layout::struct_layout(&types, "Rendering.RendererConfig").expect("layout");
        let vsync = config.field("vsync").expect("vsync").offset;
        assert!(js.contains("    width: _view().getUint32(ptr, true),\n"));
        assert!(js.contains(&format!("    vsync: _view().getUint8(ptr + {vsync}) !== 0,\n")));
        assert!(js.contains("  _view().setUint32(ptr + 4, _allocString(value.apiImpl, allocs), true);\n"));
    }

    #[test]
    fn parameters_marshal_by_class() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        let js = content(&arts, "example_app.js");
        assert!(js.contains("const [_pixelsPtr, _pixelsLen] = _copyBufferToWasm(pixels);"));
        assert!(js.contains("_wasm.exports.example_app_renderer_upload_pixels(renderer._ptr, _pixelsPtr, _pixelsLen, format);"));
        assert!(js.contains("_copyBufferFromWasm(_destPtr, dest);"));
        assert!(js.contains("const _result = _wasm.exports.example_app_info_scale(value, enabled ? 1 : 0);"));
        assert!(js.contains("_writeRenderingRendererConfig(config, _configPtr, allocs);"));
        assert!(js.contains("allocs.forEach(_free);"));
    }

    #[test]
    fn enums_occupy_four_bytes_like_the_c_enum() {
        let (api, types) = greeter();
        let arts = run(emitter(), &api, &types);
        let js = content(&arts, "hello.js");
        assert!(js.contains("const _outPtr = _malloc(4);"));
        assert!(js.contains("return _view().getInt32(_outPtr, true);"));
        assert!(!js.contains("getUint8(_outPtr)"));
        assert!(js.contains("    format: _view().getInt32(ptr, true),\n"));
        assert!(js.contains("    weight: _view().getUint8(ptr + 4, true),\n"));
    }
}
