//! Build-system scaffolds, one emitter per implementation language.
//!
//! Every language gets a project `Makefile` that re-runs generation when the description changes,
//! builds a desktop shared library and packages one artifact per target family. The variable block,
//! codegen stamp and packaging rules are shared; only the compile recipes differ. C has no
//! implementation emitter of its own, so its build system also brings the `<api>_impl.c` stubs and a
//! `CMakeLists.txt` for Emscripten.

use xplatter_core::lang::impl_langs;
use xplatter_core::{ImplLangId, TargetId, TypeRef, naming};

use super::platform_services::{self, Platform};
use crate::backend::artifact::Artifact;
use crate::backend::banner::{self, CommentStyle};
use crate::backend::context::EmitContext;
use crate::backend::ctypes::CSignature;
use crate::backend::errors::EmitError;
use crate::backend::registry::Emitter;
use crate::backend::writer::CodeWriter;
use crate::frontend::model::MethodShape;

pub const C: &str = "impl_c_build_system";
pub const CPP: &str = "impl_cpp_build_system";
pub const RUST: &str = "impl_rust_build_system";
pub const GO: &str = "impl_go_build_system";

pub fn c_emitter() -> Emitter {
    Emitter::new(C, emit_c)
}

pub fn cpp_emitter() -> Emitter {
    Emitter::new(CPP, |ctx| Ok(vec![makefile(ctx, ImplLangId::Cpp)]))
}

pub fn rust_emitter() -> Emitter {
    Emitter::new(RUST, |ctx| Ok(vec![makefile(ctx, ImplLangId::Rust)]))
}

pub fn go_emitter() -> Emitter {
    Emitter::new(GO, |ctx| Ok(vec![makefile(ctx, ImplLangId::Go)]))
}

fn emit_c(ctx: &EmitContext<'_>) -> Result<Vec<Artifact>, EmitError> {
    Ok(vec![
        makefile(ctx, ImplLangId::C),
        Artifact::scaffold(format!("{}_impl.c", ctx.api_name()), impl_c(ctx)?).in_project(),
        Artifact::scaffold("CMakeLists.txt", cmake_c(ctx)).in_project(),
    ])
}

/// One iOS slice: `(arch dir, sdk, clang target, rust triple, GOARCH)`.
const IOS_SLICES: [[&str; 5]; 3] = [
    ["ios-arm64", "iphoneos", "arm64-apple-ios$(IOS_MIN)", "aarch64-apple-ios", "arm64"],
    [
        "ios-sim-arm64",
        "iphonesimulator",
        "arm64-apple-ios$(IOS_MIN)-simulator",
        "aarch64-apple-ios-sim",
        "arm64",
    ],
    [
        "ios-sim-x86_64",
        "iphonesimulator",
        "x86_64-apple-ios$(IOS_MIN)-simulator",
        "x86_64-apple-ios",
        "amd64",
    ],
];

/// One Android ABI: `(abi, NDK clang prefix, rust triple, GOARCH, extra go env)`.
const ANDROID_ABIS: [[&str; 5]; 4] = [
    ["arm64-v8a", "aarch64-linux-android$(ANDROID_MIN_API)", "aarch64-linux-android", "arm64", ""],
    [
        "armeabi-v7a",
        "armv7a-linux-androideabi$(ANDROID_MIN_API)",
        "armv7-linux-androideabi",
        "arm",
        "GOARM=7",
    ],
    ["x86_64", "x86_64-linux-android$(ANDROID_MIN_API)", "x86_64-linux-android", "amd64", ""],
    ["x86", "i686-linux-android$(ANDROID_MIN_API)", "i686-linux-android", "386", ""],
];

fn makefile(ctx: &EmitContext<'_>, lang: ImplLangId) -> Artifact {
    let mk = Makefile {
        ctx,
        lang,
        families: platform_services::platforms(ctx),
    };
    Artifact::scaffold("Makefile", mk.render()).in_project()
}

struct Makefile<'a> {
    ctx: &'a EmitContext<'a>,
    lang: ImplLangId,
    families: Vec<Platform>,
}

impl Makefile<'_> {
    fn has(&self, family: Platform) -> bool {
        self.families.contains(&family)
    }

    fn render(&self) -> String {
        let mut w = CodeWriter::with_indent("\t");
        w.write(&banner::scaffold(CommentStyle::Hash, &self.ctx.source_name()));
        self.variables(&mut w);
        self.toolchain(&mut w);
        self.codegen(&mut w);
        self.local_build(&mut w);
        if self.has(Platform::Ios) {
            self.package_ios(&mut w);
        }
        if self.has(Platform::Android) {
            self.package_android(&mut w);
        }
        if self.has(Platform::Web) {
            self.package_web(&mut w);
        }
        if self.has(Platform::Desktop) {
            self.package_desktop(&mut w);
        }
        self.aggregate(&mut w);
        w.finish()
    }

    fn variables(&self, w: &mut CodeWriter) {
        let api = self.ctx.api_name();
        let gen_dir = self.ctx.generated_dir;
        let targets: Vec<&str> = self.families.iter().map(|p| p.family()).collect();
        w.lines([
            "SHELL       := /bin/sh".to_string(),
            "XPLATTER    ?= xplatter".to_string(),
            format!("API_DEF     := {}", self.ctx.source_name()),
            format!("IMPL_LANG   := {}", impl_langs::as_str(self.lang)),
            format!("API_NAME    := {api}"),
            "LIB_NAME    := lib$(API_NAME)".to_string(),
            format!("PASCAL_NAME := {}", self.ctx.pascal_api()),
            format!("BUILD_MACRO := {}", naming::build_macro(api)),
            format!("GEN_DIR     := {gen_dir}/"),
            "BUILD_DIR   := build".to_string(),
            "DIST_DIR    := dist".to_string(),
            "STAMP       := $(BUILD_DIR)/.codegen.stamp".to_string(),
            String::new(),
            format!("TARGETS ?= {}", targets.join(" ")),
            String::new(),
            "HOST_OS := $(shell uname -s)".to_string(),
            "ifeq ($(HOST_OS),Darwin)".to_string(),
            "DYLIB_EXT := dylib".to_string(),
            "else".to_string(),
            "DYLIB_EXT := so".to_string(),
            "endif".to_string(),
            "SHARED_LIB := $(BUILD_DIR)/$(LIB_NAME).$(DYLIB_EXT)".to_string(),
            String::new(),
            "GEN_HEADER := $(GEN_DIR)$(API_NAME).h".to_string(),
        ]);
        if self.has(Platform::Ios) || self.ctx.api.has_target(TargetId::Macos) {
            w.line("GEN_SWIFT_BINDING  := $(GEN_DIR)$(PASCAL_NAME).swift");
        }
        if self.has(Platform::Android) {
            w.line("GEN_KOTLIN_BINDING := $(GEN_DIR)$(PASCAL_NAME).kt");
            w.line("GEN_JNI_SOURCE     := $(GEN_DIR)$(API_NAME)_jni.c");
        }
        if self.has(Platform::Web) {
            w.line("GEN_JS_BINDING     := $(GEN_DIR)$(API_NAME).js");
            w.blank_line();
            w.line(&format!("WASM_EXPORTS := {}", wasm_exports(self.ctx)));
        }
        w.blank_line();
    }

    fn toolchain(&self, w: &mut CodeWriter) {
        w.line("# Toolchain");
        w.blank_line();
        if self.has(Platform::Ios) {
            w.line("IOS_MIN         ?= 15.0");
        }
        if self.has(Platform::Android) {
            w.lines([
                "ANDROID_MIN_API ?= 24",
                "ANDROID_NDK_HOME ?= $(ANDROID_HOME)/ndk-bundle",
                "NDK_BIN := $(wildcard $(ANDROID_NDK_HOME)/toolchains/llvm/prebuilt/*/bin)",
            ]);
        }
        if self.has(Platform::Web) && matches!(self.lang, ImplLangId::C | ImplLangId::Cpp) {
            w.line("EMCC ?= emcc");
            if self.lang == ImplLangId::Cpp {
                w.line("EMXX ?= em++");
            }
        }
        w.line("PLATFORM_SERVICES := platform_services");
        match self.lang {
            ImplLangId::C => w.lines([
                "CC          ?= cc",
                "CFLAGS      := -std=c17 -Wall -Wextra -I$(GEN_DIR)",
                "LIB_C_FLAGS := $(CFLAGS) -fvisibility=hidden -D$(BUILD_MACRO)",
                "IMPL_SOURCES := $(API_NAME)_impl.c",
            ]),
            ImplLangId::Cpp => w.lines([
                "CXX           ?= c++",
                "CC            ?= cc",
                "LIB_CXX_FLAGS := -std=c++20 -Wall -Wextra -I$(GEN_DIR) -fvisibility=hidden -D$(BUILD_MACRO)",
                "LIB_C_FLAGS   := -std=c17 -Wall -Wextra -I$(GEN_DIR) -fvisibility=hidden -D$(BUILD_MACRO)",
                "IMPL_SOURCES  := $(GEN_DIR)$(API_NAME)_impl.cpp $(GEN_DIR)$(API_NAME)_shim.cpp",
            ]),
            ImplLangId::Rust => w.lines([
                "CARGO       ?= cargo",
                "LIB_C_FLAGS := -std=c17 -Wall -Wextra -I$(GEN_DIR) -fvisibility=hidden -D$(BUILD_MACRO)",
            ]),
            ImplLangId::Go => w.lines([
                "GO ?= go",
                "GEN_GO_SOURCES := $(wildcard $(GEN_DIR)$(API_NAME)_*.go)",
                "GEN_GO_COPIES  := $(notdir $(GEN_GO_SOURCES))",
            ]),
        }
        w.blank_line();
    }

    fn codegen(&self, w: &mut CodeWriter) {
        let lang = impl_langs::as_str(self.lang);
        let out = self.ctx.generated_dir;
        w.line("# Codegen");
        w.blank_line();
        w.line(".DEFAULT_GOAL := build");
        w.blank_line();
        w.line("$(STAMP): $(API_DEF)");
        w.indented(|w| {
            w.line("@mkdir -p $(BUILD_DIR)");
            w.line(&format!("$(XPLATTER) generate --impl-lang {lang} -o {out} $(API_DEF)"));
            if self.lang == ImplLangId::Go {
                // `go build .` only sees the package root.
                w.line("cp $(GEN_DIR)$(API_NAME)_*.go .");
            }
            w.line("@touch $@");
        });
        w.blank_line();
        w.line("$(GEN_HEADER): $(STAMP)");
        w.blank_line();
    }

    fn local_build(&self, w: &mut CodeWriter) {
        w.line("# Local build");
        w.blank_line();
        w.line(".PHONY: shared-lib clean");
        w.blank_line();
        w.line("shared-lib: $(SHARED_LIB)");
        w.blank_line();
        w.line("$(SHARED_LIB): $(STAMP)");
        w.indented(|w| {
            w.line("@mkdir -p $(BUILD_DIR)");
            let desktop = "$(PLATFORM_SERVICES)/desktop.c";
            match self.lang {
                ImplLangId::C => {
                    w.line(&format!("$(CC) $(LIB_C_FLAGS) -shared -fPIC -o $@ $(IMPL_SOURCES) {desktop}"));
                }
                ImplLangId::Cpp => {
                    w.line(&format!("$(CC) $(LIB_C_FLAGS) -fPIC -c -o $(BUILD_DIR)/desktop.o {desktop}"));
                    w.line("$(CXX) $(LIB_CXX_FLAGS) -shared -fPIC -o $@ $(IMPL_SOURCES) $(BUILD_DIR)/desktop.o");
                }
                ImplLangId::Rust => {
                    w.line("$(CARGO) build --release");
                    w.line("cp target/release/$(LIB_NAME).$(DYLIB_EXT) $@");
                }
                ImplLangId::Go => {
                    w.line("$(GO) build -buildmode=c-shared -o $@ .");
                }
            }
        });
        if self.lang != ImplLangId::Go {
            w.line("ifeq ($(HOST_OS),Darwin)");
            w.indented(|w| w.line("install_name_tool -id @rpath/$(LIB_NAME).$(DYLIB_EXT) $@"));
            w.line("endif");
        }
        w.blank_line();
        w.line("clean:");
        w.indented(|w| {
            if self.lang == ImplLangId::Rust {
                w.line("$(CARGO) clean");
            }
            w.line(&format!("rm -rf {} $(BUILD_DIR) $(DIST_DIR)", self.ctx.generated_dir));
            if self.lang == ImplLangId::Go {
                w.line("rm -f $(GEN_GO_COPIES)");
            }
        });
        w.blank_line();
    }

    fn package_ios(&self, w: &mut CodeWriter) {
        w.line("# iOS: static library per slice, simulator slices merged, wrapped in an XCFramework");
        w.blank_line();
        w.line("# $(1) = arch dir, $(2) = sdk, $(3) = clang target, $(4) = rust triple, $(5) = GOARCH");
        w.line("define BUILD_IOS_ARCH");
        w.blank_line();
        w.line("$(DIST_DIR)/ios/obj/$(1)/$(LIB_NAME).a: $(STAMP)");
        w.indented(|w| {
            w.line("@mkdir -p $$(dir $$@)");
            w.lines(self.ios_recipe());
        });
        w.blank_line();
        w.line("endef");
        w.blank_line();
        for slice in &IOS_SLICES {
            w.line(&format!("$(eval $(call BUILD_IOS_ARCH,{}))", slice.join(",")));
        }
        w.blank_line();
        w.lines([
            "IOS_DEVICE_LIB := $(DIST_DIR)/ios/obj/ios-arm64/$(LIB_NAME).a",
            "IOS_SIM_LIBS   := $(DIST_DIR)/ios/obj/ios-sim-arm64/$(LIB_NAME).a $(DIST_DIR)/ios/obj/ios-sim-x86_64/$(LIB_NAME).a",
            "IOS_SIM_LIB    := $(DIST_DIR)/ios/obj/ios-sim/$(LIB_NAME).a",
            "IOS_XCFRAMEWORK := $(DIST_DIR)/ios/$(PASCAL_NAME).xcframework",
            "",
            ".PHONY: package-ios",
            "",
            "package-ios: $(IOS_XCFRAMEWORK)",
            "",
            "$(IOS_XCFRAMEWORK): $(IOS_DEVICE_LIB) $(IOS_SIM_LIBS)",
        ]);
        w.indented(|w| {
            w.lines([
                "@mkdir -p $(dir $(IOS_SIM_LIB)) $(DIST_DIR)/ios/include",
                "lipo -create $(IOS_SIM_LIBS) -output $(IOS_SIM_LIB)",
                "cp $(GEN_HEADER) $(DIST_DIR)/ios/include/",
                "rm -rf $@",
                "xcodebuild -create-xcframework \\",
                "\t-library $(IOS_DEVICE_LIB) -headers $(DIST_DIR)/ios/include \\",
                "\t-library $(IOS_SIM_LIB) -headers $(DIST_DIR)/ios/include \\",
                "\t-output $@",
                "cp $(GEN_SWIFT_BINDING) $(DIST_DIR)/ios/",
            ]);
        });
        w.blank_line();
    }

    fn ios_recipe(&self) -> Vec<&'static str> {
        match self.lang {
            ImplLangId::C => vec![
                "xcrun --sdk $(2) clang -target $(3) $(LIB_C_FLAGS) -c -o $$(dir $$@)impl.o $(IMPL_SOURCES)",
                "xcrun --sdk $(2) clang -target $(3) $(LIB_C_FLAGS) -c -o $$(dir $$@)services.o $(PLATFORM_SERVICES)/ios.c",
                "ar rcs $$@ $$(dir $$@)impl.o $$(dir $$@)services.o",
            ],
            ImplLangId::Cpp => vec![
                "xcrun --sdk $(2) clang++ -target $(3) $(LIB_CXX_FLAGS) -c -o $$(dir $$@)impl.o $(GEN_DIR)$(API_NAME)_impl.cpp",
                "xcrun --sdk $(2) clang++ -target $(3) $(LIB_CXX_FLAGS) -c -o $$(dir $$@)shim.o $(GEN_DIR)$(API_NAME)_shim.cpp",
                "xcrun --sdk $(2) clang -target $(3) $(LIB_C_FLAGS) -c -o $$(dir $$@)services.o $(PLATFORM_SERVICES)/ios.c",
                "ar rcs $$@ $$(dir $$@)impl.o $$(dir $$@)shim.o $$(dir $$@)services.o",
            ],
            ImplLangId::Rust => vec![
                "$(CARGO) build --release --target $(4)",
                "cp target/$(4)/release/$(LIB_NAME).a $$@",
            ],
            ImplLangId::Go => vec![
                "CGO_ENABLED=1 GOOS=ios GOARCH=$(5) \\",
                "\tCC=\"$$$$(xcrun --sdk $(2) --find clang)\" \\",
                "\tCGO_CFLAGS=\"-target $(3) -isysroot $$$$(xcrun --sdk $(2) --show-sdk-path)\" \\",
                "\tCGO_LDFLAGS=\"-target $(3) -isysroot $$$$(xcrun --sdk $(2) --show-sdk-path)\" \\",
                "\t$(GO) build -buildmode=c-archive -o $$@ .",
            ],
        }
    }

    fn package_android(&self, w: &mut CodeWriter) {
        w.line("# Android: one shared library per ABI with the JNI bridge linked in");
        w.blank_line();
        w.line("# $(1) = ABI, $(2) = NDK clang prefix, $(3) = rust triple, $(4) = GOARCH, $(5) = extra go env");
        w.line("define BUILD_ANDROID_ABI");
        w.blank_line();
        w.line("$(DIST_DIR)/android/src/main/jniLibs/$(1)/$(LIB_NAME).so: $(STAMP)");
        w.indented(|w| {
            w.line("@mkdir -p $$(dir $$@) $(DIST_DIR)/android/obj/$(1)");
            w.lines(self.android_recipe());
        });
        w.blank_line();
        w.line("endef");
        w.blank_line();
        for abi in &ANDROID_ABIS {
            w.line(&format!("$(eval $(call BUILD_ANDROID_ABI,{}))", abi.join(",")));
        }
        w.blank_line();
        let abis: Vec<&str> = ANDROID_ABIS.iter().map(|a| a[0]).collect();
        w.line(&format!(
            "ANDROID_LIBS := $(foreach abi,{},$(DIST_DIR)/android/src/main/jniLibs/$(abi)/$(LIB_NAME).so)",
            abis.join(" ")
        ));
        w.blank_line();
        w.line(".PHONY: package-android");
        w.blank_line();
        w.line("package-android: $(ANDROID_LIBS)");
        w.indented(|w| {
            w.line("@mkdir -p $(DIST_DIR)/android/src/main/kotlin");
            w.line("cp $(GEN_KOTLIN_BINDING) $(DIST_DIR)/android/src/main/kotlin/");
        });
        w.blank_line();
    }

    fn android_recipe(&self) -> Vec<&'static str> {
        match self.lang {
            ImplLangId::C => vec![
                "$(NDK_BIN)/$(2)-clang $(LIB_C_FLAGS) -shared -fPIC -o $$@ \\",
                "\t$(IMPL_SOURCES) $(PLATFORM_SERVICES)/android.c $(GEN_JNI_SOURCE) -llog",
            ],
            ImplLangId::Cpp => vec![
                "$(NDK_BIN)/$(2)-clang $(LIB_C_FLAGS) -fPIC -c -o $(DIST_DIR)/android/obj/$(1)/services.o $(PLATFORM_SERVICES)/android.c",
                "$(NDK_BIN)/$(2)-clang $(LIB_C_FLAGS) -fPIC -c -o $(DIST_DIR)/android/obj/$(1)/jni.o $(GEN_JNI_SOURCE)",
                "$(NDK_BIN)/$(2)-clang++ $(LIB_CXX_FLAGS) -shared -fPIC -static-libstdc++ -o $$@ \\",
                "\t$(IMPL_SOURCES) $(DIST_DIR)/android/obj/$(1)/services.o $(DIST_DIR)/android/obj/$(1)/jni.o -llog",
            ],
            ImplLangId::Rust => vec![
                "PATH=$(NDK_BIN):$$$$PATH $(CARGO) build --release --target $(3)",
                "$(NDK_BIN)/$(2)-clang $(LIB_C_FLAGS) -fPIC -c -o $(DIST_DIR)/android/obj/$(1)/jni.o $(GEN_JNI_SOURCE)",
                "$(NDK_BIN)/$(2)-clang -shared -o $$@ \\",
                "\t-Wl,--whole-archive target/$(3)/release/$(LIB_NAME).a -Wl,--no-whole-archive \\",
                "\t$(DIST_DIR)/android/obj/$(1)/jni.o -ldl -lm -llog",
            ],
            // cgo compiles every .c file in the package root, so the bridge is copied in for the build.
            ImplLangId::Go => vec![
                "cp $(GEN_JNI_SOURCE) ./$(API_NAME)_jni.c",
                "CGO_ENABLED=1 GOOS=android GOARCH=$(4) $(5) CC=$(NDK_BIN)/$(2)-clang \\",
                "\tCGO_CFLAGS=\"-I$(GEN_DIR)\" $(GO) build -buildmode=c-shared -o $$@ . \\",
                "\t|| (rm -f ./$(API_NAME)_jni.c; exit 1)",
                "rm -f ./$(API_NAME)_jni.c",
            ],
        }
    }

    fn package_web(&self, w: &mut CodeWriter) {
        w.line("# Web: a standalone WebAssembly module next to the JS binding");
        w.blank_line();
        w.line("WASM_MODULE := $(DIST_DIR)/web/$(API_NAME).wasm");
        w.blank_line();
        w.line(".PHONY: package-web");
        w.blank_line();
        w.line("package-web: $(WASM_MODULE)");
        w.indented(|w| w.line("cp $(GEN_JS_BINDING) $(DIST_DIR)/web/"));
        w.blank_line();
        w.line("$(WASM_MODULE): $(STAMP)");
        w.indented(|w| {
            w.line("@mkdir -p $(dir $@)");
            match self.lang {
                ImplLangId::C => w.lines([
                    "$(EMCC) $(LIB_C_FLAGS) -O2 --no-entry -s STANDALONE_WASM \\",
                    "\t-s EXPORTED_FUNCTIONS='$(WASM_EXPORTS)' \\",
                    "\t-o $@ $(IMPL_SOURCES) $(PLATFORM_SERVICES)/web.c",
                ]),
                ImplLangId::Cpp => w.lines([
                    "$(EMCC) $(LIB_C_FLAGS) -c -o $(BUILD_DIR)/web_services.o $(PLATFORM_SERVICES)/web.c",
                    "$(EMXX) $(LIB_CXX_FLAGS) -O2 --no-entry -s STANDALONE_WASM \\",
                    "\t-s EXPORTED_FUNCTIONS='$(WASM_EXPORTS)' \\",
                    "\t-o $@ $(IMPL_SOURCES) $(BUILD_DIR)/web_services.o",
                ]),
                ImplLangId::Rust => w.lines([
                    "$(CARGO) build --release --target wasm32-unknown-unknown",
                    "cp target/wasm32-unknown-unknown/release/$(API_NAME).wasm $@",
                ]),
                ImplLangId::Go => w.line("GOOS=wasip1 GOARCH=wasm $(GO) build -o $@ ."),
            }
        });
        w.blank_line();
    }

    fn package_desktop(&self, w: &mut CodeWriter) {
        w.line("# Desktop: the host shared library and its header");
        w.blank_line();
        w.line(".PHONY: package-desktop");
        w.blank_line();
        w.line("package-desktop: $(SHARED_LIB)");
        w.indented(|w| {
            w.line("@mkdir -p $(DIST_DIR)/desktop/include $(DIST_DIR)/desktop/lib");
            w.line("cp $(GEN_HEADER) $(DIST_DIR)/desktop/include/");
            w.line("cp $(SHARED_LIB) $(DIST_DIR)/desktop/lib/");
        });
        w.blank_line();
    }

    fn aggregate(&self, w: &mut CodeWriter) {
        w.lines([
            "# Aggregate",
            "",
            ".PHONY: packages build",
            "",
            "packages: $(addprefix package-,$(TARGETS))",
            "",
            "build: packages",
        ]);
    }
}

/// Emscripten export list: the allocator pair, then every C ABI symbol.
fn wasm_exports(ctx: &EmitContext<'_>) -> String {
    let api = ctx.api_name();
    let mut names = vec!["\"_malloc\"".to_string(), "\"_free\"".to_string()];
    for iface in &ctx.api.interfaces {
        for op in iface.operations() {
            names.push(format!("\"_{}\"", op.symbol(api)));
        }
    }
    format!("[{}]", names.join(","))
}

/// Stub definitions for every C ABI export. Fallible stubs report the generic failure.
fn impl_c(ctx: &EmitContext<'_>) -> Result<String, EmitError> {
    let api = ctx.api_name();
    let export = naming::export_macro(api);
    let mut w = CodeWriter::new();
    w.write(&banner::scaffold(CommentStyle::Slash, &ctx.source_name()));
    w.line(&format!("#include \"{api}.h\""));
    w.line("#include <stdlib.h>");
    w.line("#include <string.h>");
    w.blank_line();

    for iface in &ctx.api.interfaces {
        w.line(&format!("/* {} */", iface.name));
        w.blank_line();
        for op in iface.operations() {
            let sig = CSignature::for_operation(ctx, C, &op)?;
            let ret = match op.shape() {
                MethodShape::InfallibleVoid => None,
                MethodShape::FallibleVoid | MethodShape::FallibleValue => {
                    let error = op.error.as_deref().unwrap_or_default();
                    Some(ctx.failure_constant(C, error)?)
                }
                MethodShape::InfallibleValue => {
                    let ty = op.return_type().unwrap_or_default();
                    Some(zero_value(ctx, ty, &sig.ret)?)
                }
            };
            sig.write(&mut w, Some(&export), " {");
            w.indented(|w| {
                w.line(&format!("/* TODO: implement {}.{} */", iface.name, op.name));
                for name in sig.arg_names() {
                    w.line(&format!("(void){name};"));
                }
                if let Some(value) = &ret {
                    w.line(&format!("return {value};"));
                }
            });
            w.line("}");
            w.blank_line();
        }
    }
    Ok(w.finish())
}

fn zero_value(ctx: &EmitContext<'_>, ty: &str, c_type: &str) -> Result<String, EmitError> {
    Ok(match ctx.classify(C, ty)? {
        TypeRef::Handle(_) | TypeRef::String | TypeRef::Buffer(_) => "NULL".to_string(),
        TypeRef::Qualified(name) if !ctx.is_enum(name) => format!("({c_type}){{0}}"),
        _ => "0".to_string(),
    })
}

/// Emscripten build of the C implementation into a standalone module.
fn cmake_c(ctx: &EmitContext<'_>) -> String {
    let api = ctx.api_name();
    let project = api.replace('_', "-");
    let gen_dir = ctx.generated_dir;
    let mut w = CodeWriter::new();
    w.write(&banner::scaffold(CommentStyle::Hash, &ctx.source_name()));
    w.line("cmake_minimum_required(VERSION 3.15)");
    w.line(&format!("project({project} VERSION {} LANGUAGES C)", ctx.api.api.version));
    w.blank_line();
    w.line("set(CMAKE_C_STANDARD 17)");
    w.line("set(CMAKE_C_STANDARD_REQUIRED ON)");
    w.blank_line();
    w.line("if(EMSCRIPTEN)");
    w.indented(|w| {
        w.line(&format!("add_executable({project}"));
        w.indented(|w| {
            w.line(&format!("{api}_impl.c"));
            w.line(&format!("{}/web.c", platform_services::DIR));
        });
        w.line(")");
        w.line(&format!("set_target_properties({project} PROPERTIES SUFFIX \".wasm\")"));
        w.line(&format!("target_include_directories({project} PRIVATE ${{CMAKE_CURRENT_SOURCE_DIR}}/{gen_dir})"));
        w.line(&format!("target_compile_definitions({project} PRIVATE {})", naming::build_macro(api)));
        w.line(&format!("target_link_options({project} PRIVATE"));
        w.indented(|w| {
            w.line("--no-entry");
            w.line(&format!("\"SHELL:-s EXPORTED_FUNCTIONS={}\"", wasm_exports(ctx).replace('"', "'")));
            w.line("\"SHELL:-s STANDALONE_WASM\"");
            w.line("-O2");
        });
        w.line(")");
    });
    w.line("else()");
    w.indented(|w| {
        w.line(&format!("add_library({project} SHARED"));
        w.indented(|w| {
            w.line(&format!("{api}_impl.c"));
            w.line(&format!("{}/desktop.c", platform_services::DIR));
        });
        w.line(")");
        w.line(&format!("target_include_directories({project} PRIVATE ${{CMAKE_CURRENT_SOURCE_DIR}}/{gen_dir})"));
        w.line(&format!("target_compile_definitions({project} PRIVATE {})", naming::build_macro(api)));
    });
    w.line("endif()");
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::emit::test_support::{content, fixture, minimal, paths, run};

    #[test]
    fn c_brings_stubs_and_cmake() {
        let (api, types) = minimal();
        let arts = run(c_emitter(), &api, &types);
        assert_eq!(paths(&arts), ["Makefile", "test_api_impl.c", "CMakeLists.txt"]);
        assert!(arts.iter().all(|a| a.is_scaffold && a.is_project_file));
        for emitter in [cpp_emitter(), rust_emitter(), go_emitter()] {
            assert_eq!(paths(&run(emitter, &api, &types)), ["Makefile"]);
        }
    }

    #[test]
    fn codegen_stamp_reruns_generation_into_the_output_dir() {
        let (api, types) = minimal();
        let ctx = EmitContext::new(&api, &types).with_generated_dir("gen_out");
        let arts = rust_emitter().emit(&ctx).expect("emits");
        let mk = content(&arts, "Makefile");
        assert!(mk.starts_with("# Scaffold generated by xplatter "));
        assert!(mk.contains("GEN_DIR     := gen_out/\n"));
        assert!(mk.contains(
            "$(STAMP): $(API_DEF)\n\t@mkdir -p $(BUILD_DIR)\n\t$(XPLATTER) generate --impl-lang rust -o gen_out $(API_DEF)\n\t@touch $@\n"
        ));
        assert!(mk.contains("clean:\n\t$(CARGO) clean\n\trm -rf gen_out $(BUILD_DIR) $(DIST_DIR)\n"));
    }

    #[test]
    fn go_copies_generated_sources_into_the_package() {
        let (api, types) = minimal();
        let arts = run(go_emitter(), &api, &types);
        let mk = content(&arts, "Makefile");
        assert!(mk.contains("\tcp $(GEN_DIR)$(API_NAME)_*.go .\n"));
        assert!(mk.contains("\trm -f $(GEN_GO_COPIES)\n"));
        assert!(mk.contains("GOOS=wasip1 GOARCH=wasm $(GO) build -o $@ ."));
    }

    #[test]
    fn packaging_follows_the_target_families() {
        let (mut api, types) = minimal();
        api.apply_overrides(None, Some(vec![TargetId::Linux, TargetId::Web]));
        let arts = run(cpp_emitter(), &api, &types);
        let mk = content(&arts, "Makefile");
        assert!(mk.contains("TARGETS ?= desktop web\n"));
        assert!(mk.contains("package-web: $(WASM_MODULE)"));
        assert!(mk.contains("package-desktop: $(SHARED_LIB)"));
        assert!(!mk.contains("BUILD_IOS_ARCH"));
        assert!(!mk.contains("GEN_KOTLIN_BINDING"));
    }

    #[test]
    fn every_slice_and_abi_is_instantiated() {
        let (api, types) = minimal();
        let arts = run(c_emitter(), &api, &types);
        let mk = content(&arts, "Makefile");
        assert_eq!(mk.matches("$(eval $(call BUILD_IOS_ARCH,").count(), 3);
        assert_eq!(mk.matches("$(eval $(call BUILD_ANDROID_ABI,").count(), 4);
        assert!(mk.contains(
            "$(eval $(call BUILD_ANDROID_ABI,armeabi-v7a,armv7a-linux-androideabi$(ANDROID_MIN_API),armv7-linux-androideabi,arm,GOARM=7))"
        ));
    }

    #[test]
    fn wasm_exports_list_allocator_then_every_symbol() {
        let (api, types) = minimal();
        let arts = run(c_emitter(), &api, &types);
        let exports = "[\"_malloc\",\"_free\",\"_test_api_lifecycle_create_engine\",\"_test_api_lifecycle_destroy_engine\"]";
        assert!(content(&arts, "Makefile").contains(&format!("WASM_EXPORTS := {exports}\n")));
        let cmake = content(&arts, "CMakeLists.txt");
        assert!(cmake.contains(&format!("\"SHELL:-s EXPORTED_FUNCTIONS={}\"", exports.replace('"', "'"))));
        assert!(cmake.contains("project(test-api VERSION 0.1.0 LANGUAGES C)"));
    }

    #[test]
    fn c_stubs_cover_every_export() {
        let (api, types) = minimal();
        let arts = run(c_emitter(), &api, &types);
        let stubs = content(&arts, "test_api_impl.c");
        assert!(stubs.contains(
            "TEST_API_EXPORT int32_t test_api_lifecycle_create_engine(engine_handle* out_result) {\n    /* TODO: implement lifecycle.create_engine */\n    (void)out_result;\n    return Common_ErrorCode_InternalError;\n}"
        ));
        assert!(stubs.contains("TEST_API_EXPORT void test_api_lifecycle_destroy_engine(engine_handle engine) {\n"));
    }

    #[test]
    fn infallible_stubs_return_zero_values() {
        let (api, types) = fixture();
        let arts = run(c_emitter(), &api, &types);
        let stubs = content(&arts, "example_app_impl.c");
        for iface in &api.interfaces {
            for op in iface.operations() {
                assert!(stubs.contains(&format!(" {}(", op.symbol("example_app"))), "{}", op.name);
            }
        }
        assert!(!stubs.contains("return ;"));
    }
}
