//! Platform-service stubs: one C file per platform family under `platform_services/`.
//!
//! These are user-owned. Desktop logs to stderr, iOS to `os_log`, Android to logcat; the web stub
//! does nothing. Every resource function reports an empty resource set.

use xplatter_core::lang::targets::{self, TargetId};

use crate::backend::artifact::Artifact;
use crate::backend::banner::{self, CommentStyle};
use crate::backend::context::EmitContext;
use crate::backend::ctypes::{PLATFORM_SERVICES, PlatformService};
use crate::backend::errors::EmitError;
use crate::backend::registry::Emitter;
use crate::backend::writer::CodeWriter;

pub const NAME: &str = "impl_platform_services";

/// Directory, relative to the project, holding the stubs.
pub const DIR: &str = "platform_services";

pub fn emitter() -> Emitter {
    Emitter::new(NAME, emit)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Platform {
    Desktop,
    Ios,
    Android,
    Web,
}

impl Platform {
    /// Packaging family name, as the build system spells it.
    pub(super) fn family(self) -> &'static str {
        match self {
            Platform::Desktop => "desktop",
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Web => "web",
        }
    }

    pub(super) fn file(self) -> &'static str {
        match self {
            Platform::Desktop => "desktop.c",
            Platform::Ios => "ios.c",
            Platform::Android => "android.c",
            Platform::Web => "web.c",
        }
    }

    fn summary(self) -> &'static str {
        match self {
            Platform::Desktop => "Desktop (Windows, macOS, Linux) platform services. Logging goes to stderr.",
            Platform::Ios => "iOS platform services. Logging uses os_log.",
            Platform::Android => "Android platform services. Logging uses __android_log_print.",
            Platform::Web => "WebAssembly platform services, compiled into the module. All no-ops.",
        }
    }

    fn includes(self) -> &'static [&'static str] {
        match self {
            Platform::Desktop => &["<stdint.h>", "<stdio.h>"],
            Platform::Ios => &["<stdint.h>", "<os/log.h>"],
            Platform::Android => &["<stdint.h>", "<android/log.h>"],
            Platform::Web => &["<stdint.h>"],
        }
    }

    fn log_body(self) -> &'static [&'static str] {
        match self {
            Platform::Desktop => &["fprintf(stderr, \"[%d] %s: %s\\n\", level, tag, message);"],
            Platform::Ios => &[
                "os_log_type_t type = level <= 1 ? OS_LOG_TYPE_DEBUG : OS_LOG_TYPE_DEFAULT;",
                "os_log_with_type(OS_LOG_DEFAULT, type, \"[%{public}s] %{public}s\", tag, message);",
            ],
            Platform::Android => &[
                "int prio = level <= 1 ? ANDROID_LOG_DEBUG : ANDROID_LOG_INFO;",
                "__android_log_print(prio, tag, \"%s\", message);",
            ],
            Platform::Web => &["(void)level;", "(void)tag;", "(void)message;"],
        }
    }
}

/// Platforms needing a stub, in a fixed order.
pub(super) fn platforms(ctx: &EmitContext<'_>) -> Vec<Platform> {
    let targets = ctx.api.effective_targets();
    let mut out = Vec::new();
    if targets.iter().any(|t| targets::info_for(*t).desktop) {
        out.push(Platform::Desktop);
    }
    for (target, platform) in [
        (TargetId::Ios, Platform::Ios),
        (TargetId::Android, Platform::Android),
        (TargetId::Web, Platform::Web),
    ] {
        if targets.contains(&target) {
            out.push(platform);
        }
    }
    out
}

fn emit(ctx: &EmitContext<'_>) -> Result<Vec<Artifact>, EmitError> {
    Ok(platforms(ctx)
        .into_iter()
        .map(|p| Artifact::scaffold(format!("{DIR}/{}", p.file()), render(ctx, p)).in_project())
        .collect())
}

fn render(ctx: &EmitContext<'_>, platform: Platform) -> String {
    let api = ctx.api_name();
    let mut w = CodeWriter::new();
    w.write(&banner::scaffold(CommentStyle::Slash, &ctx.source_name()));
    w.line(&format!("/* {} */", platform.summary()));
    w.blank_line();
    for include in platform.includes() {
        w.line(&format!("#include {include}"));
    }
    w.blank_line();

    for service in &PLATFORM_SERVICES {
        let head = format!("{} {}({})", service.ret, service.symbol(api), service.param_list());
        w.block(&head, |w| {
            if service.name == "log_sink" {
                w.lines(platform.log_body());
            } else {
                w.lines(resource_stub(service));
            }
        });
        w.blank_line();
    }
    w.finish()
}

/// Body reporting no resources: counts and sizes are 0, lookups fail with -1.
fn resource_stub(service: &PlatformService) -> Vec<String> {
    let mut lines: Vec<String> = service.params.iter().map(|(_, name)| format!("(void){name};")).collect();
    let value = match service.name {
        "resource_name" | "resource_read" => "-1",
        _ => "0",
    };
    lines.push(format!("return {value};"));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::emit::test_support::{content, fixture, minimal, paths, run};
    use xplatter_core::lang::targets::TargetId;

    #[test]
    fn one_stub_per_platform_family() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        assert_eq!(
            paths(&arts),
            [
                "platform_services/desktop.c",
                "platform_services/ios.c",
                "platform_services/android.c",
                "platform_services/web.c"
            ]
        );
        assert!(arts.iter().all(|a| a.is_scaffold && a.is_project_file));
    }

    #[test]
    fn desktop_targets_share_one_stub() {
        let (mut api, types) = minimal();
        api.apply_overrides(None, Some(vec![TargetId::Windows, TargetId::Linux, TargetId::Macos]));
        let arts = run(emitter(), &api, &types);
        assert_eq!(paths(&arts), ["platform_services/desktop.c"]);
    }

    #[test]
    fn every_service_is_defined() {
        let (api, types) = minimal();
        let arts = run(emitter(), &api, &types);
        let desktop = content(&arts, "platform_services/desktop.c");
        assert!(desktop.starts_with("// Scaffold generated by xplatter "));
        for service in &PLATFORM_SERVICES {
            assert!(desktop.contains(&format!("{}(", service.symbol("test_api"))), "{}", service.name);
        }
        assert!(desktop.contains("uint32_t test_api_resource_count(void) {\n    return 0;\n}"));
        assert!(desktop.contains(
            "int32_t test_api_resource_read(const char* name, uint8_t* buffer, uint32_t buffer_size) {\n    (void)name;\n    (void)buffer;\n    (void)buffer_size;\n    return -1;\n}"
        ));
    }

    #[test]
    fn mobile_logging_uses_the_system_logger() {
        let (api, types) = fixture();
        let arts = run(emitter(), &api, &types);
        assert!(content(&arts, "platform_services/ios.c").contains("os_log_with_type(OS_LOG_DEFAULT"));
        assert!(content(&arts, "platform_services/android.c").contains("#include <android/log.h>"));
        assert!(content(&arts, "platform_services/web.c").contains("    (void)message;\n"));
    }
}
