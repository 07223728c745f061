//! Fixture loading shared by the integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use xplatter::backend::registry;
use xplatter::frontend::resolver;
use xplatter::{ApiDescription, Artifact, EmitContext, ResolvedTypeMap, load_str, validate};

pub const MINIMAL_API: &str = include_str!("../fixtures/minimal/api.yaml");
pub const MINIMAL_FBS: &str = include_str!("../fixtures/minimal/common.fbs");
pub const FULL_API: &str = include_str!("../fixtures/full/api.yaml");
pub const FULL_FBS: &str = include_str!("../fixtures/full/types.fbs");
pub const GREETER_API: &str = include_str!("../fixtures/greeter/api.yaml");
pub const GREETER_FBS: &str = include_str!("../fixtures/greeter/types.fbs");

pub fn load(api: &str, fbs: &str) -> (ApiDescription, ResolvedTypeMap) {
    let api = load_str(api).expect("fixture loads");
    let types = resolver::parse_str(fbs).expect("fixture schema parses");
    let report = validate(&api, Some(&types));
    assert!(report.is_valid(), "fixture invalid:\n{report}");
    (api, types)
}

pub fn minimal() -> (ApiDescription, ResolvedTypeMap) {
    load(MINIMAL_API, MINIMAL_FBS)
}

pub fn full() -> (ApiDescription, ResolvedTypeMap) {
    load(FULL_API, FULL_FBS)
}

pub fn greeter() -> (ApiDescription, ResolvedTypeMap) {
    load(GREETER_API, GREETER_FBS)
}

/// Run a registered emitter by name.
pub fn emit(name: &str, api: &ApiDescription, types: &ResolvedTypeMap) -> Vec<Artifact> {
    let emitter = registry::global()
        .get(name)
        .unwrap_or_else(|| panic!("emitter {name} is not registered"));
    emitter.emit(&EmitContext::new(api, types)).expect("emitter succeeds")
}

pub fn content<'a>(artifacts: &'a [Artifact], path: &str) -> &'a str {
    artifacts
        .iter()
        .find(|a| a.path == Path::new(path))
        .map(|a| a.content.as_str())
        .unwrap_or_else(|| {
            let have: Vec<_> = artifacts.iter().map(|a| a.path.display().to_string()).collect();
            panic!("no artifact {path}; have {have:?}")
        })
}

pub fn fixture_dir(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// Copy a fixture directory into `into` and return the description path.
pub fn copy_fixture(name: &str, into: &Path) -> PathBuf {
    fs::create_dir_all(into).expect("create fixture dir");
    for entry in fs::read_dir(fixture_dir(name)).expect("read fixture dir") {
        let entry = entry.expect("dir entry");
        fs::copy(entry.path(), into.join(entry.file_name())).expect("copy fixture file");
    }
    into.join("api.yaml")
}
