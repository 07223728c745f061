//! Shared fixtures for emitter unit tests.

use crate::backend::artifact::Artifact;
use crate::backend::context::EmitContext;
use crate::backend::registry::Emitter;
use crate::frontend::model::ApiDescription;
use crate::frontend::resolver::{self, ResolvedTypeMap};
use crate::frontend::{load_str, validate};

const MINIMAL_API: &str = include_str!("../../../tests/fixtures/minimal/api.yaml");
const MINIMAL_FBS: &str = include_str!("../../../tests/fixtures/minimal/common.fbs");
const FULL_API: &str = include_str!("../../../tests/fixtures/full/api.yaml");
const FULL_FBS: &str = include_str!("../../../tests/fixtures/full/types.fbs");
const GREETER_API: &str = include_str!("../../../tests/fixtures/greeter/api.yaml");
const GREETER_FBS: &str = include_str!("../../../tests/fixtures/greeter/types.fbs");

fn load(api: &str, fbs: &str) -> (ApiDescription, ResolvedTypeMap) {
    let api = load_str(api).expect("fixture loads");
    let types = resolver::parse_str(fbs).expect("fixture schema parses");
    let report = validate(&api, Some(&types));
    assert!(report.is_valid(), "fixture invalid:\n{report}");
    (api, types)
}

/// `test_api` with one `Engine` handle and a `lifecycle` interface.
pub fn minimal() -> (ApiDescription, ResolvedTypeMap) {
    load(MINIMAL_API, MINIMAL_FBS)
}

/// Every shape, every parameter class, struct and enum returns.
pub fn fixture() -> (ApiDescription, ResolvedTypeMap) {
    load(FULL_API, FULL_FBS)
}

/// `hello`: `lifecycle` constructs a `Greeter` whose methods live in the `greeter` interface.
pub fn greeter() -> (ApiDescription, ResolvedTypeMap) {
    load(GREETER_API, GREETER_FBS)
}

pub fn run(emitter: Emitter, api: &ApiDescription, types: &ResolvedTypeMap) -> Vec<Artifact> {
    emitter.emit(&EmitContext::new(api, types)).expect("emitter succeeds")
}

/// Content of the artifact at `path`.
pub fn content<'a>(artifacts: &'a [Artifact], path: &str) -> &'a str {
    artifacts
        .iter()
        .find(|a| a.path.to_str() == Some(path))
        .map(|a| a.content.as_str())
        .unwrap_or_else(|| panic!("no artifact {path}; have {:?}", paths(artifacts)))
}

pub fn paths(artifacts: &[Artifact]) -> Vec<String> {
    artifacts.iter().map(|a| a.path.display().to_string()).collect()
}
