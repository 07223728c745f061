use std::collections::HashMap;

use xplatter_core::lang::{impl_langs, primitives, targets};
use xplatter_core::types::TypeRef;

#[test]
fn primitive_rows_are_in_id_order() {
    for (index, info) in primitives::PRIMITIVES.iter().enumerate() {
        assert_eq!(
            info.id as usize, index,
            "primitive row {} ({}) is out of order",
            index, info.canonical
        );
        assert_eq!(primitives::info_for(info.id).canonical, info.canonical);
    }
}

#[test]
fn primitive_spellings_unique_and_resolvable() {
    let mut seen: HashMap<&'static str, primitives::PrimitiveId> = HashMap::new();

    for info in primitives::PRIMITIVES {
        assert_eq!(
            primitives::from_str(info.canonical),
            Some(info.id),
            "primitive canonical spelling not resolvable: {}",
            info.canonical
        );
        assert_eq!(TypeRef::parse(info.canonical), Some(TypeRef::Primitive(info.id)));

        if let Some(prev) = seen.insert(info.canonical, info.id) {
            panic!("duplicate primitive spelling {:?}: {:?} and {:?}", info.canonical, prev, info.id);
        }
        for &alias in info.fbs_aliases {
            assert_eq!(primitives::from_fbs(alias), Some(info.id), "fbs alias not resolvable: {}", alias);
            assert_eq!(primitives::from_str(alias), None, "fbs alias leaked into API spellings: {}", alias);
            if let Some(prev) = seen.insert(alias, info.id) {
                panic!("duplicate primitive alias {:?}: {:?} and {:?}", alias, prev, info.id);
            }
        }
    }
}

#[test]
fn primitive_rows_are_fully_populated() {
    for info in primitives::PRIMITIVES {
        for (column, value) in [
            ("kotlin", info.kotlin),
            ("kotlin_array", info.kotlin_array),
            ("jni", info.jni),
            ("jni_array", info.jni_array),
            ("jni_signature", info.jni_signature),
            ("jni_array_accessor", info.jni_array_accessor),
            ("swift", info.swift),
            ("data_view", info.data_view),
            ("js_typed_array", info.js_typed_array),
        ] {
            assert!(!value.is_empty(), "{} is missing its {} spelling", info.canonical, column);
        }
        assert!(
            matches!(info.wasm_size, 1 | 2 | 4 | 8),
            "{} has an unnatural wasm size {}",
            info.canonical,
            info.wasm_size
        );
    }
}

#[test]
fn targets_resolvable_and_ordered() {
    let expected = ["android", "ios", "web", "windows", "macos", "linux"];
    let actual: Vec<&str> = targets::all().into_iter().map(targets::as_str).collect();
    assert_eq!(actual, expected);
    for info in targets::TARGETS {
        assert_eq!(targets::from_str(info.canonical), Some(info.id));
        assert_eq!(targets::info_for(info.id).canonical, info.canonical);
    }
}

#[test]
fn impl_lang_spellings_unique_and_resolvable() {
    let mut seen: HashMap<&'static str, impl_langs::ImplLangId> = HashMap::new();
    for info in impl_langs::IMPL_LANGS {
        assert_eq!(impl_langs::info_for(info.id).canonical, info.canonical);
        for spelling in std::iter::once(&info.canonical).chain(info.aliases.iter()) {
            assert_eq!(impl_langs::from_str(spelling), Some(info.id));
            if let Some(prev) = seen.insert(*spelling, info.id) {
                panic!("duplicate impl-lang spelling {:?}: {:?} and {:?}", spelling, prev, info.id);
            }
        }
    }
    assert_eq!(impl_langs::spellings().len(), seen.len());
}
