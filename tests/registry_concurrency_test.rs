//! Registry behaviour under concurrent registration and lookup

mod common;

use common::ScriptedValidator;
use planguard::error::RegistryError;
use planguard::tools::{ToolRegistry, Validator};
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_distinct_registrations_all_succeed() {
    let registry = ToolRegistry::new();

    thread::scope(|scope| {
        for t in 0..16 {
            let registry = &registry;
            scope.spawn(move || {
                for i in 0..8 {
                    let name = format!("tool-{}-{}", t, i);
                    registry
                        .register(Arc::new(ScriptedValidator::new(&name)))
                        .unwrap();
                    assert!(registry.get(&name).is_some());
                }
            });
        }
    });

    assert_eq!(registry.len(), 128);
    let names = registry.list();
    for t in 0..16 {
        for i in 0..8 {
            assert!(names.contains(&format!("tool-{}-{}", t, i)));
        }
    }
}

#[test]
fn test_concurrent_duplicate_registration_admits_exactly_one() {
    let registry = ToolRegistry::new();

    let results: Vec<Result<(), RegistryError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..12)
            .map(|_| {
                let registry = &registry;
                scope.spawn(move || registry.register(Arc::new(ScriptedValidator::new("S3Validator"))))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, RegistryError::DuplicateName(name) if name == "S3Validator")));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_readers_never_see_partial_registration() {
    let registry = ToolRegistry::new();

    thread::scope(|scope| {
        let writer = &registry;
        scope.spawn(move || {
            for i in 0..200 {
                writer
                    .register(Arc::new(ScriptedValidator::new(&format!("v{}", i))))
                    .unwrap();
            }
        });

        for _ in 0..4 {
            let reader = &registry;
            scope.spawn(move || {
                for _ in 0..200 {
                    // every advertised name must resolve and match its spec
                    for spec in reader.describe_all() {
                        let validator = reader.get(&spec.name).unwrap();
                        assert_eq!(validator.name(), spec.name);
                    }
                }
            });
        }
    });

    assert_eq!(registry.describe_all().len(), 200);
}

#[test]
fn test_duplicate_keeps_original_entry() {
    let registry = ToolRegistry::new();
    let first = Arc::new(ScriptedValidator::new("EC2Validator"));
    registry.register(first.clone()).unwrap();

    let err = registry
        .register(Arc::new(ScriptedValidator::new("EC2Validator")))
        .unwrap_err();
    assert_eq!(err, RegistryError::DuplicateName("EC2Validator".into()));

    let kept = registry.get("EC2Validator").unwrap();
    let first_dyn: Arc<dyn Validator> = first;
    assert!(Arc::ptr_eq(&kept, &first_dyn));
}
