//! Integration tests for registration, attribute access and proxies through
//! the public API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use vigil_core::object::{arg, native, unknown_method};
use vigil_core::open_type::{from_open, to_open, CompositeData, CompositeType, TabularData, TabularType};
use vigil_core::{
    make_proxy, Connection, Dispatcher, ManagedObject, ManagementError, ManagementInterface,
    MethodSignature, ObjectName, OpenType, OpenValue, Proxy, Registry, Result,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Usage {
    used: i64,
    max: i64,
}

fn usage_type() -> OpenType {
    CompositeType::builder("Usage")
        .field("used", OpenType::INT64)
        .field("max", OpenType::INT64)
        .build()
        .unwrap()
        .into()
}

/// A memory pool with a writable `Used` counter.
struct Mem {
    used: AtomicI64,
    gc_called: AtomicBool,
}

impl Mem {
    fn new(used: i64) -> Arc<Self> {
        Arc::new(Self {
            used: AtomicI64::new(used),
            gc_called: AtomicBool::new(false),
        })
    }
}

impl ManagedObject for Mem {
    fn methods(&self) -> Vec<MethodSignature> {
        vec![
            MethodSignature::getter("get_used", OpenType::INT64),
            MethodSignature::setter("set_used", OpenType::INT64),
            MethodSignature::getter("get_usage", usage_type()),
            MethodSignature::operation("gc", OpenType::INT64).param("target", OpenType::INT64),
        ]
    }

    fn description(&self) -> String {
        "Test memory pool".to_string()
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        match method {
            "get_used" => native(&self.used.load(Ordering::SeqCst)),
            "set_used" => {
                self.used.store(arg(args, 0)?, Ordering::SeqCst);
                native(&())
            }
            "get_usage" => native(&Usage {
                used: self.used.load(Ordering::SeqCst),
                max: 1024,
            }),
            "gc" => {
                self.gc_called.store(true, Ordering::SeqCst);
                let target: i64 = arg(args, 0)?;
                self.used.store(target, Ordering::SeqCst);
                native(&target)
            }
            other => Err(unknown_method(other)),
        }
    }
}

struct MemProxy(Proxy);

impl ManagementInterface for MemProxy {
    fn methods() -> Result<Vec<MethodSignature>> {
        Ok(vec![MethodSignature::getter("get_used", OpenType::INT64)])
    }

    fn from_proxy(proxy: Proxy) -> Self {
        MemProxy(proxy)
    }
}

impl MemProxy {
    async fn get_used(&self) -> Result<i64> {
        self.0.call("get_used", &[]).await
    }
}

fn name(s: &str) -> ObjectName {
    s.parse().unwrap()
}

#[test]
fn test_duplicate_registration_keeps_first_object() {
    let registry = Arc::new(Registry::new());
    registry.register(name("dom:type=Mem"), Mem::new(100)).unwrap();

    let second = registry.register(name("dom:type=Mem"), Mem::new(999));
    assert!(matches!(second, Err(ManagementError::DuplicateName { .. })));

    let dispatcher = Dispatcher::new(registry);
    assert_eq!(
        dispatcher.get_attribute(&name("dom:type=Mem"), "Used").unwrap(),
        OpenValue::Int64(100)
    );
}

#[test]
fn test_key_order_does_not_matter() {
    let registry = Registry::new();
    registry
        .register(name("dom:type=Pool,name=eden"), Mem::new(1))
        .unwrap();
    assert!(matches!(
        registry.register(name("dom:name=eden,type=Pool"), Mem::new(2)),
        Err(ManagementError::DuplicateName { .. })
    ));
}

#[test]
fn test_readable_attributes_round_trip() {
    let registry = Arc::new(Registry::new());
    registry.register(name("dom:type=Mem"), Mem::new(42)).unwrap();
    let dispatcher = Dispatcher::new(registry);

    let info = dispatcher.get_info(&name("dom:type=Mem")).unwrap();
    assert_eq!(info.description, "Test memory pool");

    let used = dispatcher.get_attribute(&name("dom:type=Mem"), "Used").unwrap();
    let native_used: i64 = from_open(&used, &OpenType::INT64).unwrap();
    assert_eq!(to_open(&native_used, &OpenType::INT64).unwrap(), used);

    let usage = dispatcher.get_attribute(&name("dom:type=Mem"), "Usage").unwrap();
    let native_usage: Usage = from_open(&usage, &usage_type()).unwrap();
    assert_eq!(native_usage, Usage { used: 42, max: 1024 });
    assert_eq!(to_open(&native_usage, &usage_type()).unwrap(), usage);
}

#[test]
fn test_read_after_write() {
    let registry = Arc::new(Registry::new());
    registry.register(name("dom:type=Mem"), Mem::new(100)).unwrap();
    let dispatcher = Dispatcher::new(registry);

    dispatcher
        .set_attribute(&name("dom:type=Mem"), "Used", &OpenValue::Int64(321))
        .unwrap();
    assert_eq!(
        dispatcher.get_attribute(&name("dom:type=Mem"), "Used").unwrap(),
        OpenValue::Int64(321)
    );
}

#[test]
fn test_wildcard_query_returns_every_name() {
    let registry = Registry::new();
    let names = ["c:type=X", "a:type=Y", "b:type=Z,id=1", "a:type=Z"];
    for n in names {
        registry.register(name(n), Mem::new(0)).unwrap();
    }

    let all = registry.query_names(Some(&ObjectName::wildcard())).unwrap();
    let expected: std::collections::BTreeSet<ObjectName> = names.iter().map(|n| name(n)).collect();
    assert_eq!(all, expected);

    registry.unregister(&name("a:type=Y")).unwrap();
    assert_eq!(registry.query_names(Some(&name("*:*"))).unwrap().len(), 3);
}

#[test]
fn test_tabular_duplicate_key_and_insertion_order() {
    let row_type = CompositeType::builder("Entry")
        .field("key", OpenType::STRING)
        .field("count", OpenType::INT32)
        .build()
        .unwrap();
    let table_type = TabularType::new("Entries", row_type.clone(), ["key"]).unwrap();

    let row = |key: &str, count: i32| {
        CompositeData::new(
            row_type.clone(),
            [
                ("key", OpenValue::String(key.to_string())),
                ("count", OpenValue::Int32(count)),
            ],
        )
        .unwrap()
    };

    let duplicate = TabularData::from_rows(table_type.clone(), [row("b", 1), row("b", 2)]);
    assert!(matches!(duplicate, Err(ManagementError::DuplicateKey { .. })));

    let table = TabularData::from_rows(table_type, [row("zeta", 1), row("alpha", 2), row("mid", 3)])
        .unwrap();
    let keys: Vec<&str> = table
        .iter()
        .map(|r| r.get("key").and_then(OpenValue::as_str).unwrap())
        .collect();
    assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
}

#[test]
fn test_arity_mismatch_before_native_call() {
    let registry = Arc::new(Registry::new());
    let mem = Mem::new(100);
    registry.register(name("dom:type=Mem"), mem.clone()).unwrap();
    let dispatcher = Dispatcher::new(registry);

    let result = dispatcher.invoke(
        &name("dom:type=Mem"),
        "gc",
        &[OpenValue::Int64(1), OpenValue::Int64(2)],
    );
    assert!(matches!(result, Err(ManagementError::ArityMismatch { .. })));
    assert!(!mem.gc_called.load(Ordering::SeqCst));

    assert_eq!(
        dispatcher
            .invoke(&name("dom:type=Mem"), "gc", &[OpenValue::Int64(10)])
            .unwrap(),
        OpenValue::Int64(10)
    );
    assert!(mem.gc_called.load(Ordering::SeqCst));
}

#[test]
fn test_unregister_then_get_attribute_is_not_found() {
    let registry = Arc::new(Registry::new());
    registry.register(name("dom:type=Mem"), Mem::new(100)).unwrap();
    let dispatcher = Dispatcher::new(registry.clone());

    assert_eq!(
        dispatcher.get_attribute(&name("dom:type=Mem"), "Used").unwrap(),
        OpenValue::Int64(100)
    );

    registry.unregister(&name("dom:type=Mem")).unwrap();

    assert!(matches!(
        dispatcher.get_attribute(&name("dom:type=Mem"), "Used"),
        Err(ManagementError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_proxy_observes_attribute_updates() {
    let registry = Arc::new(Registry::new());
    registry.register(name("dom:type=Mem"), Mem::new(100)).unwrap();
    let dispatcher = Dispatcher::new(registry);
    let connection: Arc<dyn Connection> = Arc::new(dispatcher.clone());

    let proxy: MemProxy = make_proxy(connection, name("dom:type=Mem")).unwrap();
    assert_eq!(proxy.get_used().await.unwrap(), 100);

    dispatcher
        .set_attribute(&name("dom:type=Mem"), "Used", &OpenValue::Int64(250))
        .unwrap();
    assert_eq!(proxy.get_used().await.unwrap(), 250);
}

#[test]
fn test_concurrent_access_and_unregister() {
    let registry = Arc::new(Registry::new());
    registry.register(name("dom:type=Mem"), Mem::new(7)).unwrap();
    let dispatcher = Dispatcher::new(registry.clone());

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    match dispatcher.get_attribute(&name("dom:type=Mem"), "Used") {
                        Ok(value) => assert_eq!(value, OpenValue::Int64(7)),
                        Err(e) => assert!(matches!(e, ManagementError::NotFound { .. })),
                    }
                }
            })
        })
        .collect();

    registry.unregister(&name("dom:type=Mem")).unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert!(!registry.is_registered(&name("dom:type=Mem")).unwrap());
}
