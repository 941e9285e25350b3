//! Inventory file loading and pre-flight validation.

use std::fs;

use lmboot::errors::BootstrapError;
use lmboot::inventory::Inventory;

const SAMPLE_TOML: &str = r#"
[[appliances]]
hostname = "KEMP1"
address = "10.0.1.109"
management_port = 8443

[[appliances.interfaces]]
interface_id = 0
cidr_address = "10.0.1.31/24"

[[appliances.interfaces]]
interface_id = 1
cidr_address = "10.0.2.31/24"

[[appliances]]
hostname = "KEMP2"
address = "10.0.2.109"

[[parameters]]
name = "ntphost"
value = "10.0.0.5"

[[parameters]]
name = "snmpenable"
value = "yes"
"#;

#[test]
fn toml_inventory_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory.toml");
    fs::write(&path, SAMPLE_TOML).unwrap();

    let inventory = Inventory::load(&path).expect("load failed");
    assert_eq!(inventory.appliances.len(), 2);
    assert_eq!(inventory.parameters.len(), 2);

    let kemp1 = &inventory.appliances[0];
    assert_eq!(kemp1.hostname, "KEMP1");
    assert_eq!(kemp1.address, "10.0.1.109");
    assert_eq!(kemp1.management_port, Some(8443));
    assert_eq!(kemp1.interfaces.len(), 2);
    assert!(kemp1.interfaces[0].is_management());
    assert!(!kemp1.interfaces[1].is_management());

    let kemp2 = &inventory.appliances[1];
    assert_eq!(kemp2.management_port, None);
    assert!(kemp2.interfaces.is_empty());

    assert!(inventory.validate().is_ok());
}

#[test]
fn json_inventory_loads_too() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory.json");
    let doc = serde_json::json!({
        "appliances": [
            {
                "hostname": "KEMP1",
                "address": "10.0.1.109",
                "interfaces": [
                    {"interface_id": 0, "cidr_address": "10.0.1.31/24"}
                ]
            }
        ],
        "parameters": [{"name": "snmpenable", "value": "yes"}]
    });
    fs::write(&path, doc.to_string()).unwrap();

    let inventory = Inventory::load(&path).expect("load failed");
    assert_eq!(inventory.appliances.len(), 1);
    assert!(inventory.validate().is_ok());
}

#[test]
fn missing_file_is_an_inventory_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.toml");

    let err = Inventory::load(&path).unwrap_err();
    assert!(matches!(err, BootstrapError::Inventory(_)));
}

#[test]
fn malformed_cidr_in_file_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory.toml");
    fs::write(
        &path,
        r#"
[[appliances]]
hostname = "KEMP1"
address = "10.0.1.109"

[[appliances.interfaces]]
interface_id = 0
cidr_address = "10.0.1.31"
"#,
    )
    .unwrap();

    let inventory = Inventory::load(&path).expect("load failed");
    let err = inventory.validate().unwrap_err();
    assert!(matches!(err, BootstrapError::Validation { .. }));
    assert!(err.to_string().contains("cidr_address"));
}

#[test]
fn empty_parameter_name_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory.toml");
    fs::write(
        &path,
        r#"
[[appliances]]
hostname = "KEMP1"
address = "10.0.1.109"

[[parameters]]
name = ""
value = "yes"
"#,
    )
    .unwrap();

    let inventory = Inventory::load(&path).expect("load failed");
    assert!(inventory.validate().is_err());
}
