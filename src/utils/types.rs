//! Common types for the Sui CLI

use serde::{Deserialize, Serialize};

/// Sui network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiNetwork {
    Mainnet,
    Testnet,
    Devnet,
    Localnet,
}

impl SuiNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuiNetwork::Mainnet => "mainnet",
            SuiNetwork::Testnet => "testnet",
            SuiNetwork::Devnet => "devnet",
            SuiNetwork::Localnet => "localnet",
        }
    }
}

/// How an object is owned on-chain, as reported by the GraphQL `owner` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerKind {
    AddressOwner,
    Shared,
    Immutable,
    /// Owned by another object (dynamic field parent)
    Parent,
    #[serde(rename = "unknown")]
    Unknown,
}

impl OwnerKind {
    /// Whether objects of this kind carry an owner address
    pub fn has_address(&self) -> bool {
        matches!(self, OwnerKind::AddressOwner | OwnerKind::Parent)
    }
}

/// One object found by a type-filtered query, with its normalized owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    pub id: String,
    pub owner_type: OwnerKind,
    pub owner: Option<String>,
}

impl ObjectRecord {
    /// Build a record, dropping the address for kinds that never carry one
    pub fn new(id: String, owner_type: OwnerKind, owner: Option<String>) -> Self {
        let owner = if owner_type.has_address() { owner } else { None };
        Self { id, owner_type, owner }
    }
}

/// Relay-style pagination info
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// Output of `sui move build --dump-bytecode-as-base64`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledPackage {
    /// Base64-encoded module bytecode
    pub modules: Vec<String>,
    /// Object IDs of the packages this one links against
    pub dependencies: Vec<String>,
}

/// Execution status from transaction effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEffects {
    pub status: ExecutionStatus,
}

/// A single entry of a transaction's `objectChanges`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ObjectChange {
    #[serde(rename_all = "camelCase")]
    Published { package_id: String },
    #[serde(rename_all = "camelCase")]
    Created { object_id: String, object_type: String },
    #[serde(rename_all = "camelCase")]
    Mutated { object_id: String, object_type: String },
    #[serde(rename_all = "camelCase")]
    Transferred { object_id: String, object_type: String },
    #[serde(rename_all = "camelCase")]
    Deleted { object_id: String, object_type: String },
    #[serde(rename_all = "camelCase")]
    Wrapped { object_id: String, object_type: String },
}

/// Response of `sui_executeTransactionBlock` (the subset we request)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub digest: String,
    pub effects: Option<TransactionEffects>,
    #[serde(default)]
    pub object_changes: Vec<ObjectChange>,
}

impl TransactionResponse {
    /// Package ID of the first `published` change, if any
    pub fn package_id(&self) -> Option<&str> {
        self.object_changes.iter().find_map(|change| match change {
            ObjectChange::Published { package_id } => Some(package_id.as_str()),
            _ => None,
        })
    }
}

/// Object created or touched by a publish, as saved to the created-objects file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedObject {
    #[serde(rename = "type")]
    pub object_type: String,
    pub id: String,
}

impl CreatedObject {
    /// Describe every object change, labelling the package itself by its name
    pub fn from_changes(package_name: &str, changes: &[ObjectChange]) -> Vec<Self> {
        changes
            .iter()
            .map(|change| match change {
                ObjectChange::Published { package_id } => CreatedObject {
                    object_type: package_name.to_string(),
                    id: package_id.clone(),
                },
                ObjectChange::Created { object_id, object_type }
                | ObjectChange::Mutated { object_id, object_type }
                | ObjectChange::Transferred { object_id, object_type }
                | ObjectChange::Deleted { object_id, object_type }
                | ObjectChange::Wrapped { object_id, object_type } => CreatedObject {
                    object_type: object_type.clone(),
                    id: object_id.clone(),
                },
            })
            .collect()
    }
}

/// Active environment as reported by the `sui` client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkContext {
    pub environment: String,
    pub chain_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_record_serializes_camel_case() {
        let record = ObjectRecord::new(
            "0x1".to_string(),
            OwnerKind::AddressOwner,
            Some("0xaa".to_string()),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "id": "0x1", "ownerType": "AddressOwner", "owner": "0xaa" })
        );
    }

    #[test]
    fn test_object_record_drops_address_for_shared() {
        let record = ObjectRecord::new("0x1".to_string(), OwnerKind::Shared, Some("0xaa".to_string()));
        assert_eq!(record.owner, None);

        let json = serde_json::to_value(&ObjectRecord::new("0x2".to_string(), OwnerKind::Unknown, None)).unwrap();
        assert_eq!(json["ownerType"], "unknown");
        assert!(json["owner"].is_null());
    }

    #[test]
    fn test_publish_response_package_id() {
        let response: TransactionResponse = serde_json::from_value(serde_json::json!({
            "digest": "abc",
            "effects": { "status": { "status": "success" } },
            "objectChanges": [
                { "type": "created", "objectId": "0x5", "objectType": "0x2::package::UpgradeCap" },
                { "type": "published", "packageId": "0xcafe" }
            ]
        }))
        .unwrap();

        assert_eq!(response.package_id(), Some("0xcafe"));
        assert!(response.effects.unwrap().status.is_success());
    }

    #[test]
    fn test_created_objects_label_package_by_name() {
        let changes = vec![
            ObjectChange::Published { package_id: "0xcafe".to_string() },
            ObjectChange::Created {
                object_id: "0x5".to_string(),
                object_type: "0x2::package::UpgradeCap".to_string(),
            },
        ];
        let objects = CreatedObject::from_changes("Kiosk", &changes);
        assert_eq!(objects[0], CreatedObject { object_type: "Kiosk".into(), id: "0xcafe".into() });
        assert_eq!(objects[1].object_type, "0x2::package::UpgradeCap");
    }
}
