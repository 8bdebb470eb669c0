use std::sync::Arc;

use serde_json::{json, Map, Value};

use mzansi_books_storage::storage::MemoryStore;
use mzansi_books_storage::{
    Client, ClientCategory, ClientStore, ClientsState, CompanyDetails, CompanyStore, Namespace,
    PermanentStorage, StorageBackends, StorageError, StorageOptions,
};

async fn engine() -> PermanentStorage {
    let storage = PermanentStorage::new(StorageBackends::in_memory());
    storage
        .initialize(Some(StorageOptions {
            validation_delay_ms: 10,
            ..StorageOptions::default()
        }))
        .await;
    storage
}

fn ids(clients: &[Client]) -> Vec<&str> {
    clients.iter().map(|c| c.id.as_str()).collect()
}

#[tokio::test]
async fn test_empty_storage_gives_shaped_state() {
    let storage = engine().await;
    let clients = ClientStore::new(storage.clone());

    let state = clients.get_clients_data().await.unwrap();
    assert_eq!(state, ClientsState::default());
    assert_eq!(
        serde_json::to_value(&state).unwrap(),
        json!({"companies": [], "individuals": [], "vendors": []})
    );
    assert!(!clients.has_clients().await);

    storage.settle().await;
}

#[tokio::test]
async fn test_legacy_migration_is_idempotent() {
    let storage = engine().await;
    let clients = ClientStore::new(storage.clone());
    storage
        .local()
        .set_raw("mokClients", "{\"companies\":[{\"id\":\"c1\",\"name\":\"Acme\"}]}");

    let first = clients.get_clients_data().await.unwrap();
    assert_eq!(ids(&first.companies), vec!["c1"]);

    // The legacy key is no longer needed once migrated.
    storage.local().remove("mokClients");
    let second = clients.get_clients_data().await.unwrap();
    assert_eq!(second, first);

    let primary: ClientsState = storage
        .local()
        .load(&Namespace::Clients.keys().primary)
        .unwrap();
    assert_eq!(primary, first);

    storage.settle().await;
}

#[tokio::test]
async fn test_legacy_backup_key_is_normalized() {
    let storage = engine().await;
    let clients = ClientStore::new(storage.clone());
    storage.local().set_raw(
        "mok-mzansi-books-clients-emergency-backup",
        "{\"vendors\":[{\"id\":\"v1\",\"name\":\"Paper Supplies\"}],\"individuals\":null}",
    );

    assert!(clients.has_clients().await);
    let state = clients.get_clients_data().await.unwrap();
    assert!(state.companies.is_empty());
    assert!(state.individuals.is_empty());
    assert_eq!(ids(&state.vendors), vec!["v1"]);

    storage.settle().await;
}

#[tokio::test]
async fn test_client_crud() {
    let storage = engine().await;
    let clients = ClientStore::new(storage.clone());
    clients
        .save_clients_data(&ClientsState {
            companies: vec![Client::new("c1", "Acme")],
            ..Default::default()
        })
        .await
        .unwrap();

    clients
        .add_client(Client::new("c2", "Beta"), ClientCategory::Company)
        .await
        .unwrap();
    let state = clients.get_clients_data().await.unwrap();
    assert_eq!(ids(&state.companies), vec!["c1", "c2"]);

    clients.delete_client("c1", ClientCategory::Company).await.unwrap();
    let state = clients.get_clients_data().await.unwrap();
    assert_eq!(ids(&state.companies), vec!["c2"]);

    clients
        .update_client(Client::new("c2", "Beta2"), ClientCategory::Company)
        .await
        .unwrap();
    let state = clients.get_clients_data().await.unwrap();
    assert_eq!(state.companies, vec![Client::new("c2", "Beta2")]);

    storage.settle().await;
}

#[tokio::test]
async fn test_add_client_keeps_loosely_typed_clients() {
    let storage = engine().await;
    let clients = ClientStore::new(storage.clone());
    let seeded = json!({
        "companies": [
            { "id": 1697000000000u64, "name": "Acme" },
            { "id": "c2", "name": null }
        ],
        "individuals": [],
        "vendors": []
    });
    assert!(storage.save_data(Namespace::Clients, &seeded).await);

    let before = clients.get_clients_data().await.unwrap();
    assert_eq!(ids(&before.companies), vec!["1697000000000", "c2"]);

    clients
        .add_client(Client::new("c3", "Beta"), ClientCategory::Company)
        .await
        .unwrap();
    let after = clients.get_clients_data().await.unwrap();
    assert_eq!(ids(&after.companies), vec!["1697000000000", "c2", "c3"]);
    assert_eq!(after.companies[0].name, "Acme");

    storage.settle().await;
}

#[tokio::test]
async fn test_undecodable_clients_are_never_overwritten() {
    let storage = engine().await;
    let clients = ClientStore::new(storage.clone());
    let seeded = json!({ "companies": "Acme; Beta", "vendors": [] });
    assert!(storage.save_data(Namespace::Clients, &seeded).await);
    storage.settle().await;

    assert!(matches!(
        clients.get_clients_data().await,
        Err(StorageError::Undecodable { namespace: Namespace::Clients, .. })
    ));
    let result = clients
        .add_client(Client::new("c3", "Beta"), ClientCategory::Company)
        .await;
    assert!(matches!(result, Err(StorageError::Undecodable { .. })));

    let keys = Namespace::Clients.keys();
    for key in [&keys.primary, &keys.backup_1, &keys.backup_2, &keys.persistent] {
        assert_eq!(storage.local().load::<Value>(key), Some(seeded.clone()));
    }
    assert_eq!(storage.local().get_raw("clients"), None);

    storage.settle().await;
}

#[tokio::test]
async fn test_deleting_last_migrated_client_rescans_legacy() {
    let storage = engine().await;
    let clients = ClientStore::new(storage.clone());
    storage
        .local()
        .set_raw("mokClients", "{\"companies\":[{\"id\":\"c1\",\"name\":\"Acme\"}]}");

    let migrated = clients.get_clients_data().await.unwrap();
    assert_eq!(ids(&migrated.companies), vec!["c1"]);

    // An empty engine document counts as absent, so the untouched legacy
    // key supplies the client again.
    clients.delete_client("c1", ClientCategory::Company).await.unwrap();
    let state = clients.get_clients_data().await.unwrap();
    assert_eq!(ids(&state.companies), vec!["c1"]);

    storage.settle().await;
}

#[tokio::test]
async fn test_add_client_assigns_id() {
    let storage = engine().await;
    let clients = ClientStore::new(storage.clone());

    let added = clients
        .add_client(Client::new("", "Sipho Dlamini"), ClientCategory::Individual)
        .await
        .unwrap();
    assert!(uuid::Uuid::parse_str(&added.id).is_ok());

    let state = clients.get_clients_data().await.unwrap();
    assert_eq!(state.individuals, vec![added]);
    assert!(clients.has_clients().await);

    storage.settle().await;
}

#[tokio::test]
async fn test_update_without_match_is_noop() {
    let storage = engine().await;
    let clients = ClientStore::new(storage.clone());
    clients
        .add_client(Client::new("v1", "Paper Supplies"), ClientCategory::Vendor)
        .await
        .unwrap();

    clients
        .update_client(Client::new("v404", "Ghost"), ClientCategory::Vendor)
        .await
        .unwrap();
    // Same id in another category is not touched either.
    clients
        .update_client(Client::new("v1", "Renamed"), ClientCategory::Company)
        .await
        .unwrap();

    let state = clients.get_clients_data().await.unwrap();
    assert_eq!(state.vendors, vec![Client::new("v1", "Paper Supplies")]);
    assert!(state.companies.is_empty());

    storage.settle().await;
}

#[tokio::test]
async fn test_save_writes_compatibility_keys() {
    let storage = engine().await;
    let clients = ClientStore::new(storage.clone());
    let state = ClientsState {
        companies: vec![Client::new("c1", "Acme")],
        ..Default::default()
    };
    clients.save_clients_data(&state).await.unwrap();

    for key in ["clients", "mok-mzansi-books-clients-backup"] {
        assert_eq!(storage.local().load::<ClientsState>(key), Some(state.clone()));
    }

    storage.settle().await;
}

#[tokio::test]
async fn test_save_fails_only_when_every_write_fails() {
    let storage = PermanentStorage::new(StorageBackends {
        local: Arc::new(MemoryStore::with_quota(0)),
        session: Arc::new(MemoryStore::new()),
        structured: None,
    });
    storage.initialize(None).await;
    let clients = ClientStore::new(storage.clone());

    let result = clients
        .add_client(Client::new("c1", "Acme"), ClientCategory::Company)
        .await;
    assert_eq!(result, Err(StorageError::WriteFailed(Namespace::Clients)));

    storage.settle().await;
}

#[tokio::test]
async fn test_company_defaults_and_legacy_migration() {
    let storage = engine().await;
    let company = CompanyStore::new(storage.clone());

    assert_eq!(company.get_company_details().await.unwrap(), CompanyDetails::default());
    assert!(!company.has_company_details().await);

    // A nameless legacy record does not count as data.
    storage.local().set_raw("companyDetails", "{\"address\":\"12 Long St\"}");
    storage.local().set_raw(
        "companyDetails_emergency_backup",
        "{\"name\":\"Mok Trading\",\"contactEmail\":\"info@mok.co.za\"}",
    );

    let details = company.get_company_details().await.unwrap();
    assert_eq!(details.name, "Mok Trading");
    assert_eq!(details.contact_email, "info@mok.co.za");
    assert!(company.has_company_details().await);

    let migrated: CompanyDetails = storage.load_data(Namespace::Company).await.unwrap();
    assert_eq!(migrated, details);

    storage.settle().await;
}

#[tokio::test]
async fn test_company_update_and_clear() {
    let storage = engine().await;
    let company = CompanyStore::new(storage.clone());
    company
        .save_company_details(&CompanyDetails {
            name: "Mok Trading".to_string(),
            address: "12 Long St, Cape Town".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(
        storage.local().load::<Value>("companyDetails").unwrap()["name"],
        json!("Mok Trading")
    );

    let mut patch = Map::new();
    patch.insert("vatNumber".to_string(), json!("4123456789"));
    patch.insert("bankName".to_string(), json!("FNB"));
    let updated = company.update_company_details(patch).await.unwrap();
    assert_eq!(updated.name, "Mok Trading");
    assert_eq!(updated.vat_number, "4123456789");
    assert_eq!(updated.extra.get("bankName"), Some(&json!("FNB")));
    assert_eq!(company.get_company_details().await.unwrap(), updated);

    storage.settle().await;
    company.clear_company_details().await.unwrap();
    assert!(!company.has_company_details().await);
    assert!(storage.local().get_raw("companyDetails").is_none());
}
