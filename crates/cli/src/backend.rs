//! Builds the record store and coordinator described by the configuration.

use std::sync::Arc;

use planta_coordinator::schema::{equipment, tables};
use planta_coordinator::{Coordinator, RolePolicy, SystemClock};
use planta_storage::{Fields, MemoryStore, RecordStore};

use crate::config::{AccessConfig, Backend, EquipmentSeed, PlantaConfig, StoreConfig};

pub(crate) type SharedCoordinator = Coordinator<dyn RecordStore>;

pub(crate) fn build_coordinator(config: &PlantaConfig) -> Result<SharedCoordinator, String> {
    let store = build_store(&config.store, &config.equipment)?;
    Ok(Coordinator::new(
        store,
        Arc::new(SystemClock),
        role_policy(&config.access),
    ))
}

pub(crate) fn role_policy(access: &AccessConfig) -> RolePolicy {
    match &access.privileged_roles {
        Some(roles) => RolePolicy::with_bypass_roles(roles.iter().cloned()),
        None => RolePolicy::default(),
    }
}

pub(crate) fn build_store(
    store: &StoreConfig,
    seeds: &[EquipmentSeed],
) -> Result<Arc<dyn RecordStore>, String> {
    match store.backend {
        Backend::Memory => {
            let memory = MemoryStore::new();
            seed_equipment(&memory, seeds)?;
            tracing::info!(equipment = seeds.len(), "using in-memory store");
            Ok(Arc::new(memory))
        }
        Backend::Airtable => airtable_store(store, seeds),
    }
}

fn seed_equipment(store: &MemoryStore, seeds: &[EquipmentSeed]) -> Result<(), String> {
    for seed in seeds {
        let mut fields = Fields::new();
        fields.insert(equipment::NAME.to_string(), seed.name.clone().into());
        store
            .insert_with_id(tables::EQUIPMENT, &seed.id, fields)
            .map_err(|e| format!("could not seed equipment '{}': {}", seed.id, e))?;
    }
    Ok(())
}

#[cfg(feature = "airtable")]
fn airtable_store(
    store: &StoreConfig,
    seeds: &[EquipmentSeed],
) -> Result<Arc<dyn RecordStore>, String> {
    use planta_storage::airtable::{AirtableConfig, AirtableStore, DEFAULT_BASE_URL};

    let base_id = store
        .base_id
        .clone()
        .ok_or("airtable backend requires [store] base_id or AIRTABLE_BASE_ID")?;
    let token = store
        .token
        .clone()
        .ok_or("airtable backend requires [store] token or AIRTABLE_TOKEN")?;
    if !seeds.is_empty() {
        tracing::warn!("[[equipment]] seeds are ignored by the airtable backend");
    }
    tracing::info!(base_id = %base_id, "using airtable store");
    Ok(Arc::new(AirtableStore::new(AirtableConfig {
        base_url: store
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        base_id,
        token,
        timeout: store.timeout_secs.map(std::time::Duration::from_secs),
    })))
}

#[cfg(not(feature = "airtable"))]
fn airtable_store(
    _store: &StoreConfig,
    _seeds: &[EquipmentSeed],
) -> Result<Arc<dyn RecordStore>, String> {
    Err("this build of planta was compiled without the `airtable` feature".to_string())
}
