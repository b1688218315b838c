//! Scenario files: master data plus an ordered list of commands, replayed
//! against a fresh in-memory plant.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use plantflow_catalog::{
    CatalogService, DirectBom, InMemoryCatalog, Item, Location, LocationService, PeetuBom, ProductYieldBom,
};
use plantflow_core::{CategoryId, ItemId};
use plantflow_events::{EventBus, EventEnvelope, InMemoryEventBus};
use plantflow_infra::{EngineConfig, InMemoryAuditLog, InMemoryPlantStore, PlantCommand, PlantEngine};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMember {
    pub category: CategoryId,
    pub item: ItemId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Overrides `PLANTFLOW_*` variables when present.
    pub config: Option<EngineConfig>,
    pub items: Vec<Item>,
    pub locations: Vec<Location>,
    pub direct_boms: Vec<DirectBom>,
    pub peetu_boms: Vec<PeetuBom>,
    pub yield_boms: Vec<ProductYieldBom>,
    pub category_members: Vec<CategoryMember>,
    pub steps: Vec<PlantCommand>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("failed to parse scenario {}", path.display()))
    }

    /// Register master data; recipes are validated on the way in.
    pub fn catalog(&self) -> Result<InMemoryCatalog> {
        let catalog = InMemoryCatalog::new();
        for item in &self.items {
            catalog.add_item(item.clone());
        }
        for location in &self.locations {
            catalog.add_location(location.clone());
        }
        for bom in &self.direct_boms {
            catalog
                .add_direct_bom(bom.clone())
                .with_context(|| format!("direct recipe for {}", bom.finished_item))?;
        }
        for bom in &self.peetu_boms {
            catalog
                .add_peetu_bom(bom.clone())
                .with_context(|| format!("peetu recipe for {}", bom.peetu_item))?;
        }
        for bom in &self.yield_boms {
            catalog
                .add_yield_bom(bom.clone())
                .with_context(|| format!("yield row for {}", bom.finished_item))?;
        }
        for member in &self.category_members {
            if catalog.item(&member.item).is_none() {
                bail!("category member {} is not a known item", member.item);
            }
            catalog.add_category_member(member.category, member.item);
        }
        Ok(catalog)
    }
}

/// Resolve the configured store and production floor codes.
pub fn well_known_locations(catalog: &InMemoryCatalog, config: &EngineConfig) -> Result<(Location, Location)> {
    let store = catalog
        .resolve_code(&config.store_location)
        .with_context(|| format!("store location {} is not defined", config.store_location))?;
    let floor = catalog
        .resolve_code(&config.production_location)
        .with_context(|| format!("production location {} is not defined", config.production_location))?;
    Ok((store, floor))
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceRow {
    pub item: String,
    pub location: String,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub steps: Vec<StepOutcome>,
    pub balances: Vec<BalanceRow>,
    pub events_published: usize,
    pub commands_audited: usize,
}

impl Report {
    pub fn rejected(&self) -> usize {
        self.steps.iter().filter(|s| s.error.is_some()).count()
    }
}

/// Replay every step. Rejected steps are recorded and leave the plant untouched;
/// with `fail_fast` the first rejection aborts the run.
pub fn run(scenario: &Scenario, config: EngineConfig, fail_fast: bool) -> Result<Report> {
    let catalog = Arc::new(scenario.catalog()?);
    let audit = Arc::new(InMemoryAuditLog::new());
    let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
    let published = bus.subscribe();

    let engine = PlantEngine::new(
        InMemoryPlantStore::new(),
        bus,
        catalog.clone(),
        catalog.clone(),
        audit.clone(),
        config,
    );

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, command) in scenario.steps.iter().cloned().enumerate() {
        let name = command.name();
        let error = match engine.dispatch(command) {
            Ok(()) => None,
            Err(err) if fail_fast => bail!("step {index} ({name}) rejected: {err}"),
            Err(err) => Some(err.to_string()),
        };
        tracing::debug!(index, command = name, rejected = error.is_some(), "step replayed");
        steps.push(StepOutcome {
            index,
            command: name,
            error,
        });
    }

    let mut balances = Vec::new();
    let mut items = catalog.items();
    items.sort_by(|a, b| a.code.cmp(&b.code));
    for item in items {
        for (location, balance) in engine.ledger().balances_for_item(item.id)? {
            let location = catalog
                .resolve(&location)
                .map(|l| l.code)
                .unwrap_or_else(|| location.to_string());
            balances.push(BalanceRow {
                item: item.code.clone(),
                location,
                balance,
            });
        }
    }

    Ok(Report {
        steps,
        balances,
        events_published: published.drain().len(),
        commands_audited: audit.records().len(),
    })
}
