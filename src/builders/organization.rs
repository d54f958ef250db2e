//! Bootstrap an organization (warehouse, board, scheduler) from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::OrganizationConfig;
use crate::core::{AuditSink, Board, ChiefOfStaff, DispatchError, MissionSpec, Warehouse};

/// A fully wired organization.
#[derive(Debug, Clone)]
pub struct Organization {
    /// Shared warehouse.
    pub warehouse: Arc<Warehouse>,
    /// Mission board.
    pub board: Arc<Board>,
    /// Scheduler driving the board.
    pub chief: Arc<ChiefOfStaff>,
}

/// Build an organization from validated configuration.
///
/// Stock is added first, then sergeants in configuration order, then missions
/// in dependency order so every prerequisite already exists. The scheduler is
/// not started.
///
/// # Errors
///
/// `DispatchError::Config` if validation fails, or the first board or
/// sergeant error.
pub fn build_organization(
    cfg: &OrganizationConfig,
    audit: Option<Arc<dyn AuditSink>>,
) -> Result<Organization, DispatchError> {
    cfg.validate()
        .map_err(|e| DispatchError::Config(format!("config invalid: {e}")))?;

    let warehouse = Arc::new(Warehouse::new());
    for stock in &cfg.stock {
        warehouse.add_stock(&stock.name, stock.amount)?;
    }

    let board = Arc::new(match &audit {
        Some(sink) => Board::new().with_audit(Arc::clone(sink)),
        None => Board::new(),
    });
    let chief = Arc::new(ChiefOfStaff::new(
        Arc::clone(&board),
        Arc::clone(&warehouse),
        cfg.runtime.clone(),
        audit,
    ));
    for sergeant in &cfg.sergeants {
        chief.add_sergeant(sergeant)?;
    }

    let mut ids = HashMap::with_capacity(cfg.missions.len());
    for mission in cfg.missions_in_dependency_order() {
        let mut spec = MissionSpec::new(&mission.name, &mission.skill, mission.duration);
        spec.items.clone_from(&mission.items);
        for pre in &mission.prerequisites {
            if let Some(&id) = ids.get(pre.as_str()) {
                spec = spec.with_prerequisite(id);
            }
        }
        let id = board.create_mission(spec)?;
        ids.insert(mission.name.as_str(), id);
    }

    info!(
        missions = board.len(),
        sergeants = cfg.sergeants.len(),
        items = cfg.stock.len(),
        threads = chief.total_threads(),
        "organization built"
    );
    Ok(Organization {
        warehouse,
        board,
        chief,
    })
}
