use std::sync::Arc;

use crate::store::DepartmentDirectory;
use crate::types::{Department, RoutingTier, Zone};

#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub department: Option<Department>,
    pub tier: Option<RoutingTier>,
    pub note: String,
}

/// Resolves a predicted department name to a department record. Tiers, each
/// tried only if the previous found nothing:
/// 1. exact case-insensitive name within the resolved zone
/// 2. case-insensitive contains (either direction) within the resolved zone
/// 3. the configured fallback, matched by substring with no zone constraint
///
/// Candidates are sorted by name so ties resolve the same way every time.
pub struct DepartmentRouter {
    departments: Arc<dyn DepartmentDirectory>,
    fallback_name: String,
}

impl DepartmentRouter {
    pub fn new(departments: Arc<dyn DepartmentDirectory>, fallback_name: impl Into<String>) -> Self {
        Self {
            departments,
            fallback_name: fallback_name.into(),
        }
    }

    pub async fn route(&self, predicted: Option<&str>, zone: Option<&Zone>) -> RoutingDecision {
        let predicted = predicted.map(str::trim).filter(|p| !p.is_empty());

        if let (Some(name), Some(zone)) = (predicted, zone) {
            let mut in_zone = match self.departments.list_departments_in_zone(&zone.zone_id).await {
                Ok(departments) => departments,
                Err(e) => {
                    tracing::warn!("Failed to list departments in zone {}: {}", zone.zone_id, e);
                    Vec::new()
                }
            };
            in_zone.sort_by(|a, b| a.name.cmp(&b.name));

            if let Some(department) = in_zone.iter().find(|d| d.name.eq_ignore_ascii_case(name)) {
                return RoutingDecision {
                    note: format!("matched '{}' in zone {}", department.name, zone.name),
                    department: Some(department.clone()),
                    tier: Some(RoutingTier::ExactInZone),
                };
            }

            let wanted = name.to_lowercase();
            if let Some(department) = in_zone.iter().find(|d| {
                let have = d.name.to_lowercase();
                have.contains(&wanted) || wanted.contains(&have)
            }) {
                return RoutingDecision {
                    note: format!(
                        "'{}' partially matched '{}' in zone {}",
                        name, department.name, zone.name
                    ),
                    department: Some(department.clone()),
                    tier: Some(RoutingTier::PartialInZone),
                };
            }
        }

        self.fallback(predicted).await
    }

    async fn fallback(&self, predicted: Option<&str>) -> RoutingDecision {
        let mut all = match self.departments.list_departments().await {
            Ok(departments) => departments,
            Err(e) => {
                tracing::warn!("Failed to list departments for fallback routing: {}", e);
                Vec::new()
            }
        };
        // Zone-less departments first, then by name
        all.sort_by(|a, b| {
            a.zone_id
                .is_some()
                .cmp(&b.zone_id.is_some())
                .then_with(|| a.name.cmp(&b.name))
        });

        let wanted = self.fallback_name.to_lowercase();
        let reason = match predicted {
            Some(name) => format!("no in-zone match for '{}'", name),
            None => "no department predicted".to_string(),
        };

        match all.into_iter().find(|d| d.name.to_lowercase().contains(&wanted)) {
            Some(department) => RoutingDecision {
                note: format!("{}, routed to fallback '{}'", reason, department.name),
                department: Some(department),
                tier: Some(RoutingTier::GlobalFallback),
            },
            None => {
                tracing::warn!(
                    "Fallback department '{}' not found, complaint left unassigned",
                    self.fallback_name
                );
                RoutingDecision {
                    department: None,
                    tier: None,
                    note: format!("{}, fallback '{}' missing", reason, self.fallback_name),
                }
            }
        }
    }
}
