use std::sync::Arc;

use crate::error::StoreError;
use crate::store::ComplaintStore;
use crate::types::{Category, Complaint, GeoPoint, GeoWindow};

/// Half-width of the duplicate window on each axis (about 500 m).
pub const DUPLICATE_WINDOW_DEGREES: f64 = 0.005;

/// Finds the canonical open complaint a new report duplicates.
pub struct DuplicateDetector {
    complaints: Arc<dyn ComplaintStore>,
}

impl DuplicateDetector {
    pub fn new(complaints: Arc<dyn ComplaintStore>) -> Self {
        Self { complaints }
    }

    /// Oldest open complaint of `category` inside the window around `point`.
    /// ESCALATED counts as open here; only RESOLVED is excluded.
    pub async fn find_duplicate(
        &self,
        category: Category,
        point: GeoPoint,
    ) -> Result<Option<Complaint>, StoreError> {
        let window = GeoWindow::around(point, DUPLICATE_WINDOW_DEGREES);
        let candidates = self
            .complaints
            .find_open_in_window(&window, Some(category))
            .await?;

        Ok(candidates
            .into_iter()
            .filter(|c| c.is_open() && c.category == category && window.contains(c.location))
            .min_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.complaint_id.cmp(&b.complaint_id))
            }))
    }
}
