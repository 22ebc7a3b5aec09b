use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::figures::FigureSet;
use super::report::VarianceReport;
use super::variance;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventPublisher};
use crate::money::Money;

/// Reconciles returns at a fixed materiality threshold and announces each report.
pub struct ReconciliationService<P> {
    events: Arc<P>,
    materiality_threshold: Money,
}

impl<P: EventPublisher> ReconciliationService<P> {
    pub fn new(events: Arc<P>, materiality_threshold: Money) -> Result<Self, EngineError> {
        if materiality_threshold.is_negative() {
            return Err(EngineError::validation(format!(
                "materiality threshold cannot be negative (got {materiality_threshold})"
            )));
        }
        Ok(Self {
            events,
            materiality_threshold,
        })
    }

    pub fn from_config(events: Arc<P>, config: &EngineConfig) -> Result<Self, EngineError> {
        Self::new(events, config.materiality_threshold)
    }

    pub const fn materiality_threshold(&self) -> Money {
        self.materiality_threshold
    }

    pub fn reconcile(
        &self,
        reference: &FigureSet,
        computed: &FigureSet,
    ) -> Result<VarianceReport, EngineError> {
        let rows = variance::reconcile(reference, computed, self.materiality_threshold)?;
        let report = VarianceReport::new(rows, self.materiality_threshold);

        if report.needs_review() {
            warn!(summary = %report.summary(), "variance report needs review");
        } else {
            info!(summary = %report.summary(), "variance report generated");
        }

        self.events.publish(EngineEvent::VarianceReportGenerated {
            occurred_at: Utc::now(),
            report: report.clone(),
        })?;
        Ok(report)
    }
}
