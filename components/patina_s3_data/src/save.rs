//! S3 Data Save Path
//!
//! Runs once per suspend. The non-volatile and volatile blobs come from the silicon init library; the range
//! configuration snapshot is taken right before it is written so it reflects the state at save time.
//!
//! Every region is written independently. A probe, erase, or write failure on one region is recorded in the
//! [`S3SaveReport`] and the remaining regions are still attempted: losing one blob should degrade the next resume, not
//! forfeit the others. Nothing on this path allocates.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use crate::{
    LOG_TARGET, codec,
    error::{Result, S3DataError},
    layout::{Region, S3DataKind, S3DataLayout},
    range_config::{RANGE_CONFIG_SNAPSHOT_MAX, RangeConfigBackend},
    reservation::{ReservationId, ResumeMemoryReservation, ResumeReservations},
    storage::{FlashSession, SpiFlash},
};

/// Blobs handed over by the silicon init library at suspend. An empty slice means there is nothing to save.
#[derive(Debug, Clone, Copy, Default)]
pub struct S3SaveParams<'a> {
    pub non_volatile: &'a [u8],
    pub volatile: &'a [u8],
}

/// What happened to one region during save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionOutcome {
    /// Nothing to save, or no storage for it. The region was not touched.
    #[default]
    Skipped,
    /// The blob was written.
    Saved { length: u32 },
    /// The region could not be written.
    Failed(S3DataError),
}

/// Aggregated result of a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct S3SaveReport {
    regions: [RegionOutcome; S3DataKind::COUNT],
    reservations: [Option<S3DataError>; ReservationId::COUNT],
}

impl S3SaveReport {
    /// Outcome for the region holding `kind`.
    pub fn outcome(&self, kind: S3DataKind) -> RegionOutcome {
        self.regions[kind as usize]
    }

    /// The error reported while reserving `id`, if any.
    pub fn reservation_error(&self, id: ReservationId) -> Option<S3DataError> {
        self.reservations[id.index()]
    }

    /// Every failure, reservations first, then regions in save order.
    pub fn errors(&self) -> impl Iterator<Item = S3DataError> + '_ {
        // Regions are indexed by raw tag, which is also the order they are written in.
        let reservations = self.reservations.iter().flatten().copied();
        let regions = self.regions.iter().filter_map(|outcome| match outcome {
            RegionOutcome::Failed(err) => Some(*err),
            _ => None,
        });
        reservations.chain(regions)
    }

    /// Returns true if nothing failed.
    pub fn is_success(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Number of regions written.
    pub fn saved_count(&self) -> usize {
        self.regions.iter().filter(|outcome| matches!(outcome, RegionOutcome::Saved { .. })).count()
    }

    /// Collapses the report into the first failure, if any.
    pub fn into_result(self) -> Result<()> {
        match self.errors().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn record(&mut self, kind: S3DataKind, outcome: RegionOutcome) {
        self.regions[kind as usize] = outcome;
    }
}

/// Saves the S3 data.
///
/// Never fails as a whole; see [`S3SaveReport`] for the per-region results.
pub fn save(
    layout: &S3DataLayout,
    reservations: &ResumeReservations,
    flash: &mut dyn SpiFlash,
    range_config: &mut dyn RangeConfigBackend,
    reserver: &mut dyn ResumeMemoryReservation,
    params: S3SaveParams<'_>,
) -> S3SaveReport {
    log::info!(
        target: LOG_TARGET,
        "Saving S3 data: non-volatile={:#x}, volatile={:#x}",
        params.non_volatile.len(),
        params.volatile.len()
    );

    let mut report = S3SaveReport::default();

    for (id, size) in reservations.iter() {
        if let Err(status) = reserver.reserve(id, size) {
            log::warn!(target: LOG_TARGET, "Failed to reserve {:?} ({:#x} bytes): {:?}", id, size, status);
            report.reservations[id.index()] = Some(S3DataError::ReservationFailed { id, status });
        }
    }

    // Consumed by the early resume phase.
    report.record(
        S3DataKind::NonVolatile,
        write_region(flash, S3DataKind::NonVolatile, layout.locate(S3DataKind::NonVolatile), params.non_volatile),
    );

    // Consumed by the late resume phase.
    report.record(
        S3DataKind::Volatile,
        write_region(flash, S3DataKind::Volatile, layout.locate(S3DataKind::Volatile), params.volatile),
    );

    // Consumed during CPU enumeration.
    let region = layout.locate(S3DataKind::RangeConfig);
    report.record(S3DataKind::RangeConfig, save_range_config(flash, range_config, region));

    log::info!(
        target: LOG_TARGET,
        "S3 data save complete: {} region(s) written, {} failure(s)",
        report.saved_count(),
        report.errors().count()
    );
    report
}

fn save_range_config(
    flash: &mut dyn SpiFlash,
    range_config: &mut dyn RangeConfigBackend,
    region: Region,
) -> RegionOutcome {
    if region.is_empty() {
        log::debug!(target: LOG_TARGET, "No storage for the range configuration, skipping");
        return RegionOutcome::Skipped;
    }

    let mut snapshot = [0u8; RANGE_CONFIG_SNAPSHOT_MAX];
    let bound = core::cmp::min(region.payload_capacity() as usize, snapshot.len());
    let length = range_config.backup(&mut snapshot[..bound]);
    if length > bound {
        log::error!(
            target: LOG_TARGET,
            "Range configuration snapshot of {:#x} bytes does not fit in {:#x} bytes",
            length,
            bound
        );
        return RegionOutcome::Failed(S3DataError::CapacityExceeded {
            kind: S3DataKind::RangeConfig,
            requested: length,
            available: bound as u32,
        });
    }

    write_region(flash, S3DataKind::RangeConfig, region, &snapshot[..length])
}

fn write_region(flash: &mut dyn SpiFlash, kind: S3DataKind, region: Region, payload: &[u8]) -> RegionOutcome {
    if payload.is_empty() {
        log::debug!(target: LOG_TARGET, "No {kind} data to save");
        return RegionOutcome::Skipped;
    }
    if region.is_empty() {
        log::warn!(target: LOG_TARGET, "No storage for {kind} data, dropping {:#x} bytes", payload.len());
        return RegionOutcome::Skipped;
    }

    let result = codec::check_capacity(kind, region, payload.len()).and_then(|()| {
        let mut session = FlashSession::open(flash)?;
        codec::encode(&mut *session, kind, region, payload)
    });

    match result {
        Ok(()) => {
            log::debug!(target: LOG_TARGET, "Saved {kind} data: {:#x} bytes at {:#x}", payload.len(), region.offset);
            RegionOutcome::Saved { length: payload.len() as u32 }
        }
        Err(err) => {
            log::error!(target: LOG_TARGET, "Failed to save {kind} data: {err}");
            RegionOutcome::Failed(err)
        }
    }
}
