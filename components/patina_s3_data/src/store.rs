//! S3 Data Store
//!
//! [`S3DataStore`] binds a validated [`S3DataConfig`] to the save and restore paths so each boot phase only needs the
//! store and the collaborators it actually uses.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use alloc::boxed::Box;

use crate::{
    LOG_TARGET,
    config::S3DataConfig,
    error::Result,
    layout::{Region, S3DataKind, S3DataLayout},
    range_config::RangeConfigBackend,
    reservation::{ResumeMemoryReservation, ResumeReservations},
    restore,
    save::{self, S3SaveParams, S3SaveReport},
    storage::{BlobView, MappedWindow, SpiFlash},
};

/// Entry point for saving and restoring S3 data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct S3DataStore {
    config: S3DataConfig,
    layout: S3DataLayout,
}

impl S3DataStore {
    /// Creates a store for `config`.
    ///
    /// Fails with [`InvalidConfiguration`](crate::S3DataError::InvalidConfiguration) if the configuration does not
    /// describe a usable layout.
    pub fn new(config: &S3DataConfig) -> Result<Self> {
        let layout = S3DataLayout::new(config).inspect_err(|err| {
            log::error!(target: LOG_TARGET, "Invalid S3 data configuration: {err}");
        })?;
        Ok(Self { config: *config, layout })
    }

    /// The configuration this store was created from.
    pub fn config(&self) -> &S3DataConfig {
        &self.config
    }

    /// The region layout derived from the configuration.
    pub fn layout(&self) -> &S3DataLayout {
        &self.layout
    }

    /// Returns the region holding `kind`.
    pub fn locate(&self, kind: S3DataKind) -> Region {
        self.layout.locate(kind)
    }

    /// Saves the S3 data during suspend. See [`save::save`].
    pub fn save(
        &self,
        flash: &mut dyn SpiFlash,
        range_config: &mut dyn RangeConfigBackend,
        reserver: &mut dyn ResumeMemoryReservation,
        params: S3SaveParams<'_>,
    ) -> S3SaveReport {
        let reservations = ResumeReservations::from_config(&self.config);
        save::save(&self.layout, &reservations, flash, range_config, reserver, params)
    }

    /// Returns the saved non-volatile blob. See [`restore::early_restore`].
    pub fn early_restore<'a>(&self, window: &MappedWindow<'a>) -> Option<BlobView<'a>> {
        restore::early_restore(&self.layout, window)
    }

    /// Returns a heap copy of the saved volatile blob. See [`restore::late_restore`].
    pub fn late_restore(&self, window: &MappedWindow<'_>) -> Option<Box<[u8]>> {
        restore::late_restore(&self.layout, window)
    }

    /// Returns the saved range configuration snapshot.
    pub fn saved_range_config<'a>(&self, window: &MappedWindow<'a>) -> Option<BlobView<'a>> {
        restore::saved_range_config(&self.layout, window)
    }

    /// Replays the saved range configuration snapshot into `backend`.
    pub fn restore_range_config(&self, window: &MappedWindow<'_>, backend: &mut dyn RangeConfigBackend) -> bool {
        restore::restore_range_config(&self.layout, window, backend)
    }
}
